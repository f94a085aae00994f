//! The profiling service: one user handle in, one HTML report out.
//!
//! # Pipeline
//!
//! ```text
//! discover ──▶ per repository (bounded) ──────────────────────────▶ sort ──▶ headline ──▶ render
//!              commit ─▶ tree ─┬─▶ architecture review                        summary
//!                              └─▶ select ─▶ sample ─▶ score chunks ─▶ aggregate
//! ```
//!
//! Repositories run on their own pool of `llm.parallel_requests` slots.
//! Every LLM call of the run, whichever repository issues it, goes through
//! one shared [`Dispatcher`] so the configured parallelism and
//! requests-per-minute apply to the run as a whole.
//!
//! Only a failed discovery or an empty repository list aborts
//! [`Profiler::submit`]. Anything that goes wrong inside one repository
//! degrades that repository's row to an empty result.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::aggregate::assemble;
use crate::cache::DiskCache;
use crate::config::{AppConfig, Config};
use crate::discover::DiscoverOptions;
use crate::evaluate::{evaluate_all, Evaluator};
use crate::fanout::Dispatcher;
use crate::host::{CodeHost, RepoSource};
use crate::llm::LlmProvider;
use crate::models::{ArchReview, RepoResult, RepoTarget};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::prompts::{render, Prompts};
use crate::report::{render_html, Report};
use crate::sampler::sample_chunks;
use crate::select::{detect_repo_kind, select_paths, RepoKind};

/// Paths listed in the architecture prompt, at most.
pub const MAX_TREE_PATHS: usize = 1500;

#[derive(Clone)]
pub struct Profiler {
    inner: Arc<Inner>,
}

struct Inner {
    app: AppConfig,
    discover: DiscoverOptions,
    source: RepoSource,
    evaluator: Evaluator,
    /// Shared by every LLM call of a run.
    llm: Dispatcher,
    repo_parallelism: usize,
    prompts: Prompts,
    progress: Arc<dyn ProgressReporter>,
}

#[derive(Deserialize)]
struct HeadlineOut {
    #[serde(default)]
    headline: String,
}

#[derive(Deserialize)]
struct SummaryOut {
    #[serde(default)]
    summary: String,
}

impl Profiler {
    pub fn new(
        config: &Config,
        host: Arc<dyn CodeHost>,
        provider: Arc<dyn LlmProvider>,
        cache: DiskCache,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        let discover = DiscoverOptions::from_app(&config.app).context("invalid app.exclude_repos")?;
        let source = RepoSource::new(
            host,
            cache,
            config.cache.repos_ttl(),
            config.cache.content_ttl(),
        );
        let parallelism = config.llm.parallelism();

        Ok(Self {
            inner: Arc::new(Inner {
                app: config.app.clone(),
                discover,
                source,
                evaluator: Evaluator::new(provider, config.llm.max_attempts),
                llm: Dispatcher::for_rate(parallelism, config.llm.rpm()),
                repo_parallelism: parallelism,
                prompts: Prompts::load(config.app.prompt_path.as_deref()),
                progress,
            }),
        })
    }

    /// Profile `user` and return the rendered HTML report.
    pub async fn submit(&self, user: &str) -> Result<String> {
        let inner = &self.inner;
        inner.progress.report(ProgressEvent::Discovering {
            user: user.to_string(),
        });

        let repos = inner.source.discover(user, &inner.discover).await?;
        if repos.is_empty() {
            bail!("no repositories for @{}", user);
        }
        tracing::info!(user, repos = repos.len(), "analyzing repositories");
        inner.progress.report(ProgressEvent::Discovered {
            user: user.to_string(),
            repos: repos.len(),
        });

        let mut results = self.evaluate_repos(repos).await;
        // Stable: equal scores keep discovery order.
        results.sort_by(|a, b| b.score.cmp(&a.score));

        inner.progress.report(ProgressEvent::Rendering);
        let (headline, summary) = tokio::join!(
            self.headline(user, &results),
            self.summary(user, &results)
        );

        Ok(render_html(&Report {
            user,
            results: &results,
            headline: headline.as_deref(),
            summary: summary.as_deref(),
            generated_at: Utc::now(),
        }))
    }

    async fn evaluate_repos(&self, repos: Vec<RepoTarget>) -> Vec<RepoResult> {
        let total = repos.len();
        let done = Arc::new(AtomicUsize::new(0));
        let pool = Dispatcher::unthrottled(self.inner.repo_parallelism);

        let outcome = pool
            .run(repos.clone(), |_, repo| {
                let profiler = self.clone();
                let done = done.clone();
                async move {
                    profiler.inner.progress.report(ProgressEvent::RepoStarted {
                        repo: repo.full_name(),
                    });
                    let result = profiler.evaluate_repo(repo).await;
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    profiler.inner.progress.report(ProgressEvent::RepoFinished {
                        repo: result.repo.full_name(),
                        score: result.score,
                        n,
                        total,
                    });
                    Ok(result)
                }
            })
            .await;

        if let Some(e) = &outcome.first_error {
            tracing::warn!(error = %e, "repository task failed");
        }

        outcome
            .results
            .into_iter()
            .zip(repos)
            .map(|(result, repo)| result.unwrap_or_else(|| RepoResult::empty(repo)))
            .collect()
    }

    /// Evaluate one repository; never fails, degrades instead.
    pub async fn evaluate_repo(&self, repo: RepoTarget) -> RepoResult {
        match self.try_evaluate_repo(&repo).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(repo = %repo.full_name(), error = %format!("{:#}", e), "repository analysis failed");
                RepoResult::empty(repo)
            }
        }
    }

    async fn try_evaluate_repo(&self, repo: &RepoTarget) -> Result<RepoResult> {
        let inner = &self.inner;
        let full_name = repo.full_name();

        let sha = inner
            .source
            .commit_sha(repo)
            .await
            .with_context(|| format!("resolving {}@{}", full_name, repo.default_branch))?;
        let tree = inner
            .source
            .tree(repo, &sha)
            .await
            .with_context(|| format!("listing tree of {}", full_name))?;

        let paths = select_paths(&tree, inner.app.chunks_per_repo);
        tracing::debug!(repo = %full_name, sha = %short_sha(&sha), files = paths.len(), "files selected");

        let (arch, chunks) = tokio::join!(
            self.architecture(repo, &tree),
            sample_chunks(&inner.source, repo, &sha, &paths, inner.app.max_chunk_bytes)
        );

        if chunks.is_empty() {
            tracing::warn!(repo = %full_name, "no readable files selected");
            let mut result = RepoResult::empty(repo.clone());
            result.arch_strengths = arch.arch_strengths;
            result.arch_considerations = arch.arch_considerations;
            result.files = paths.len();
            return Ok(result);
        }

        let outcome = evaluate_all(
            &inner.evaluator,
            &inner.llm,
            &inner.prompts.review,
            repo,
            &chunks,
        )
        .await;
        if let Some(e) = &outcome.first_error {
            tracing::warn!(
                repo = %full_name,
                failures = outcome.failures,
                error = %format!("{:#}", e),
                "some chunks were not scored"
            );
        }

        Ok(assemble(
            repo.clone(),
            paths.len(),
            &chunks,
            &outcome.results,
            arch,
        ))
    }

    /// Architecture review; any failure yields an empty review.
    async fn architecture(&self, repo: &RepoTarget, tree: &[String]) -> ArchReview {
        let inner = &self.inner;
        let template = match detect_repo_kind(tree) {
            RepoKind::Monorepo => &inner.prompts.arch_monorepo,
            RepoKind::Standard => &inner.prompts.arch_standard,
        };
        let listing = tree
            .iter()
            .take(MAX_TREE_PATHS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = render(
            template,
            &[("language", repo.language.as_str()), ("tree", listing.as_str())],
        );
        let user = format!(
            "[REPO] {}@{}\nReview the repository layout above.",
            repo.full_name(),
            repo.default_branch
        );

        let review = inner
            .llm
            .once(inner.evaluator.evaluate::<ArchReview>(&prompt, &user))
            .await;
        match review {
            Ok(review) => review,
            Err(e) => {
                tracing::warn!(repo = %repo.full_name(), error = %format!("{:#}", e), "architecture review failed");
                ArchReview::default()
            }
        }
    }

    async fn headline(&self, user: &str, results: &[RepoResult]) -> Option<String> {
        let inner = &self.inner;
        let table = summary_table(results, TableKind::Architecture);
        let prompt = render(&inner.prompts.headline, &[("summary_data", table.as_str())]);
        let request = format!("[USER] @{}\n\n{}", user, table);

        match inner
            .llm
            .once(inner.evaluator.evaluate::<HeadlineOut>(&prompt, &request))
            .await
        {
            Ok(out) if !out.headline.trim().is_empty() => Some(out.headline),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(user, error = %format!("{:#}", e), "headline generation failed");
                None
            }
        }
    }

    async fn summary(&self, user: &str, results: &[RepoResult]) -> Option<String> {
        let inner = &self.inner;
        let table = summary_table(results, TableKind::Code);
        let prompt = render(&inner.prompts.summary, &[("summary_data", table.as_str())]);
        let request = format!("[USER] @{}\n\n{}", user, table);

        match inner
            .llm
            .once(inner.evaluator.evaluate::<SummaryOut>(&prompt, &request))
            .await
        {
            Ok(out) if !out.summary.trim().is_empty() => Some(out.summary),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(user, error = %format!("{:#}", e), "summary generation failed");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    /// Architecture strengths and considerations.
    Architecture,
    /// Code-level strengths and risks.
    Code,
}

fn summary_table(results: &[RepoResult], kind: TableKind) -> String {
    let mut table = String::from("Repository Analysis Table:\nRepo\tScore\tStrengths\tRisks\n");
    for r in results {
        let (strengths, risks) = match kind {
            TableKind::Architecture => (
                r.arch_strengths.iter().map(|s| s.point()).collect::<Vec<_>>(),
                r.arch_considerations.iter().map(|c| c.point()).collect::<Vec<_>>(),
            ),
            TableKind::Code => (
                r.strengths.iter().map(String::as_str).collect(),
                r.risks.iter().map(String::as_str).collect(),
            ),
        };
        table.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            r.repo.full_name(),
            r.score,
            strengths.join(", "),
            risks.join(", ")
        ));
    }
    table
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchConsideration, ArchStrength};

    fn result(name: &str, score: u32) -> RepoResult {
        let mut r = RepoResult::empty(RepoTarget {
            owner: "octo".into(),
            name: name.into(),
            default_branch: "main".into(),
            stars: 0,
            pinned: false,
            language: "Go".into(),
        });
        r.score = score;
        r
    }

    #[test]
    fn code_table_lists_strengths_and_risks() {
        let mut a = result("kit", 71);
        a.strengths = vec!["idiomatic".into(), "well-structured".into()];
        a.risks = vec!["globals".into()];
        let table = summary_table(&[a, result("bare", 0)], TableKind::Code);
        assert_eq!(
            table,
            "Repository Analysis Table:\nRepo\tScore\tStrengths\tRisks\n\
             octo/kit\t71\tidiomatic, well-structured\tglobals\n\
             octo/bare\t0\t\t\n"
        );
    }

    #[test]
    fn architecture_table_uses_points() {
        let mut a = result("kit", 50);
        a.arch_strengths = vec![ArchStrength::SimpleText("layered".into())];
        a.arch_considerations = vec![ArchConsideration::DetailedPoint {
            point: "no CI".into(),
            justification: "x".into(),
            severity: "High".into(),
        }];
        let table = summary_table(&[a], TableKind::Architecture);
        assert!(table.ends_with("octo/kit\t50\tlayered\tno CI\n"));
    }

    #[test]
    fn short_sha_handles_short_input() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456");
        assert_eq!(short_sha("abc"), "abc");
    }
}
