//! LLM evaluation: retrying, decoding calls and the per-chunk fan-out.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::decode::{decode_many, decode_one};
use crate::fanout::{Dispatcher, FanOutOutcome};
use crate::llm::{complete_with_retry, LlmProvider};
use crate::models::{ChunkScore, FileChunk, RepoTarget};

/// Wraps a provider with the retry budget and typed decoding.
#[derive(Clone)]
pub struct Evaluator {
    provider: Arc<dyn LlmProvider>,
    max_attempts: u32,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn LlmProvider>, max_attempts: u32) -> Self {
        Self {
            provider,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        complete_with_retry(self.provider.as_ref(), system, user, self.max_attempts)
            .await
            .with_context(|| format!("{} completion failed", self.provider.name()))
    }

    /// One completion decoded as a single `T`.
    pub async fn evaluate<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T> {
        let text = self.complete(system, user).await?;
        decode_one(&text)
    }

    /// One completion decoded as a list of `T`.
    pub async fn evaluate_many<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Vec<T>> {
        let text = self.complete(system, user).await?;
        decode_many(&text, self.provider.wraps_single_values())
    }
}

/// The user message for one chunk.
pub fn chunk_prompt(repo: &RepoTarget, chunk: &FileChunk) -> String {
    format!(
        "[REPO] {}/{}@{}\n[FILE] {} ({})\n[LINES] {}-{}\n\n[CODE]\n{}\n\n[REQUIREMENTS]\n\
         - Output STRICT JSON: {{readability, design, testing, maintainability, idiomatic, security, notes[], citations[]}}\n\
         - Base judgments ONLY on this snippet.\n\
         - Cite concrete lines where relevant.",
        repo.owner,
        repo.name,
        repo.default_branch,
        chunk.path,
        chunk.language,
        chunk.start_line,
        chunk.end_line,
        chunk.content,
    )
}

/// Score every chunk through `dispatcher`.
///
/// Results line up with `chunks`. Failed chunks are logged and left empty;
/// the outcome's `first_error` holds the first failure in completion order.
pub async fn evaluate_all(
    evaluator: &Evaluator,
    dispatcher: &Dispatcher,
    system_prompt: &str,
    repo: &RepoTarget,
    chunks: &[FileChunk],
) -> FanOutOutcome<ChunkScore> {
    let system: Arc<str> = Arc::from(system_prompt);
    let prompts: Vec<(String, String)> = chunks
        .iter()
        .map(|chunk| (chunk.path.clone(), chunk_prompt(repo, chunk)))
        .collect();
    let full_name = repo.full_name();

    let outcome = dispatcher
        .run(prompts, |_, (path, user)| {
            let evaluator = evaluator.clone();
            let system = system.clone();
            let full_name = full_name.clone();
            async move {
                evaluator
                    .evaluate::<ChunkScore>(&system, &user)
                    .await
                    .map_err(|e| {
                        tracing::warn!(repo = %full_name, path = %path, error = %e, "chunk evaluation failed");
                        e.context(format!("evaluating {}", path))
                    })
            }
        })
        .await;

    tracing::debug!(
        repo = %full_name,
        chunks = chunks.len(),
        failures = outcome.failures,
        "chunk evaluation finished"
    );
    outcome
}
