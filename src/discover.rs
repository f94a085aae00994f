//! Merging and ranking of discovered repositories.
//!
//! Pinned repositories come first, in the order the provider returned them.
//! Non-pinned repositories follow, deduplicated against the pinned set by
//! `owner/name` and sorted by descending star count (missing counts rank as
//! zero; ties keep query order, which is most-recently-pushed first). The
//! combined list is truncated to the limit last.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;

use crate::config::AppConfig;
use crate::host::{HostedRepo, UserRepositories};
use crate::models::RepoTarget;

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// `0` means no limit.
    pub limit: usize,
    pub include_pinned: bool,
    pub include_non_pinned: bool,
    pub exclude_forks: bool,
    /// Matched against `owner/name`.
    pub exclude: GlobSet,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            include_pinned: true,
            include_non_pinned: true,
            exclude_forks: false,
            exclude: GlobSet::empty(),
        }
    }
}

impl DiscoverOptions {
    pub fn from_app(app: &AppConfig) -> Result<Self> {
        Ok(Self {
            limit: app.repos_limit,
            include_pinned: app.include_pinned,
            include_non_pinned: app.include_non_pinned,
            exclude_forks: app.exclude_forks,
            exclude: build_globset(&app.exclude_repos)?,
        })
    }

    fn admits(&self, repo: &HostedRepo) -> bool {
        if repo.name_with_owner.is_empty() {
            return false;
        }
        if self.exclude_forks && repo.is_fork {
            return false;
        }
        !self.exclude.is_match(&repo.name_with_owner)
    }
}

pub fn merge_repositories(found: &UserRepositories, options: &DiscoverOptions) -> Vec<RepoTarget> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut targets = Vec::new();

    if options.include_pinned {
        for repo in &found.pinned {
            if options.admits(repo) && seen.insert(repo.name_with_owner.as_str()) {
                targets.push(repo.to_target(true));
            }
        }
    }

    if options.include_non_pinned {
        let mut remaining = Vec::new();
        for repo in &found.recent {
            if options.admits(repo) && seen.insert(repo.name_with_owner.as_str()) {
                remaining.push(repo.to_target(false));
            }
        }
        // Stable: equal star counts keep query order.
        remaining.sort_by(|a, b| b.stars.cmp(&a.stars));
        targets.extend(remaining);
    }

    if options.limit > 0 {
        targets.truncate(options.limit);
    }
    targets
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
