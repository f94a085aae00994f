//! Code-hosting provider abstraction and its caching front.
//!
//! [`CodeHost`] is the seam to the remote provider: four idempotent calls
//! (discovery query, ref resolution, recursive tree, file content).
//! [`RepoSource`] wraps any host with the [`DiskCache`] so repeated runs
//! avoid repeated API traffic:
//!
//! | Call | Cache key | TTL |
//! |------|-----------|-----|
//! | discovery | `repos-<handle>.json` | `cache.repos_ttl_secs` (1h) |
//! | tree | `<owner>/<repo>/<sha>-tree.json` | `cache.content_ttl_secs` (30d) |
//! | file | `<owner>/<repo>/<sha>/<flattened path>.cache` | `cache.content_ttl_secs` |
//!
//! Ref resolution is never cached: it is what makes the other keys safe to
//! keep for a long time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{flat_file_name, DiskCache};
use crate::discover::{merge_repositories, DiscoverOptions};
use crate::models::RepoTarget;

/// One repository as reported by the provider's discovery query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostedRepo {
    pub name_with_owner: String,
    pub owner: String,
    pub name: String,
    pub default_branch: Option<String>,
    pub stars: Option<u32>,
    pub is_fork: bool,
    pub language: Option<String>,
}

impl HostedRepo {
    pub fn to_target(&self, pinned: bool) -> RepoTarget {
        RepoTarget {
            owner: self.owner.clone(),
            name: self.name.clone(),
            default_branch: self.default_branch.clone().unwrap_or_default(),
            stars: self.stars.unwrap_or(0),
            pinned,
            language: self.language.clone().unwrap_or_default(),
        }
    }
}

/// Result of the combined pinned + recently-pushed query, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRepositories {
    pub pinned: Vec<HostedRepo>,
    pub recent: Vec<HostedRepo>,
}

#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Pinned and recently pushed repositories of `handle`.
    async fn user_repositories(&self, handle: &str) -> Result<UserRepositories>;

    /// Resolve a branch name to its head commit SHA.
    async fn commit_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String>;

    /// Paths of every blob in the recursive tree at `sha`.
    async fn list_tree(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<String>>;

    /// Text content of `path` at `git_ref`.
    async fn read_file(&self, owner: &str, repo: &str, path: &str, git_ref: &str)
        -> Result<String>;
}

/// Caching access to a [`CodeHost`].
#[derive(Clone)]
pub struct RepoSource {
    host: Arc<dyn CodeHost>,
    cache: DiskCache,
    repos_ttl: Duration,
    content_ttl: Duration,
}

impl RepoSource {
    pub fn new(
        host: Arc<dyn CodeHost>,
        cache: DiskCache,
        repos_ttl: Duration,
        content_ttl: Duration,
    ) -> Self {
        Self {
            host,
            cache,
            repos_ttl,
            content_ttl,
        }
    }

    /// Discover, merge, and rank the repositories of `handle`.
    ///
    /// The ranked list is cached per handle; a query failure is returned.
    pub async fn discover(&self, handle: &str, options: &DiscoverOptions) -> Result<Vec<RepoTarget>> {
        let key = format!("repos-{}.json", handle);
        if let Some(cached) = self.cached::<Vec<RepoTarget>>(&key, self.repos_ttl) {
            tracing::debug!(handle, count = cached.len(), "repository list served from cache");
            return Ok(cached);
        }

        let found = self
            .host
            .user_repositories(handle)
            .await
            .with_context(|| format!("repository discovery for @{} failed", handle))?;
        let targets = merge_repositories(&found, options);

        self.store(&key, &targets);
        Ok(targets)
    }

    pub async fn commit_sha(&self, repo: &RepoTarget) -> Result<String> {
        self.host
            .commit_sha(&repo.owner, &repo.name, &repo.default_branch)
            .await
    }

    pub async fn tree(&self, repo: &RepoTarget, sha: &str) -> Result<Vec<String>> {
        let key = format!("{}/{}/{}-tree.json", repo.owner, repo.name, sha);
        if let Some(cached) = self.cached::<Vec<String>>(&key, self.content_ttl) {
            return Ok(cached);
        }

        let paths = self.host.list_tree(&repo.owner, &repo.name, sha).await?;
        self.store(&key, &paths);
        Ok(paths)
    }

    pub async fn file(&self, repo: &RepoTarget, sha: &str, path: &str) -> Result<String> {
        let key = format!(
            "{}/{}/{}/{}",
            repo.owner,
            repo.name,
            sha,
            flat_file_name(path)
        );
        if let Some(cached) = self.cached::<String>(&key, self.content_ttl) {
            return Ok(cached);
        }

        let content = self
            .host
            .read_file(&repo.owner, &repo.name, path, sha)
            .await?;
        self.store(&key, &content);
        Ok(content)
    }

    /// Cache read where failures degrade to a miss.
    fn cached<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        match self.cache.read(key, ttl) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, fetching live");
                None
            }
        }
    }

    fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.write(key, value) {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHost {
        discovery_calls: AtomicUsize,
        file_calls: AtomicUsize,
    }

    #[async_trait]
    impl CodeHost for CountingHost {
        async fn user_repositories(&self, _handle: &str) -> Result<UserRepositories> {
            self.discovery_calls.fetch_add(1, Ordering::SeqCst);
            Ok(UserRepositories {
                pinned: vec![HostedRepo {
                    name_with_owner: "octo/kit".into(),
                    owner: "octo".into(),
                    name: "kit".into(),
                    default_branch: Some("main".into()),
                    stars: Some(2),
                    ..Default::default()
                }],
                recent: Vec::new(),
            })
        }

        async fn commit_sha(&self, _o: &str, _r: &str, _b: &str) -> Result<String> {
            Ok("abc123".into())
        }

        async fn list_tree(&self, _o: &str, _r: &str, _s: &str) -> Result<Vec<String>> {
            Ok(vec!["src/lib.rs".into()])
        }

        async fn read_file(&self, _o: &str, _r: &str, path: &str, _g: &str) -> Result<String> {
            self.file_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("// {}", path))
        }
    }

    fn source(host: Arc<CountingHost>, root: &std::path::Path) -> RepoSource {
        RepoSource::new(
            host,
            DiskCache::new(root),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn discovery_is_cached_per_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(CountingHost::default());
        let source = source(host.clone(), tmp.path());
        let options = DiscoverOptions::default();

        let first = source.discover("octo", &options).await.unwrap();
        let second = source.discover("octo", &options).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].full_name(), "octo/kit");
        assert_eq!(host.discovery_calls.load(Ordering::SeqCst), 1);
        assert!(tmp.path().join("repos-octo.json").exists());
    }

    #[tokio::test]
    async fn file_content_cached_under_flat_name() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(CountingHost::default());
        let source = source(host.clone(), tmp.path());
        let repo = host.user_repositories("octo").await.unwrap().pinned[0].to_target(true);

        let a = source.file(&repo, "abc123", "src/lib.rs").await.unwrap();
        let b = source.file(&repo, "abc123", "src/lib.rs").await.unwrap();
        assert_eq!(a, "// src/lib.rs");
        assert_eq!(a, b);
        assert_eq!(host.file_calls.load(Ordering::SeqCst), 1);
        assert!(tmp
            .path()
            .join("octo/kit/abc123/src_lib.rs.cache")
            .exists());
    }

    #[tokio::test]
    async fn corrupt_cache_falls_through_to_live_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let host = Arc::new(CountingHost::default());
        let source = source(host.clone(), tmp.path());
        let repo = host.user_repositories("octo").await.unwrap().pinned[0].to_target(true);

        let path = tmp.path().join("octo/kit/abc123-tree.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();

        let tree = source.tree(&repo, "abc123").await.unwrap();
        assert_eq!(tree, vec!["src/lib.rs".to_string()]);
    }
}
