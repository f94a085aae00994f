//! File-backed TTL cache.
//!
//! Values are stored as JSON under a root directory, one file per key. Keys
//! are relative paths (`octo/kit/<sha>-tree.json`); parent directories are
//! created on write. Staleness is judged from the file's modification time
//! at read time, so there is no expiry field and no invalidation call: a
//! successful live fetch simply overwrites the entry.
//!
//! Repository file paths are flattened with [`flat_file_name`].
//!
//! There is no locking. Concurrent writers of one key race, which is harmless
//! because every writer derives the same content from the same remote state.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to its file under the cache root.
    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir: {}", parent.display()))?;
        }
        let bytes = serde_json::to_vec(value)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;
        Ok(())
    }

    /// Read a fresh entry.
    ///
    /// Returns `Ok(None)` when the entry is absent or older than `ttl`, and an
    /// error for any other I/O or decoding failure.
    pub fn read<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Result<Option<T>> {
        let path = self.path_for(key);
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to stat cache entry: {}", path.display()))
            }
        };

        let modified = metadata.modified()?;
        // A timestamp in the future counts as age zero.
        let age = modified.elapsed().unwrap_or(Duration::ZERO);
        if age > ttl {
            return Ok(None);
        }

        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt cache entry: {}", path.display()))?;
        Ok(Some(value))
    }
}

/// Flatten a repository file path into a single cache file name.
///
/// `/` becomes `_`. Literal `%` and `_` are percent-escaped first so that
/// `a/b_c.go` and `a_b/c.go` map to different names.
pub fn flat_file_name(path: &str) -> String {
    let escaped = path.replace('%', "%25").replace('_', "%5F");
    format!("{}.cache", escaped.replace('/', "_"))
}
