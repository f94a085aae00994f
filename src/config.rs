//! TOML configuration parsing and validation.
//!
//! Every field carries a serde default, so an almost empty file is a valid
//! configuration. Secrets fall back to environment variables when left blank:
//!
//! | Field | Environment fallback |
//! |-------|----------------------|
//! | `auth.github_token` | `GITHUB_TOKEN` |
//! | `llm.api_key` (openai) | `OPENAI_API_KEY` |
//! | `llm.api_key` (gemini) | `GEMINI_API_KEY` |
//!
//! # Example
//!
//! ```toml
//! [app]
//! out_dir = "./out"
//! repos_limit = 8
//! chunks_per_repo = 6
//! exclude_repos = ["*/dotfiles"]
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! requests_per_minute = 60
//! parallel_requests = 4
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Disk override for the per-chunk review prompt.
    #[serde(default)]
    pub prompt_path: Option<PathBuf>,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Maximum repositories to analyze; `0` means no limit.
    #[serde(default = "default_repos_limit")]
    pub repos_limit: usize,
    #[serde(default = "default_chunks_per_repo")]
    pub chunks_per_repo: usize,
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
    #[serde(default = "default_true")]
    pub include_pinned: bool,
    #[serde(default = "default_true")]
    pub include_non_pinned: bool,
    #[serde(default = "default_true")]
    pub exclude_forks: bool,
    /// Glob patterns matched against `owner/name`.
    #[serde(default)]
    pub exclude_repos: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prompt_path: None,
            out_dir: default_out_dir(),
            repos_limit: default_repos_limit(),
            chunks_per_repo: default_chunks_per_repo(),
            max_chunk_bytes: default_max_chunk_bytes(),
            include_pinned: true,
            include_non_pinned: true,
            exclude_forks: true,
            exclude_repos: Vec::new(),
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./out")
}
fn default_repos_limit() -> usize {
    10
}
fn default_chunks_per_repo() -> usize {
    6
}
fn default_max_chunk_bytes() -> usize {
    12_000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub github_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            api_url: default_api_url(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Empty selects the provider's default model.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Base URL override (OpenAI-compatible gateways, proxies).
    #[serde(default)]
    pub endpoint: String,
    /// `0` leaves the limit to the provider.
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: i64,
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: String::new(),
            api_key: String::new(),
            endpoint: String::new(),
            max_tokens: 0,
            temperature: None,
            requests_per_minute: default_requests_per_minute(),
            parallel_requests: default_parallel_requests(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_requests_per_minute() -> i64 {
    60
}
fn default_parallel_requests() -> i64 {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    /// Parallel request limit as a permit count (always >= 1 after loading).
    pub fn parallelism(&self) -> usize {
        self.parallel_requests.max(1) as usize
    }

    pub fn rpm(&self) -> u32 {
        self.requests_per_minute.clamp(1, u32::MAX as i64) as u32
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Cache root; defaults to the per-user cache directory + `ghp`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_repos_ttl")]
    pub repos_ttl_secs: u64,
    #[serde(default = "default_content_ttl")]
    pub content_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            repos_ttl_secs: default_repos_ttl(),
            content_ttl_secs: default_content_ttl(),
        }
    }
}

fn default_repos_ttl() -> u64 {
    60 * 60
}
fn default_content_ttl() -> u64 {
    30 * 24 * 60 * 60
}

impl CacheConfig {
    pub fn repos_ttl(&self) -> Duration {
        Duration::from_secs(self.repos_ttl_secs)
    }

    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }

    /// Resolve the cache root, consulting the platform cache directory when unset.
    pub fn root(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|d| d.join("ghp"))
                .ok_or_else(|| anyhow::anyhow!("could not determine the user cache directory")),
        }
    }
}

impl Config {
    /// All-defaults configuration for commands that run without a config file.
    pub fn minimal() -> Self {
        let mut config = Self::default();
        config.apply_env_fallbacks();
        config
    }

    fn apply_env_fallbacks(&mut self) {
        if self.auth.github_token.is_empty() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                self.auth.github_token = token;
            }
        }
    }

    fn normalize(&mut self) {
        if self.llm.parallel_requests <= 0 {
            self.llm.parallel_requests = default_parallel_requests();
        }
        if self.llm.requests_per_minute <= 0 {
            self.llm.requests_per_minute = default_requests_per_minute();
        }
        if self.llm.max_attempts == 0 {
            self.llm.max_attempts = 1;
        }
    }

    /// Check invariants that would otherwise surface as confusing runtime failures.
    pub fn validate(&self) -> Result<()> {
        if !self.app.include_pinned && !self.app.include_non_pinned {
            bail!("app.include_pinned and app.include_non_pinned cannot both be false");
        }
        if self.app.chunks_per_repo == 0 {
            bail!("app.chunks_per_repo must be > 0");
        }
        if self.app.max_chunk_bytes == 0 {
            bail!("app.max_chunk_bytes must be > 0");
        }
        match self.llm.provider.as_str() {
            "openai" | "gemini" => {}
            other => bail!(
                "Unknown LLM provider: '{}'. Must be openai or gemini.",
                other
            ),
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.normalize();
    config.apply_env_fallbacks();
    config.validate()?;

    Ok(config)
}
