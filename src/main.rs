//! # GitHub Profiler CLI (`ghp`)
//!
//! The `ghp` binary profiles a GitHub user's public repositories and writes
//! an HTML report.
//!
//! ## Usage
//!
//! ```bash
//! ghp --config ./config/ghp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ghp report --user <handle>` | Full run: discover, sample, score, render |
//! | `ghp repos --user <handle>` | List the repositories a run would analyze |
//! | `ghp select [PATHS...]` | Rank file paths offline (reads stdin without arguments) |
//! | `ghp completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Profile a user with the default provider
//! ghp report --user octocat
//!
//! # Use Gemini and JSON progress lines
//! ghp report --user octocat --provider gemini --progress json
//!
//! # Which files of this checkout would be sampled?
//! git ls-files | ghp select --chunks 6
//! ```

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use gh_profiler::cache::DiskCache;
use gh_profiler::config::{self, Config};
use gh_profiler::discover::DiscoverOptions;
use gh_profiler::github::GitHubClient;
use gh_profiler::host::RepoSource;
use gh_profiler::llm::create_provider;
use gh_profiler::profile::Profiler;
use gh_profiler::progress::ProgressMode;
use gh_profiler::select::rank_paths;

const GITHUB_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub Profiler: LLM-assisted code quality reports for GitHub users.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ghp.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ghp",
    about = "LLM-assisted code quality reports for a GitHub user's repositories",
    version,
    long_about = "ghp discovers a user's pinned and most starred repositories, samples the \
    most relevant source files from each, asks an LLM provider (OpenAI or Gemini) to score them, \
    and renders the aggregated results as a static HTML report."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ghp.toml`. `select` and `completions` work
    /// without it.
    #[arg(long, global = true, default_value = "./config/ghp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile a user and write the HTML report.
    ///
    /// Writes `profile-<user>.html` into the output directory and prints
    /// its path.
    Report {
        /// GitHub handle to profile.
        #[arg(long)]
        user: String,

        /// LLM provider override: `openai` or `gemini`.
        #[arg(long)]
        provider: Option<String>,

        /// Output directory override (created if missing).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// List the repositories a report would analyze, in order.
    Repos {
        /// GitHub handle.
        #[arg(long)]
        user: String,
    },

    /// Rank file paths the way a report samples them.
    ///
    /// Prints `score<TAB>path` for the selected paths, best first.
    Select {
        /// Number of paths to keep. Defaults to `app.chunks_per_repo`.
        #[arg(long)]
        chunks: Option<usize>,

        /// Paths to rank. Read from stdin, one per line, when omitted.
        paths: Vec<String>,
    },

    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "ghp", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Select { chunks, paths } => {
            // Use config if available, otherwise a minimal default
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            run_select(chunks.unwrap_or(cfg.app.chunks_per_repo), paths)?;
            return Ok(());
        }
        _ => {}
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Report {
            user,
            provider,
            out_dir,
            progress,
        } => {
            if let Some(provider) = provider {
                cfg.llm.provider = provider;
            }
            if let Some(out_dir) = out_dir {
                cfg.app.out_dir = out_dir;
            }
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            run_report(&cfg, &user, mode).await?;
        }
        Commands::Repos { user } => {
            run_repos(&cfg, &user).await?;
        }
        Commands::Completions { .. } | Commands::Select { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn check_handle(user: &str) -> Result<()> {
    if user.trim().is_empty() {
        bail!("missing --user");
    }
    if user.contains(|c: char| c == '/' || c == '\\') || user.starts_with('.') {
        bail!("invalid GitHub handle: {}", user);
    }
    Ok(())
}

fn open_cache(cfg: &Config) -> Result<DiskCache> {
    Ok(DiskCache::new(cfg.cache.root()?))
}

async fn run_report(cfg: &Config, user: &str, mode: ProgressMode) -> Result<()> {
    check_handle(user)?;

    let provider = create_provider(&cfg.llm)?;
    std::fs::create_dir_all(&cfg.app.out_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            cfg.app.out_dir.display()
        )
    })?;

    let github = GitHubClient::new(&cfg.auth, GITHUB_TIMEOUT)?;
    let profiler = Profiler::new(
        cfg,
        Arc::new(github),
        provider,
        open_cache(cfg)?,
        mode.reporter(),
    )?;

    let html = profiler.submit(user).await?;

    let out = cfg.app.out_dir.join(format!("profile-{}.html", user));
    std::fs::write(&out, html)
        .with_context(|| format!("Failed to write report: {}", out.display()))?;
    println!("Report: {}", out.display());
    Ok(())
}

async fn run_repos(cfg: &Config, user: &str) -> Result<()> {
    check_handle(user)?;

    let github = GitHubClient::new(&cfg.auth, GITHUB_TIMEOUT)?;
    let source = RepoSource::new(
        Arc::new(github),
        open_cache(cfg)?,
        cfg.cache.repos_ttl(),
        cfg.cache.content_ttl(),
    );
    let options = DiscoverOptions::from_app(&cfg.app)?;
    let repos = source.discover(user, &options).await?;

    if repos.is_empty() {
        println!("No repositories found for @{}.", user);
        return Ok(());
    }
    for repo in &repos {
        let marker = if repo.pinned { "*" } else { " " };
        let language = if repo.language.is_empty() {
            "-"
        } else {
            repo.language.as_str()
        };
        println!(
            "{} {:>6}  {:<12} {}",
            marker,
            repo.stars,
            language,
            repo.full_name()
        );
    }
    Ok(())
}

fn run_select(chunks: usize, paths: &[String]) -> Result<()> {
    let paths: Vec<String> = if paths.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read paths from stdin")?
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    } else {
        paths.to_vec()
    };

    for scored in rank_paths(&paths).into_iter().take(chunks) {
        println!("{}\t{}", scored.score, scored.path);
    }
    Ok(())
}
