//! Run progress reporting.
//!
//! Reports what a `ghp report` run is doing so users see which repositories
//! are being analyzed and how many remain. Progress is emitted on **stderr**
//! so stdout stays parseable for scripts.

use std::io::Write;
use std::sync::Arc;

/// A single progress event of a profiling run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Querying the code host for the user's repositories.
    Discovering { user: String },
    /// Discovery finished with this many repositories to analyze.
    Discovered { user: String, repos: usize },
    /// A repository's analysis began.
    RepoStarted { repo: String },
    /// A repository finished; `n` of `total` are done.
    RepoFinished {
        repo: String,
        score: u32,
        n: usize,
        total: usize,
    },
    /// Headline, summary and HTML rendering.
    Rendering,
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: "analyze octo/kit  done (score 71)  3 / 10".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Discovering { user } => {
                format!("discover @{}  querying repositories...\n", user)
            }
            ProgressEvent::Discovered { user, repos } => {
                format!("discover @{}  {} repositories found\n", user, repos)
            }
            ProgressEvent::RepoStarted { repo } => format!("analyze {}  started\n", repo),
            ProgressEvent::RepoFinished {
                repo,
                score,
                n,
                total,
            } => format!(
                "analyze {}  done (score {})  {} / {}\n",
                repo, score, n, total
            ),
            ProgressEvent::Rendering => "report  generating summary and HTML...\n".to_string(),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn event_json(event: &ProgressEvent) -> serde_json::Value {
    match event {
        ProgressEvent::Discovering { user } => serde_json::json!({
            "event": "progress",
            "phase": "discovering",
            "user": user
        }),
        ProgressEvent::Discovered { user, repos } => serde_json::json!({
            "event": "progress",
            "phase": "discovered",
            "user": user,
            "total": repos
        }),
        ProgressEvent::RepoStarted { repo } => serde_json::json!({
            "event": "progress",
            "phase": "analyzing",
            "repo": repo
        }),
        ProgressEvent::RepoFinished {
            repo,
            score,
            n,
            total,
        } => serde_json::json!({
            "event": "progress",
            "phase": "analyzed",
            "repo": repo,
            "score": score,
            "n": n,
            "total": total
        }),
        ProgressEvent::Rendering => serde_json::json!({
            "event": "progress",
            "phase": "rendering"
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
