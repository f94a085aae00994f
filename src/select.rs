//! Heuristic file selection.
//!
//! [`score_path`] ranks a repository path by how much it says about the
//! author's code: core-logic directories and mainstream source extensions
//! score high, configuration and prose low, vendored trees and binary assets
//! zero. [`select_paths`] keeps the top `n` non-zero paths.
//!
//! | Rule | Effect |
//! |------|--------|
//! | any directory named `vendor`, `node_modules`, `.git`, `build`, `dist` | 0 |
//! | binary/asset extension (`.png`, `.jpg`, `.zip`, `.pdf`, `.svg`, ...) | 0 |
//! | lock file (`*.lock`, `go.sum`, `package-lock.json`, ...) | 1 |
//! | generated, docs, or example path | 1 |
//! | base | 10 |
//! | under `internal/`, `pkg/`, `src/`, `lib/` | +20 |
//! | under `cmd/` | +15 |
//! | mainstream source extension | +50 |
//! | shell / SQL | +20 |
//! | config / infra | +5 |
//! | prose / markup | +2 |
//! | test naming convention | -5 |
//!
//! Ties keep the input order (the tree listing order), so selection is
//! deterministic for a given tree.

const EXCLUDED_DIRS: &[&str] = &["vendor", "node_modules", ".git", "build", "dist"];

const BINARY_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".zip", ".gz", ".tar", ".pdf", ".woff",
    ".woff2", ".ttf",
];

const LOCK_FILES: &[&str] = &[
    "go.sum",
    "package-lock.json",
    "pnpm-lock.yaml",
    "npm-shrinkwrap.json",
];

const CORE_DIRS: &[&str] = &["internal/", "pkg/", "src/", "lib/"];

const SOURCE_EXTENSIONS: &[&str] = &[
    ".go", ".py", ".ts", ".js", ".java", ".rs", ".swift", ".kt", ".kts", ".rb", ".ex", ".exs",
    ".cs", ".cpp", ".c", ".h", ".hpp",
];

const SCRIPT_EXTENSIONS: &[&str] = &[".sh", ".sql"];

const CONFIG_EXTENSIONS: &[&str] = &[".yml", ".yaml", ".json", ".toml", ".hcl", ".tf"];

const PROSE_EXTENSIONS: &[&str] = &[".md", ".txt", ".html", ".css"];

/// A path together with its [`score_path`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPath {
    pub path: String,
    pub score: u32,
}

pub fn score_path(path: &str) -> u32 {
    let lower = path.to_lowercase();
    let (dirs, file_name) = match lower.rsplit_once('/') {
        Some((dirs, file)) => (dirs, file),
        None => ("", lower.as_str()),
    };
    let ext = extension(file_name);

    if dirs.split('/').any(|d| EXCLUDED_DIRS.contains(&d)) {
        return 0;
    }
    if BINARY_EXTENSIONS.contains(&ext) {
        return 0;
    }
    if ext == ".lock" || LOCK_FILES.contains(&file_name) {
        return 1;
    }
    if is_generated_or_docs(&lower, dirs, file_name) {
        return 1;
    }

    let mut score: u32 = 10;

    if CORE_DIRS.iter().any(|d| lower.starts_with(d)) {
        score += 20;
    }
    if lower.starts_with("cmd/") {
        score += 15;
    }

    if SOURCE_EXTENSIONS.contains(&ext) {
        score += 50;
    } else if SCRIPT_EXTENSIONS.contains(&ext) {
        score += 20;
    } else if CONFIG_EXTENSIONS.contains(&ext) || file_name == "dockerfile" {
        score += 5;
    } else if PROSE_EXTENSIONS.contains(&ext) {
        score += 2;
    }

    if is_test_file(file_name) {
        score = score.saturating_sub(5);
    }

    score
}

fn extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => "",
        Some(i) => &file_name[i..],
    }
}

fn is_generated_or_docs(lower: &str, dirs: &str, file_name: &str) -> bool {
    lower.starts_with("gen/")
        || lower.starts_with("docs/")
        || lower.contains("example")
        || dirs.split('/').any(|d| d == "generated")
        || file_name.ends_with(".pb.go")
        || file_name.contains("_generated.")
        || file_name.contains(".generated.")
}

fn is_test_file(file_name: &str) -> bool {
    file_name.contains("_test.")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.starts_with("test_")
}

/// Score every path, dropping zeros, highest first.
pub fn rank_paths<S: AsRef<str>>(tree: &[S]) -> Vec<ScoredPath> {
    let mut scored: Vec<ScoredPath> = tree
        .iter()
        .map(|p| ScoredPath {
            path: p.as_ref().to_string(),
            score: score_path(p.as_ref()),
        })
        .filter(|sp| sp.score > 0)
        .collect();
    // Stable sort: equal scores keep tree order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// The `chunks_per_repo` highest scoring paths of `tree`.
pub fn select_paths<S: AsRef<str>>(tree: &[S], chunks_per_repo: usize) -> Vec<String> {
    rank_paths(tree)
        .into_iter()
        .take(chunks_per_repo)
        .map(|sp| sp.path)
        .collect()
}

/// Repository layout, which picks the architecture prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    Standard,
    Monorepo,
}

const MONOREPO_TOOL_FILES: &[&str] = &["lerna.json", "turbo.json", "nx.json", "pnpm-workspace.yaml"];

const BUILD_MANIFESTS: &[&str] = &[
    "go.mod",
    "cargo.toml",
    "package.json",
    "pyproject.toml",
    "pom.xml",
];

pub fn detect_repo_kind<S: AsRef<str>>(paths: &[S]) -> RepoKind {
    let mut has_apps = false;
    let mut has_packages = false;
    let mut manifest_counts = [0usize; BUILD_MANIFESTS.len()];

    for path in paths {
        let lower = path.as_ref().to_lowercase();
        if lower
            .split('/')
            .any(|d| d == "node_modules" || d == "vendor")
        {
            continue;
        }
        if lower.starts_with("apps/") {
            has_apps = true;
        }
        if lower.starts_with("packages/") || lower.starts_with("libs/") {
            has_packages = true;
        }

        let base = lower.rsplit('/').next().unwrap_or(&lower);
        if MONOREPO_TOOL_FILES.contains(&base) {
            return RepoKind::Monorepo;
        }
        if let Some(i) = BUILD_MANIFESTS.iter().position(|m| *m == base) {
            manifest_counts[i] += 1;
        }
    }

    // A root manifest plus one sub-module is still a standard repository.
    if (has_apps && has_packages) || manifest_counts.iter().any(|&n| n > 2) {
        RepoKind::Monorepo
    } else {
        RepoKind::Standard
    }
}

/// Human-readable language name for a path, by extension.
pub fn guess_language(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    let ext = extension(lower.rsplit('/').next().unwrap_or(&lower)).to_string();
    match ext.as_str() {
        ".go" => "Go",
        ".ts" => "TypeScript",
        ".js" => "JavaScript",
        ".py" => "Python",
        ".rb" => "Ruby",
        ".java" => "Java",
        ".dart" => "Dart",
        ".clj" => "Clojure",
        ".cljs" => "ClojureScript",
        ".rkt" => "Racket",
        ".gleam" => "Gleam",
        ".ex" | ".exs" => "Elixir",
        ".md" | ".markdown" => "Markdown",
        ".cpp" | ".hpp" | ".cc" | ".h" => "C++",
        ".cs" => "C#",
        ".swift" => "Swift",
        ".kt" | ".kts" => "Kotlin",
        ".rs" => "Rust",
        ".php" => "PHP",
        ".html" | ".htm" => "HTML",
        ".css" => "CSS",
        ".sh" => "Shell",
        ".yml" | ".yaml" => "YAML",
        ".json" => "JSON",
        ".toml" => "TOML",
        _ => "Unknown",
    }
}
