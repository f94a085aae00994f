//! Core data models used throughout the profiler.
//!
//! These types flow through the pipeline: discovery produces [`RepoTarget`]s,
//! sampling produces [`FileChunk`]s, the LLM produces [`ChunkScore`]s and an
//! [`ArchReview`], and aggregation assembles one [`RepoResult`] per repository.

use serde::{Deserialize, Serialize};

/// One repository selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub stars: u32,
    pub pinned: bool,
    pub language: String,
}

impl RepoTarget {
    /// `owner/name`, the deduplication key used during discovery.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Web URL for browsing `path` on the default branch.
    pub fn blob_url(&self, path: &str) -> String {
        format!(
            "https://github.com/{}/{}/blob/{}/{}",
            self.owner, self.name, self.default_branch, path
        )
    }
}

/// A sampled file submitted to the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub language: String,
}

/// A `file`/`lines`/`reason` reference the LLM attaches to its verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub lines: String,
    #[serde(default)]
    pub reason: String,
}

/// The LLM's verdict for one chunk. Each sub-score is on a 0..=5 scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChunkScore {
    #[serde(default)]
    pub readability: u32,
    #[serde(default)]
    pub design: u32,
    #[serde(default)]
    pub testing: u32,
    #[serde(default)]
    pub maintainability: u32,
    #[serde(default)]
    pub idiomatic: u32,
    #[serde(default)]
    pub security: u32,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ChunkScore {
    /// Highest attainable [`total`](Self::total).
    pub const MAX_TOTAL: u32 = 30;

    pub fn total(&self) -> u32 {
        self.readability
            + self.design
            + self.testing
            + self.maintainability
            + self.idiomatic
            + self.security
    }
}

/// An architectural strength, as a bare string or a structured point.
///
/// Decoding tries the bare string first and falls back to the object form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArchStrength {
    SimpleText(String),
    DetailedPoint {
        point: String,
        #[serde(default)]
        justification: String,
    },
}

impl ArchStrength {
    pub fn point(&self) -> &str {
        match self {
            ArchStrength::SimpleText(point) => point,
            ArchStrength::DetailedPoint { point, .. } => point,
        }
    }

    pub fn justification(&self) -> Option<&str> {
        match self {
            ArchStrength::SimpleText(_) => None,
            ArchStrength::DetailedPoint { justification, .. } => Some(justification),
        }
    }
}

/// An architectural consideration (risk), as a bare string or a structured point.
///
/// Same decoding order as [`ArchStrength`]. Severity defaults to `"Low"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArchConsideration {
    SimpleText(String),
    DetailedPoint {
        point: String,
        #[serde(default)]
        justification: String,
        #[serde(default = "default_severity")]
        severity: String,
    },
}

pub const DEFAULT_SEVERITY: &str = "Low";

fn default_severity() -> String {
    DEFAULT_SEVERITY.to_string()
}

impl ArchConsideration {
    pub fn point(&self) -> &str {
        match self {
            ArchConsideration::SimpleText(point) => point,
            ArchConsideration::DetailedPoint { point, .. } => point,
        }
    }

    pub fn justification(&self) -> Option<&str> {
        match self {
            ArchConsideration::SimpleText(_) => None,
            ArchConsideration::DetailedPoint { justification, .. } => Some(justification),
        }
    }

    pub fn severity(&self) -> &str {
        match self {
            ArchConsideration::SimpleText(_) => DEFAULT_SEVERITY,
            ArchConsideration::DetailedPoint { severity, .. } => severity,
        }
    }
}

/// Architecture review of one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArchReview {
    #[serde(default)]
    pub arch_strengths: Vec<ArchStrength>,
    #[serde(default)]
    pub arch_considerations: Vec<ArchConsideration>,
}

/// A cited file link paired with the first note of its chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub url: String,
    pub note: String,
}

/// Aggregated evaluation of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoResult {
    pub repo: RepoTarget,
    /// 0..=100.
    pub score: u32,
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
    pub arch_strengths: Vec<ArchStrength>,
    pub arch_considerations: Vec<ArchConsideration>,
    pub samples: Vec<Sample>,
    pub files: usize,
    pub chunks: usize,
}

impl RepoResult {
    /// A degraded result: the repository still appears in the report.
    pub fn empty(repo: RepoTarget) -> Self {
        Self {
            repo,
            score: 0,
            strengths: Vec::new(),
            risks: Vec::new(),
            arch_strengths: Vec::new(),
            arch_considerations: Vec::new(),
            samples: Vec::new(),
            files: 0,
            chunks: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_decodes_bare_string() {
        let s: ArchStrength = serde_json::from_str(r#""clear layering""#).unwrap();
        assert_eq!(s, ArchStrength::SimpleText("clear layering".into()));
        assert_eq!(s.point(), "clear layering");
        assert_eq!(s.justification(), None);
    }

    #[test]
    fn strength_decodes_object() {
        let s: ArchStrength = serde_json::from_str(
            r#"{"point": "clear layering", "justification": "cmd/ only wires internal/"}"#,
        )
        .unwrap();
        assert_eq!(s.point(), "clear layering");
        assert_eq!(s.justification(), Some("cmd/ only wires internal/"));
    }

    #[test]
    fn consideration_string_defaults_to_low() {
        let c: ArchConsideration = serde_json::from_str(r#""no CI""#).unwrap();
        assert_eq!(c.point(), "no CI");
        assert_eq!(c.severity(), "Low");
    }

    #[test]
    fn consideration_object_keeps_severity() {
        let c: ArchConsideration = serde_json::from_str(
            r#"{"point": "global state", "justification": "init() mutates", "severity": "High"}"#,
        )
        .unwrap();
        assert_eq!(c.severity(), "High");
        assert_eq!(c.justification(), Some("init() mutates"));
    }

    #[test]
    fn consideration_object_without_severity_is_low() {
        let c: ArchConsideration =
            serde_json::from_str(r#"{"point": "global state"}"#).unwrap();
        assert_eq!(c.severity(), "Low");
    }

    #[test]
    fn arch_review_mixes_forms() {
        let review: ArchReview = serde_json::from_str(
            r#"{
                "arch_strengths": ["modular", {"point": "ports and adapters", "justification": "x"}],
                "arch_considerations": [{"point": "tight coupling", "severity": "Medium"}, "sparse docs"]
            }"#,
        )
        .unwrap();
        assert_eq!(review.arch_strengths.len(), 2);
        assert_eq!(review.arch_considerations[0].severity(), "Medium");
        assert_eq!(review.arch_considerations[1].severity(), "Low");
    }

    #[test]
    fn chunk_score_total_and_defaults() {
        let score: ChunkScore =
            serde_json::from_str(r#"{"readability": 4, "design": 3, "notes": ["ok"]}"#).unwrap();
        assert_eq!(score.total(), 7);
        assert!(score.citations.is_empty());
    }

    #[test]
    fn blob_url_uses_default_branch() {
        let repo = RepoTarget {
            owner: "octo".into(),
            name: "kit".into(),
            default_branch: "main".into(),
            stars: 3,
            pinned: false,
            language: "Go".into(),
        };
        assert_eq!(repo.full_name(), "octo/kit");
        assert_eq!(
            repo.blob_url("internal/a.go"),
            "https://github.com/octo/kit/blob/main/internal/a.go"
        );
    }
}
