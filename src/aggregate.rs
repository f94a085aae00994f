//! Per-repository aggregation of chunk scores.
//!
//! Each scored chunk contributes `total / 30` weighted by its path; chunks
//! scoring exactly zero carry no signal and are skipped. Free-text notes are
//! scanned for keywords to produce up to three strengths and three risks, and
//! up to three cited chunks become report samples.

use crate::models::{ArchReview, ChunkScore, FileChunk, RepoResult, RepoTarget, Sample};

const MAX_HIGHLIGHTS: usize = 3;
const MAX_SAMPLES: usize = 3;

const STRENGTH_KEYWORDS: &[&str] = &["well-structured", "idiomatic", "tested"];
const RISK_KEYWORDS: &[&str] = &[
    "missing tests",
    "long function",
    "globals",
    "security",
    "concurrency",
];

/// Path weight: `1.0`, `+0.1` for test paths, `+0.2` under `cmd/` or `internal/`.
pub fn chunk_weight(path: &str) -> f64 {
    let lower = path.to_lowercase();
    let mut weight = 1.0;
    if lower.contains("test") {
        weight += 0.1;
    }
    if lower.starts_with("cmd/")
        || lower.starts_with("internal/")
        || lower.contains("/cmd/")
        || lower.contains("/internal/")
    {
        weight += 0.2;
    }
    weight
}

/// Weighted 0..=100 score over `(path, score)` pairs; `0` when nothing scored.
pub fn weighted_score<'a, I>(scored: I) -> u32
where
    I: IntoIterator<Item = (&'a str, &'a ChunkScore)>,
{
    let mut sum = 0.0;
    let mut weights = 0.0;
    for (path, score) in scored {
        let total = score.total();
        if total == 0 {
            continue;
        }
        let w = chunk_weight(path);
        sum += f64::from(total) / f64::from(ChunkScore::MAX_TOTAL) * w;
        weights += w;
    }
    if weights == 0.0 {
        return 0;
    }
    (sum / weights * 100.0).round().clamp(0.0, 100.0) as u32
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Highlights {
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
}

/// Keyword scan over notes. A note lands in at most one list, strengths first.
pub fn highlights<'a, I>(notes: I) -> Highlights
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Highlights::default();
    for note in notes {
        let lower = note.to_lowercase();
        if STRENGTH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            if out.strengths.len() < MAX_HIGHLIGHTS {
                out.strengths.push(note.to_string());
            }
        } else if RISK_KEYWORDS.iter().any(|k| lower.contains(k))
            && out.risks.len() < MAX_HIGHLIGHTS
        {
            out.risks.push(note.to_string());
        }
    }
    out
}

/// Assemble the repository result from aligned chunks and scores.
///
/// `scores[i]` belongs to `chunks[i]`; `None` marks a failed evaluation.
pub fn assemble(
    repo: RepoTarget,
    files: usize,
    chunks: &[FileChunk],
    scores: &[Option<ChunkScore>],
    arch: ArchReview,
) -> RepoResult {
    let scored: Vec<(&str, &ChunkScore)> = chunks
        .iter()
        .zip(scores)
        .filter_map(|(chunk, score)| score.as_ref().map(|s| (chunk.path.as_str(), s)))
        .filter(|(_, s)| s.total() > 0)
        .collect();

    let score = weighted_score(scored.iter().copied());
    let Highlights { strengths, risks } = highlights(
        scored
            .iter()
            .flat_map(|(_, s)| s.notes.iter().map(String::as_str)),
    );

    let samples = scored
        .iter()
        .filter(|(_, s)| !s.citations.is_empty())
        .take(MAX_SAMPLES)
        .map(|(path, s)| Sample {
            url: repo.blob_url(path),
            note: s.notes.first().cloned().unwrap_or_default(),
        })
        .collect();

    RepoResult {
        score,
        strengths,
        risks,
        arch_strengths: arch.arch_strengths,
        arch_considerations: arch.arch_considerations,
        samples,
        files,
        chunks: chunks.len(),
        repo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Citation;

    fn score(parts: [u32; 6], notes: &[&str], cited: bool) -> ChunkScore {
        ChunkScore {
            readability: parts[0],
            design: parts[1],
            testing: parts[2],
            maintainability: parts[3],
            idiomatic: parts[4],
            security: parts[5],
            notes: notes.iter().map(|n| n.to_string()).collect(),
            citations: if cited {
                vec![Citation {
                    file: "x".into(),
                    lines: "1-2".into(),
                    reason: "r".into(),
                }]
            } else {
                Vec::new()
            },
        }
    }

    fn chunk(path: &str) -> FileChunk {
        FileChunk {
            path: path.into(),
            start_line: 1,
            end_line: 1,
            content: "x".into(),
            language: "Go".into(),
        }
    }

    fn repo() -> RepoTarget {
        RepoTarget {
            owner: "octo".into(),
            name: "kit".into(),
            default_branch: "main".into(),
            stars: 0,
            pinned: false,
            language: "Go".into(),
        }
    }

    #[test]
    fn weights() {
        assert_eq!(chunk_weight("main.go"), 1.0);
        assert!((chunk_weight("pkg/a_test.go") - 1.1).abs() < 1e-9);
        assert!((chunk_weight("cmd/ghp/main.go") - 1.2).abs() < 1e-9);
        assert!((chunk_weight("Internal/x_TEST.go") - 1.3).abs() < 1e-9);
        assert!((chunk_weight("svc/internal/a.go") - 1.2).abs() < 1e-9);
    }

    #[test]
    fn weighted_average_rounds() {
        let a = score([3, 3, 3, 3, 3, 3], &[], false); // 18
        let b = score([4, 4, 4, 4, 4, 4], &[], false); // 24
        // (0.6 * 1.0 + 0.8 * 1.2) / 2.2 = 0.709 → 71
        let s = weighted_score([("main.go", &a), ("internal/b.go", &b)]);
        assert_eq!(s, 71);
    }

    #[test]
    fn zero_totals_carry_no_signal() {
        let zero = ChunkScore::default();
        assert_eq!(weighted_score([("a.go", &zero), ("b.go", &zero)]), 0);

        let full = score([5, 5, 5, 5, 5, 5], &[], false);
        assert_eq!(weighted_score([("a.go", &zero), ("b.go", &full)]), 100);
    }

    #[test]
    fn highlights_capped_and_strengths_first() {
        let h = highlights([
            "Well-structured module",
            "Idiomatic error handling",
            "Thoroughly tested",
            "idiomatic naming",
            "Uses globals",
            "Tested, but has a security issue",
            "missing tests for parser",
            "Long function in handler",
            "Concurrency hazard",
            "neutral remark",
        ]);
        assert_eq!(h.strengths.len(), 3);
        assert_eq!(h.strengths[0], "Well-structured module");
        // "Tested, but has a security issue" matched a strength keyword first.
        assert_eq!(
            h.risks,
            vec![
                "Uses globals",
                "missing tests for parser",
                "Long function in handler"
            ]
        );
    }

    #[test]
    fn assemble_skips_failures_and_builds_samples() {
        let chunks = vec![chunk("main.go"), chunk("internal/b.go"), chunk("c.go")];
        let scores = vec![
            Some(score([3, 3, 3, 3, 3, 3], &["idiomatic use of errors"], true)),
            Some(score([4, 4, 4, 4, 4, 4], &[], false)),
            None,
        ];
        let result = assemble(repo(), 5, &chunks, &scores, ArchReview::default());
        assert_eq!(result.score, 71);
        assert_eq!(result.files, 5);
        assert_eq!(result.chunks, 3);
        assert_eq!(result.strengths, vec!["idiomatic use of errors"]);
        assert_eq!(
            result.samples,
            vec![Sample {
                url: "https://github.com/octo/kit/blob/main/main.go".into(),
                note: "idiomatic use of errors".into(),
            }]
        );
    }

    #[test]
    fn sample_note_empty_without_notes() {
        let chunks = vec![chunk("a.go")];
        let scores = vec![Some(score([1, 1, 1, 1, 1, 1], &[], true))];
        let result = assemble(repo(), 1, &chunks, &scores, ArchReview::default());
        assert_eq!(result.samples[0].note, "");
    }
}
