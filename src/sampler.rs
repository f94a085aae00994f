//! Turns selected paths into [`FileChunk`]s.
//!
//! Files are read one after another through the caching [`RepoSource`].
//! Unreadable or empty files are skipped; content longer than the byte
//! budget is cut at the last character boundary that fits.

use crate::host::RepoSource;
use crate::models::{FileChunk, RepoTarget};
use crate::select::guess_language;

pub async fn sample_chunks(
    source: &RepoSource,
    repo: &RepoTarget,
    sha: &str,
    paths: &[String],
    max_chunk_bytes: usize,
) -> Vec<FileChunk> {
    let mut chunks = Vec::with_capacity(paths.len());

    for path in paths {
        let content = match source.file(repo, sha, path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(repo = %repo.full_name(), path = %path, error = %e, "skipping unreadable file");
                continue;
            }
        };
        if let Some(chunk) = make_chunk(path, content, max_chunk_bytes) {
            chunks.push(chunk);
        }
    }

    chunks
}

/// Build a chunk covering the (possibly truncated) head of a file.
pub fn make_chunk(path: &str, mut content: String, max_bytes: usize) -> Option<FileChunk> {
    if content.is_empty() {
        return None;
    }
    truncate_on_char_boundary(&mut content, max_bytes);

    let end_line = 1 + content.matches('\n').count();
    Some(FileChunk {
        path: path.to_string(),
        start_line: 1,
        end_line,
        content,
        language: guess_language(path).to_string(),
    })
}

fn truncate_on_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_nothing() {
        assert!(make_chunk("a.go", String::new(), 100).is_none());
    }

    #[test]
    fn line_range_counts_newlines() {
        let chunk = make_chunk("internal/a.go", "package a\n\nfunc A() {}\n".into(), 1000).unwrap();
        assert_eq!(chunk.start_line, 1);
        assert_eq!(chunk.end_line, 4);
        assert_eq!(chunk.language, "Go");
    }

    #[test]
    fn truncation_respects_utf8() {
        // "é" is two bytes; a 3-byte budget cannot end inside the second one.
        let chunk = make_chunk("notes.md", "aéé".into(), 4).unwrap();
        assert_eq!(chunk.content, "aé");
        let chunk = make_chunk("notes.md", "aéé".into(), 3).unwrap();
        assert_eq!(chunk.content, "aé");
        let chunk = make_chunk("notes.md", "aéé".into(), 2).unwrap();
        assert_eq!(chunk.content, "a");
    }

    #[test]
    fn truncation_shortens_line_range() {
        let chunk = make_chunk("a.py", "x = 1\ny = 2\nz = 3\n".into(), 6).unwrap();
        assert_eq!(chunk.content, "x = 1\n");
        assert_eq!(chunk.end_line, 2);
    }
}
