//! Prompt templates.
//!
//! Defaults are compiled into the binary from `prompts/`. The per-chunk
//! review prompt can be overridden from disk with `app.prompt_path`; an
//! unreadable override falls back to the embedded default.
//!
//! Templates use `{{name}}` placeholders filled by [`render`].

use std::collections::HashMap;
use std::path::Path;

const REVIEW: &str = include_str!("../prompts/prompt.txt");
const SUMMARY: &str = include_str!("../prompts/summary.txt");
const HEADLINE: &str = include_str!("../prompts/headline_summary.txt");
const ARCH_STANDARD: &str = include_str!("../prompts/arch_standard.txt");
const ARCH_MONOREPO: &str = include_str!("../prompts/arch_monorepo.txt");

#[derive(Debug, Clone)]
pub struct Prompts {
    /// System prompt for per-chunk scoring.
    pub review: String,
    pub summary: String,
    pub headline: String,
    pub arch_standard: String,
    pub arch_monorepo: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            review: REVIEW.to_string(),
            summary: SUMMARY.to_string(),
            headline: HEADLINE.to_string(),
            arch_standard: ARCH_STANDARD.to_string(),
            arch_monorepo: ARCH_MONOREPO.to_string(),
        }
    }
}

impl Prompts {
    pub fn load(review_override: Option<&Path>) -> Self {
        let mut prompts = Self::default();
        if let Some(path) = review_override {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), "using review prompt from disk");
                    prompts.review = text;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "prompt override unreadable, using embedded default");
                }
            }
        }
        prompts
    }
}

/// Replace `{{name}}` placeholders in one pass.
///
/// Substituted values are not scanned again, and unknown placeholders are
/// left as they are.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = after[..close].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_templates_have_placeholders() {
        let p = Prompts::default();
        assert!(p.arch_standard.contains("{{tree}}"));
        assert!(p.arch_monorepo.contains("{{language}}"));
        assert!(p.summary.contains("{{summary_data}}"));
        assert!(p.headline.contains("{{summary_data}}"));
        assert!(p.review.contains("readability"));
    }

    #[test]
    fn render_replaces_known_and_keeps_unknown() {
        let out = render(
            "lang={{language}} tree={{ tree }} keep={{other}}",
            &[("language", "Go"), ("tree", "a.go\nb.go")],
        );
        assert_eq!(out, "lang=Go tree=a.go\nb.go keep={{other}}");
    }

    #[test]
    fn render_does_not_rescan_values() {
        let out = render("{{a}}", &[("a", "{{b}}"), ("b", "nope")]);
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn render_unterminated_placeholder() {
        assert_eq!(render("x {{open", &[]), "x {{open");
    }

    #[test]
    fn review_override_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"custom review").unwrap();
        let p = Prompts::load(Some(file.path()));
        assert_eq!(p.review, "custom review");
    }

    #[test]
    fn missing_override_falls_back() {
        let p = Prompts::load(Some(Path::new("/no/such/prompt.txt")));
        assert_eq!(p.review, REVIEW);
    }
}
