//! Static HTML report rendering.
//!
//! The page is a single self-contained document styled with the Tailwind
//! CDN build. Every value that came from GitHub or the LLM is escaped.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Write;

use crate::models::RepoResult;

const PLACEHOLDER: &str = "&mdash;";
const TOP_LANGUAGES: usize = 5;

pub struct Report<'a> {
    pub user: &'a str,
    /// Already ordered for display.
    pub results: &'a [RepoResult],
    pub headline: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub generated_at: DateTime<Utc>,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Primary languages by repository count, most common first, at most five.
///
/// Ties are ordered by name so the output is stable.
pub fn top_languages(results: &[RepoResult]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in results {
        if !r.repo.language.is_empty() {
            *counts.entry(r.repo.language.as_str()).or_insert(0) += 1;
        }
    }
    let mut langs: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    langs.truncate(TOP_LANGUAGES);
    langs
}

fn list_or_placeholder<I>(items: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut out = String::new();
    for item in items {
        let _ = write!(out, "<li>{}</li>", item);
    }
    if out.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        format!("<ul>{}</ul>", out)
    }
}

fn code_row(r: &RepoResult) -> String {
    let strengths = list_or_placeholder(r.strengths.iter().map(|s| escape_html(s)));
    let risks = list_or_placeholder(r.risks.iter().map(|s| escape_html(s)));
    let samples = if r.samples.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        r.samples
            .iter()
            .map(|s| {
                format!(
                    r#"<a class="underline" href="{}" title="{}" target="_blank" rel="noreferrer">sample</a>"#,
                    escape_html(&s.url),
                    escape_html(&s.note)
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    format!(
        r#"<tr class="border-b">
<td class="py-2 px-3 font-medium align-top">{}/{}</td>
<td class="py-2 px-3 text-right align-top">{}</td>
<td class="py-2 px-3">{}</td>
<td class="py-2 px-3">{}</td>
<td class="py-2 px-3 align-top">{}</td>
</tr>"#,
        escape_html(&r.repo.owner),
        escape_html(&r.repo.name),
        r.score,
        strengths,
        risks,
        samples
    )
}

fn arch_row(r: &RepoResult) -> String {
    let strengths = list_or_placeholder(r.arch_strengths.iter().map(|s| escape_html(s.point())));
    let considerations = list_or_placeholder(r.arch_considerations.iter().map(|c| {
        format!(
            r#"{} <span class="text-xs text-slate-500">({})</span>"#,
            escape_html(c.point()),
            escape_html(c.severity())
        )
    }));

    format!(
        r#"<tr class="border-b">
<td class="py-2 px-3 font-medium align-top">{}/{}</td>
<td class="py-2 px-3">{}</td>
<td class="py-2 px-3">{}</td>
</tr>"#,
        escape_html(&r.repo.owner),
        escape_html(&r.repo.name),
        strengths,
        considerations
    )
}

fn headline_section(headline: Option<&str>) -> String {
    match headline.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => format!(
            r#"<section class="mt-4 mb-8 p-4 bg-sky-50 border-l-4 border-sky-400"><p class="text-sky-800">{}</p></section>"#,
            escape_html(h)
        ),
        None => String::new(),
    }
}

fn summary_section(summary: Option<&str>) -> String {
    let body = match summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => escape_html(s),
        None => "<em>Summary unavailable.</em>".to_string(),
    };
    format!(
        r#"<section class="mt-8 p-4 bg-yellow-50 border-l-4 border-yellow-400"><strong>AI Summary:</strong> {}</section>"#,
        body
    )
}

fn language_section(results: &[RepoResult]) -> String {
    let tags: String = top_languages(results)
        .iter()
        .map(|(name, _)| {
            format!(
                r#"<span class="inline-block bg-sky-100 text-sky-800 text-xs font-semibold mr-2 px-2.5 py-0.5 rounded-full">{}</span>"#,
                escape_html(name)
            )
        })
        .collect();
    if tags.is_empty() {
        return String::new();
    }
    format!(
        r#"<section class="mt-8">
  <h2 class="text-lg font-semibold mb-2">Main Languages</h2>
  {}
</section>"#,
        tags
    )
}

pub fn render_html(report: &Report<'_>) -> String {
    let user = escape_html(report.user);
    let code_rows: String = report.results.iter().map(code_row).collect();
    let arch_rows: String = report.results.iter().map(arch_row).collect();

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>GitHub Profiler &ndash; @{user}</title>
<script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-slate-50 text-slate-900">
<main class="max-w-5xl mx-auto p-6">
<header class="mb-6">
  <h1 class="text-2xl font-bold">GitHub Profiler for <a href="https://github.com/{user}" class="text-blue-600 hover:underline" target="_blank" rel="noreferrer">@{user}</a></h1>
  <p class="text-sm text-slate-600">Generated {generated} UTC. Scores are LLM-assisted and based on sampled files.</p>
</header>

{headline}

<section class="mt-8">
  <h2 class="text-xl font-semibold mb-4">Code Analysis</h2>
  <div class="bg-white shadow rounded-xl overflow-hidden">
    <table class="w-full text-sm">
      <thead class="bg-slate-100">
        <tr>
          <th class="text-left py-2 px-3 w-1/4">Repo</th>
          <th class="text-right py-2 px-3">Score</th>
          <th class="text-left py-2 px-3">Strengths</th>
          <th class="text-left py-2 px-3">Risks</th>
          <th class="text-left py-2 px-3">Samples</th>
        </tr>
      </thead>
      <tbody>
        {code_rows}
      </tbody>
    </table>
  </div>
</section>

<section class="mt-8">
  <h2 class="text-xl font-semibold mb-4">Architecture Analysis</h2>
  <div class="bg-white shadow rounded-xl overflow-hidden">
    <table class="w-full text-sm">
      <thead class="bg-slate-100">
        <tr>
          <th class="text-left py-2 px-3 w-1/4">Repo</th>
          <th class="text-left py-2 px-3">Strengths</th>
          <th class="text-left py-2 px-3">Considerations</th>
        </tr>
      </thead>
      <tbody>
        {arch_rows}
      </tbody>
    </table>
  </div>
</section>

{summary}
{languages}

</main>
</body>
</html>
"#,
        user = user,
        generated = report.generated_at.format("%Y-%m-%d %H:%M"),
        headline = headline_section(report.headline),
        code_rows = code_rows,
        arch_rows = arch_rows,
        summary = summary_section(report.summary),
        languages = language_section(report.results),
    )
}
