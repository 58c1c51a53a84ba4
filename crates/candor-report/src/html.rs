//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

use candor_core::aggregator::{DimensionStats, SessionSummary};
use candor_core::model::{Dimension, EvidenceSpan, InterviewSession, QuestionEvent};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML report for a session.
///
/// `summary` is `None` when no question has been answered yet.
pub fn generate_html(session: &InterviewSession, summary: Option<&SessionSummary>) -> String {
    let title = session.label.as_deref().unwrap_or("interview session");
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>candor report: {}</title>\n",
        html_escape(title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(title)));
    html.push_str(&format!(
        "<p class=\"meta\">Session <code>{}</code> | {} questions | {} answered | {} | started {}</p>\n",
        session.id,
        session.questions().len(),
        session.answered_count(),
        if session.is_ended() { "ended" } else { "in progress" },
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    match summary {
        Some(summary) => push_summary(&mut html, summary),
        None => html.push_str("<p class=\"meta\">No responses have been analyzed yet.</p>\n"),
    }
    html.push_str("</section>\n");

    // Per-question results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Responses</h2>\n");
    for question in session.questions() {
        push_question(&mut html, question);
    }
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(session).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str(&format!(
        "<footer class=\"meta\">Generated {}</footer>\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(
    session: &InterviewSession,
    summary: Option<&SessionSummary>,
    path: &Path,
) -> Result<()> {
    let html = generate_html(session, summary);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn push_summary(html: &mut String, summary: &SessionSummary) {
    html.push_str(&format!(
        "<p class=\"overall\">Overall <strong>{:.1}</strong>/100 across {} answered questions{}</p>\n",
        summary.overall_score,
        summary.answered_questions,
        if summary.is_final { "" } else { " (provisional)" }
    ));

    html.push_str("<table class=\"summary\" id=\"dimensions\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Dimension</th><th onclick=\"sortTable(1)\">Mean</th><th onclick=\"sortTable(2)\">Min</th><th onclick=\"sortTable(3)\">Max</th><th onclick=\"sortTable(4)\">Samples</th><th onclick=\"sortTable(5)\">Trend</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for (dim, stats) in &summary.dimensions {
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:.1}</td><td>{}</td><td>{}</td></tr>\n",
            standing(summary, dim),
            html_escape(dim.as_str()),
            stats.mean,
            stats.min,
            stats.max,
            stats.samples,
            stats.trend,
        ));
    }
    html.push_str("</tbody></table>\n");

    if !summary.dimensions.is_empty() {
        html.push_str(&generate_bar_chart(summary));
    }

    let names = |dims: &[Dimension]| {
        dims.iter()
            .map(|d| html_escape(d.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !summary.strengths.is_empty() {
        html.push_str(&format!(
            "<p><strong>Strengths:</strong> {}</p>\n",
            names(&summary.strengths)
        ));
    }
    if !summary.weaknesses.is_empty() {
        html.push_str(&format!(
            "<p><strong>Weaknesses:</strong> {}</p>\n",
            names(&summary.weaknesses)
        ));
    }
    for outlier in &summary.outliers {
        html.push_str(&format!(
            "<p class=\"outlier\">Question {} scored {:.1} (z = {:+.2}), an outlier for this session.</p>\n",
            outlier.question_index + 1,
            outlier.overall_score,
            outlier.z_score
        ));
    }
}

fn standing(summary: &SessionSummary, dim: &Dimension) -> &'static str {
    if summary.strengths.contains(dim) {
        "strength"
    } else if summary.weaknesses.contains(dim) {
        "weakness"
    } else {
        "neutral"
    }
}

fn push_question(html: &mut String, question: &QuestionEvent) {
    html.push_str("<article class=\"question\">\n");
    html.push_str(&format!(
        "<h3>Q{} <span class=\"tag\">{}</span> {}</h3>\n",
        question.index + 1,
        question.question_type,
        html_escape(&question.text)
    ));

    let Some(analysis) = question.analysis() else {
        html.push_str(&format!(
            "<p class=\"meta\">Not answered ({}).</p>\n</article>\n",
            question.state()
        ));
        return;
    };

    let spans: Vec<&EvidenceSpan> = analysis
        .dimensions
        .values()
        .flat_map(|d| &d.evidence)
        .collect();
    html.push_str(&format!(
        "<blockquote>{}</blockquote>\n",
        highlight(&analysis.response_text, &spans)
    ));

    html.push_str("<table class=\"scores\">\n<thead><tr><th>Dimension</th><th>Score</th><th>Confidence</th><th>Evidence</th></tr></thead>\n<tbody>\n");
    for (dim, ds) in &analysis.dimensions {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.0}</td><td>{:.2}</td><td>{}</td></tr>\n",
            html_escape(dim.as_str()),
            ds.score,
            ds.confidence,
            ds.evidence.len()
        ));
    }
    html.push_str("</tbody></table>\n");

    html.push_str(&format!(
        "<p class=\"overall\">Overall {:.1} | strategy {}{} | version {}</p>\n",
        analysis.overall_score,
        html_escape(&analysis.strategy),
        if analysis.fallback_used { " (fallback)" } else { "" },
        analysis.version
    ));
    html.push_str(&format!(
        "<pre class=\"justification\">{}</pre>\n",
        html_escape(&analysis.justification)
    ));
    html.push_str("</article>\n");
}

/// Render a response with evidence spans wrapped in `<mark>`.
///
/// Overlapping spans are split into runs; each run's title lists every tag
/// covering it.
fn highlight(text: &str, spans: &[&EvidenceSpan]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut cover: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); chars.len()];
    for span in spans.iter().filter(|s| s.is_within(chars.len())) {
        for tags in &mut cover[span.start..span.end] {
            tags.insert(span.tag.as_str());
        }
    }

    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let mut j = i + 1;
        while j < chars.len() && cover[j] == cover[i] {
            j += 1;
        }
        let segment: String = chars[i..j].iter().collect();
        if cover[i].is_empty() {
            out.push_str(&html_escape(&segment));
        } else {
            let title = cover[i].iter().copied().collect::<Vec<_>>().join(", ");
            out.push_str(&format!(
                "<mark title=\"{}\">{}</mark>",
                html_escape(&title),
                html_escape(&segment)
            ));
        }
        i = j;
    }
    out
}

fn generate_bar_chart(summary: &SessionSummary) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 200;

    let dims: Vec<(&Dimension, &DimensionStats)> = summary.dimensions.iter().collect();
    let total_height = dims.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (dim, stats)) in dims.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = (stats.mean.clamp(0.0, 100.0) / 100.0 * max_width as f64) as usize;

        let color = match standing(summary, dim) {
            "strength" => "#22c55e",
            "weakness" => "#ef4444",
            _ => "#eab308",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(dim.as_str())
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.1}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            stats.mean
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --strength: #dcfce7; --weakness: #fde2e2; --mark: #fef3c7; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --strength: #064e3b; --weakness: #7f1d1d; --mark: #78350f; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.strength { background: var(--strength); }
.weakness { background: var(--weakness); }
.tag { font-size: 0.75rem; padding: 0.1rem 0.4rem; border: 1px solid var(--border); border-radius: 4px; }
blockquote { border-left: 4px solid var(--border); margin: 1rem 0; padding: 0.5rem 1rem; }
mark { background: var(--mark); color: inherit; border-radius: 2px; }
article.question { border-top: 1px solid var(--border); padding-top: 1rem; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; white-space: pre-wrap; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('dimensions');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = isNaN(na) || isNaN(nb) ? va.localeCompare(vb) : na - nb;
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
