//! Markdown report generator.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use candor_core::aggregator::SessionSummary;
use candor_core::model::{InterviewSession, QuestionEvent};

/// Escape characters that would break a Markdown table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Generate a Markdown report for a session.
pub fn generate_markdown(session: &InterviewSession, summary: Option<&SessionSummary>) -> String {
    let mut md = String::new();
    let title = session.label.as_deref().unwrap_or("Interview session");

    let _ = writeln!(md, "# {title}\n");
    let _ = writeln!(
        md,
        "Session `{}`, started {}, {} of {} questions answered{}.\n",
        session.id,
        session.created_at.format("%Y-%m-%d %H:%M UTC"),
        session.answered_count(),
        session.questions().len(),
        if session.is_ended() { ", ended" } else { "" }
    );

    md.push_str("## Summary\n\n");
    match summary {
        Some(summary) => push_summary(&mut md, summary),
        None => md.push_str("_No responses have been analyzed yet._\n\n"),
    }

    md.push_str("## Responses\n\n");
    for question in session.questions() {
        push_question(&mut md, question);
    }

    md
}

/// Write a Markdown report to a file.
pub fn write_markdown_report(
    session: &InterviewSession,
    summary: Option<&SessionSummary>,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_markdown(session, summary))
        .with_context(|| format!("failed to write Markdown report to {}", path.display()))
}

fn push_summary(md: &mut String, summary: &SessionSummary) {
    let _ = writeln!(
        md,
        "**Overall:** {:.1}/100{}\n",
        summary.overall_score,
        if summary.is_final { "" } else { " (provisional)" }
    );

    md.push_str("| Dimension | Mean | Min | Max | Samples | Trend |\n");
    md.push_str("|---|---:|---:|---:|---:|---|\n");
    for (dim, stats) in &summary.dimensions {
        let _ = writeln!(
            md,
            "| {} | {:.1} | {:.1} | {:.1} | {} | {} |",
            dim, stats.mean, stats.min, stats.max, stats.samples, stats.trend
        );
    }
    md.push('\n');

    let join = |dims: &[candor_core::model::Dimension]| {
        dims.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
    };
    if !summary.strengths.is_empty() {
        let _ = writeln!(md, "- **Strengths:** {}", join(&summary.strengths));
    }
    if !summary.weaknesses.is_empty() {
        let _ = writeln!(md, "- **Weaknesses:** {}", join(&summary.weaknesses));
    }
    for outlier in &summary.outliers {
        let _ = writeln!(
            md,
            "- **Outlier:** question {} scored {:.1} (z = {:+.2})",
            outlier.question_index + 1,
            outlier.overall_score,
            outlier.z_score
        );
    }
    md.push('\n');
}

fn push_question(md: &mut String, question: &QuestionEvent) {
    let _ = writeln!(
        md,
        "### Q{} ({}): {}\n",
        question.index + 1,
        question.question_type,
        question.text
    );

    let Some(analysis) = question.analysis() else {
        let _ = writeln!(md, "_Not answered ({})._\n", question.state());
        return;
    };

    for line in analysis.response_text.lines() {
        let _ = writeln!(md, "> {line}");
    }
    md.push('\n');

    md.push_str("| Dimension | Score | Confidence | Evidence |\n");
    md.push_str("|---|---:|---:|---|\n");
    for (dim, ds) in &analysis.dimensions {
        let tags = ds
            .evidence
            .iter()
            .map(|e| format!("{} \"{}\"", e.tag, e.excerpt(&analysis.response_text)))
            .collect::<Vec<_>>()
            .join("; ");
        let _ = writeln!(
            md,
            "| {} | {:.0} | {:.2} | {} |",
            dim,
            ds.score,
            ds.confidence,
            cell(&tags)
        );
    }
    md.push('\n');

    let _ = writeln!(
        md,
        "Overall {:.1} via {}{} (version {}).\n",
        analysis.overall_score,
        analysis.strategy,
        if analysis.fallback_used { ", fallback" } else { "" },
        analysis.version
    );
    for line in analysis.justification.lines() {
        let _ = writeln!(md, "- {line}");
    }
    md.push('\n');
}
