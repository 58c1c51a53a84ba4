pub mod extract;
pub mod init;
pub mod run;
pub mod summarize;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use candor_core::aggregator::SessionSummary;
use candor_core::profile::{load_profile, ScoringProfile};
use candor_providers::CandorConfig;

/// The profile named on the command line, else the configured one.
fn resolve_profile(cli_profile: Option<&Path>, config: &CandorConfig) -> Result<ScoringProfile> {
    match cli_profile {
        Some(path) => load_profile(path),
        None => config.load_profile(),
    }
}

/// Render a session summary as a table of dimension statistics.
fn summary_table(summary: &SessionSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Dimension", "Mean", "Min", "Max", "Samples", "Trend", ""]);

    for (dim, stats) in &summary.dimensions {
        let standing = if summary.strengths.contains(dim) {
            "strength"
        } else if summary.weaknesses.contains(dim) {
            "weakness"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(dim),
            Cell::new(format!("{:.1}", stats.mean)),
            Cell::new(format!("{:.1}", stats.min)),
            Cell::new(format!("{:.1}", stats.max)),
            Cell::new(stats.samples),
            Cell::new(&stats.trend),
            Cell::new(standing),
        ]);
    }
    table
}

/// Print a summary: table, overall score and outliers.
fn print_summary(summary: &SessionSummary) {
    println!("{}", summary_table(summary));
    println!(
        "Overall: {:.1}/100 over {} answered question(s){}",
        summary.overall_score,
        summary.answered_questions,
        if summary.is_final { "" } else { " (provisional)" }
    );
    for outlier in &summary.outliers {
        println!(
            "Outlier: question {} scored {:.1} (z = {:+.2})",
            outlier.question_index + 1,
            outlier.overall_score,
            outlier.z_score
        );
    }
}
