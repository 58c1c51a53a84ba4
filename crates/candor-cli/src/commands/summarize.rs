//! The `candor summarize` command.

use std::path::PathBuf;

use anyhow::Result;

use candor_core::aggregator::summarize;
use candor_core::model::InterviewSession;
use candor_providers::load_config_from;
use candor_report::{generate_html, generate_markdown};

pub fn execute(
    session_path: PathBuf,
    format: String,
    output: Option<PathBuf>,
    profile_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let profile = super::resolve_profile(profile_path.as_deref(), &config)?;
    let session = InterviewSession::load_json(&session_path)?;
    let summary = summarize(&session, &profile)?;

    let rendered = match format.as_str() {
        "text" => {
            println!(
                "Session {} ({})",
                session.id,
                session.label.as_deref().unwrap_or("unlabeled")
            );
            super::print_summary(&summary);
            return Ok(());
        }
        "json" => serde_json::to_string_pretty(&summary)?,
        "markdown" => generate_markdown(&session, Some(&summary)),
        "html" => generate_html(&session, Some(&summary)),
        other => anyhow::bail!(
            "unknown format '{other}' (expected text, json, markdown or html)"
        ),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)?;
            eprintln!("Summary written to: {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
