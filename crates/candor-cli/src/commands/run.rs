//! The `candor run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use candor_core::engine::{AnalysisEngine, EngineConfig};
use candor_core::model::ResponseAnalysis;
use candor_core::record::AnalyzeRequest;
use candor_core::store::InMemorySessionStore;
use candor_core::transcript::{self, Transcript};
use candor_core::EngineError;
use candor_providers::{create_strategy, load_config_from};
use candor_report::{write_html_report, write_markdown_report};

pub struct RunArgs {
    pub transcript: PathBuf,
    pub strategy: Option<String>,
    pub profile: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: String,
    pub keep_open: bool,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;
    let profile = Arc::new(super::resolve_profile(args.profile.as_deref(), &config)?);

    let strategy_name = args.strategy.as_deref().unwrap_or(&config.strategy);
    let strategy = create_strategy(strategy_name, &config, profile.clone())?;

    let formats: Vec<&str> = if args.format == "all" {
        vec!["json", "html", "markdown"]
    } else {
        args.format.split(',').map(str::trim).collect()
    };
    for fmt in &formats {
        anyhow::ensure!(
            matches!(*fmt, "json" | "html" | "markdown"),
            "unknown output format '{fmt}' (expected json, html, markdown or all)"
        );
    }

    let transcripts = if args.transcript.is_dir() {
        transcript::load_transcript_directory(&args.transcript)?
    } else {
        vec![transcript::load_transcript(&args.transcript)?]
    };
    anyhow::ensure!(
        !transcripts.is_empty(),
        "no transcripts found in {}",
        args.transcript.display()
    );

    let engine = AnalysisEngine::new(
        Arc::new(InMemorySessionStore::new()),
        profile,
        strategy,
        EngineConfig {
            strategy_timeout: config.strategy_timeout(),
        },
    )?;
    let output = args.output.unwrap_or_else(|| config.output_dir.clone());

    for transcript in &transcripts {
        eprintln!(
            "candor v{}: scoring {} question(s) from {} with {}",
            env!("CARGO_PKG_VERSION"),
            transcript.questions.len(),
            transcript.source.display(),
            engine.strategy_name()
        );
        eprintln!();

        let session_id = replay(&engine, transcript).await?;
        if !args.keep_open {
            engine.end_session(session_id).await?;
        }
        let session = engine.get_session(session_id).await?;

        let summary = match engine.summarize(session_id).await {
            Ok(summary) => {
                super::print_summary(&summary);
                Some(summary)
            }
            Err(EngineError::EmptySession(_)) => {
                eprintln!("No answered questions; nothing to summarize.");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let stem = format!(
            "session-{}-{}",
            chrono::Utc::now().format("%Y-%m-%dT%H%M%S"),
            &session_id.simple().to_string()[..8]
        );
        std::fs::create_dir_all(&output)?;
        for fmt in &formats {
            match *fmt {
                "json" => {
                    let path = output.join(format!("{stem}.json"));
                    session.save_json(&path)?;
                    eprintln!("Session saved to: {}", path.display());
                }
                "html" => {
                    let path = output.join(format!("{stem}.html"));
                    write_html_report(&session, summary.as_ref(), &path)?;
                    eprintln!("HTML report: {}", path.display());
                }
                "markdown" => {
                    let path = output.join(format!("{stem}.md"));
                    write_markdown_report(&session, summary.as_ref(), &path)?;
                    eprintln!("Markdown report: {}", path.display());
                }
                _ => {}
            }
        }
        eprintln!();
    }

    Ok(())
}

/// Feed one transcript through the engine question by question.
async fn replay(engine: &AnalysisEngine, transcript: &Transcript) -> Result<uuid::Uuid> {
    let session_id = engine.create_session(transcript.label.clone()).await?;

    for entry in &transcript.questions {
        let index = engine
            .add_question(session_id, &entry.text, entry.question_type)
            .await?;
        engine.mark_asked(session_id, index).await?;

        let Some(response) = &entry.response else {
            eprintln!("  Q{}: no response", index + 1);
            continue;
        };
        let analysis = engine
            .analyze(&AnalyzeRequest {
                session_id,
                question_index: index,
                response_text: response.clone(),
            })
            .await?;
        report_analysis(&analysis);
    }

    Ok(session_id)
}

fn report_analysis(analysis: &ResponseAnalysis) {
    let evidence: usize = analysis.dimensions.values().map(|d| d.evidence.len()).sum();
    eprintln!(
        "  Q{}: overall {:.1} ({} evidence citation(s), {})",
        analysis.question_index + 1,
        analysis.overall_score,
        evidence,
        analysis.strategy
    );
    if analysis.fallback_used {
        warn!(
            question = analysis.question_index,
            "scoring strategy unavailable, used rule-based fallback"
        );
    }
}
