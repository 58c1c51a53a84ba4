//! The `candor validate` command.

use std::path::PathBuf;

use anyhow::Result;

use candor_core::profile::load_profile;
use candor_core::transcript::{self, ValidationWarning};

pub fn execute(transcript_path: Option<PathBuf>, profile_path: Option<PathBuf>) -> Result<()> {
    anyhow::ensure!(
        transcript_path.is_some() || profile_path.is_some(),
        "nothing to validate: pass --transcript and/or --profile"
    );

    let mut total_warnings = 0;

    if let Some(path) = &profile_path {
        let profile = load_profile(path)?;
        println!(
            "Profile: {} ({} question types, {} dimensions)",
            path.display(),
            profile.question_types.len(),
            profile.dimensions.len()
        );
        total_warnings += print_warnings(&profile.warnings());
    }

    if let Some(path) = &transcript_path {
        let transcripts = if path.is_dir() {
            transcript::load_transcript_directory(path)?
        } else {
            vec![transcript::load_transcript(path)?]
        };

        for t in &transcripts {
            println!(
                "Transcript: {} ({} questions)",
                t.label.as_deref().unwrap_or("unlabeled"),
                t.questions.len()
            );
            total_warnings += print_warnings(&transcript::validate_transcript(t));
        }
    }

    if total_warnings == 0 {
        println!("All inputs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

fn print_warnings(warnings: &[ValidationWarning]) -> usize {
    for w in warnings {
        println!("  WARNING: {w}");
    }
    warnings.len()
}
