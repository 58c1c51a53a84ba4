//! The `candor extract` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use candor_core::evidence::{extract, extract_for_question};
use candor_core::model::QuestionType;

pub fn execute(
    text: Option<String>,
    file: Option<PathBuf>,
    question_type: String,
    question: Option<String>,
    json: bool,
) -> Result<()> {
    let question_type: QuestionType = question_type.parse()?;
    let response = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read response: {}", path.display()))?,
        (None, None) => anyhow::bail!("either --text or --file is required"),
    };

    let spans = match &question {
        Some(question) => extract_for_question(&response, question_type, question),
        None => extract(&response, question_type),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&spans)?);
        return Ok(());
    }

    if spans.is_empty() {
        println!("No evidence found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Start", "End", "Tag", "Excerpt", "Rationale"]);
    for span in &spans {
        table.add_row(vec![
            Cell::new(span.start),
            Cell::new(span.end),
            Cell::new(span.tag),
            Cell::new(span.excerpt(&response)),
            Cell::new(&span.rationale),
        ]);
    }
    println!("{table}");
    println!("{} span(s)", spans.len());
    Ok(())
}
