//! TOML interview transcript parser.
//!
//! A transcript is a recorded session: a header plus the questions in the
//! order they were asked, each with the candidate's response. Transcripts
//! drive offline scoring runs from the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::QuestionType;

/// A parsed transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Free-form label for the session (role, loop name).
    pub label: Option<String>,
    pub questions: Vec<TranscriptEntry>,
    /// File the transcript was loaded from.
    #[serde(skip)]
    pub source: PathBuf,
}

/// One asked question and the response it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub question_type: QuestionType,
    pub text: String,
    /// `None` when the question was asked but not answered.
    pub response: Option<String>,
}

/// Intermediate TOML structure for parsing transcript files.
#[derive(Debug, Deserialize)]
struct TomlTranscript {
    #[serde(default)]
    session: TomlSessionHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlSessionHeader {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(rename = "type")]
    question_type: String,
    text: String,
    #[serde(default)]
    response: Option<String>,
}

/// Parse a transcript file.
pub fn load_transcript(path: &Path) -> Result<Transcript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read transcript: {}", path.display()))?;
    parse_transcript_str(&content, path)
}

/// Parse a transcript from a TOML string.
pub fn parse_transcript_str(content: &str, source_path: &Path) -> Result<Transcript> {
    let parsed: TomlTranscript = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .with_context(|| format!("question {i} in {}", source_path.display()))?;
            Ok(TranscriptEntry {
                question_type,
                text: q.text,
                response: q.response,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Transcript {
        label: parsed.session.label,
        questions,
        source: source_path.to_path_buf(),
    })
}

/// Recursively load all `.toml` transcripts from a directory, skipping
/// files that fail to parse.
pub fn load_transcript_directory(dir: &Path) -> Result<Vec<Transcript>> {
    let mut transcripts = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            transcripts.extend(load_transcript_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match load_transcript(&path) {
                Ok(t) => transcripts.push(t),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(transcripts)
}

/// A warning from transcript or profile validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The question index, if the warning is about one question.
    pub question: Option<usize>,
    pub message: String,
}

impl ValidationWarning {
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            question: None,
            message: message.into(),
        }
    }

    pub fn for_question(index: usize, message: impl Into<String>) -> Self {
        Self {
            question: Some(index),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.question {
            Some(i) => write!(f, "question {i}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Check a transcript for common issues.
pub fn validate_transcript(transcript: &Transcript) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if transcript.questions.is_empty() {
        warnings.push(ValidationWarning::general("transcript has no questions"));
    }

    for (i, q) in transcript.questions.iter().enumerate() {
        if q.text.trim().is_empty() {
            warnings.push(ValidationWarning::for_question(i, "question text is empty"));
        }
        match &q.response {
            None => warnings.push(ValidationWarning::for_question(
                i,
                "no response recorded; the question will be left unanswered",
            )),
            Some(r) if r.trim().is_empty() => warnings.push(ValidationWarning::for_question(
                i,
                "response is empty and will score neutral",
            )),
            Some(_) => {}
        }
    }

    let mut seen = std::collections::HashSet::new();
    for (i, q) in transcript.questions.iter().enumerate() {
        if !seen.insert(q.text.trim()) {
            warnings.push(ValidationWarning::for_question(i, "duplicate question text"));
        }
    }

    warnings
}
