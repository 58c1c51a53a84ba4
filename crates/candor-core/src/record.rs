//! Serializable request and result records for transport layers.
//!
//! These are the shapes the engine exchanges with callers outside the process
//! (HTTP handlers, the CLI's JSON output). Field names are stable; converting
//! a record back into engine types validates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{Dimension, DimensionScore, EvidenceSpan, EvidenceTag, ResponseAnalysis};

/// A request to analyze one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub session_id: Uuid,
    pub question_index: usize,
    pub response_text: String,
}

/// One evidence span, with its tag as a plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub start: usize,
    pub end: usize,
    pub tag: String,
    pub rationale: String,
}

/// One dimension's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub name: String,
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceRecord>,
}

/// A complete analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub question_index: usize,
    pub version: u32,
    pub response_text: String,
    pub dimensions: Vec<DimensionRecord>,
    pub overall_score: f64,
    pub justification: String,
    pub strategy: String,
    #[serde(default)]
    pub fallback_used: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// An engine error as returned to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Stable kind code, e.g. `state-conflict`.
    pub kind: String,
    pub message: String,
}

impl From<&EngineError> for ErrorRecord {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<&EvidenceSpan> for EvidenceRecord {
    fn from(span: &EvidenceSpan) -> Self {
        Self {
            start: span.start,
            end: span.end,
            tag: span.tag.to_string(),
            rationale: span.rationale.clone(),
        }
    }
}

impl From<&ResponseAnalysis> for AnalysisRecord {
    fn from(a: &ResponseAnalysis) -> Self {
        Self {
            question_index: a.question_index,
            version: a.version,
            response_text: a.response_text.clone(),
            dimensions: a
                .dimensions
                .iter()
                .map(|(name, ds)| DimensionRecord {
                    name: name.to_string(),
                    score: ds.score,
                    confidence: ds.confidence,
                    evidence: ds.evidence.iter().map(EvidenceRecord::from).collect(),
                })
                .collect(),
            overall_score: a.overall_score,
            justification: a.justification.clone(),
            strategy: a.strategy.clone(),
            fallback_used: a.fallback_used,
            analyzed_at: a.analyzed_at,
        }
    }
}

impl TryFrom<AnalysisRecord> for ResponseAnalysis {
    type Error = EngineError;

    fn try_from(record: AnalysisRecord) -> Result<Self> {
        let invalid = |msg: String| EngineError::InvalidRecord(msg);
        let text_len = record.response_text.chars().count();

        if !(0.0..=100.0).contains(&record.overall_score) {
            return Err(invalid(format!(
                "overall score {} is outside 0..=100",
                record.overall_score
            )));
        }

        let mut dimensions = std::collections::BTreeMap::new();
        for dim in record.dimensions {
            if !(0.0..=100.0).contains(&dim.score) || !(0.0..=1.0).contains(&dim.confidence) {
                return Err(invalid(format!(
                    "dimension '{}' has score {} / confidence {} out of range",
                    dim.name, dim.score, dim.confidence
                )));
            }
            let evidence = dim
                .evidence
                .into_iter()
                .map(|e| {
                    let tag: EvidenceTag = e.tag.parse().map_err(invalid)?;
                    let span = EvidenceSpan {
                        start: e.start,
                        end: e.end,
                        tag,
                        rationale: e.rationale,
                    };
                    if !span.is_within(text_len) {
                        return Err(invalid(format!(
                            "span [{}, {}) is outside a response of {text_len} characters",
                            span.start, span.end
                        )));
                    }
                    Ok(span)
                })
                .collect::<Result<Vec<_>>>()?;

            let name = Dimension::new(dim.name);
            if dimensions.contains_key(&name) {
                return Err(invalid(format!("dimension '{name}' appears twice")));
            }
            dimensions.insert(
                name,
                DimensionScore {
                    score: dim.score,
                    confidence: dim.confidence,
                    evidence,
                },
            );
        }

        Ok(ResponseAnalysis {
            question_index: record.question_index,
            version: record.version,
            response_text: record.response_text,
            dimensions,
            overall_score: record.overall_score,
            justification: record.justification,
            strategy: record.strategy,
            fallback_used: record.fallback_used,
            analyzed_at: record.analyzed_at,
        })
    }
}
