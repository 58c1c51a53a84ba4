//! Core trait definitions for scoring strategies and session storage.
//!
//! Scoring strategies are implemented here (rule-based) and in the
//! `candor-providers` crate (model-backed). Session storage is consumed
//! through [`SessionStore`]; [`crate::store::InMemorySessionStore`] is the
//! bundled implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Dimension, EvidenceSpan, InterviewSession, QuestionEvent, QuestionType};

// ---------------------------------------------------------------------------
// Scoring strategy
// ---------------------------------------------------------------------------

/// A pluggable scoring algorithm.
///
/// Implementations may return dimensions outside the declared set or leave
/// some out; the analyzer normalizes the result against the profile.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    /// Short name recorded on every analysis (e.g. "rule-based").
    fn name(&self) -> &str;

    /// Score a response on the request's declared dimensions.
    async fn score(&self, request: &ScoringRequest) -> anyhow::Result<DimensionScores>;
}

/// Everything a strategy may use to score a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub question_type: QuestionType,
    pub question_text: String,
    pub response_text: String,
    pub metadata: ResponseMetadata,
    /// Spans already extracted from the response, in text order.
    pub evidence: Vec<EvidenceSpan>,
    /// Dimensions the profile declares for this question type.
    pub dimensions: Vec<Dimension>,
}

/// Measurements of a response that don't depend on its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub char_count: usize,
    pub word_count: usize,
    /// Time between the question being asked and the response arriving.
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
}

impl ResponseMetadata {
    pub fn measure(text: &str, elapsed_ms: Option<u64>) -> Self {
        Self {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            elapsed_ms,
        }
    }
}

/// One dimension's raw estimate from a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionEstimate {
    pub score: f64,
    pub confidence: f64,
}

/// Raw per-dimension output of a strategy.
pub type DimensionScores = BTreeMap<Dimension, DimensionEstimate>;

// ---------------------------------------------------------------------------
// Session storage
// ---------------------------------------------------------------------------

/// Persistence for interview sessions.
///
/// The engine serializes mutations per session, so implementations only need
/// to make individual calls atomic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session. Unknown ids return [`crate::EngineError::NotFound`].
    async fn get(&self, id: Uuid) -> Result<InterviewSession>;

    /// Insert or replace a session.
    async fn put(&self, session: InterviewSession) -> Result<()>;

    /// The session's question events, in question order.
    async fn list_question_events(&self, id: Uuid) -> Result<Vec<QuestionEvent>> {
        Ok(self.get(id).await?.questions().to_vec())
    }

    /// Remove a session. Unknown ids return [`crate::EngineError::NotFound`].
    async fn delete(&self, id: Uuid) -> Result<()>;
}
