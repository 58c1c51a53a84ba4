//! Core data model types for candor.
//!
//! A session owns an ordered list of question events; each question event
//! owns the versions of its response analysis. Mutation goes through methods
//! that enforce the question state machine
//! (`Created -> Asked -> Answered -> Reanalyzed`) and the session's terminal
//! `Ended` status.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Score reported for a dimension that has no supporting evidence.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Kind of interview question. Determines the dimension set and weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Behavioral,
    Technical,
    Situational,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::Behavioral,
        QuestionType::Technical,
        QuestionType::Situational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Behavioral => "behavioral",
            QuestionType::Technical => "technical",
            QuestionType::Situational => "situational",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "behavioral" | "behavioural" => Ok(QuestionType::Behavioral),
            "technical" => Ok(QuestionType::Technical),
            "situational" => Ok(QuestionType::Situational),
            other => Err(EngineError::InvalidQuestionType(other.to_string())),
        }
    }
}

/// A named axis of evaluation (e.g. `relevance`, `depth`).
///
/// Dimension names come from the scoring profile, so they are open-ended
/// strings rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(String);

impl Dimension {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dimension {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Tag attached to an evidence span, naming the detector that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceTag {
    QuestionKeyword,
    QuantifiedClaim,
    ExampleGiven,
    CausalReasoning,
    SequenceMarker,
    TechnicalTerm,
    SelfReflection,
    Ownership,
    Outcome,
    Hypothetical,
    Hedging,
}

impl EvidenceTag {
    pub const ALL: [EvidenceTag; 11] = [
        EvidenceTag::QuestionKeyword,
        EvidenceTag::QuantifiedClaim,
        EvidenceTag::ExampleGiven,
        EvidenceTag::CausalReasoning,
        EvidenceTag::SequenceMarker,
        EvidenceTag::TechnicalTerm,
        EvidenceTag::SelfReflection,
        EvidenceTag::Ownership,
        EvidenceTag::Outcome,
        EvidenceTag::Hypothetical,
        EvidenceTag::Hedging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceTag::QuestionKeyword => "question-keyword",
            EvidenceTag::QuantifiedClaim => "quantified-claim",
            EvidenceTag::ExampleGiven => "example-given",
            EvidenceTag::CausalReasoning => "causal-reasoning",
            EvidenceTag::SequenceMarker => "sequence-marker",
            EvidenceTag::TechnicalTerm => "technical-term",
            EvidenceTag::SelfReflection => "self-reflection",
            EvidenceTag::Ownership => "ownership",
            EvidenceTag::Outcome => "outcome",
            EvidenceTag::Hypothetical => "hypothetical",
            EvidenceTag::Hedging => "hedging",
        }
    }
}

impl fmt::Display for EvidenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        EvidenceTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| format!("unknown evidence tag: {s}"))
    }
}

/// A located, tagged substring of a response cited as support for a score.
///
/// Offsets count Unicode scalar values (characters), not bytes, and always
/// satisfy `0 <= start < end <= response.chars().count()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub start: usize,
    pub end: usize,
    pub tag: EvidenceTag,
    pub rationale: String,
}

impl EvidenceSpan {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the span is well-formed for a text of `text_len` characters.
    pub fn is_within(&self, text_len: usize) -> bool {
        self.start < self.end && self.end <= text_len
    }

    /// The covered substring of `response`.
    pub fn excerpt(&self, response: &str) -> String {
        response
            .chars()
            .skip(self.start)
            .take(self.end - self.start)
            .collect()
    }
}

/// Score, confidence, and supporting evidence for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 0–100.
    pub score: f64,
    /// 0.0–1.0.
    pub confidence: f64,
    /// Evidence spans whose tags contribute to this dimension, in text order.
    #[serde(default)]
    pub evidence: Vec<EvidenceSpan>,
}

/// The evaluation of one response. Never mutated once attached to a
/// question; re-analysis appends a new version instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    /// Index of the question this analysis belongs to.
    pub question_index: usize,
    /// 1-based version; re-analysis increments it.
    pub version: u32,
    pub response_text: String,
    pub dimensions: BTreeMap<Dimension, DimensionScore>,
    /// Weighted composite of the dimension scores, 0–100.
    pub overall_score: f64,
    pub justification: String,
    /// Name of the scoring strategy whose scores were used.
    pub strategy: String,
    /// `true` when the configured strategy failed or timed out and the
    /// rule-based scores were used instead.
    #[serde(default)]
    pub fallback_used: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// Lifecycle state of a question event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionState {
    Created,
    Asked,
    Answered,
    Reanalyzed,
}

impl fmt::Display for QuestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionState::Created => "created",
            QuestionState::Asked => "asked",
            QuestionState::Answered => "answered",
            QuestionState::Reanalyzed => "re-analyzed",
        };
        f.write_str(s)
    }
}

/// One question asked during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvent {
    /// Position in the session, starting at 0.
    pub index: usize,
    pub text: String,
    pub question_type: QuestionType,
    pub created_at: DateTime<Utc>,
    state: QuestionState,
    #[serde(default)]
    asked_at: Option<DateTime<Utc>>,
    /// Analysis versions, oldest first.
    #[serde(default)]
    analyses: Vec<ResponseAnalysis>,
}

impl QuestionEvent {
    pub fn new(index: usize, text: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            index,
            text: text.into(),
            question_type,
            created_at: Utc::now(),
            state: QuestionState::Created,
            asked_at: None,
            analyses: Vec::new(),
        }
    }

    pub fn state(&self) -> QuestionState {
        self.state
    }

    pub fn asked_at(&self) -> Option<DateTime<Utc>> {
        self.asked_at
    }

    /// The current analysis (latest version), if answered.
    pub fn analysis(&self) -> Option<&ResponseAnalysis> {
        self.analyses.last()
    }

    /// All analysis versions, oldest first.
    pub fn analyses(&self) -> &[ResponseAnalysis] {
        &self.analyses
    }

    pub fn is_answered(&self) -> bool {
        matches!(
            self.state,
            QuestionState::Answered | QuestionState::Reanalyzed
        )
    }

    /// Transition `Created -> Asked`.
    pub fn mark_asked(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.state != QuestionState::Created {
            return Err(EngineError::StateConflict(format!(
                "question {} is already {}",
                self.index, self.state
            )));
        }
        self.state = QuestionState::Asked;
        self.asked_at = Some(at);
        Ok(())
    }

    /// Attach the first analysis: `Asked -> Answered`.
    pub(crate) fn attach_analysis(&mut self, analysis: ResponseAnalysis) -> Result<()> {
        match self.state {
            QuestionState::Asked => {
                self.analyses.push(analysis);
                self.state = QuestionState::Answered;
                Ok(())
            }
            QuestionState::Created => Err(EngineError::StateConflict(format!(
                "question {} has not been asked yet",
                self.index
            ))),
            QuestionState::Answered | QuestionState::Reanalyzed => {
                Err(EngineError::StateConflict(format!(
                    "question {} is already answered; use re-analysis to record a new version",
                    self.index
                )))
            }
        }
    }

    /// Append a re-analysis version, keeping earlier ones.
    pub(crate) fn append_reanalysis(&mut self, analysis: ResponseAnalysis) -> Result<()> {
        if !self.is_answered() {
            return Err(EngineError::StateConflict(format!(
                "question {} is {} and has nothing to re-analyze",
                self.index, self.state
            )));
        }
        self.analyses.push(analysis);
        self.state = QuestionState::Reanalyzed;
        Ok(())
    }
}

/// Session status. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// A structured interview: an ordered sequence of question events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: Uuid,
    /// Free-form label (role, loop name).
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    status: SessionStatus,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    questions: Vec<QuestionEvent>,
}

impl InterviewSession {
    pub fn new(label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            created_at: Utc::now(),
            status: SessionStatus::Active,
            ended_at: None,
            questions: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    pub fn questions(&self) -> &[QuestionEvent] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Result<&QuestionEvent> {
        self.questions
            .get(index)
            .ok_or_else(|| self.question_not_found(index))
    }

    /// Mutable access for the engine; fails on ended sessions.
    pub(crate) fn question_mut(&mut self, index: usize) -> Result<&mut QuestionEvent> {
        self.ensure_active()?;
        let id = self.id;
        self.questions.get_mut(index).ok_or_else(|| {
            EngineError::NotFound(format!("question {index} in session {id}"))
        })
    }

    /// Number of questions with at least one analysis.
    pub fn answered_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_answered()).count()
    }

    /// Append a new question in the `Created` state. Returns its index.
    pub fn push_question(
        &mut self,
        text: impl Into<String>,
        question_type: QuestionType,
    ) -> Result<usize> {
        self.ensure_active()?;
        let index = self.questions.len();
        self.questions
            .push(QuestionEvent::new(index, text, question_type));
        Ok(index)
    }

    /// Transition to the terminal `Ended` status.
    pub fn end(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_active()?;
        self.status = SessionStatus::Ended;
        self.ended_at = Some(at);
        Ok(())
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_ended() {
            Err(EngineError::SessionClosed(self.id))
        } else {
            Ok(())
        }
    }

    fn question_not_found(&self, index: usize) -> EngineError {
        EngineError::NotFound(format!("question {index} in session {}", self.id))
    }

    /// Save the session as pretty JSON.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize session")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write session to {}", path.display()))?;
        Ok(())
    }

    /// Load a session from a JSON file.
    pub fn load_json(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session from {}", path.display()))?;
        let session: InterviewSession =
            serde_json::from_str(&content).context("failed to parse session JSON")?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(index: usize, version: u32) -> ResponseAnalysis {
        ResponseAnalysis {
            question_index: index,
            version,
            response_text: "answer".into(),
            dimensions: BTreeMap::new(),
            overall_score: 50.0,
            justification: String::new(),
            strategy: "rule-based".into(),
            fallback_used: false,
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn question_type_display_and_parse() {
        assert_eq!(QuestionType::Technical.to_string(), "technical");
        assert_eq!(
            "Behavioural".parse::<QuestionType>().unwrap(),
            QuestionType::Behavioral
        );
        let err = "trivia".parse::<QuestionType>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuestionType(t) if t == "trivia"));
    }

    #[test]
    fn evidence_tag_parse_accepts_snake_case() {
        assert_eq!(
            "quantified_claim".parse::<EvidenceTag>().unwrap(),
            EvidenceTag::QuantifiedClaim
        );
        assert!("sarcasm".parse::<EvidenceTag>().is_err());
        for tag in EvidenceTag::ALL {
            assert_eq!(tag.as_str().parse::<EvidenceTag>().unwrap(), tag);
        }
    }

    #[test]
    fn span_excerpt_uses_character_offsets() {
        let span = EvidenceSpan {
            start: 2,
            end: 5,
            tag: EvidenceTag::QuantifiedClaim,
            rationale: String::new(),
        };
        assert_eq!(span.excerpt("é 40% more"), "40%");
        assert!(span.is_within(5));
        assert!(!span.is_within(4));
    }

    #[test]
    fn question_state_machine() {
        let mut q = QuestionEvent::new(0, "Tell me about a conflict", QuestionType::Behavioral);
        assert!(matches!(
            q.attach_analysis(analysis(0, 1)),
            Err(EngineError::StateConflict(_))
        ));

        q.mark_asked(Utc::now()).unwrap();
        assert!(q.mark_asked(Utc::now()).is_err());
        assert_eq!(q.state(), QuestionState::Asked);

        q.attach_analysis(analysis(0, 1)).unwrap();
        assert_eq!(q.state(), QuestionState::Answered);
        assert!(matches!(
            q.attach_analysis(analysis(0, 2)),
            Err(EngineError::StateConflict(_))
        ));

        q.append_reanalysis(analysis(0, 2)).unwrap();
        assert_eq!(q.state(), QuestionState::Reanalyzed);
        assert_eq!(q.analyses().len(), 2);
        assert_eq!(q.analysis().unwrap().version, 2);
    }

    #[test]
    fn ended_session_rejects_mutation() {
        let mut session = InterviewSession::new(Some("backend loop".into()));
        session
            .push_question("Design a cache", QuestionType::Technical)
            .unwrap();
        session.end(Utc::now()).unwrap();

        assert!(matches!(
            session.push_question("Another", QuestionType::Technical),
            Err(EngineError::SessionClosed(_))
        ));
        assert!(matches!(
            session.question_mut(0),
            Err(EngineError::SessionClosed(_))
        ));
        assert!(matches!(
            session.end(Utc::now()),
            Err(EngineError::SessionClosed(_))
        ));
        // Reads still work.
        assert_eq!(session.question(0).unwrap().text, "Design a cache");
    }

    #[test]
    fn unknown_question_is_not_found() {
        let session = InterviewSession::new(None);
        assert!(matches!(session.question(3), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn session_json_roundtrip() {
        let mut session = InterviewSession::new(Some("loop".into()));
        session
            .push_question("Why Rust?", QuestionType::Technical)
            .unwrap();
        session.question_mut(0).unwrap().mark_asked(Utc::now()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");
        session.save_json(&path).unwrap();

        let loaded = InterviewSession::load_json(&path).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.question(0).unwrap().state(), QuestionState::Asked);
    }
}
