//! Engine error kinds.
//!
//! Every error is local to the request that produced it: the engine never
//! writes a partially computed analysis back to the store, so a failed call
//! leaves the session exactly as it was.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown session or question.
    #[error("not found: {0}")]
    NotFound(String),

    /// The question is not in a state that allows the requested operation.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// The session has ended and accepts no further mutation.
    #[error("session {0} is closed")]
    SessionClosed(Uuid),

    /// A summary was requested before any response was analyzed.
    #[error("session {0} has no analyzed responses")]
    EmptySession(Uuid),

    /// An unrecognized question type, or one the scoring profile does not configure.
    #[error("invalid question type: {0}")]
    InvalidQuestionType(String),

    /// The scoring profile violates one of its invariants.
    #[error("invalid scoring profile: {0}")]
    InvalidProfile(String),

    /// An external record could not be converted back into engine types.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The session store reported a failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not-found",
            EngineError::StateConflict(_) => "state-conflict",
            EngineError::SessionClosed(_) => "session-closed",
            EngineError::EmptySession(_) => "empty-session",
            EngineError::InvalidQuestionType(_) => "invalid-question-type",
            EngineError::InvalidProfile(_) => "invalid-profile",
            EngineError::InvalidRecord(_) => "invalid-record",
            EngineError::Storage(_) => "storage",
        }
    }

    /// Returns `true` if the caller caused the error and retrying the same
    /// request cannot succeed.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::Storage(_))
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
