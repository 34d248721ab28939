//! Error types for the adaptive testing core.
//!
//! The numeric kernel itself never fails; these errors describe contract
//! violations at its boundary (bad item parameters, unknown items) and
//! failures of the session workflow around it.

use thiserror::Error;
use uuid::Uuid;

/// Item parameters that violate the three-parameter model's invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// Discrimination must be strictly positive.
    #[error("discrimination must be > 0, got {0}")]
    NonPositiveDiscrimination(f64),

    /// Guessing must lie in `[0, 1)`.
    #[error("guessing must be in [0, 1), got {0}")]
    GuessingOutOfRange(f64),

    /// Every parameter must be a finite number.
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
}

/// An item referenced by a response is missing from the parameter lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no parameters found for item '{item_id}'")]
pub struct LookupError {
    pub item_id: String,
}

/// Failures of the adaptive session workflow.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with this id exists.
    #[error("session not found: {0}")]
    NotFound(Uuid),

    /// The session already terminated.
    #[error("session {0} is already finished")]
    AlreadyFinished(Uuid),

    /// The submitted item is not in the catalog.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// The item was already answered in this session.
    #[error("item '{item_id}' was already administered in session {session_id}")]
    DuplicateResponse { session_id: Uuid, item_id: String },

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<LookupError> for SessionError {
    fn from(err: LookupError) -> Self {
        SessionError::UnknownItem(err.item_id)
    }
}

impl SessionError {
    /// Returns `true` if the caller sent a request that can never succeed
    /// for this session, as opposed to an infrastructure failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SessionError::Store(_))
    }
}
