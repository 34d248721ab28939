//! Store error types.

use thiserror::Error;

/// Errors raised by the in-memory stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `update` on a record that was never created.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// `create` with an id that is already taken.
    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },
}
