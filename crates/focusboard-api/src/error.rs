//! Error taxonomy.
//!
//! `StoreError` is what a backing store signals; `BoardError` is what
//! the engine surfaces to callers. The split matters for recovery: a
//! `BoardError::WriteFailed` means local state was already rolled back
//! and the operation can simply be retried, while an `InvalidMove`
//! means no writes were attempted at all.

use serde::{Deserialize, Serialize};

/// Errors raised by a store implementation.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("write rejected: {message}")]
    Rejected { message: String },

    #[error("constraint violated: {message}")]
    Constraint { message: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BoardError {
    /// A precondition did not hold (unknown card or list, card not in
    /// the claimed source list, undeletable list). No writes were
    /// attempted.
    #[error("invalid move: {reason}")]
    InvalidMove { reason: String },

    /// The store rejected one or more writes of a batch. The in-memory
    /// view was rolled back; the caller may retry.
    #[error("not saved, please retry: {source}")]
    WriteFailed {
        #[source]
        source: StoreError,
    },
}

impl BoardError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for BoardError {
    fn from(source: StoreError) -> Self {
        Self::WriteFailed { source }
    }
}
