//! Façade error types
//!
//! Subsystem errors converge here on their way to the caller.

use thiserror::Error;

use crate::index::IndexError;
use crate::planner::PlannerError;
use crate::realtime::RealtimeError;
use crate::storage::StorageError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the public API
#[derive(Debug, Error)]
pub enum StoreError {
    /// `update` on an id that is absent or deleted
    #[error("document not found: {id}")]
    NotFound { id: String },

    /// The caller supplied something other than a JSON object
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// Record log or primary index failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Secondary index failure
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Query planning failure
    #[error(transparent)]
    Planner(#[from] PlannerError),

    /// Notification subsystem failure
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

impl StoreError {
    /// Not-found error for an id
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Invalid-document error
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }
}
