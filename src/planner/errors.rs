//! Planner error types

use thiserror::Error;

use crate::index::IndexError;

/// Result type for planning
pub type PlannerResult<T> = Result<T, PlannerError>;

/// Errors raised while selecting and preparing a query strategy
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Canonical-key encoding or index loading failed
    #[error(transparent)]
    Index(#[from] IndexError),
}
