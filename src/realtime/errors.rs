//! Notification error types

use thiserror::Error;

/// Result type for notification operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Change-notification errors
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
