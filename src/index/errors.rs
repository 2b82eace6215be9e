//! Index error types

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Secondary-index and index-manager errors
#[derive(Debug, Error)]
pub enum IndexError {
    /// Failure in the underlying record log or on the index file itself
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An index artifact cannot be parsed; recovered by rebuild
    #[error("corrupt index file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Numeric key outside the encodable band of ±10^12
    #[error("numeric key out of range: {value}")]
    OutOfRange { value: String },

    /// A worker-side rebuild was cancelled or panicked
    #[error("index rebuild worker failed: {0}")]
    Worker(String),
}

impl IndexError {
    /// Corruption error for an index file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Out-of-range numeric key error
    pub fn out_of_range(value: impl ToString) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
        }
    }
}
