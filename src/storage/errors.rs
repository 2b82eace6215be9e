//! Storage error types
//!
//! I/O failures surface to the caller; artifact corruption is reported
//! with enough context to decide between skip and rebuild.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Record log and primary index errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying filesystem failure
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record offered to the log is not writable as an NDJSON line
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// An on-disk artifact cannot be parsed
    #[error("corrupt artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl StorageError {
    /// I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Invalid record error
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Corruption error for an artifact file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
