//! Record log and primary index
//!
//! The storage engine holds the canonical persistent state of a
//! collection: an append-only NDJSON log plus a primary offset index
//! mapping each id to its newest record.
//!
//! # Design
//!
//! - Append-only (no in-place updates); newest record wins per id
//! - Tombstones mark deletes and stay in the log
//! - Primary index flushed via write-tmp-then-rename on every commit
//! - Crash recovery streams the log and tolerates a partial tail line

mod errors;
mod log;
mod primary;

pub use errors::{StorageError, StorageResult};
pub use log::{LogSnapshot, RecordLog, LOG_FILE_NAME, PRIMARY_INDEX_FILE_NAME};
pub use primary::{PrimaryEntry, PrimaryIndex};
