//! Change notification
//!
//! Per-collection and per-document broadcast channels driven by the
//! write path, plus a filesystem watcher that folds out-of-process
//! writes into the same event stream.

mod errors;
mod hub;
mod watcher;

pub use errors::{RealtimeError, RealtimeResult};
pub use hub::ChangeHub;
pub use watcher::DirectoryWatcher;
