//! Collection directory watcher
//!
//! Polls the collection directory and its record log for metadata
//! changes and publishes a collection event on every observed change, so
//! out-of-process writers produce in-process notifications. One event is
//! emitted per observed change of the `(len, mtime)` signature, however
//! many writes happened inside a poll tick.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use super::hub::ChangeHub;
use crate::storage::LOG_FILE_NAME;

/// Metadata signature of the watched directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct DirSignature {
    dir_mtime: Option<SystemTime>,
    log_len: Option<u64>,
    log_mtime: Option<SystemTime>,
}

impl DirSignature {
    fn capture(dir: &Path, log_path: &Path) -> Self {
        let dir_mtime = fs::metadata(dir).and_then(|m| m.modified()).ok();
        let (log_len, log_mtime) = match fs::metadata(log_path) {
            Ok(m) => (Some(m.len()), m.modified().ok()),
            Err(_) => (None, None),
        };
        Self {
            dir_mtime,
            log_len,
            log_mtime,
        }
    }
}

/// Background poller feeding collection events into the hub.
///
/// The task is aborted on `stop` or drop; teardown never blocks.
#[derive(Debug)]
pub struct DirectoryWatcher {
    handle: JoinHandle<()>,
}

impl DirectoryWatcher {
    /// Spawns a watcher over `dir` with the given poll cadence
    pub fn spawn(dir: PathBuf, poll_interval: Duration, hub: Arc<ChangeHub>) -> Self {
        let handle = tokio::spawn(async move {
            let log_path = dir.join(LOG_FILE_NAME);
            let mut last = DirSignature::capture(&dir, &log_path);

            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it so the
            // primed signature is not immediately re-read
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let current = DirSignature::capture(&dir, &log_path);
                if current != last {
                    trace!(dir = %dir.display(), "directory change observed");
                    hub.publish_collection();
                    last = current;
                }
            }
        });
        Self { handle }
    }

    /// Stops the watcher task
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
