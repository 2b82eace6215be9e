//! Store configuration
//!
//! Tunables for the watcher cadence, notification buffering, and the
//! planner's default candidate cap.

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory watch poll interval in milliseconds (default: 200)
    #[serde(default = "default_watch_poll_interval_ms")]
    pub watch_poll_interval_ms: u64,

    /// Capacity of each broadcast channel ring (default: 64)
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Default candidate cap for indexed query plans (default: 1000)
    #[serde(default = "default_indexed_query_limit")]
    pub indexed_query_limit: usize,

    /// Run bulk index rebuilds on a dedicated blocking worker (default: true)
    #[serde(default = "default_use_worker_for_rebuild")]
    pub use_worker_for_rebuild: bool,
}

fn default_watch_poll_interval_ms() -> u64 {
    200
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_indexed_query_limit() -> usize {
    1000
}

fn default_use_worker_for_rebuild() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            watch_poll_interval_ms: default_watch_poll_interval_ms(),
            broadcast_capacity: default_broadcast_capacity(),
            indexed_query_limit: default_indexed_query_limit(),
            use_worker_for_rebuild: default_use_worker_for_rebuild(),
        }
    }
}

impl StoreConfig {
    /// Config with a specific watch poll interval
    pub fn with_watch_poll_interval_ms(interval_ms: u64) -> Self {
        Self {
            watch_poll_interval_ms: interval_ms,
            ..Default::default()
        }
    }
}
