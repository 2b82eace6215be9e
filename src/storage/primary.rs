//! Primary offset index
//!
//! One entry per document id, pointing at the newest log record for that
//! id. The map is the single source of truth for liveness: an id is live
//! iff it is present with `tombstone == 0`. Earlier log records for the
//! same id are unreferenced dead weight until the next compaction.
//!
//! Persisted as a single JSON object (`primary.idx.json`), flushed via
//! write-tmp-then-rename so readers always observe a complete file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{StorageError, StorageResult};

/// Bookkeeping for the newest log record of one document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryEntry {
    /// Byte offset in the log where the JSON line begins
    pub offset: u64,
    /// Line length in bytes, including the trailing newline
    pub length: u64,
    /// Per-collection monotonically increasing write version
    pub version: u64,
    /// 1 if the newest record for this id is a tombstone
    pub tombstone: u8,
    /// Field values that were linked into secondary indexes at this
    /// entry's write time; used for incremental unlink on the next write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<Map<String, Value>>,
}

impl PrimaryEntry {
    /// Returns whether this entry marks a deleted document
    pub fn is_tombstone(&self) -> bool {
        self.tombstone != 0
    }
}

/// In-memory primary index with atomic persistence.
#[derive(Debug, Default, Clone)]
pub struct PrimaryIndex {
    entries: HashMap<String, PrimaryEntry>,
}

impl PrimaryIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index from `path`.
    ///
    /// A missing file yields an empty index. A file that exists but does
    /// not parse is reported as corrupt; callers recover by rebuilding.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let entries: HashMap<String, PrimaryEntry> = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupt(path, e.to_string()))?;

        Ok(Self { entries })
    }

    /// Flushes the index to `path` atomically (write tmp, then rename).
    pub fn flush(&self, path: &Path) -> StorageResult<()> {
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(&self.entries)
            .map_err(|e| StorageError::invalid_record(e.to_string()))?;

        fs::write(&tmp_path, bytes).map_err(|e| StorageError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))?;

        Ok(())
    }

    /// Looks up the entry for an id
    pub fn get(&self, id: &str) -> Option<&PrimaryEntry> {
        self.entries.get(id)
    }

    /// Inserts or replaces the entry for an id
    pub fn insert(&mut self, id: String, entry: PrimaryEntry) {
        self.entries.insert(id, entry);
    }

    /// Returns whether an id is present and not tombstoned
    pub fn is_live(&self, id: &str) -> bool {
        self.entries.get(id).map(|e| !e.is_tombstone()).unwrap_or(false)
    }

    /// All live ids, sorted for deterministic traversal
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_tombstone())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of live (non-tombstoned) ids
    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_tombstone()).count()
    }

    /// Highest version observed across all entries (0 if empty)
    pub fn max_version(&self) -> u64 {
        self.entries.values().map(|e| e.version).max().unwrap_or(0)
    }

    /// Iterates over all `(id, entry)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PrimaryEntry)> {
        self.entries.iter()
    }

    /// Total number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
