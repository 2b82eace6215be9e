//! Append-only NDJSON record log
//!
//! One UTF-8 JSON object per line, LF-terminated. The log is never
//! rewritten in place; the newest line for an id wins and the primary
//! index points at it. Deletes append a tombstone line (`_deleted: true`).
//!
//! Crash consistency: the log is valid up to the last whole line written.
//! A partial tail line is tolerated by `rebuild_primary_index`, which
//! skips unparseable lines while preserving byte offsets.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::errors::{StorageError, StorageResult};
use super::primary::{PrimaryEntry, PrimaryIndex};

/// File name of the per-collection record log
pub const LOG_FILE_NAME: &str = "data.ndjson";

/// File name of the persistent primary index
pub const PRIMARY_INDEX_FILE_NAME: &str = "primary.idx.json";

/// Append-only record log plus its in-memory primary index.
///
/// Writes are serialized at the append step: offsets and versions are
/// assigned in commit order. The append handle is opened in the OS's
/// append mode so concurrent descriptors cannot interleave a line.
pub struct RecordLog {
    dir: PathBuf,
    log_path: PathBuf,
    index_path: PathBuf,
    file: File,
    current_offset: u64,
    primary: PrimaryIndex,
    next_version: u64,
}

impl RecordLog {
    /// Opens (or creates) the collection directory and its log.
    ///
    /// Loads `primary.idx.json` when present; a corrupt index file is
    /// logged and treated as empty so the engine stays functional and
    /// can be rebuilt.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

        let log_path = dir.join(LOG_FILE_NAME);
        let index_path = dir.join(PRIMARY_INDEX_FILE_NAME);

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| StorageError::io(&log_path, e))?;

        let current_offset = file
            .metadata()
            .map_err(|e| StorageError::io(&log_path, e))?
            .len();

        let primary = match PrimaryIndex::load(&index_path) {
            Ok(index) => index,
            Err(StorageError::Corrupt { path, reason }) => {
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "primary index unreadable, starting empty"
                );
                PrimaryIndex::new()
            }
            Err(e) => return Err(e),
        };

        let next_version = primary.max_version() + 1;

        Ok(Self {
            dir: dir.to_path_buf(),
            log_path,
            index_path,
            file,
            current_offset,
            primary,
            next_version,
        })
    }

    /// Returns the collection directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the log file path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Current end-of-log byte offset
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends one record and commits the primary index.
    ///
    /// The record must be a JSON object with a string `id` field. A
    /// record with `_deleted: true` is recorded as a tombstone. `prev`
    /// is the mapping of indexed field values captured for this write,
    /// stored on the entry for incremental unlink at the next write.
    ///
    /// Failure to flush the primary index is fatal for the write; the
    /// appended line may remain in the log and is reconciled by the next
    /// `rebuild_primary_index`.
    pub fn append_record(
        &mut self,
        record: &Value,
        prev: Option<Map<String, Value>>,
    ) -> StorageResult<PrimaryEntry> {
        let obj = record
            .as_object()
            .ok_or_else(|| StorageError::invalid_record("record is not a JSON object"))?;
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StorageError::invalid_record("record has no string `id` field"))?
            .to_string();

        let mut line = serde_json::to_string(record)
            .map_err(|e| StorageError::invalid_record(e.to_string()))?;
        line.push('\n');

        let offset = self.current_offset;

        self.file
            .write_all(line.as_bytes())
            .map_err(|e| StorageError::io(&self.log_path, e))?;
        self.file
            .sync_all()
            .map_err(|e| StorageError::io(&self.log_path, e))?;

        self.current_offset += line.len() as u64;

        let tombstone = obj
            .get("_deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let entry = PrimaryEntry {
            offset,
            length: line.len() as u64,
            version: self.next_version,
            tombstone: u8::from(tombstone),
            prev,
        };
        self.next_version += 1;
        self.primary.insert(id, entry.clone());

        self.primary.flush(&self.index_path)?;

        Ok(entry)
    }

    /// Loads the newest record for an id.
    ///
    /// Returns `None` when the id is absent, tombstoned, or the bytes at
    /// its recorded location no longer parse.
    pub fn get_by_id(&self, id: &str) -> StorageResult<Option<Value>> {
        let entry = match self.primary.get(id) {
            Some(e) if !e.is_tombstone() => e,
            _ => return Ok(None),
        };
        read_record_at(&self.log_path, entry.offset, entry.length)
    }

    /// Returns whether an id is present and not tombstoned
    pub fn exists_live(&self, id: &str) -> bool {
        self.primary.is_live(id)
    }

    /// Returns the primary entry for an id, tombstones included
    pub fn primary_entry(&self, id: &str) -> Option<&PrimaryEntry> {
        self.primary.get(id)
    }

    /// All live ids, sorted
    pub fn live_ids(&self) -> Vec<String> {
        self.primary.live_ids()
    }

    /// Number of live documents
    pub fn live_count(&self) -> usize {
        self.primary.live_count()
    }

    /// Fetches every live record, in id order. Entries whose bytes no
    /// longer parse are dropped.
    pub fn read_all_live(&self) -> StorageResult<Vec<Value>> {
        let mut records = Vec::new();
        for id in self.primary.live_ids() {
            if let Some(record) = self.get_by_id(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Rebuilds the primary index by streaming the log.
    ///
    /// Later lines for the same id win. A line that fails to parse still
    /// advances the byte offset but is not indexed, so every other entry
    /// stays addressable. The rebuilt index is flushed atomically.
    pub fn rebuild_primary_index(&mut self) -> StorageResult<()> {
        let file = File::open(&self.log_path).map_err(|e| StorageError::io(&self.log_path, e))?;
        let mut reader = BufReader::new(file);

        let mut rebuilt = PrimaryIndex::new();
        let mut offset: u64 = 0;
        let mut version: u64 = 0;
        let mut skipped: usize = 0;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes = reader
                .read_line(&mut line)
                .map_err(|e| StorageError::io(&self.log_path, e))?;
            if bytes == 0 {
                break;
            }

            match serde_json::from_str::<Value>(line.trim_end_matches('\n')) {
                Ok(record) => {
                    if let Some(id) = record.get("id").and_then(Value::as_str) {
                        let tombstone = record
                            .get("_deleted")
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        version += 1;
                        rebuilt.insert(
                            id.to_string(),
                            PrimaryEntry {
                                offset,
                                length: bytes as u64,
                                version,
                                tombstone: u8::from(tombstone),
                                prev: None,
                            },
                        );
                    } else {
                        skipped += 1;
                    }
                }
                Err(e) => {
                    debug!(offset, error = %e, "skipping unparseable log line");
                    skipped += 1;
                }
            }

            offset += bytes as u64;
        }

        if skipped > 0 {
            warn!(
                path = %self.log_path.display(),
                skipped,
                "rebuild skipped unindexable lines"
            );
        }

        self.primary = rebuilt;
        self.next_version = self.primary.max_version() + 1;
        self.current_offset = offset;
        self.primary.flush(&self.index_path)?;

        Ok(())
    }

    /// Immutable snapshot for worker-side index rebuilds.
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            log_path: self.log_path.clone(),
            primary: self.primary.clone(),
        }
    }
}

/// Owned, immutable view of the log handed to rebuild workers.
///
/// Carries a clone of the primary index and the log path; fetches go
/// through their own read handle, so no state is shared with the parent.
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    log_path: PathBuf,
    primary: PrimaryIndex,
}

impl LogSnapshot {
    /// All live ids at snapshot time, sorted
    pub fn live_ids(&self) -> Vec<String> {
        self.primary.live_ids()
    }

    /// Fetches the record an id pointed at when the snapshot was taken
    pub fn fetch(&self, id: &str) -> StorageResult<Option<Value>> {
        let entry = match self.primary.get(id) {
            Some(e) if !e.is_tombstone() => e,
            _ => return Ok(None),
        };
        read_record_at(&self.log_path, entry.offset, entry.length)
    }
}

/// Positioned read of one log line. Short reads and parse failures yield
/// `None`; the primary index may momentarily outrun a truncated log.
fn read_record_at(log_path: &Path, offset: u64, length: u64) -> StorageResult<Option<Value>> {
    let mut file = File::open(log_path).map_err(|e| StorageError::io(log_path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StorageError::io(log_path, e))?;

    let mut buf = vec![0u8; length as usize];
    match file.read_exact(&mut buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(StorageError::io(log_path, e)),
    }

    let text = match std::str::from_utf8(&buf) {
        Ok(t) => t,
        Err(_) => return Ok(None),
    };

    Ok(serde_json::from_str(text.trim_end_matches('\n')).ok())
}
