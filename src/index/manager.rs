//! Index manager
//!
//! Owns the named index definitions of one collection and a lazy cache
//! of loaded [`SecondaryIndex`] instances. Loading prefers the on-disk
//! artifact; a missing or corrupt artifact triggers a rebuild from the
//! record log, optionally on a dedicated blocking worker that receives
//! an immutable snapshot and returns the finished index.
//!
//! Incremental maintenance consumes the previous-value hints the façade
//! stores in the primary index, so an update unlinks the old posting
//! without re-reading the old record.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::canonical::{canonical_value, key_for_document, IndexMeta};
use super::errors::{IndexError, IndexResult};
use super::secondary::SecondaryIndex;
use crate::storage::{LogSnapshot, StorageError};

/// Per-collection registry of index definitions and loaded indexes.
pub struct IndexManager {
    dir: PathBuf,
    metas: HashMap<String, IndexMeta>,
    loaded: HashMap<String, SecondaryIndex>,
}

impl IndexManager {
    /// Creates a manager rooted at the collection directory
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            metas: HashMap::new(),
            loaded: HashMap::new(),
        }
    }

    /// Registered definitions, sorted by name for deterministic traversal
    pub fn registered_metas(&self) -> Vec<IndexMeta> {
        let mut metas: Vec<IndexMeta> = self.metas.values().cloned().collect();
        metas.sort_by_key(|m| m.name());
        metas
    }

    /// Names of currently loaded indexes, sorted
    pub fn loaded_index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.keys().cloned().collect();
        names.sort();
        names
    }

    /// Loaded index by name
    pub fn loaded_index(&self, name: &str) -> Option<&SecondaryIndex> {
        self.loaded.get(name)
    }

    /// Registered single-field definition covering `field`, if any
    pub fn single_field_meta(&self, field: &str) -> Option<IndexMeta> {
        self.metas
            .get(field)
            .filter(|m| !m.is_composite())
            .cloned()
    }

    /// First registered composite definition whose every field appears in
    /// `clause_fields` (candidates considered in name order)
    pub fn composite_match(&self, clause_fields: &[&str]) -> Option<IndexMeta> {
        self.registered_metas()
            .into_iter()
            .filter(|m| m.is_composite())
            .find(|m| {
                m.fields
                    .iter()
                    .all(|f| clause_fields.contains(&f.as_str()))
            })
    }

    /// Registers `meta` and makes its index available in the loaded cache.
    ///
    /// Load order: already loaded → on-disk artifact → rebuild from the
    /// snapshot. With `use_worker`, the rebuild runs on a blocking worker
    /// owning the snapshot; the parent swaps the result into the cache and
    /// persists it atomically.
    pub async fn ensure_index(
        &mut self,
        meta: IndexMeta,
        snapshot: LogSnapshot,
        use_worker: bool,
    ) -> IndexResult<()> {
        let name = meta.name();
        self.metas.insert(name.clone(), meta.clone());

        if self.loaded.contains_key(&name) {
            return Ok(());
        }

        let path = self.dir.join(meta.file_name());
        match load_index_file(&path)? {
            Some(index) => {
                debug!(index = %name, path = %path.display(), "loaded index from disk");
                self.loaded.insert(name, index);
                return Ok(());
            }
            None => {
                if path.exists() {
                    warn!(index = %name, path = %path.display(), "index file corrupt, rebuilding");
                }
            }
        }

        let built = if use_worker {
            let worker_meta = meta.clone();
            tokio::task::spawn_blocking(move || build_index(&worker_meta, &snapshot))
                .await
                .map_err(|e| IndexError::Worker(e.to_string()))??
        } else {
            build_index(&meta, &snapshot)?
        };

        info!(
            index = %name,
            keys = built.key_count(),
            postings = built.posting_count(),
            "index rebuilt"
        );
        persist_index(&path, &built)?;
        self.loaded.insert(name, built);
        Ok(())
    }

    /// Applies one document mutation to every loaded index.
    ///
    /// `prev` is the indexed-value hint captured at the document's last
    /// write; `new` is the document state after this write (`None` for a
    /// delete). Composite unlink uses the old composite key built from
    /// `prev` with empty-string substitution, mirroring the add rule, so
    /// a partially indexed `prev` cannot strand a posting. Touched index
    /// files are persisted atomically.
    pub fn apply_update(
        &mut self,
        id: &str,
        prev: Option<&Map<String, Value>>,
        new: Option<&Map<String, Value>>,
    ) -> IndexResult<()> {
        let mut names: Vec<String> = self.loaded.keys().cloned().collect();
        names.sort();

        for name in names {
            let Some(meta) = self.metas.get(&name).cloned() else {
                continue;
            };
            let Some(index) = self.loaded.get_mut(&name) else {
                continue;
            };
            let mut changed = false;

            if !meta.is_composite() {
                let field = &meta.fields[0];
                let key_type = meta.key_types[0];
                if let Some(old_value) = prev.and_then(|p| p.get(field)) {
                    index.remove(&canonical_value(old_value, key_type)?, id);
                    changed = true;
                }
                if let Some(new_value) = new.and_then(|n| n.get(field)) {
                    index.add(&canonical_value(new_value, key_type)?, id);
                    changed = true;
                }
            } else {
                if let Some(p) = prev {
                    if let Some(old_key) = key_for_document(p, &meta)? {
                        index.remove(&old_key, id);
                        changed = true;
                    }
                }
                if let Some(n) = new {
                    if let Some(new_key) = key_for_document(n, &meta)? {
                        index.add(&new_key, id);
                        changed = true;
                    }
                }
            }

            if changed {
                let path = self.dir.join(meta.file_name());
                persist_index(&path, index)?;
            }
        }

        Ok(())
    }

    /// Collects the values of every loaded-index field present in `doc`,
    /// to be stored as the primary entry's previous-value hint.
    pub fn indexed_values(&self, doc: &Map<String, Value>) -> Option<Map<String, Value>> {
        let mut values = Map::new();
        for name in self.loaded.keys() {
            let Some(meta) = self.metas.get(name) else {
                continue;
            };
            for field in &meta.fields {
                if let Some(value) = doc.get(field) {
                    values.insert(field.clone(), value.clone());
                }
            }
        }
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }
}

/// Reads an index artifact. `Ok(None)` covers both a missing file and a
/// corrupt one; the caller decides whether that means rebuild.
fn load_index_file(path: &Path) -> IndexResult<Option<SecondaryIndex>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e).into()),
    };
    Ok(serde_json::from_slice(&bytes).ok())
}

/// Builds a fresh index by scanning the snapshot's live records.
fn build_index(meta: &IndexMeta, snapshot: &LogSnapshot) -> IndexResult<SecondaryIndex> {
    let mut index = SecondaryIndex::new();
    for id in snapshot.live_ids() {
        let Some(record) = snapshot.fetch(&id)? else {
            continue;
        };
        let Some(doc) = record.as_object() else {
            continue;
        };
        if let Some(key) = key_for_document(doc, meta)? {
            index.add(&key, &id);
        }
    }
    Ok(index)
}

/// Atomic write of an index artifact (tmp + rename).
fn persist_index(path: &Path, index: &SecondaryIndex) -> IndexResult<()> {
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec(index).map_err(|e| IndexError::corrupt(path, e.to_string()))?;
    fs::write(&tmp_path, bytes).map_err(|e| StorageError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}
