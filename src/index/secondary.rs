//! Ordered secondary index
//!
//! An ordered list of canonical keys with a posting list of document ids
//! per key. Keys compare by code-point lexicographic order on their
//! encoded form; posting lists keep insertion order.
//!
//! Persistence is a single JSON artifact `{keys: [...], postings: {...}}`
//! written by the index manager; this structure is purely in-memory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default cap on range-scan results
pub const DEFAULT_RANGE_LIMIT: usize = 1000;

/// In-memory ordered key → posting-list index.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SecondaryIndex {
    /// Canonical keys in lexicographic order
    keys: Vec<String>,
    /// Posting list per key, insertion-ordered
    postings: HashMap<String, Vec<String>>,
}

impl SecondaryIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `id` under `key`. Inserting an already-linked pair is a no-op.
    pub fn add(&mut self, key: &str, id: &str) {
        if let Err(pos) = self.keys.binary_search_by(|k| k.as_str().cmp(key)) {
            self.keys.insert(pos, key.to_string());
        }
        let ids = self.postings.entry(key.to_string()).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    /// Unlinks `id` from `key`; drops the key once its posting list empties.
    pub fn remove(&mut self, key: &str, id: &str) {
        let Some(ids) = self.postings.get_mut(key) else {
            return;
        };
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            self.postings.remove(key);
            if let Ok(pos) = self.keys.binary_search_by(|k| k.as_str().cmp(key)) {
                self.keys.remove(pos);
            }
        }
    }

    /// Posting list for an exact key (empty if absent)
    pub fn get_exact(&self, key: &str) -> Vec<String> {
        self.postings.get(key).cloned().unwrap_or_default()
    }

    /// Ids whose keys fall between the bounds, concatenated in key order
    /// and truncated to `limit`. `None` bounds are open-ended.
    pub fn get_range(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        start_inclusive: bool,
        end_inclusive: bool,
        limit: usize,
    ) -> Vec<String> {
        let lo = match start {
            Some(bound) => match self.keys.binary_search_by(|k| k.as_str().cmp(bound)) {
                Ok(pos) => {
                    if start_inclusive {
                        pos
                    } else {
                        pos + 1
                    }
                }
                Err(pos) => pos,
            },
            None => 0,
        };
        let hi = match end {
            Some(bound) => match self.keys.binary_search_by(|k| k.as_str().cmp(bound)) {
                Ok(pos) => {
                    if end_inclusive {
                        pos + 1
                    } else {
                        pos
                    }
                }
                Err(pos) => pos,
            },
            None => self.keys.len(),
        };

        let mut result = Vec::new();
        if lo >= hi {
            return result;
        }
        for key in &self.keys[lo..hi] {
            if let Some(ids) = self.postings.get(key) {
                for id in ids {
                    if result.len() >= limit {
                        return result;
                    }
                    result.push(id.clone());
                }
            }
        }
        result
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Total number of postings
    pub fn posting_count(&self) -> usize {
        self.postings.values().map(|ids| ids.len()).sum()
    }

    /// Returns whether the index holds no postings
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
