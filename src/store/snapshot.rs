//! Document and query snapshots
//!
//! Immutable views of store state handed to callers and pushed through
//! the notification hub.

use serde_json::Value;

/// Point-in-time view of one document.
///
/// `data` is `None` when the document does not exist (absent or deleted);
/// live data always carries the `id` field.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    id: String,
    data: Option<Value>,
}

impl DocumentSnapshot {
    /// Snapshot of a live document
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }

    /// Snapshot of a missing or deleted document
    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    /// Document id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns whether the document existed at snapshot time
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Document contents, if live
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// One field of the document, if live and present
    pub fn get_field(&self, field: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(field))
    }
}

/// Materialized result of one query run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySnapshot {
    docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    /// Wraps materialized documents
    pub fn new(docs: Vec<DocumentSnapshot>) -> Self {
        Self { docs }
    }

    /// Documents in result order
    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns whether the result is empty
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Iterates over the documents
    pub fn iter(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.docs.iter()
    }
}
