//! Document handle
//!
//! Read, write, delete, and live-snapshot operations for one document id.

use tokio::sync::broadcast;

use super::collection::{CollectionRef, WriteOp};
use super::errors::{StoreError, StoreResult};
use super::snapshot::DocumentSnapshot;

/// Handle to one document of a collection.
#[derive(Clone)]
pub struct DocumentRef {
    collection: CollectionRef,
    id: String,
}

impl DocumentRef {
    pub(crate) fn new(collection: CollectionRef, id: String) -> Self {
        Self { collection, id }
    }

    /// Document id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reads the current state of the document.
    pub async fn get(&self) -> StoreResult<DocumentSnapshot> {
        self.collection.load_snapshot(&self.id).await
    }

    /// Writes the document.
    ///
    /// With `merge: false` the record fully replaces any current content
    /// (the id is preserved). With `merge: true` the supplied fields are
    /// overlaid onto the current record; untouched fields survive.
    pub async fn set(&self, data: serde_json::Value, merge: bool) -> StoreResult<()> {
        let map = match data {
            serde_json::Value::Object(map) => map,
            _ => return Err(StoreError::invalid_document("expected a JSON object")),
        };
        let op = if merge {
            WriteOp::Merge(map)
        } else {
            WriteOp::Replace(map)
        };
        self.collection.apply_write(&self.id, op).await
    }

    /// Merge-writes onto an existing document; errors with `NotFound`
    /// when the document is absent or deleted.
    pub async fn update(&self, data: serde_json::Value) -> StoreResult<()> {
        let map = match data {
            serde_json::Value::Object(map) => map,
            _ => return Err(StoreError::invalid_document("expected a JSON object")),
        };
        self.collection.apply_write(&self.id, WriteOp::Update(map)).await
    }

    /// Deletes the document. Deleting an absent document is a no-op.
    pub async fn delete(&self) -> StoreResult<()> {
        self.collection.apply_write(&self.id, WriteOp::Delete).await
    }

    /// Live snapshots of this document: the current state on subscribe,
    /// then one snapshot per committed mutation, in commit order.
    pub async fn snapshots(&self) -> StoreResult<DocumentSubscription> {
        let rx = self.collection.subscribe_document(&self.id).await?;
        Ok(DocumentSubscription { rx })
    }
}

/// Live handle to a document snapshot stream.
pub struct DocumentSubscription {
    rx: broadcast::Receiver<DocumentSnapshot>,
}

impl DocumentSubscription {
    /// Next snapshot; `None` once the stream has closed. A lagged
    /// subscriber skips dropped snapshots and resumes with the newest.
    pub async fn recv(&mut self) -> Option<DocumentSnapshot> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::StoreConfig;
    use crate::store::collection::CollectionRef;
    use crate::store::errors::StoreError;
    use serde_json::json;
    use tempfile::TempDir;

    async fn collection(tmp: &TempDir) -> CollectionRef {
        CollectionRef::open(tmp.path().join("users"), "users", &StoreConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        let doc = users.doc("u1");
        doc.set(json!({"name": "Bob", "age": 20}), false).await.unwrap();

        let snap = doc.get().await.unwrap();
        assert_eq!(snap.get_field("name"), Some(&json!("Bob")));
        assert_eq!(snap.get_field("id"), Some(&json!("u1")));
    }

    #[tokio::test]
    async fn test_set_merge_preserves_untouched_fields() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        let doc = users.doc("u1");
        doc.set(json!({"name": "Bob", "age": 20}), false).await.unwrap();
        doc.set(json!({"age": 21}), true).await.unwrap();

        let snap = doc.get().await.unwrap();
        assert_eq!(snap.get_field("name"), Some(&json!("Bob")));
        assert_eq!(snap.get_field("age"), Some(&json!(21)));
    }

    #[tokio::test]
    async fn test_set_replace_drops_old_fields() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        let doc = users.doc("u1");
        doc.set(json!({"name": "Bob", "age": 20}), false).await.unwrap();
        doc.set(json!({"age": 21}), false).await.unwrap();

        let snap = doc.get().await.unwrap();
        assert_eq!(snap.get_field("name"), None);
        assert_eq!(snap.get_field("age"), Some(&json!(21)));
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        let result = users.doc("ghost").update(json!({"n": 1})).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_then_set_resurrects() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        let doc = users.doc("u1");
        doc.set(json!({"n": 1}), false).await.unwrap();
        doc.delete().await.unwrap();
        assert!(!doc.get().await.unwrap().exists());

        doc.set(json!({"n": 2}), false).await.unwrap();
        let snap = doc.get().await.unwrap();
        assert!(snap.exists());
        assert_eq!(snap.get_field("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        users.doc("ghost").delete().await.unwrap();
        assert_eq!(users.count().await, 0);
    }

    #[tokio::test]
    async fn test_snapshots_initial_then_updates() {
        let tmp = TempDir::new().unwrap();
        let users = collection(&tmp).await;

        let doc = users.doc("u1");
        doc.set(json!({"n": 1}), false).await.unwrap();

        let mut sub = doc.snapshots().await.unwrap();
        let initial = sub.recv().await.unwrap();
        assert_eq!(initial.get_field("n"), Some(&json!(1)));

        doc.set(json!({"n": 2}), true).await.unwrap();
        let next = sub.recv().await.unwrap();
        assert_eq!(next.get_field("n"), Some(&json!(2)));

        doc.delete().await.unwrap();
        let gone = sub.recv().await.unwrap();
        assert!(!gone.exists());
    }
}
