//! Change notification hub
//!
//! One broadcast channel of void "something changed" events per
//! collection, plus one broadcast channel of document snapshots per
//! subscribed document id. Channels are bounded rings: a slow subscriber
//! lags and drops events, writers never block and never fail because
//! notification failed.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use super::errors::{RealtimeError, RealtimeResult};
use crate::store::DocumentSnapshot;

/// Per-collection fan-out of collection and document events.
#[derive(Debug)]
pub struct ChangeHub {
    collection_tx: broadcast::Sender<()>,
    doc_channels: RwLock<HashMap<String, broadcast::Sender<DocumentSnapshot>>>,
    capacity: usize,
}

impl ChangeHub {
    /// Creates a hub whose channels buffer `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (collection_tx, _) = broadcast::channel(capacity);
        Self {
            collection_tx,
            doc_channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribes to collection-level change events
    pub fn subscribe_collection(&self) -> broadcast::Receiver<()> {
        self.collection_tx.subscribe()
    }

    /// Publishes a collection-level change event.
    ///
    /// Send failures mean "no subscribers" and are ignored.
    pub fn publish_collection(&self) {
        let _ = self.collection_tx.send(());
    }

    /// Subscribes to snapshots of one document.
    ///
    /// The first subscriber on a document channel receives `initial`
    /// immediately; later subscribers only see subsequent mutations.
    pub fn subscribe_document(
        &self,
        id: &str,
        initial: Option<DocumentSnapshot>,
    ) -> RealtimeResult<broadcast::Receiver<DocumentSnapshot>> {
        let mut channels = self
            .doc_channels
            .write()
            .map_err(|_| RealtimeError::Internal("lock poisoned".into()))?;

        let tx = channels
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        let first_subscriber = tx.receiver_count() == 0;
        let rx = tx.subscribe();
        if first_subscriber {
            if let Some(snapshot) = initial {
                let _ = tx.send(snapshot);
            }
        }
        Ok(rx)
    }

    /// Returns whether anyone is subscribed to a document's channel
    pub fn has_document_subscribers(&self, id: &str) -> bool {
        self.doc_channels
            .read()
            .map(|channels| {
                channels
                    .get(id)
                    .map(|tx| tx.receiver_count() > 0)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Pushes a snapshot to a document's subscribers, if any
    pub fn publish_document(&self, id: &str, snapshot: DocumentSnapshot) {
        if let Ok(channels) = self.doc_channels.read() {
            if let Some(tx) = channels.get(id) {
                if tx.receiver_count() > 0 {
                    let _ = tx.send(snapshot);
                }
            }
        }
    }
}
