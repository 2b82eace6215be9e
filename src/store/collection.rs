//! Collection handle
//!
//! A [`CollectionRef`] is a cheap clone of shared collection state: the
//! record log and index manager behind one async mutex, the notification
//! hub, and the directory watcher. Writes serialize at the log-append
//! step and publish notifications in commit order, before the commit
//! lock is released.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::executor::QueryExecutor;
use crate::index::{IndexManager, IndexMeta};
use crate::planner::{QueryDescriptor, QueryPlanner};
use crate::realtime::{ChangeHub, DirectoryWatcher};
use crate::storage::RecordLog;

use super::document::DocumentRef;
use super::errors::{StoreError, StoreResult};
use super::ids::generate_document_id;
use super::snapshot::{DocumentSnapshot, QuerySnapshot};

/// Mutable collection state guarded by the commit lock.
pub(crate) struct CollectionCore {
    pub(crate) log: RecordLog,
    pub(crate) indexes: IndexManager,
}

struct CollectionShared {
    name: String,
    config: StoreConfig,
    core: Mutex<CollectionCore>,
    hub: Arc<ChangeHub>,
    watcher: DirectoryWatcher,
}

/// One write against a document id
pub(crate) enum WriteOp {
    /// Full replacement record
    Replace(Map<String, Value>),
    /// Overlay onto the current record (creates when absent)
    Merge(Map<String, Value>),
    /// Overlay that requires the document to exist
    Update(Map<String, Value>),
    /// Tombstone; a no-op when the document is already gone
    Delete,
}

/// Handle to one collection of the store.
#[derive(Clone)]
pub struct CollectionRef {
    shared: Arc<CollectionShared>,
}

impl CollectionRef {
    pub(crate) fn open(dir: PathBuf, name: &str, config: &StoreConfig) -> StoreResult<Self> {
        let log = RecordLog::open(&dir)?;
        let indexes = IndexManager::new(&dir);
        let hub = Arc::new(ChangeHub::new(config.broadcast_capacity));
        let watcher = DirectoryWatcher::spawn(
            dir,
            Duration::from_millis(config.watch_poll_interval_ms),
            Arc::clone(&hub),
        );

        Ok(Self {
            shared: Arc::new(CollectionShared {
                name: name.to_string(),
                config: config.clone(),
                core: Mutex::new(CollectionCore { log, indexes }),
                hub,
                watcher,
            }),
        })
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Adds a new document with a generated id, returning the id.
    pub async fn add(&self, data: Value) -> StoreResult<String> {
        let map = into_object(data)?;
        let id = generate_document_id();
        self.apply_write(&id, WriteOp::Replace(map)).await?;
        Ok(id)
    }

    /// Handle to the document with the given id
    pub fn doc(&self, id: impl Into<String>) -> DocumentRef {
        DocumentRef::new(self.clone(), id.into())
    }

    /// Handle to a fresh document with a generated id
    pub fn new_doc(&self) -> DocumentRef {
        DocumentRef::new(self.clone(), generate_document_id())
    }

    /// Runs a query; `None` reads every live document.
    pub async fn get(&self, qd: Option<&QueryDescriptor>) -> StoreResult<QuerySnapshot> {
        let default_qd = QueryDescriptor::new();
        let qd = qd.unwrap_or(&default_qd);

        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;

        let snapshot = core.log.snapshot();
        let planner = QueryPlanner::new(
            self.shared.config.indexed_query_limit,
            self.shared.config.use_worker_for_rebuild,
        );
        let plan = planner.plan(qd, &mut core.indexes, &snapshot).await?;
        let result = QueryExecutor::execute(&plan, qd, &core.log, &core.indexes)?;
        Ok(result)
    }

    /// Live query results: the current result on subscribe, then a fresh
    /// result after every collection event. Dropping the subscription
    /// cancels the underlying collection subscription.
    pub fn snapshots(&self, qd: Option<QueryDescriptor>) -> QuerySubscription {
        let qd = qd.unwrap_or_default();
        let mut events = self.shared.hub.subscribe_collection();
        let (tx, rx) = mpsc::channel(16);
        let collection = self.clone();
        let id = Uuid::new_v4();

        let handle = tokio::spawn(async move {
            debug!(subscription = %id, collection = %collection.name(), "query subscription started");
            loop {
                let result = match collection.get(Some(&qd)).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(subscription = %id, error = %e, "query subscription run failed");
                        break;
                    }
                };
                if tx.send(result).await.is_err() {
                    break;
                }

                loop {
                    match events.recv().await {
                        Ok(()) => break,
                        // A lagged subscriber coalesces missed events
                        // into the next re-run
                        Err(broadcast::error::RecvError::Lagged(_)) => break,
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        QuerySubscription { id, rx, handle }
    }

    /// Registers and loads an index per the store's rebuild policy.
    pub async fn ensure_index(&self, meta: IndexMeta) -> StoreResult<()> {
        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;
        let snapshot = core.log.snapshot();
        core.indexes
            .ensure_index(meta, snapshot, self.shared.config.use_worker_for_rebuild)
            .await?;
        Ok(())
    }

    /// Rebuilds the primary index from the record log.
    pub async fn rebuild_primary_index(&self) -> StoreResult<()> {
        let mut guard = self.shared.core.lock().await;
        guard.log.rebuild_primary_index()?;
        Ok(())
    }

    /// Number of live documents
    pub async fn count(&self) -> usize {
        self.shared.core.lock().await.log.live_count()
    }

    /// Subscribes to collection-level change events
    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.shared.hub.subscribe_collection()
    }

    pub(crate) fn stop_watcher(&self) {
        self.shared.watcher.stop();
    }

    pub(crate) async fn load_snapshot(&self, id: &str) -> StoreResult<DocumentSnapshot> {
        let guard = self.shared.core.lock().await;
        Ok(match guard.log.get_by_id(id)? {
            Some(record) => DocumentSnapshot::new(id, record),
            None => DocumentSnapshot::missing(id),
        })
    }

    pub(crate) async fn subscribe_document(
        &self,
        id: &str,
    ) -> StoreResult<broadcast::Receiver<DocumentSnapshot>> {
        // Hold the commit lock across the initial load and the subscribe
        // so the first pushed snapshot cannot miss a concurrent write
        let guard = self.shared.core.lock().await;
        let initial = match guard.log.get_by_id(id)? {
            Some(record) => DocumentSnapshot::new(id, record),
            None => DocumentSnapshot::missing(id),
        };
        Ok(self.shared.hub.subscribe_document(id, Some(initial))?)
    }

    /// Commits one write: append to the log with the fresh indexed-value
    /// hint, update loaded indexes using the previous hint, then publish
    /// notifications, all in commit order under the collection lock.
    pub(crate) async fn apply_write(&self, id: &str, op: WriteOp) -> StoreResult<()> {
        let mut guard = self.shared.core.lock().await;
        let core = &mut *guard;

        let new_doc: Option<Map<String, Value>> = match op {
            WriteOp::Replace(mut data) => {
                data.insert("id".to_string(), Value::String(id.to_string()));
                Some(data)
            }
            WriteOp::Merge(data) => Some(merge_onto_current(core, id, data)?),
            WriteOp::Update(data) => {
                if !core.log.exists_live(id) {
                    return Err(StoreError::not_found(id));
                }
                Some(merge_onto_current(core, id, data)?)
            }
            WriteOp::Delete => {
                if !core.log.exists_live(id) {
                    return Ok(());
                }
                None
            }
        };

        let record = match &new_doc {
            Some(map) => Value::Object(map.clone()),
            None => {
                let mut tombstone = Map::new();
                tombstone.insert("id".to_string(), Value::String(id.to_string()));
                tombstone.insert("_deleted".to_string(), Value::Bool(true));
                Value::Object(tombstone)
            }
        };

        let old_prev = core.log.primary_entry(id).and_then(|e| e.prev.clone());
        let new_prev = new_doc.as_ref().and_then(|map| core.indexes.indexed_values(map));

        core.log.append_record(&record, new_prev)?;
        core.indexes
            .apply_update(id, old_prev.as_ref(), new_doc.as_ref())?;

        self.shared.hub.publish_collection();
        if self.shared.hub.has_document_subscribers(id) {
            let snapshot = match new_doc {
                Some(map) => DocumentSnapshot::new(id, Value::Object(map)),
                None => DocumentSnapshot::missing(id),
            };
            self.shared.hub.publish_document(id, snapshot);
        }

        Ok(())
    }
}

fn into_object(data: Value) -> StoreResult<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::invalid_document(format!(
            "expected a JSON object, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Overlays `data` onto the current record, preserving untouched fields
/// and the id.
fn merge_onto_current(
    core: &CollectionCore,
    id: &str,
    data: Map<String, Value>,
) -> StoreResult<Map<String, Value>> {
    let mut merged = core
        .log
        .get_by_id(id)?
        .and_then(|record| record.as_object().cloned())
        .unwrap_or_default();
    for (field, value) in data {
        merged.insert(field, value);
    }
    merged.insert("id".to_string(), Value::String(id.to_string()));
    Ok(merged)
}

/// Live handle to a running query subscription.
///
/// Dropping it cancels the background re-run task.
pub struct QuerySubscription {
    id: Uuid,
    rx: mpsc::Receiver<QuerySnapshot>,
    handle: JoinHandle<()>,
}

impl QuerySubscription {
    /// Subscription identity, for diagnostics
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next query result; `None` once the subscription has ended
    pub async fn recv(&mut self) -> Option<QuerySnapshot> {
        self.rx.recv().await
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
