//! Store root
//!
//! Owns the root directory and the per-collection handles. All state
//! lives inside the `Store` value; teardown stops every watcher and
//! drops the notification channels with the handles.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::StoreConfig;

use super::collection::CollectionRef;
use super::errors::StoreResult;
use crate::storage::StorageError;

/// An open document store rooted at one directory.
pub struct Store {
    root: PathBuf,
    config: StoreConfig,
    collections: Mutex<HashMap<String, CollectionRef>>,
}

impl Store {
    /// Opens a store with default configuration.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(root, StoreConfig::default()).await
    }

    /// Opens a store, creating the root directory when missing.
    pub async fn open_with_config(
        root: impl AsRef<Path>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        debug!(root = %root.display(), "store opened");

        Ok(Self {
            root,
            config,
            collections: Mutex::new(HashMap::new()),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle to a collection, opening it on first access.
    pub async fn collection(&self, name: &str) -> StoreResult<CollectionRef> {
        let mut collections = self.collections.lock().await;
        if let Some(collection) = collections.get(name) {
            return Ok(collection.clone());
        }

        let collection = CollectionRef::open(self.root.join(name), name, &self.config)?;
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    /// Stops every collection watcher. Idempotent; open handles keep
    /// working but no further file-watch events are produced.
    pub async fn close(&self) {
        for collection in self.collections.lock().await.values() {
            collection.stop_watcher();
        }
        debug!(root = %self.root.display(), "store closed");
    }
}
