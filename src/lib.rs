//! emberdb - an embedded, file-backed JSON document store
//!
//! Collections are directories holding an append-only NDJSON record log,
//! a persistent primary offset index, and zero or more secondary/composite
//! indexes. The façade exposes a Firestore-style API: collections,
//! documents, queries, and live snapshots.

pub mod config;
pub mod executor;
pub mod index;
pub mod planner;
pub mod realtime;
pub mod storage;
pub mod store;

pub use config::StoreConfig;
pub use index::{IndexMeta, KeyType};
pub use planner::{Op, OrderBy, QueryDescriptor, WhereClause};
pub use store::{
    CollectionRef, DocumentRef, DocumentSnapshot, DocumentSubscription, QuerySnapshot,
    QuerySubscription, Store, StoreError, StoreResult,
};
