//! Store façade
//!
//! The public surface: [`Store`] owns per-collection handles; a
//! [`CollectionRef`] routes writes through the record log and index
//! manager and queries through the planner and executor; a
//! [`DocumentRef`] addresses one id. Mutations fan out through the
//! change notification hub.

mod collection;
mod document;
mod errors;
mod ids;
mod snapshot;
#[allow(clippy::module_inception)]
mod store;

pub use collection::{CollectionRef, QuerySubscription};
pub use document::{DocumentRef, DocumentSubscription};
pub use errors::{StoreError, StoreResult};
pub use ids::{generate_document_id, DOCUMENT_ID_LEN};
pub use snapshot::{DocumentSnapshot, QuerySnapshot};
pub use store::Store;
