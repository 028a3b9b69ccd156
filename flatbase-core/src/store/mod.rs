// src/store/mod.rs
//! Collection store abstraction
//!
//! The query engine never touches files or locks itself; it pulls documents
//! through [`CollectionStore`]:
//!
//! ```text
//! CollectionStore (trait)
//!   ├── whole_collection   full snapshot, primary key -> document
//!   ├── indexed_lookup     Some(keys) if `field` is indexed, None otherwise
//!   ├── entry_count        maintained counter (COUNT fast path)
//!   └── documents_by_keys  seed a stream from an index hit
//!
//! MemoryStore (RwLock'd maps + FieldIndex per indexed field)
//!   └── flat_file: open_dir / persist_dir (<root>/<db>/<collection>.json)
//! ```

pub mod flat_file;
pub mod index;
pub mod memory;

use std::collections::BTreeMap;

use crate::document::Document;
use crate::error::Result;
use crate::query::FieldOperatorType;
use crate::value::Value;

pub use index::{FieldIndex, IndexKey};
pub use memory::MemoryStore;

/// Set of primary keys produced by index lookups and set algebra
pub type KeySet = ahash::AHashSet<String>;

/// Snapshot of a collection keyed by primary key
pub type CollectionSnapshot = BTreeMap<String, Document>;

/// Storage-side collaborator of the query engine
///
/// Implementations own all locking and consistency concerns; every method
/// hands out owned data so the engine never holds a borrow into the store.
pub trait CollectionStore: Send + Sync {
    /// Full snapshot of a collection
    fn whole_collection(&self, database: &str, collection: &str) -> Result<CollectionSnapshot>;

    /// Primary keys of documents satisfying `field <operator> value`.
    ///
    /// Returns `Ok(None)` when `field` has no index; `Ok(Some(empty))` means
    /// the index was consulted and nothing matched.
    fn indexed_lookup(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        operator: FieldOperatorType,
        value: &Value,
    ) -> Result<Option<KeySet>>;

    /// Number of live documents in a collection
    fn entry_count(&self, database: &str, collection: &str) -> Result<u64>;

    /// Documents for the given keys, in primary-key order.
    /// Keys without a document are skipped.
    fn documents_by_keys(
        &self,
        database: &str,
        collection: &str,
        keys: &KeySet,
    ) -> Result<Vec<Document>> {
        Ok(self
            .whole_collection(database, collection)?
            .into_iter()
            .filter(|(id, _)| keys.contains(id))
            .map(|(_, doc)| doc)
            .collect())
    }
}
