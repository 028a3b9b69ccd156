// src/store/memory.rs
//! In-memory collection store
//!
//! ```text
//! MemoryStore
//!   └── RwLock<BTreeMap<database, BTreeMap<collection, CollectionData>>>
//!         CollectionData
//!           ├── documents: BTreeMap<_id, Document>
//!           ├── indexes:   BTreeMap<field, FieldIndex>
//!           └── entry_count
//! ```
//!
//! Readers get owned snapshots; the lock is never held across a caller's
//! iteration.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use uuid::Uuid;

use super::{CollectionSnapshot, CollectionStore, FieldIndex, KeySet};
use crate::document::{Document, ID_FIELD};
use crate::error::{FlatbaseError, Result};
use crate::query::FieldOperatorType;
use crate::value::Value;
use crate::{log_debug, log_info};

#[derive(Debug, Default, Clone)]
pub(crate) struct CollectionData {
    pub(crate) documents: BTreeMap<String, Document>,
    pub(crate) indexes: BTreeMap<String, FieldIndex>,
    entry_count: u64,
}

impl CollectionData {
    pub(crate) fn add(&mut self, doc: Document) -> Result<String> {
        let id = match doc.get(ID_FIELD) {
            None => Uuid::new_v4().to_string(),
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(FlatbaseError::InvalidDocument(format!(
                    "_id must be a string, got {}",
                    other
                )))
            }
        };

        if self.documents.contains_key(&id) {
            return Err(FlatbaseError::DuplicateKey(id));
        }

        let mut doc = doc;
        doc.set_id(id.clone());
        for index in self.indexes.values_mut() {
            index.insert(&doc);
        }
        self.documents.insert(id.clone(), doc);
        self.entry_count += 1;
        Ok(id)
    }

    fn take(&mut self, id: &str) -> Option<Document> {
        let doc = self.documents.remove(id)?;
        for index in self.indexes.values_mut() {
            index.remove(&doc);
        }
        self.entry_count -= 1;
        Some(doc)
    }

    pub(crate) fn build_index(&mut self, field: &str) {
        let index = FieldIndex::build(field, self.documents.values());
        self.indexes.insert(field.to_string(), index);
    }
}

type Databases = BTreeMap<String, BTreeMap<String, CollectionData>>;

/// Thread-safe in-memory store with per-field indexes
///
/// # Examples
///
/// ```
/// use flatbase_core::{Document, MemoryStore};
/// use flatbase_core::store::CollectionStore;
///
/// let store = MemoryStore::new();
/// let id = store.insert("shop", "users", Document::new().with("name", "Ada")).unwrap();
/// assert_eq!(store.entry_count("shop", "users").unwrap(), 1);
/// assert_eq!(store.get("shop", "users", &id).unwrap().unwrap().get("name").unwrap().as_str(), Some("Ada"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: RwLock<Databases>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_databases(databases: Databases) -> Self {
        MemoryStore {
            databases: RwLock::new(databases),
        }
    }

    pub(crate) fn read_databases<T>(&self, f: impl FnOnce(&Databases) -> T) -> T {
        f(&self.databases.read())
    }

    // ========================================================================
    // CATALOG
    // ========================================================================

    /// Create a database; existing databases are left untouched
    pub fn create_database(&self, database: &str) {
        self.databases.write().entry(database.to_string()).or_default();
    }

    /// Create a collection (and its database) if missing
    pub fn create_collection(&self, database: &str, collection: &str) {
        self.databases
            .write()
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
    }

    /// Drop a collection; returns whether it existed
    pub fn drop_collection(&self, database: &str, collection: &str) -> Result<bool> {
        let mut databases = self.databases.write();
        let collections = databases
            .get_mut(database)
            .ok_or_else(|| FlatbaseError::DatabaseNotFound(database.to_string()))?;
        Ok(collections.remove(collection).is_some())
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.databases.read().keys().cloned().collect()
    }

    pub fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let databases = self.databases.read();
        let collections = databases
            .get(database)
            .ok_or_else(|| FlatbaseError::DatabaseNotFound(database.to_string()))?;
        Ok(collections.keys().cloned().collect())
    }

    // ========================================================================
    // DOCUMENTS
    // ========================================================================

    /// Insert a document, creating the collection on first use.
    /// Returns the document's primary key.
    pub fn insert(&self, database: &str, collection: &str, document: Document) -> Result<String> {
        let mut databases = self.databases.write();
        let data = databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        data.add(document)
    }

    /// Insert several documents; stops at the first failure
    pub fn insert_many<I>(&self, database: &str, collection: &str, documents: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut databases = self.databases.write();
        let data = databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();

        let mut ids = Vec::new();
        for doc in documents {
            ids.push(data.add(doc)?);
        }
        log_debug!("inserted {} documents into {}.{}", ids.len(), database, collection);
        Ok(ids)
    }

    /// Delete by primary key; returns whether a document was removed
    pub fn delete(&self, database: &str, collection: &str, id: &str) -> Result<bool> {
        self.with_collection_mut(database, collection, |data| Ok(data.take(id).is_some()))
    }

    pub fn get(&self, database: &str, collection: &str, id: &str) -> Result<Option<Document>> {
        self.with_collection(database, collection, |data| Ok(data.documents.get(id).cloned()))
    }

    // ========================================================================
    // INDEXES
    // ========================================================================

    /// Index `field`, building entries from the documents already stored.
    /// Re-creating an existing index rebuilds it.
    pub fn create_index(&self, database: &str, collection: &str, field: &str) -> Result<()> {
        if field.is_empty() {
            return Err(FlatbaseError::IndexError("index field must not be empty".to_string()));
        }
        self.with_collection_mut(database, collection, |data| {
            data.build_index(field);
            log_info!(
                "built index on {}.{}.{} over {} documents",
                database,
                collection,
                field,
                data.documents.len()
            );
            Ok(())
        })
    }

    /// Drop the index on `field`; returns whether it existed
    pub fn drop_index(&self, database: &str, collection: &str, field: &str) -> Result<bool> {
        self.with_collection_mut(database, collection, |data| Ok(data.indexes.remove(field).is_some()))
    }

    pub fn list_indexes(&self, database: &str, collection: &str) -> Result<Vec<String>> {
        self.with_collection(database, collection, |data| Ok(data.indexes.keys().cloned().collect()))
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn with_collection<T>(
        &self,
        database: &str,
        collection: &str,
        f: impl FnOnce(&CollectionData) -> Result<T>,
    ) -> Result<T> {
        let databases = self.databases.read();
        let collections = databases
            .get(database)
            .ok_or_else(|| FlatbaseError::DatabaseNotFound(database.to_string()))?;
        let data = collections
            .get(collection)
            .ok_or_else(|| FlatbaseError::CollectionNotFound(format!("{}.{}", database, collection)))?;
        f(data)
    }

    fn with_collection_mut<T>(
        &self,
        database: &str,
        collection: &str,
        f: impl FnOnce(&mut CollectionData) -> Result<T>,
    ) -> Result<T> {
        let mut databases = self.databases.write();
        let collections = databases
            .get_mut(database)
            .ok_or_else(|| FlatbaseError::DatabaseNotFound(database.to_string()))?;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| FlatbaseError::CollectionNotFound(format!("{}.{}", database, collection)))?;
        f(data)
    }
}

impl CollectionStore for MemoryStore {
    fn whole_collection(&self, database: &str, collection: &str) -> Result<CollectionSnapshot> {
        self.with_collection(database, collection, |data| Ok(data.documents.clone()))
    }

    fn indexed_lookup(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        operator: FieldOperatorType,
        value: &Value,
    ) -> Result<Option<KeySet>> {
        self.with_collection(database, collection, |data| {
            Ok(data.indexes.get(field).map(|index| index.lookup(operator, value)))
        })
    }

    fn entry_count(&self, database: &str, collection: &str) -> Result<u64> {
        self.with_collection(database, collection, |data| Ok(data.entry_count))
    }

    fn documents_by_keys(&self, database: &str, collection: &str, keys: &KeySet) -> Result<Vec<Document>> {
        self.with_collection(database, collection, |data| {
            let mut ids: Vec<&String> = keys.iter().collect();
            ids.sort();
            Ok(ids
                .into_iter()
                .filter_map(|id| data.documents.get(id).cloned())
                .collect())
        })
    }
}
