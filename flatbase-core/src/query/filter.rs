// src/query/filter.rs
//! Filter stage: index-or-scan resolution of a predicate tree
//!
//! Resolution happens in two phases:
//!
//! 1. [`resolve`] walks the tree once and asks the store for an index hit on
//!    every leaf. Store errors surface here, before any stream is built.
//! 2. The resolved tree is evaluated either as key-set algebra (no upstream
//!    stream) or document by document against the upstream stream.
//!
//! ```text
//! leaf, index present    -> Indexed(keys)   seed by keys / keep upstream docs whose _id is in keys
//! leaf, no index         -> Scan            predicate::test per document
//! conjunction            -> Conjunction     conjunction::combine over child key sets
//! ```

use super::conjunction;
use super::{ConjunctionType, FieldOperator, PredicateTree};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::Result;
use crate::store::{CollectionSnapshot, CollectionStore, KeySet};
use crate::stream::{deferred, DocumentStream};
use crate::{log_debug, log_trace};

/// Predicate tree with index lookups already performed
#[derive(Debug)]
pub enum Resolved<'t> {
    Indexed(&'t FieldOperator, KeySet),
    Scan(&'t FieldOperator),
    Conjunction(ConjunctionType, Vec<Resolved<'t>>),
}

/// Ask the store for an index hit on every leaf of `tree`
pub fn resolve<'t, S>(
    store: &S,
    config: &EngineConfig,
    database: &str,
    collection: &str,
    tree: &'t PredicateTree,
) -> Result<Resolved<'t>>
where
    S: CollectionStore + ?Sized,
{
    match tree {
        PredicateTree::Field(op) => {
            if !config.use_indexes {
                return Ok(Resolved::Scan(op));
            }
            match store.indexed_lookup(database, collection, &op.field, op.operator_type, &op.value)? {
                Some(keys) => {
                    log_debug!(
                        "index hit on {}.{}.{} ({:?}): {} keys",
                        database,
                        collection,
                        op.field,
                        op.operator_type,
                        keys.len()
                    );
                    Ok(Resolved::Indexed(op, keys))
                }
                None => {
                    log_debug!("no index on {}.{}.{}, scanning", database, collection, op.field);
                    Ok(Resolved::Scan(op))
                }
            }
        }
        PredicateTree::Conjunction(node) => {
            let children = node
                .operators
                .iter()
                .map(|child| resolve(store, config, database, collection, child))
                .collect::<Result<Vec<_>>>()?;
            Ok(Resolved::Conjunction(node.conjunction_type, children))
        }
    }
}

impl<'t> Resolved<'t> {
    /// True when the result cannot be computed from index keys alone
    pub fn needs_universe(&self) -> bool {
        match self {
            Resolved::Indexed(..) => false,
            Resolved::Scan(_) => true,
            Resolved::Conjunction(ConjunctionType::Nor | ConjunctionType::Nand, _) => true,
            Resolved::Conjunction(_, children) => children.iter().any(Resolved::needs_universe),
        }
    }

    /// Primary keys selected from `snapshot`, whose keys form `universe`.
    ///
    /// Trees that do not need a universe may pass an empty snapshot.
    pub fn select(&self, snapshot: &CollectionSnapshot, universe: &KeySet) -> KeySet {
        match self {
            Resolved::Indexed(_, keys) => keys.clone(),
            Resolved::Scan(op) => snapshot
                .iter()
                .filter(|(_, doc)| op.matches(doc))
                .map(|(id, _)| id.clone())
                .collect(),
            Resolved::Conjunction(kind, children) => {
                let sets = children.iter().map(|child| child.select(snapshot, universe)).collect();
                conjunction::combine(*kind, sets, universe)
            }
        }
    }

    /// Does `document` survive the filter?
    ///
    /// Index hits are checked by primary key; documents without one fall
    /// back to evaluating the leaf itself.
    pub fn admits(&self, document: &Document) -> bool {
        match self {
            Resolved::Indexed(op, keys) => match document.id() {
                Some(id) => keys.contains(id),
                None => op.matches(document),
            },
            Resolved::Scan(op) => op.matches(document),
            Resolved::Conjunction(kind, children) => {
                conjunction::truth(*kind, children.len(), children.iter().map(|child| child.admits(document)))
            }
        }
    }
}

/// Apply a filter step to `stream`
///
/// Unseeded streams are seeded from the index hit when the tree resolves
/// purely through indexes, otherwise from a whole-collection read. Stored
/// streams are filtered lazily, trusting index hits by primary key.
/// Derived streams no longer match the index, so every document is tested
/// against the tree itself.
pub fn filter_stage<'a, S>(
    store: &S,
    config: &EngineConfig,
    tree: &'a PredicateTree,
    stream: DocumentStream<'a>,
    database: &str,
    collection: &str,
) -> Result<DocumentStream<'a>>
where
    S: CollectionStore + ?Sized,
{
    match stream {
        DocumentStream::Stored(upstream) => {
            let resolved = resolve(store, config, database, collection, tree)?;
            log_trace!("filtering stored rows");
            Ok(DocumentStream::stored(upstream.filter(move |doc| resolved.admits(doc))))
        }
        DocumentStream::Derived(upstream) => {
            log_trace!("filtering derived documents by predicate");
            Ok(DocumentStream::derived(upstream.filter(move |doc| tree.matches(doc))))
        }
        DocumentStream::Unseeded => {
            let resolved = resolve(store, config, database, collection, tree)?;
            seed(store, resolved, database, collection)
        }
    }
}

fn seed<'a, S>(store: &S, resolved: Resolved<'a>, database: &str, collection: &str) -> Result<DocumentStream<'a>>
where
    S: CollectionStore + ?Sized,
{
    match resolved {
        Resolved::Scan(op) => {
            let snapshot = store.whole_collection(database, collection)?;
            Ok(DocumentStream::stored(snapshot.into_values().filter(move |doc| op.matches(doc))))
        }
        resolved if !resolved.needs_universe() => {
            let keys = resolved.select(&CollectionSnapshot::new(), &KeySet::new());
            let documents = store.documents_by_keys(database, collection, &keys)?;
            Ok(DocumentStream::stored(documents.into_iter()))
        }
        resolved => {
            let snapshot = store.whole_collection(database, collection)?;
            Ok(DocumentStream::Stored(deferred(move || {
                let universe: KeySet = snapshot.keys().cloned().collect();
                let keys = resolved.select(&snapshot, &universe);
                snapshot
                    .into_iter()
                    .filter(|(id, _)| keys.contains(id))
                    .map(|(_, doc)| doc)
                    .collect()
            })))
        }
    }
}
