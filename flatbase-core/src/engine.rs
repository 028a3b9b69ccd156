// src/engine.rs
//! Query engine facade
//!
//! ```text
//! QueryEngine<S: CollectionStore>
//!   ├── evaluate_filter     predicate tree -> lazy documents
//!   ├── run_pipeline        AggregateRequest -> documents
//!   └── apply_map_operator  MapOperator x Document -> Document
//! ```
//!
//! Store calls are made while a step is applied, so store failures come
//! back as `Err` from these methods. Per-document work runs only when the
//! result is pulled.

use std::sync::Arc;

use crate::aggregation::{self, AggregateRequest, AggregationStep, JoinIndex};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::Result;
use crate::map::{self, MapOperator};
use crate::query::filter::filter_stage;
use crate::query::PredicateTree;
use crate::store::CollectionStore;
use crate::stream::{deferred, DocumentIter, DocumentStream};
use crate::{log_debug, log_trace};

/// Stateless evaluator over a shared collection store
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use flatbase_core::{Document, MemoryStore, QueryEngine};
/// use flatbase_core::query::{FieldOperatorType, PredicateTree};
///
/// let store = Arc::new(MemoryStore::new());
/// store.insert("db", "people", Document::new().with("_id", "1").with("age", 25)).unwrap();
/// store.insert("db", "people", Document::new().with("_id", "2").with("age", 30)).unwrap();
///
/// let engine = QueryEngine::new(store);
/// let tree = PredicateTree::field("age", FieldOperatorType::Equals, 25);
/// let hits: Vec<Document> = engine.evaluate_filter(&tree, "db", "people").unwrap().collect();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].id(), Some("1"));
/// ```
pub struct QueryEngine<S: CollectionStore> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: CollectionStore> QueryEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        QueryEngine { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Documents of `database.collection` matching `tree`
    pub fn evaluate_filter<'a>(
        &'a self,
        tree: &'a PredicateTree,
        database: &str,
        collection: &str,
    ) -> Result<DocumentIter<'a>> {
        let stream = filter_stage(
            self.store.as_ref(),
            &self.config,
            tree,
            DocumentStream::Unseeded,
            database,
            collection,
        )?;
        Ok(stream.into_upstream().unwrap_or_else(|| Box::new(std::iter::empty())))
    }

    /// Run every step of `request` and collect the result.
    /// A request without steps yields no documents.
    pub fn run_pipeline(&self, request: &AggregateRequest) -> Result<Vec<Document>> {
        request.validate()?;
        let mut stream = DocumentStream::Unseeded;
        for (position, step) in request.steps.iter().enumerate() {
            log_trace!(
                "step {}/{} {} on {}.{} ({:?})",
                position + 1,
                request.steps.len(),
                step.name(),
                request.database,
                request.collection,
                stream
            );
            stream = self.apply_step(step, stream, &request.database, &request.collection)?;
        }
        Ok(stream.into_documents())
    }

    /// Apply one map operator to a copy of `document`
    pub fn apply_map_operator(&self, operator: &MapOperator, document: &Document) -> Document {
        map::apply_map_operator(operator, document, &self.config)
    }

    fn apply_step<'a>(
        &'a self,
        step: &'a AggregationStep,
        stream: DocumentStream<'a>,
        database: &str,
        collection: &str,
    ) -> Result<DocumentStream<'a>> {
        let next = match step {
            AggregationStep::Filter { predicate } => {
                return filter_stage(self.store.as_ref(), &self.config, predicate, stream, database, collection);
            }
            AggregationStep::Map { operators } => {
                let config = &self.config;
                let upstream = self.seed_iter(stream, database, collection)?;
                DocumentStream::derived(upstream.map(move |doc| {
                    operators
                        .iter()
                        .fold(doc, |doc, operator| map::apply_owned(operator, doc, config))
                }))
            }
            AggregationStep::GroupBy { field } => {
                let upstream = self.seed_iter(stream, database, collection)?;
                DocumentStream::Derived(deferred(move || aggregation::group_by(upstream, field)))
            }
            AggregationStep::Join {
                collection: remote,
                local_field,
                remote_field,
                as_field,
            } => {
                let upstream = self.seed_iter(stream, database, collection)?;
                let snapshot = self.store.whole_collection(database, remote)?;
                let index = JoinIndex::build(snapshot, local_field, remote_field, as_field);
                log_debug!("join {}.{} on {}: {} remote keys", database, remote, remote_field, index.len());
                DocumentStream::derived(upstream.map(move |doc| index.attach(doc)))
            }
            AggregationStep::Count => match stream.into_upstream() {
                Some(upstream) => DocumentStream::Derived(deferred(move || {
                    vec![aggregation::count_document(upstream.count() as u64)]
                })),
                None => {
                    let count = self.store.entry_count(database, collection)?;
                    log_debug!("count of {}.{} from entry counter: {}", database, collection, count);
                    DocumentStream::derived(std::iter::once(aggregation::count_document(count)))
                }
            },
            AggregationStep::Distinct { field } => {
                let upstream = self.seed_iter(stream, database, collection)?;
                DocumentStream::Derived(aggregation::distinct(upstream, field.clone()))
            }
            AggregationStep::Limit { count } => {
                let count = *count;
                self.seed(stream, database, collection)?
                    .reshape(|upstream| Box::new(upstream.take(count)))
            }
            AggregationStep::Skip { count } => {
                let count = *count;
                self.seed(stream, database, collection)?
                    .reshape(|upstream| Box::new(upstream.skip(count)))
            }
            AggregationStep::Sort { field, ascending } => {
                let ascending = *ascending;
                self.seed(stream, database, collection)?.reshape(|upstream| {
                    deferred(move || aggregation::sort(upstream.collect(), field, ascending))
                })
            }
        };
        Ok(next)
    }

    /// The stream itself once seeded, otherwise the whole collection as
    /// stored rows
    fn seed<'a>(&self, stream: DocumentStream<'a>, database: &str, collection: &str) -> Result<DocumentStream<'a>> {
        if stream.is_seeded() {
            return Ok(stream);
        }
        Ok(DocumentStream::Stored(self.seed_iter(stream, database, collection)?))
    }

    /// The upstream iterator, reading the whole collection if nothing has
    /// seeded the stream yet
    fn seed_iter<'a>(&self, stream: DocumentStream<'a>, database: &str, collection: &str) -> Result<DocumentIter<'a>> {
        match stream.into_upstream() {
            Some(iter) => Ok(iter),
            None => {
                let snapshot = self.store.whole_collection(database, collection)?;
                log_debug!("seeding from {}.{} ({} documents)", database, collection, snapshot.len());
                Ok(Box::new(snapshot.into_values()))
            }
        }
    }
}
