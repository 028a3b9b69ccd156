// flatbase-core/src/lib.rs
// Query and aggregation engine over flat-file document collections

pub mod aggregation;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod logging;
pub mod map;
pub mod query;
pub mod store;
pub mod stream;
pub mod value;

// Public exports
pub use aggregation::{AggregateRequest, AggregationStep};
pub use config::EngineConfig;
pub use document::{Document, ID_FIELD};
pub use engine::QueryEngine;
pub use error::{FlatbaseError, Result};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use map::{ArrayOperation, CastTarget, MapOperator, MidOperator, SingleOperation};
pub use query::{ConjunctionOperator, ConjunctionType, FieldOperator, FieldOperatorType, PredicateTree};
pub use store::{CollectionStore, KeySet, MemoryStore};
pub use stream::{DocumentIter, DocumentStream};
pub use value::Value;
