// src/error.rs
use thiserror::Error;

/// Errors surfaced by the store and the query engine.
///
/// Missing fields, missing indexes, kind mismatches and arithmetic edge
/// cases are never reported through this type; they resolve to `false`,
/// `null` or exclusion inside the engine.
#[derive(Error, Debug)]
pub enum FlatbaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Index error: {0}")]
    IndexError(String),
}

impl From<serde_json::Error> for FlatbaseError {
    fn from(err: serde_json::Error) -> Self {
        FlatbaseError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlatbaseError>;
