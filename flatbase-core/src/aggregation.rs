// src/aggregation.rs
// Aggregation pipeline steps and the document-level work behind them

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{FlatbaseError, Result};
use crate::map::MapOperator;
use crate::query::PredicateTree;
use crate::store::CollectionSnapshot;
use crate::stream::DocumentIter;
use crate::value::{compare_values_with_none, Value};

/// Field holding the members of a GROUP_BY bucket
pub const GROUP_FIELD: &str = "group";

/// Field holding the result of COUNT
pub const COUNT_FIELD: &str = "count";

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// One pipeline step
///
/// Decoded from `{"type": "<STEP>", ...}`:
///
/// ```json
/// {"type": "FILTER", "predicate": {"field": "age", "operatorType": "GREATER_THAN", "value": 18}}
/// {"type": "JOIN", "collection": "orders", "localField": "_id", "remoteField": "userId", "asField": "orders"}
/// {"type": "SORT", "field": "age", "ascending": false}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationStep {
    Filter {
        predicate: PredicateTree,
    },
    Map {
        operators: Vec<MapOperator>,
    },
    GroupBy {
        field: String,
    },
    Join {
        collection: String,
        #[serde(rename = "localField")]
        local_field: String,
        #[serde(rename = "remoteField")]
        remote_field: String,
        #[serde(rename = "asField")]
        as_field: String,
    },
    Count,
    Distinct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },
    Limit {
        count: usize,
    },
    Skip {
        count: usize,
    },
    Sort {
        field: String,
        #[serde(default = "default_ascending")]
        ascending: bool,
    },
}

fn default_ascending() -> bool {
    true
}

impl AggregationStep {
    /// Step tag as it appears on the wire, for logging
    pub fn name(&self) -> &'static str {
        match self {
            AggregationStep::Filter { .. } => "FILTER",
            AggregationStep::Map { .. } => "MAP",
            AggregationStep::GroupBy { .. } => "GROUP_BY",
            AggregationStep::Join { .. } => "JOIN",
            AggregationStep::Count => "COUNT",
            AggregationStep::Distinct { .. } => "DISTINCT",
            AggregationStep::Limit { .. } => "LIMIT",
            AggregationStep::Skip { .. } => "SKIP",
            AggregationStep::Sort { .. } => "SORT",
        }
    }
}

/// Ordered steps against one database/collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub database: String,
    pub collection: String,
    #[serde(default)]
    pub steps: Vec<AggregationStep>,
}

impl AggregateRequest {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        AggregateRequest {
            database: database.into(),
            collection: collection.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: AggregationStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let request: AggregateRequest = serde_json::from_value(json.clone())
            .map_err(|e| FlatbaseError::AggregationError(format!("malformed aggregate request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    /// Reject steps whose output would overwrite their own fields.
    ///
    /// A GROUP_BY key stored at or under `group` would collide with the
    /// member array written to [`GROUP_FIELD`].
    pub fn validate(&self) -> Result<()> {
        for (position, step) in self.steps.iter().enumerate() {
            if let AggregationStep::GroupBy { field } = step {
                let head = field.split('.').next().unwrap_or_default();
                if head == GROUP_FIELD {
                    return Err(FlatbaseError::AggregationError(format!(
                        "step {}: GROUP_BY field '{}' collides with the '{}' member field",
                        position + 1,
                        field,
                        GROUP_FIELD
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// STAGES
// ============================================================================

/// Key under which GROUP_BY buckets values: EQUALS-equal values share a
/// bucket, so strings fold case.
fn group_key(value: &Value) -> String {
    match value {
        Value::String(s) => format!("s:{}", s.to_lowercase()),
        other => other.canonical_key(),
    }
}

/// Partition by the value at `field`; documents without it are dropped.
/// Buckets come out in first-seen order.
pub fn group_by<I>(documents: I, field: &str) -> Vec<Document>
where
    I: IntoIterator<Item = Document>,
{
    let mut slots: AHashMap<String, usize> = AHashMap::new();
    let mut buckets: Vec<(Value, Vec<Value>)> = Vec::new();

    for doc in documents {
        let Some(value) = doc.get(field) else { continue };
        let key = group_key(value);
        let slot = match slots.get(&key) {
            Some(slot) => *slot,
            None => {
                slots.insert(key, buckets.len());
                buckets.push((value.clone(), Vec::new()));
                buckets.len() - 1
            }
        };
        buckets[slot].1.push(Value::from(doc));
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let mut out = Document::new();
            out.set(field, key);
            out.set(GROUP_FIELD, Value::Array(members));
            out
        })
        .collect()
}

/// Lazily drop repeated documents
///
/// Without a field, documents compare by payload with `_id` stripped. With a
/// field, documents are reduced to `{field: value}` first and those missing
/// the field are dropped.
pub fn distinct<'a>(documents: DocumentIter<'a>, field: Option<String>) -> DocumentIter<'a> {
    let mut seen: AHashSet<String> = AHashSet::new();
    let projected: DocumentIter<'a> = match field {
        None => Box::new(documents.map(|doc| doc.without_id())),
        Some(field) => Box::new(documents.filter_map(move |doc| {
            let value = doc.get(&field)?.clone();
            let mut out = Document::new();
            out.set(&field, value);
            Some(out)
        })),
    };
    Box::new(projected.filter(move |doc| seen.insert(doc.canonical_key())))
}

/// Stable sort on one field; documents missing it sort first ascending
pub fn sort(mut documents: Vec<Document>, field: &str, ascending: bool) -> Vec<Document> {
    documents.sort_by(|a, b| {
        let (left, right) = if ascending { (a, b) } else { (b, a) };
        compare_values_with_none(left.get(field), right.get(field))
    });
    documents
}

/// Synthetic COUNT result
pub fn count_document(count: u64) -> Document {
    Document::new().with(COUNT_FIELD, Value::Number(count as f64))
}

/// One-to-many lookup table over a joined collection
#[derive(Debug)]
pub struct JoinIndex {
    local_field: String,
    as_field: String,
    matches: AHashMap<String, Vec<Value>>,
}

impl JoinIndex {
    /// Key the remote snapshot by `remote_field`; remote documents without
    /// it are left out. Matches keep the remote primary-key order.
    pub fn build(remote: CollectionSnapshot, local_field: &str, remote_field: &str, as_field: &str) -> Self {
        let mut matches: AHashMap<String, Vec<Value>> = AHashMap::new();
        for doc in remote.into_values() {
            let Some(key) = doc.get(remote_field).map(Value::canonical_key) else { continue };
            matches.entry(key).or_default().push(Value::from(doc));
        }
        JoinIndex {
            local_field: local_field.to_string(),
            as_field: as_field.to_string(),
            matches,
        }
    }

    /// Number of distinct remote keys
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Attach matching remote documents under `as_field`. Documents
    /// without a match or without the local field pass through unchanged.
    pub fn attach(&self, mut document: Document) -> Document {
        let found = document
            .get(&self.local_field)
            .and_then(|value| self.matches.get(&value.canonical_key()))
            .cloned();
        if let Some(found) = found {
            document.set(&self.as_field, Value::Array(found));
        }
        document
    }
}
