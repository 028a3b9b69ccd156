// src/document.rs
use serde::{Deserialize, Serialize};

use crate::error::{FlatbaseError, Result};
use crate::value::{self, Map, Value};

/// Primary key field carried by every stored document
pub const ID_FIELD: &str = "_id";

/// Document: an ordered field map with a string `_id` once persisted
///
/// Documents handed out by the store are owned snapshots; the engine only
/// ever mutates its own copies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Map::new() }
    }

    pub fn from_map(fields: Map) -> Self {
        Document { fields }
    }

    /// Build a document from a JSON object
    pub fn from_json_value(json: serde_json::Value) -> Result<Self> {
        match Value::from(json) {
            Value::Object(fields) => Ok(Document { fields }),
            other => Err(FlatbaseError::InvalidDocument(format!(
                "document must be an object, got {:?}",
                other.kind()
            ))),
        }
    }

    /// Parse a document from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(parsed)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        Value::Object(self.fields.clone()).to_json()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Primary key, if the document has a string `_id`
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    /// Field lookup with dot notation (`"address.city"`, `"items.0"`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        value::lookup(&self.fields, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set a field, creating intermediate objects for dotted paths
    pub fn set(&mut self, path: &str, value: Value) {
        value::assign(&mut self.fields, path, value);
    }

    /// Builder-style [`Document::set`]
    pub fn with(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set(path, value.into());
        self
    }

    /// Remove a field; absence is not an error
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        value::unassign(&mut self.fields, path)
    }

    /// Copy of the document without its primary key
    pub fn without_id(&self) -> Document {
        let mut copy = self.clone();
        copy.fields.remove(ID_FIELD);
        copy
    }

    pub fn fields(&self) -> &Map {
        &self.fields
    }

    pub fn into_fields(self) -> Map {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical, kind-tagged identity of the whole payload
    pub fn canonical_key(&self) -> String {
        Value::Object(self.fields.clone()).canonical_key()
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.fields)
    }
}

impl From<Map> for Document {
    fn from(fields: Map) -> Self {
        Document { fields }
    }
}
