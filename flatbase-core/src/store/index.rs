// src/store/index.rs
// Per-field ordered index

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use super::KeySet;
use crate::document::Document;
use crate::query::FieldOperatorType;
use crate::value::{eq_ignore_case, Value};

/// Index key - every non-array value kind can be indexed
///
/// Variant order is the key order: all nulls, then booleans, numbers,
/// strings, and finally objects by canonical text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Number(OrderedFloat),
    String(String),
    Opaque(String),
}

/// OrderedFloat wrapper for f64 to enable Ord
///
/// `-0.0` is folded into `0.0` on construction; NaN sorts after every number.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(f64);

impl OrderedFloat {
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            OrderedFloat(0.0)
        } else {
            OrderedFloat(value)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal),
        }
    }
}

impl IndexKey {
    /// Key for a field value; arrays are not indexed
    pub fn from_value(value: &Value) -> Option<IndexKey> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => Some(IndexKey::Number(OrderedFloat::new(*n))),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            Value::Object(_) => Some(IndexKey::Opaque(value.canonical_key())),
            Value::Array(_) => None,
        }
    }

    fn number(n: f64) -> IndexKey {
        IndexKey::Number(OrderedFloat::new(n))
    }
}

/// Ordered index over one dotted field path
///
/// Lookups answer the same question as a full scan with
/// `predicate::test`, so the engine can take either path and get the same
/// primary keys back.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    field: String,
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl FieldIndex {
    pub fn new(field: impl Into<String>) -> Self {
        FieldIndex {
            field: field.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Build an index from existing documents
    pub fn build<'a, I>(field: impl Into<String>, documents: I) -> Self
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut index = FieldIndex::new(field);
        for doc in documents {
            index.insert(doc);
        }
        index
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, doc: &Document) {
        if let Some((key, id)) = self.entry_for(doc) {
            self.entries.entry(key).or_default().insert(id.to_string());
        }
    }

    pub fn remove(&mut self, doc: &Document) {
        if let Some((key, id)) = self.entry_for(doc) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    fn entry_for<'d>(&self, doc: &'d Document) -> Option<(IndexKey, &'d str)> {
        let id = doc.id()?;
        let key = IndexKey::from_value(doc.get(&self.field)?)?;
        Some((key, id))
    }

    /// Primary keys of documents whose field satisfies `operator value`
    pub fn lookup(&self, operator: FieldOperatorType, value: &Value) -> KeySet {
        use FieldOperatorType::*;

        let mut keys = KeySet::new();
        match (value, operator) {
            (Value::Array(members), In) => {
                for member in members.iter().filter(|m| m.is_scalar()) {
                    keys.extend(self.lookup(Equals, member));
                }
            }
            (Value::Null, Equals) => self.collect_exact(&IndexKey::Null, &mut keys),
            (Value::Bool(b), Equals) => self.collect_exact(&IndexKey::Bool(*b), &mut keys),
            (Value::Bool(b), NotEquals) => self.collect_exact(&IndexKey::Bool(!*b), &mut keys),
            (Value::Number(n), _) => self.collect_numbers(*n, operator, &mut keys),
            (Value::String(s), Equals) => {
                self.collect_strings(|k| eq_ignore_case(s, k), &mut keys)
            }
            (Value::String(s), NotEquals) => {
                self.collect_strings(|k| !eq_ignore_case(s, k), &mut keys)
            }
            (Value::String(s), Contains) => {
                self.collect_strings(|k| k.contains(s.as_str()), &mut keys)
            }
            (Value::Object(_), Equals) => {
                self.collect_exact(&IndexKey::Opaque(value.canonical_key()), &mut keys)
            }
            (Value::Object(_), NotEquals) => {
                let wanted = value.canonical_key();
                for (key, ids) in self.entries.range(IndexKey::Opaque(String::new())..) {
                    if matches!(key, IndexKey::Opaque(k) if *k != wanted) {
                        keys.extend(ids.iter().cloned());
                    }
                }
            }
            _ => {}
        }
        keys
    }

    fn collect_exact(&self, key: &IndexKey, keys: &mut KeySet) {
        if let Some(ids) = self.entries.get(key) {
            keys.extend(ids.iter().cloned());
        }
    }

    fn collect_strings<F>(&self, accept: F, keys: &mut KeySet)
    where
        F: Fn(&str) -> bool,
    {
        let start = IndexKey::String(String::new());
        for (key, ids) in self.entries.range(start..) {
            match key {
                IndexKey::String(s) if accept(s) => keys.extend(ids.iter().cloned()),
                IndexKey::String(_) => {}
                _ => break,
            }
        }
    }

    fn collect_numbers(&self, n: f64, operator: FieldOperatorType, keys: &mut KeySet) {
        use FieldOperatorType::*;

        if n.is_nan() {
            // NaN compares unequal to everything, itself included
            if operator == NotEquals {
                self.collect_number_range(Bound::Unbounded, Bound::Unbounded, |_| true, keys);
            }
            return;
        }

        let pivot = IndexKey::number(n);
        match operator {
            Equals => self.collect_exact(&pivot, keys),
            NotEquals => self.collect_number_range(Bound::Unbounded, Bound::Unbounded, |d| d != n, keys),
            GreaterThan => self.collect_number_range(Bound::Excluded(pivot), Bound::Unbounded, |d| n < d, keys),
            GreaterThanEquals => {
                self.collect_number_range(Bound::Included(pivot), Bound::Unbounded, |d| n <= d, keys)
            }
            SmallerThan => self.collect_number_range(Bound::Unbounded, Bound::Excluded(pivot), |d| n > d, keys),
            SmallerThanEquals => {
                self.collect_number_range(Bound::Unbounded, Bound::Included(pivot), |d| n >= d, keys)
            }
            In | NotIn | Contains => {}
        }
    }

    /// Walk the number section of the index between two bounds, keeping
    /// entries whose stored number passes `accept`. Stored NaN keys sort
    /// last and are only kept when `accept` says so.
    fn collect_number_range<F>(&self, lower: Bound<IndexKey>, upper: Bound<IndexKey>, accept: F, keys: &mut KeySet)
    where
        F: Fn(f64) -> bool,
    {
        let lower = match lower {
            Bound::Unbounded => Bound::Included(IndexKey::number(f64::NEG_INFINITY)),
            bound => bound,
        };
        for (key, ids) in self.entries.range((lower, upper)) {
            let IndexKey::Number(n) = key else { break };
            if accept(n.get()) {
                keys.extend(ids.iter().cloned());
            }
        }
    }
}
