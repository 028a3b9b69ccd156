// src/value.rs
//! Typed document values
//!
//! Documents are trees of [`Value`]. Every number is an `f64`, which lets
//! map-stage arithmetic keep results such as `10 / 0 = +inf` or the `NaN`
//! of an empty average inside a document. `serde_json::Value` cannot hold
//! non-finite numbers, so conversions to JSON encode them as the strings
//! `"Infinity"`, `"-Infinity"` and `"NaN"`.
//!
//! Paths use dot notation:
//! - Simple fields: `"name"`
//! - Nested objects: `"address.city"`
//! - Array indexing: `"items.0.name"`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered field map used by objects and documents
pub type Map = BTreeMap<String, Value>;

/// A document value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

/// Runtime kind of a value
///
/// The declaration order is the cross-kind sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl Kind {
    fn tag(self) -> char {
        match self {
            Kind::Null => 'z',
            Kind::Bool => 'b',
            Kind::Number => 'n',
            Kind::String => 's',
            Kind::Array => 'a',
            Kind::Object => 'o',
        }
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    /// Null, boolean, number and string values are scalars
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Resolve a dotted path below this value
    ///
    /// ```
    /// use flatbase_core::value::Value;
    ///
    /// let doc = Value::from(serde_json::json!({"items": [{"name": "bolt"}]}));
    /// assert_eq!(doc.get_path("items.0.name"), Some(&Value::from("bolt")));
    /// assert_eq!(doc.get_path("items.3.name"), None);
    /// ```
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let mut current = self;
        for part in path.split('.') {
            current = current.child(part)?;
        }
        Some(current)
    }

    fn child(&self, part: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Set a value at a dotted path, creating intermediate objects.
    ///
    /// Non-container intermediates are replaced by objects. Array segments
    /// must be in-bounds indexes, otherwise nothing is written.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let (head, rest) = split_head(path);

        if let Value::Array(items) = self {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(slot) = items.get_mut(index) {
                    match rest {
                        None => *slot = value,
                        Some(rest) => slot.set_path(rest, value),
                    }
                }
            }
            return;
        }

        if !matches!(self, Value::Object(_)) {
            *self = Value::Object(Map::new());
        }
        if let Value::Object(map) = self {
            insert_path(map, head, rest, value);
        }
    }

    /// Remove the value at a dotted path, returning it if present
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let (head, rest) = split_head(path);
        match self {
            Value::Object(map) => match rest {
                None => map.remove(head),
                Some(rest) => map.get_mut(head)?.remove_path(rest),
            },
            Value::Array(items) => {
                let index = head.parse::<usize>().ok()?;
                match rest {
                    None if index < items.len() => Some(items.remove(index)),
                    None => None,
                    Some(rest) => items.get_mut(index)?.remove_path(rest),
                }
            }
            _ => None,
        }
    }

    /// Text form used by CONCAT and string casts.
    ///
    /// Strings render raw, integral numbers without a fraction, containers
    /// as compact JSON with sorted keys.
    pub fn canonical_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            _ => self.canonical_json(),
        }
    }

    /// Kind-tagged canonical form; equal keys mean structurally equal values
    pub fn canonical_key(&self) -> String {
        format!("{}:{}", self.kind().tag(), self.canonical_json())
    }

    fn canonical_json(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => quote(s),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::canonical_json).collect();
                format!("[{}]", inner.join(","))
            }
            Value::Object(map) => {
                // BTreeMap iteration is already sorted by key
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}:{}", quote(k), v.canonical_json()))
                    .collect();
                format!("{{{}}}", inner.join(","))
            }
        }
    }

    /// Convert to a JSON value. Non-finite numbers become strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn insert_path(map: &mut Map, head: &str, rest: Option<&str>, value: Value) {
    match rest {
        None => {
            map.insert(head.to_string(), value);
        }
        Some(rest) => map
            .entry(head.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .set_path(rest, value),
    }
}

/// Resolve a dotted path inside a field map
pub fn lookup<'a>(map: &'a Map, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let (head, rest) = split_head(path);
    let first = map.get(head)?;
    match rest {
        None => Some(first),
        Some(rest) => first.get_path(rest),
    }
}

/// Set a value at a dotted path inside a field map
pub fn assign(map: &mut Map, path: &str, value: Value) {
    let (head, rest) = split_head(path);
    insert_path(map, head, rest, value);
}

/// Remove the value at a dotted path inside a field map
pub fn unassign(map: &mut Map, path: &str) -> Option<Value> {
    let (head, rest) = split_head(path);
    match rest {
        None => map.remove(head),
        Some(rest) => map.get_mut(head)?.remove_path(rest),
    }
}

fn quote(s: &str) -> String {
    // serde_json escaping of a plain &str cannot fail
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Integral values print as integer literals, everything else in full
/// decimal form.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::String(format_number(n));
    }
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Case-insensitive string equality used by EQUALS/NOT_EQUALS
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.to_lowercase() == b.to_lowercase()
}

/// Total order over values used by SORT.
///
/// Different kinds order by [`Kind`]; numbers numerically (NaN last);
/// strings case-insensitively, then by raw bytes.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .partial_cmp(y)
            .unwrap_or_else(|| x.is_nan().cmp(&y.is_nan())),
        (Value::String(x), Value::String(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.canonical_json().cmp(&b.canonical_json()),
        _ => a.kind().cmp(&b.kind()),
    }
}

/// Compare optional values; a missing value sorts before any present one
pub fn compare_values_with_none(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_json())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if !n.is_finite() {
                    serializer.serialize_str(&format_number(*n))
                } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}
