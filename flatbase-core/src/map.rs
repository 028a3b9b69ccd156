// src/map.rs
//! Map stage: computed fields
//!
//! A [`MapOperator`] either adds a field computed by a [`MidOperator`] or
//! removes one. Both may carry a guard predicate; a document failing the
//! guard passes through untouched.
//!
//! Operands of array operations are interpreted per kind: numbers are
//! literals, strings are dotted field paths, anything else is skipped by the
//! numeric folds. CONCAT additionally treats strings starting with the
//! configured literal prefix as literal text.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::document::Document;
use crate::query::PredicateTree;
use crate::value::{format_number, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapOperator {
    AddField {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guard: Option<PredicateTree>,
        operation: MidOperator,
    },
    RemoveField {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guard: Option<PredicateTree>,
    },
}

/// Value producer for ADD_FIELD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MidOperator {
    Array {
        operation: ArrayOperation,
        operands: Vec<Value>,
    },
    Single {
        operation: SingleOperation,
        field: String,
    },
    Cast {
        field: String,
        target: CastTarget,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArrayOperation {
    Sum,
    Subs,
    Multiply,
    Divide,
    Pow,
    Root,
    Avg,
    Max,
    Min,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SingleOperation {
    Abs,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CastTarget {
    Number,
    String,
    Boolean,
}

// ============================================================================
// MAP OPERATORS
// ============================================================================

impl MapOperator {
    pub fn add_field(name: impl Into<String>, operation: MidOperator) -> Self {
        MapOperator::AddField {
            name: name.into(),
            guard: None,
            operation,
        }
    }

    pub fn remove_field(name: impl Into<String>) -> Self {
        MapOperator::RemoveField {
            name: name.into(),
            guard: None,
        }
    }

    /// Attach a guard predicate
    pub fn when(self, predicate: PredicateTree) -> Self {
        match self {
            MapOperator::AddField { name, operation, .. } => MapOperator::AddField {
                name,
                guard: Some(predicate),
                operation,
            },
            MapOperator::RemoveField { name, .. } => MapOperator::RemoveField {
                name,
                guard: Some(predicate),
            },
        }
    }

    pub fn guard(&self) -> Option<&PredicateTree> {
        match self {
            MapOperator::AddField { guard, .. } | MapOperator::RemoveField { guard, .. } => guard.as_ref(),
        }
    }
}

/// Apply `operator` to a copy of `document`
pub fn apply_map_operator(operator: &MapOperator, document: &Document, config: &EngineConfig) -> Document {
    apply_owned(operator, document.clone(), config)
}

/// Apply `operator` to a document the caller already owns
pub fn apply_owned(operator: &MapOperator, mut document: Document, config: &EngineConfig) -> Document {
    if let Some(guard) = operator.guard() {
        if !guard.matches(&document) {
            return document;
        }
    }

    match operator {
        MapOperator::AddField { name, operation, .. } => {
            let value = operation.evaluate(&document, config);
            document.set(name, value);
        }
        MapOperator::RemoveField { name, .. } => {
            document.remove(name);
        }
    }
    document
}

// ============================================================================
// MID OPERATORS
// ============================================================================

impl MidOperator {
    pub fn array(operation: ArrayOperation, operands: Vec<Value>) -> Self {
        MidOperator::Array { operation, operands }
    }

    pub fn single(operation: SingleOperation, field: impl Into<String>) -> Self {
        MidOperator::Single {
            operation,
            field: field.into(),
        }
    }

    pub fn cast(field: impl Into<String>, target: CastTarget) -> Self {
        MidOperator::Cast {
            field: field.into(),
            target,
        }
    }

    /// Compute the value for `document`. Never fails: missing or mistyped
    /// inputs produce `null` or are skipped.
    pub fn evaluate(&self, document: &Document, config: &EngineConfig) -> Value {
        match self {
            MidOperator::Array {
                operation: ArrayOperation::Concat,
                operands,
            } => Value::String(concat(operands, document, config.literal_prefix)),
            MidOperator::Array { operation, operands } => {
                let numbers = operands.iter().filter_map(|operand| numeric_operand(operand, document));
                Value::Number(fold_numbers(*operation, numbers))
            }
            MidOperator::Single { operation, field } => single(*operation, document.get(field)),
            MidOperator::Cast { field, target } => cast(*target, document.get(field)),
        }
    }
}

fn numeric_operand(operand: &Value, document: &Document) -> Option<f64> {
    match operand {
        Value::Number(n) => Some(*n),
        Value::String(path) => document.get(path).and_then(Value::as_f64),
        _ => None,
    }
}

fn fold_numbers<I>(operation: ArrayOperation, numbers: I) -> f64
where
    I: Iterator<Item = f64>,
{
    match operation {
        ArrayOperation::Sum => numbers.fold(0.0, |acc, n| acc + n),
        ArrayOperation::Subs => numbers.fold(0.0, |acc, n| acc - n),
        ArrayOperation::Max => numbers.fold(f64::NEG_INFINITY, f64::max),
        ArrayOperation::Min => numbers.fold(f64::INFINITY, f64::min),
        ArrayOperation::Avg => {
            let (sum, count) = numbers.fold((0.0, 0usize), |(sum, count), n| (sum + n, count + 1));
            // no numeric operands: 0 / 0
            sum / count as f64
        }
        ArrayOperation::Multiply => fold_seeded(numbers, |acc, n| acc * n),
        ArrayOperation::Divide => fold_seeded(numbers, |acc, n| acc / n),
        ArrayOperation::Pow => fold_seeded(numbers, f64::powf),
        ArrayOperation::Root => fold_seeded(numbers, |acc, n| acc.powf(1.0 / n)),
        // handled by the caller; an empty concat has no numeric value
        ArrayOperation::Concat => f64::NAN,
    }
}

/// Start at 0, add the first operand, combine the rest with `combinator`
fn fold_seeded<I, F>(numbers: I, combinator: F) -> f64
where
    I: Iterator<Item = f64>,
    F: Fn(f64, f64) -> f64,
{
    let mut numbers = numbers;
    match numbers.next() {
        Some(first) => numbers.fold(0.0 + first, combinator),
        None => 0.0,
    }
}

fn concat(operands: &[Value], document: &Document, literal_prefix: char) -> String {
    let mut out = String::new();
    for operand in operands {
        match operand {
            Value::String(text) => match text.strip_prefix(literal_prefix) {
                Some(literal) => out.push_str(literal),
                None => match document.get(text) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Array(items)) => push_scalars(&mut out, items),
                    Some(resolved) => out.push_str(&resolved.canonical_text()),
                    None => out.push_str(text),
                },
            },
            Value::Array(items) => push_scalars(&mut out, items),
            other => out.push_str(&other.canonical_text()),
        }
    }
    out
}

fn push_scalars(out: &mut String, items: &[Value]) {
    for item in items.iter().filter(|item| item.is_scalar()) {
        out.push_str(&item.canonical_text());
    }
}

fn single(operation: SingleOperation, value: Option<&Value>) -> Value {
    match (operation, value) {
        (SingleOperation::Abs, Some(Value::Number(n))) => Value::Number(n.abs()),
        (SingleOperation::Size, Some(Value::String(s))) => Value::from(s.chars().count()),
        (SingleOperation::Size, Some(Value::Array(items))) => Value::from(items.len()),
        _ => Value::Null,
    }
}

fn cast(target: CastTarget, value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };

    match (target, value) {
        (CastTarget::Number, Value::Number(n)) => Value::Number(*n),
        (CastTarget::Number, Value::String(s)) => s.trim().parse::<f64>().map(Value::Number).unwrap_or(Value::Null),
        (CastTarget::String, Value::String(s)) => Value::String(s.clone()),
        (CastTarget::String, Value::Number(n)) => Value::String(format_number(*n)),
        (CastTarget::String, Value::Bool(b)) => Value::String(b.to_string()),
        (CastTarget::Boolean, Value::Bool(b)) => Value::Bool(*b),
        (CastTarget::Boolean, Value::Number(n)) => Value::Bool(*n != 0.0),
        (CastTarget::Boolean, Value::String(s)) => {
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}
