// src/query/predicate.rs
//! Leaf predicate evaluation
//!
//! `test(document, field, operator, value)` never fails: a missing field, a
//! kind mismatch or an operator that makes no sense for a kind all evaluate
//! to `false`.
//!
//! | operator value | document value | behaviour                                  |
//! |----------------|----------------|--------------------------------------------|
//! | scalar         | scalar         | same-kind comparison, see [`compare_scalars`] |
//! | array          | scalar         | `IN` membership; every other operator false |
//! | object         | object         | deep equality for EQUALS / NOT_EQUALS       |
//! | anything else  |                | false                                      |
//!
//! Ordering operators put the operator's value on the left:
//! `GREATER_THAN` holds when `value < document_value`.

use super::FieldOperatorType;
use crate::document::Document;
use crate::value::{eq_ignore_case, Value};

/// Evaluate `document[field] <operator> value`
pub fn test(document: &Document, field: &str, operator: FieldOperatorType, value: &Value) -> bool {
    match document.get(field) {
        Some(doc_value) => test_value(doc_value, operator, value),
        None => false,
    }
}

/// Evaluate a resolved document value against an operator/value pair
pub fn test_value(doc_value: &Value, operator: FieldOperatorType, value: &Value) -> bool {
    match (value, doc_value) {
        (Value::Array(members), _) if doc_value.is_scalar() => {
            // NOT_IN never matches an array literal; only IN tests membership
            operator == FieldOperatorType::In
                && members
                    .iter()
                    .any(|member| member.is_scalar() && compare_scalars(doc_value, FieldOperatorType::Equals, member))
        }
        _ if value.is_scalar() && doc_value.is_scalar() => compare_scalars(doc_value, operator, value),
        (Value::Object(_), Value::Object(_)) => {
            let same = value.canonical_key() == doc_value.canonical_key();
            match operator {
                FieldOperatorType::Equals => same,
                FieldOperatorType::NotEquals => !same,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Same-kind scalar comparison; different kinds never match except
/// `null EQUALS null`.
pub fn compare_scalars(doc_value: &Value, operator: FieldOperatorType, value: &Value) -> bool {
    use FieldOperatorType::*;

    match (value, doc_value) {
        (Value::Null, Value::Null) => operator == Equals,
        (Value::Bool(v), Value::Bool(d)) => match operator {
            Equals => v == d,
            NotEquals => v != d,
            _ => false,
        },
        (Value::Number(v), Value::Number(d)) => match operator {
            Equals => v == d,
            NotEquals => v != d,
            GreaterThan => v < d,
            GreaterThanEquals => v <= d,
            SmallerThan => v > d,
            SmallerThanEquals => v >= d,
            In | NotIn | Contains => false,
        },
        (Value::String(v), Value::String(d)) => match operator {
            Equals => eq_ignore_case(v, d),
            NotEquals => !eq_ignore_case(v, d),
            Contains => d.contains(v.as_str()),
            _ => false,
        },
        _ => false,
    }
}

/// EQUALS semantics between two present values
pub fn values_equal(a: &Value, b: &Value) -> bool {
    test_value(a, FieldOperatorType::Equals, b)
}
