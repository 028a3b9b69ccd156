// src/query/mod.rs
//! Predicate trees
//!
//! A filter is a tree: [`FieldOperator`] leaves compare one field of a
//! document against a literal, [`ConjunctionOperator`] nodes combine their
//! children with AND/OR/XOR/NOR/NAND. Trees arrive already decoded from the
//! request layer and are only read by the engine.
//!
//! ```text
//! PredicateTree
//!   ├── Field(FieldOperator)            predicate::test
//!   └── Conjunction(ConjunctionOperator)
//!         └── operators: [PredicateTree]  conjunction::combine
//! ```

pub mod conjunction;
pub mod filter;
pub mod predicate;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{FlatbaseError, Result};
use crate::value::Value;

/// Comparison applied by a leaf predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOperatorType {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    SmallerThan,
    SmallerThanEquals,
    In,
    NotIn,
    Contains,
}

/// Leaf predicate: `field <operator_type> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOperator {
    pub field: String,
    pub operator_type: FieldOperatorType,
    pub value: Value,
}

impl FieldOperator {
    pub fn new(field: impl Into<String>, operator_type: FieldOperatorType, value: impl Into<Value>) -> Self {
        FieldOperator {
            field: field.into(),
            operator_type,
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        predicate::test(document, &self.field, self.operator_type, &self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConjunctionType {
    And,
    Or,
    Xor,
    Nor,
    Nand,
}

/// Interior node combining child predicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConjunctionOperator {
    pub conjunction_type: ConjunctionType,
    pub operators: Vec<PredicateTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateTree {
    Field(FieldOperator),
    Conjunction(ConjunctionOperator),
}

impl PredicateTree {
    pub fn field(field: impl Into<String>, operator_type: FieldOperatorType, value: impl Into<Value>) -> Self {
        PredicateTree::Field(FieldOperator::new(field, operator_type, value))
    }

    pub fn conjunction(conjunction_type: ConjunctionType, operators: Vec<PredicateTree>) -> Self {
        PredicateTree::Conjunction(ConjunctionOperator {
            conjunction_type,
            operators,
        })
    }

    pub fn and(operators: Vec<PredicateTree>) -> Self {
        Self::conjunction(ConjunctionType::And, operators)
    }

    pub fn or(operators: Vec<PredicateTree>) -> Self {
        Self::conjunction(ConjunctionType::Or, operators)
    }

    pub fn xor(operators: Vec<PredicateTree>) -> Self {
        Self::conjunction(ConjunctionType::Xor, operators)
    }

    pub fn nor(operators: Vec<PredicateTree>) -> Self {
        Self::conjunction(ConjunctionType::Nor, operators)
    }

    pub fn nand(operators: Vec<PredicateTree>) -> Self {
        Self::conjunction(ConjunctionType::Nand, operators)
    }

    /// Decode a predicate tree from its JSON request form
    ///
    /// ```
    /// use flatbase_core::query::PredicateTree;
    /// use serde_json::json;
    ///
    /// let tree = PredicateTree::from_json(&json!({
    ///     "conjunctionType": "OR",
    ///     "operators": [
    ///         {"field": "age", "operatorType": "GREATER_THAN", "value": 65},
    ///         {"field": "vip", "operatorType": "EQUALS", "value": true}
    ///     ]
    /// })).unwrap();
    /// assert!(matches!(tree, PredicateTree::Conjunction(_)));
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(json.clone())
            .map_err(|e| FlatbaseError::InvalidQuery(format!("malformed predicate tree: {}", e)))
    }

    /// Evaluate the tree against a single document
    pub fn matches(&self, document: &Document) -> bool {
        conjunction::matches_document(self, document)
    }
}

impl From<FieldOperator> for PredicateTree {
    fn from(op: FieldOperator) -> Self {
        PredicateTree::Field(op)
    }
}

impl From<ConjunctionOperator> for PredicateTree {
    fn from(op: ConjunctionOperator) -> Self {
        PredicateTree::Conjunction(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_field_operator() {
        let tree = PredicateTree::from_json(&json!({
            "field": "address.city",
            "operatorType": "NOT_EQUALS",
            "value": "Budapest"
        }))
        .unwrap();
        assert_eq!(
            tree,
            PredicateTree::field("address.city", FieldOperatorType::NotEquals, "Budapest")
        );
    }

    #[test]
    fn test_decode_nested_conjunction() {
        let tree = PredicateTree::from_json(&json!({
            "conjunctionType": "NAND",
            "operators": [
                {"field": "a", "operatorType": "IN", "value": [1, 2]},
                {"conjunctionType": "XOR", "operators": []}
            ]
        }))
        .unwrap();

        match tree {
            PredicateTree::Conjunction(op) => {
                assert_eq!(op.conjunction_type, ConjunctionType::Nand);
                assert_eq!(op.operators.len(), 2);
                assert!(matches!(op.operators[1], PredicateTree::Conjunction(_)));
            }
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_operator() {
        let err = PredicateTree::from_json(&json!({
            "field": "a",
            "operatorType": "LIKE",
            "value": 1
        }))
        .unwrap_err();
        assert!(matches!(err, FlatbaseError::InvalidQuery(_)));
    }
}
