// filter_tests.rs
// Filter evaluation through the engine, with and without indexes

use std::sync::Arc;

use flatbase_core::query::{FieldOperatorType, PredicateTree};
use flatbase_core::{Document, EngineConfig, FlatbaseError, MemoryStore, QueryEngine};
use serde_json::json;

fn people() -> MemoryStore {
    let store = MemoryStore::new();
    let docs = vec![
        json!({"_id": "1", "name": "Alice", "age": 25, "active": false, "city": "NYC", "address": {"zip": "10001"}}),
        json!({"_id": "2", "name": "Bob", "age": 30, "active": true, "city": "LA"}),
        json!({"_id": "3", "name": "carol", "age": 35, "active": true, "city": "nyc", "tags": ["a"]}),
        json!({"_id": "4", "name": "Dave", "age": "40", "active": null}),
        json!({"_id": "5", "name": "Eve", "age": 45.5, "city": "Chicago", "address": {"zip": "60601"}}),
    ];
    store
        .insert_many("db", "people", docs.into_iter().map(|d| Document::from_json_value(d).unwrap()))
        .unwrap();
    store
}

fn ids<S: flatbase_core::CollectionStore>(engine: &QueryEngine<S>, tree: &PredicateTree) -> Vec<String> {
    let mut ids: Vec<String> = engine
        .evaluate_filter(tree, "db", "people")
        .unwrap()
        .map(|d| d.id().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

fn indexed_engine() -> QueryEngine<MemoryStore> {
    let store = people();
    for field in ["age", "city", "active", "address.zip"] {
        store.create_index("db", "people", field).unwrap();
    }
    QueryEngine::new(Arc::new(store))
}

fn scanning_engine() -> QueryEngine<MemoryStore> {
    QueryEngine::with_config(Arc::new(people()), EngineConfig::new().with_indexes(false))
}

// ========== Leaf predicates ==========

#[test]
fn test_age_equals_returns_single_document() {
    let store = MemoryStore::new();
    store
        .insert("db", "people", Document::from_json_value(json!({"_id": "1", "age": 25, "active": false})).unwrap())
        .unwrap();
    store
        .insert("db", "people", Document::from_json_value(json!({"_id": "2", "age": 30, "active": true})).unwrap())
        .unwrap();
    let engine = QueryEngine::new(Arc::new(store));

    let tree = PredicateTree::field("age", FieldOperatorType::Equals, 25);
    assert_eq!(ids(&engine, &tree), vec!["1"]);
}

#[test]
fn test_string_equality_ignores_case() {
    let engine = scanning_engine();
    let tree = PredicateTree::field("city", FieldOperatorType::Equals, "NYC");
    assert_eq!(ids(&engine, &tree), vec!["1", "3"]);
}

#[test]
fn test_contains_is_case_sensitive() {
    let engine = indexed_engine();
    let tree = PredicateTree::field("city", FieldOperatorType::Contains, "hic");
    assert_eq!(ids(&engine, &tree), vec!["5"]);
    let tree = PredicateTree::field("city", FieldOperatorType::Contains, "HIC");
    assert!(ids(&engine, &tree).is_empty());
}

#[test]
fn test_cross_kind_never_matches() {
    let engine = scanning_engine();
    let tree = PredicateTree::field("age", FieldOperatorType::Equals, "40");
    assert_eq!(ids(&engine, &tree), vec!["4"]);
    let tree = PredicateTree::field("age", FieldOperatorType::Equals, 40);
    assert!(ids(&engine, &tree).is_empty());
}

#[test]
fn test_not_in_with_array_never_matches() {
    for engine in [indexed_engine(), scanning_engine()] {
        let tree = PredicateTree::field("city", FieldOperatorType::NotIn, json!(["LA"]));
        assert!(ids(&engine, &tree).is_empty());
        let tree = PredicateTree::field("city", FieldOperatorType::In, json!(["la", "Chicago"]));
        assert_eq!(ids(&engine, &tree), vec!["2", "5"]);
    }
}

#[test]
fn test_dotted_path_with_index() {
    let engine = indexed_engine();
    let tree = PredicateTree::field("address.zip", FieldOperatorType::Equals, "60601");
    assert_eq!(ids(&engine, &tree), vec!["5"]);
}

// ========== Conjunctions ==========

#[test]
fn test_mixed_indexed_and_scanned_conjunction() {
    let tree = PredicateTree::and(vec![
        PredicateTree::field("age", FieldOperatorType::GreaterThanEquals, 30),
        PredicateTree::field("name", FieldOperatorType::NotEquals, "bob"),
    ]);
    assert_eq!(ids(&indexed_engine(), &tree), vec!["3", "5"]);
    assert_eq!(ids(&scanning_engine(), &tree), vec!["3", "5"]);
}

#[test]
fn test_nested_conjunctions() {
    let tree = PredicateTree::or(vec![
        PredicateTree::and(vec![
            PredicateTree::field("active", FieldOperatorType::Equals, true),
            PredicateTree::field("city", FieldOperatorType::Equals, "nyc"),
        ]),
        PredicateTree::nor(vec![
            PredicateTree::field("age", FieldOperatorType::SmallerThan, 45),
            PredicateTree::field("age", FieldOperatorType::Equals, "40"),
        ]),
    ]);
    assert_eq!(ids(&indexed_engine(), &tree), vec!["3", "5"]);
    assert_eq!(ids(&scanning_engine(), &tree), vec!["3", "5"]);
}

#[test]
fn test_xor_nand() {
    let a = PredicateTree::field("active", FieldOperatorType::Equals, true);
    let b = PredicateTree::field("city", FieldOperatorType::Equals, "nyc");

    for engine in [indexed_engine(), scanning_engine()] {
        assert_eq!(ids(&engine, &PredicateTree::xor(vec![a.clone(), b.clone()])), vec!["1", "2"]);
        assert_eq!(
            ids(&engine, &PredicateTree::nand(vec![a.clone(), b.clone()])),
            vec!["1", "2", "4", "5"]
        );
    }
}

#[test]
fn test_empty_conjunctions() {
    let engine = indexed_engine();
    assert!(ids(&engine, &PredicateTree::and(vec![])).is_empty());
    assert!(ids(&engine, &PredicateTree::or(vec![])).is_empty());
    assert!(ids(&engine, &PredicateTree::xor(vec![])).is_empty());
    assert_eq!(ids(&engine, &PredicateTree::nor(vec![])).len(), 5);
    assert_eq!(ids(&engine, &PredicateTree::nand(vec![])).len(), 5);
}

#[test]
fn test_decoded_request_tree() {
    let tree = PredicateTree::from_json(&json!({
        "conjunctionType": "AND",
        "operators": [
            {"field": "age", "operatorType": "GREATER_THAN", "value": 26},
            {"field": "age", "operatorType": "SMALLER_THAN", "value": 40}
        ]
    }))
    .unwrap();
    assert_eq!(ids(&indexed_engine(), &tree), vec!["2", "3"]);
}

// ========== Errors ==========

#[test]
fn test_unknown_collection_propagates() {
    let engine = indexed_engine();
    let tree = PredicateTree::field("age", FieldOperatorType::Equals, 25);
    assert!(matches!(
        engine.evaluate_filter(&tree, "db", "ghosts"),
        Err(FlatbaseError::CollectionNotFound(_))
    ));
    assert!(matches!(
        engine.evaluate_filter(&tree, "nodb", "people"),
        Err(FlatbaseError::DatabaseNotFound(_))
    ));
}
