// flat_file_tests.rs
// Persisting a store to a directory and reading it back

use std::fs;
use std::sync::Arc;

use flatbase_core::query::{FieldOperatorType, PredicateTree};
use flatbase_core::store::CollectionStore;
use flatbase_core::{Document, FlatbaseError, MemoryStore, QueryEngine, Value};
use serde_json::json;
use tempfile::TempDir;

fn doc(json: serde_json::Value) -> Document {
    Document::from_json_value(json).unwrap()
}

#[test]
fn test_round_trip_documents_and_indexes() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    store.insert("shop", "users", doc(json!({"_id": "u1", "age": 31, "tags": ["a"]}))).unwrap();
    store.insert("shop", "users", doc(json!({"_id": "u2", "age": 19}))).unwrap();
    store.insert("logs", "events", doc(json!({"_id": "e1", "kind": "boot"}))).unwrap();
    store.create_index("shop", "users", "age").unwrap();
    store.persist_dir(dir.path()).unwrap();

    assert!(dir.path().join("shop/users.json").exists());
    assert!(dir.path().join("shop/users.indexes.json").exists());
    assert!(dir.path().join("logs/events.json").exists());

    let reopened = MemoryStore::open_dir(dir.path()).unwrap();
    assert_eq!(reopened.list_databases(), vec!["logs", "shop"]);
    assert_eq!(reopened.list_indexes("shop", "users").unwrap(), vec!["age"]);
    assert_eq!(reopened.entry_count("shop", "users").unwrap(), 2);
    assert_eq!(
        reopened.whole_collection("shop", "users").unwrap(),
        store.whole_collection("shop", "users").unwrap()
    );

    let hits = reopened
        .indexed_lookup("shop", "users", "age", FieldOperatorType::GreaterThan, &Value::from(20))
        .unwrap()
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits.contains("u1"));
}

#[test]
fn test_documents_without_id_are_skipped_on_load() {
    let dir = TempDir::new().unwrap();
    let db_dir = dir.path().join("db");
    fs::create_dir_all(&db_dir).unwrap();
    fs::write(
        db_dir.join("items.json"),
        serde_json::to_string(&json!([{"_id": "a", "n": 1}, {"n": 2}])).unwrap(),
    )
    .unwrap();

    let store = MemoryStore::open_dir(dir.path()).unwrap();
    assert_eq!(store.entry_count("db", "items").unwrap(), 1);
}

#[test]
fn test_corrupt_collection_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let db_dir = dir.path().join("db");
    fs::create_dir_all(&db_dir).unwrap();
    fs::write(db_dir.join("broken.json"), "{not json").unwrap();

    assert!(matches!(
        MemoryStore::open_dir(dir.path()),
        Err(FlatbaseError::Serialization(_))
    ));
}

#[test]
fn test_engine_over_reopened_store() {
    let dir = TempDir::new().unwrap();
    {
        let store = MemoryStore::new();
        for (id, city) in [("1", "Paris"), ("2", "Rome"), ("3", "paris")] {
            store.insert("geo", "cities", doc(json!({"_id": id, "city": city}))).unwrap();
        }
        store.create_index("geo", "cities", "city").unwrap();
        store.persist_dir(dir.path()).unwrap();
    }

    let engine = QueryEngine::new(Arc::new(MemoryStore::open_dir(dir.path()).unwrap()));
    let tree = PredicateTree::field("city", FieldOperatorType::Equals, "PARIS");
    let ids: Vec<String> = engine
        .evaluate_filter(&tree, "geo", "cities")
        .unwrap()
        .map(|d| d.id().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "3"]);
}
