// pipeline_tests.rs
// End-to-end aggregation pipelines

use std::sync::Arc;

use flatbase_core::aggregation::GROUP_FIELD;
use flatbase_core::query::{FieldOperatorType, PredicateTree};
use flatbase_core::{
    AggregateRequest, AggregationStep, ArrayOperation, Document, MapOperator, MemoryStore, MidOperator,
    QueryEngine, Value,
};
use serde_json::json;

fn doc(json: serde_json::Value) -> Document {
    Document::from_json_value(json).unwrap()
}

fn shop() -> QueryEngine<MemoryStore> {
    let store = MemoryStore::new();
    for user in [
        json!({"_id": "u1", "name": "Ada", "age": 36, "city": "London"}),
        json!({"_id": "u2", "name": "Linus", "age": 28, "city": "Helsinki"}),
        json!({"_id": "u3", "name": "Grace", "age": 45, "city": "london"}),
        json!({"_id": "u4", "name": "Ken", "age": 52}),
    ] {
        store.insert("shop", "users", doc(user)).unwrap();
    }
    for order in [
        json!({"_id": "o1", "userId": "u1", "total": 10}),
        json!({"_id": "o2", "userId": "u3", "total": 25}),
        json!({"_id": "o3", "userId": "u1", "total": 5}),
    ] {
        store.insert("shop", "orders", doc(order)).unwrap();
    }
    QueryEngine::new(Arc::new(store))
}

fn request(steps: serde_json::Value) -> AggregateRequest {
    AggregateRequest::from_json(&json!({"database": "shop", "collection": "users", "steps": steps})).unwrap()
}

// ========== Scenarios ==========

#[test]
fn test_group_by_shared_value() {
    let store = MemoryStore::new();
    store.insert("db", "c", doc(json!({"_id": "1", "groupField": "value1"}))).unwrap();
    store.insert("db", "c", doc(json!({"_id": "2", "groupField": "value1"}))).unwrap();
    let engine = QueryEngine::new(Arc::new(store));

    let request = AggregateRequest::new("db", "c").step(AggregationStep::GroupBy {
        field: "groupField".to_string(),
    });
    let out = engine.run_pipeline(&request).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get("groupField"), Some(&Value::from("value1")));
    assert_eq!(out[0].get(GROUP_FIELD).and_then(Value::as_array).map(Vec::len), Some(2));
}

#[test]
fn test_count_uses_entry_counter_when_unseeded() {
    let store = MemoryStore::new();
    store.insert("db", "c", doc(json!({"_id": "1"}))).unwrap();
    let engine = QueryEngine::new(Arc::new(store));

    let out = engine
        .run_pipeline(&AggregateRequest::new("db", "c").step(AggregationStep::Count))
        .unwrap();
    assert_eq!(out, vec![doc(json!({"count": 1}))]);
}

// ========== Stage combinations ==========

#[test]
fn test_filter_sort_skip_limit() {
    let engine = shop();
    let out = engine
        .run_pipeline(&request(json!([
            {"type": "FILTER", "predicate": {"field": "age", "operatorType": "GREATER_THAN", "value": 30}},
            {"type": "SORT", "field": "age", "ascending": false},
            {"type": "SKIP", "count": 1},
            {"type": "LIMIT", "count": 1}
        ])))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id(), Some("u3"));
}

#[test]
fn test_count_paths_agree() {
    let engine = shop();
    let unseeded = engine.run_pipeline(&request(json!([{"type": "COUNT"}]))).unwrap();
    let seeded = engine
        .run_pipeline(&request(json!([{"type": "SKIP", "count": 0}, {"type": "COUNT"}])))
        .unwrap();
    assert_eq!(unseeded, seeded);
    assert_eq!(unseeded[0].get("count"), Some(&Value::from(4)));
}

#[test]
fn test_join_one_to_many() {
    let engine = shop();
    let out = engine
        .run_pipeline(&request(json!([
            {"type": "JOIN", "collection": "orders", "localField": "_id", "remoteField": "userId", "asField": "orders"}
        ])))
        .unwrap();

    let orders_of = |id: &str| {
        out.iter()
            .find(|d| d.id() == Some(id))
            .and_then(|d| d.get("orders"))
            .and_then(Value::as_array)
            .map(Vec::len)
    };
    assert_eq!(orders_of("u1"), Some(2));
    assert_eq!(orders_of("u3"), Some(1));
    assert_eq!(orders_of("u2"), None);
}

#[test]
fn test_map_then_filter_sees_computed_field() {
    let engine = shop();
    let request = AggregateRequest::new("shop", "users")
        .step(AggregationStep::Map {
            operators: vec![MapOperator::add_field(
                "decades",
                MidOperator::array(ArrayOperation::Divide, vec![Value::from("age"), Value::from(10)]),
            )],
        })
        .step(AggregationStep::Filter {
            predicate: PredicateTree::field("decades", FieldOperatorType::GreaterThan, 4),
        });

    let out = engine.run_pipeline(&request).unwrap();
    let ids: Vec<_> = out.iter().map(|d| d.id().unwrap()).collect();
    assert_eq!(ids, vec!["u3", "u4"]);
}

#[test]
fn test_filter_after_map_with_index_uses_primary_keys() {
    let engine = shop();
    engine.store().create_index("shop", "users", "age").unwrap();

    let out = engine
        .run_pipeline(&request(json!([
            {"type": "MAP", "operators": [{"type": "REMOVE_FIELD", "name": "name"}]},
            {"type": "FILTER", "predicate": {"field": "age", "operatorType": "SMALLER_THAN", "value": 40}}
        ])))
        .unwrap();

    let ids: Vec<_> = out.iter().map(|d| d.id().unwrap()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
    assert!(out.iter().all(|d| !d.contains("name")));
}

#[test]
fn test_filter_sees_mapped_value_of_indexed_field() {
    let engines: Vec<QueryEngine<MemoryStore>> = [true, false]
        .into_iter()
        .map(|indexed| {
            let store = MemoryStore::new();
            for (id, age) in [("u1", 36), ("u2", 28), ("u3", 45)] {
                store.insert("shop", "users", doc(json!({"_id": id, "age": age}))).unwrap();
            }
            if indexed {
                store.create_index("shop", "users", "age").unwrap();
            }
            QueryEngine::new(Arc::new(store))
        })
        .collect();

    let pipeline = |bound: i64| {
        request(json!([
            {"type": "MAP", "operators": [{
                "type": "ADD_FIELD",
                "name": "age",
                "operation": {"type": "ARRAY", "operation": "SUM", "operands": [100]}
            }]},
            {"type": "FILTER", "predicate": {"field": "age", "operatorType": "SMALLER_THAN", "value": bound}}
        ]))
    };

    for engine in &engines {
        assert!(engine.run_pipeline(&pipeline(40)).unwrap().is_empty());

        let out = engine.run_pipeline(&pipeline(200)).unwrap();
        let ids: Vec<_> = out.iter().map(|d| d.id().unwrap()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert!(out.iter().all(|d| d.get("age") == Some(&Value::from(100))));
    }
}

#[test]
fn test_filter_after_sort_and_skip_still_uses_index() {
    let engine = shop();
    engine.store().create_index("shop", "users", "age").unwrap();

    let out = engine
        .run_pipeline(&request(json!([
            {"type": "SORT", "field": "age", "ascending": false},
            {"type": "SKIP", "count": 1},
            {"type": "FILTER", "predicate": {"field": "age", "operatorType": "GREATER_THAN", "value": 30}}
        ])))
        .unwrap();
    let ids: Vec<_> = out.iter().map(|d| d.id().unwrap()).collect();
    assert_eq!(ids, vec!["u3", "u1"]);
}

#[test]
fn test_group_by_folds_case_then_counts() {
    let engine = shop();
    let out = engine
        .run_pipeline(&request(json!([
            {"type": "GROUP_BY", "field": "city"},
            {"type": "COUNT"}
        ])))
        .unwrap();
    // London/london share a bucket; Ken has no city
    assert_eq!(out[0].get("count"), Some(&Value::from(2)));
}

#[test]
fn test_distinct_field_projection() {
    let engine = shop();
    let out = engine
        .run_pipeline(&request(json!([
            {"type": "DISTINCT", "field": "city"}
        ])))
        .unwrap();

    // distinct compares projected payloads exactly, so case variants remain
    assert_eq!(
        out,
        vec![
            doc(json!({"city": "London"})),
            doc(json!({"city": "Helsinki"})),
            doc(json!({"city": "london"})),
        ]
    );
}

#[test]
fn test_limit_larger_than_stream() {
    let engine = shop();
    let out = engine.run_pipeline(&request(json!([{"type": "LIMIT", "count": 100}]))).unwrap();
    assert_eq!(out.len(), 4);
}

#[test]
fn test_nor_filter_inside_pipeline() {
    let engine = shop();
    let out = engine
        .run_pipeline(&request(json!([
            {"type": "SKIP", "count": 1},
            {"type": "FILTER", "predicate": {
                "conjunctionType": "NOR",
                "operators": [{"field": "city", "operatorType": "EQUALS", "value": "LONDON"}]
            }}
        ])))
        .unwrap();
    let ids: Vec<_> = out.iter().map(|d| d.id().unwrap()).collect();
    assert_eq!(ids, vec!["u2", "u4"]);
}
