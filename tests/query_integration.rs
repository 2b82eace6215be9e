//! Query integration tests
//!
//! Strategy coverage through the public API: ordered range scans over a
//! single-field index, composite prefix scans, equality intersection
//! with on-demand index builds, and the full-scan fallback.

use emberdb::{IndexMeta, KeyType, OrderBy, QueryDescriptor, Store, WhereClause};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

async fn open_store(tmp: &TempDir) -> Store {
    Store::open(tmp.path()).await.expect("store open")
}

fn ages(result: &emberdb::QuerySnapshot) -> Vec<i64> {
    result
        .iter()
        .map(|d| d.get_field("age").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

// =============================================================================
// Single-Field Ordered Index
// =============================================================================

#[tokio::test]
async fn test_range_query_over_num_index() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let users = store.collection("users").await.unwrap();

    users.ensure_index(IndexMeta::single("age", KeyType::Num)).await.unwrap();
    for age in [10, 20, 30, 40] {
        users.add(json!({"age": age})).await.unwrap();
    }

    let qd = QueryDescriptor::new()
        .filter(WhereClause::gte("age", json!(20)))
        .filter(WhereClause::lte("age", json!(35)))
        .order_by(OrderBy::asc("age"));
    let result = users.get(Some(&qd)).await.unwrap();

    assert_eq!(ages(&result), vec![20, 30]);
}

#[tokio::test]
async fn test_negative_ages_sort_below_positive() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let readings = store.collection("readings").await.unwrap();

    readings.ensure_index(IndexMeta::single("age", KeyType::Num)).await.unwrap();
    for age in [5, -3, 0, -40, 12] {
        readings.add(json!({"age": age})).await.unwrap();
    }

    let qd = QueryDescriptor::new().order_by(OrderBy::asc("age"));
    let result = readings.get(Some(&qd)).await.unwrap();

    assert_eq!(ages(&result), vec![-40, -3, 0, 5, 12]);
}

#[tokio::test]
async fn test_descending_order() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let users = store.collection("users").await.unwrap();

    users.ensure_index(IndexMeta::single("age", KeyType::Num)).await.unwrap();
    for age in [10, 20, 30] {
        users.add(json!({"age": age})).await.unwrap();
    }

    let qd = QueryDescriptor::new().order_by(OrderBy::desc("age")).with_limit(2);
    let result = users.get(Some(&qd)).await.unwrap();

    assert_eq!(ages(&result), vec![30, 20]);
}

#[tokio::test]
async fn test_index_maintained_across_update_and_delete() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let users = store.collection("users").await.unwrap();

    users.ensure_index(IndexMeta::single("age", KeyType::Num)).await.unwrap();
    let id_a = users.add(json!({"age": 10})).await.unwrap();
    let id_b = users.add(json!({"age": 20})).await.unwrap();

    users.doc(&id_a).update(json!({"age": 50})).await.unwrap();
    users.doc(&id_b).delete().await.unwrap();

    let qd = QueryDescriptor::new()
        .filter(WhereClause::gte("age", json!(0)))
        .order_by(OrderBy::asc("age"));
    let result = users.get(Some(&qd)).await.unwrap();

    assert_eq!(ages(&result), vec![50]);
}

// =============================================================================
// Composite Prefix
// =============================================================================

#[tokio::test]
async fn test_composite_prefix_query() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let events = store.collection("events").await.unwrap();

    events
        .ensure_index(IndexMeta::composite([
            ("age", KeyType::Num),
            ("createdAt", KeyType::Str),
        ]))
        .await
        .unwrap();

    events.add(json!({"age": 30, "createdAt": "2024-01"})).await.unwrap();
    let want = events.add(json!({"age": 30, "createdAt": "2024-02"})).await.unwrap();
    events.add(json!({"age": 31, "createdAt": "2024-01"})).await.unwrap();

    let qd = QueryDescriptor::new()
        .filter_eq("age", json!(30))
        .filter(WhereClause::gte("createdAt", json!("2024-02")));
    let result = events.get(Some(&qd)).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.docs()[0].id(), want);
}

#[tokio::test]
async fn test_composite_index_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let meta = IndexMeta::composite([("age", KeyType::Num), ("createdAt", KeyType::Str)]);

    {
        let store = open_store(&tmp).await;
        let events = store.collection("events").await.unwrap();
        events.ensure_index(meta.clone()).await.unwrap();
        events.add(json!({"age": 1, "createdAt": "a"})).await.unwrap();
        store.close().await;
    }
    assert!(tmp
        .path()
        .join("events")
        .join("composite_age__createdAt.idx.json")
        .exists());

    let store = open_store(&tmp).await;
    let events = store.collection("events").await.unwrap();
    events.ensure_index(meta).await.unwrap();

    let qd = QueryDescriptor::new()
        .filter_eq("age", json!(1))
        .filter_eq("createdAt", json!("a"));
    assert_eq!(events.get(Some(&qd)).await.unwrap().len(), 1);
}

// =============================================================================
// Equality Intersection
// =============================================================================

#[tokio::test]
async fn test_equality_intersection_builds_indexes_on_demand() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let users = store.collection("users").await.unwrap();

    let want = users.add(json!({"name": "Ada", "email": "a@x"})).await.unwrap();
    users.add(json!({"name": "Ada", "email": "b@x"})).await.unwrap();
    users.add(json!({"name": "Bob", "email": "a@x"})).await.unwrap();

    let qd = QueryDescriptor::new()
        .filter_eq("name", json!("Ada"))
        .filter_eq("email", json!("a@x"));
    let result = users.get(Some(&qd)).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.docs()[0].id(), want);

    // The on-demand indexes were persisted next to the log
    assert!(tmp.path().join("users").join("secondary_name.idx.json").exists());
    assert!(tmp.path().join("users").join("secondary_email.idx.json").exists());
}

// =============================================================================
// Full Scan
// =============================================================================

#[tokio::test]
async fn test_full_scan_filters_sorts_and_truncates() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let users = store.collection("users").await.unwrap();

    for (age, city) in [(10, "oslo"), (20, "lund"), (30, "oslo"), (40, "lund")] {
        users.add(json!({"age": age, "city": city})).await.unwrap();
    }

    // No index anywhere: planner falls through to a full scan
    let qd = QueryDescriptor::new()
        .filter(WhereClause::gt("age", json!(10)))
        .order_by(OrderBy::desc("age"))
        .with_limit(2);
    let result = users.get(Some(&qd)).await.unwrap();

    assert_eq!(ages(&result), vec![40, 30]);
}

#[tokio::test]
async fn test_missing_field_never_matches() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let users = store.collection("users").await.unwrap();

    users.add(json!({"age": 10})).await.unwrap();
    users.add(json!({"name": "no-age"})).await.unwrap();
    users.add(json!({"age": null})).await.unwrap();

    let qd = QueryDescriptor::new().filter(WhereClause::gte("age", json!(0)));
    let result = users.get(Some(&qd)).await.unwrap();

    assert_eq!(result.len(), 1);
}
