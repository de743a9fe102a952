//! Integration tests: conflict coordinator with policy resolvers
//!
//! Each test produces a genuine conflict between two devices, then lets the
//! coordinator route it to a resolver.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use vidsync_sync::{MemoryRemote, PolicyResolver, Resolution};

use common::Device;

/// Leave `key` on `a` with a pending write that the server rejects.
async fn make_conflict(a: &Device, b: &Device, key: &str, a_value: Value, b_value: Value) {
    a.store.set_entry(key, &json!({"id": "s1", "name": "base"})).await.unwrap();
    b.store.sync().await.unwrap();
    b.store.set_entry(key, &b_value).await.unwrap();
    a.store.set_entry(key, &a_value).await.unwrap();
}

#[tokio::test]
async fn unresolved_conflicts_reach_the_caller() {
    let remote = Arc::new(MemoryRemote::new());
    let a = common::device(&remote, "alice");
    let b = common::device(&remote, "alice");
    make_conflict(&a, &b, "stacks::s1", json!({"name": "a"}), json!({"name": "b"})).await;

    let err = a.sync.sync().await.unwrap_err();
    assert_eq!(err.conflicts().len(), 1);

    a.sync
        .set_resolver(Some(Arc::new(PolicyResolver::new(Resolution::Defer))));
    let err = a.sync.sync().await.unwrap_err();
    assert_eq!(err.conflicts()[0].key, "stacks::s1");
}

#[tokio::test]
async fn keep_local_overwrites_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let a = common::device(&remote, "alice");
    let b = common::device(&remote, "alice");
    make_conflict(&a, &b, "stacks::s1", json!({"name": "a"}), json!({"name": "b"})).await;

    a.sync
        .set_resolver(Some(Arc::new(PolicyResolver::new(Resolution::KeepLocal))));
    a.sync.sync().await.unwrap();

    let on_b: Value = b.sync.get_entry("stacks::s1").await.unwrap();
    assert_eq!(on_b, json!({"name": "a"}));
    a.sync.sync().await.unwrap();
}

#[tokio::test]
async fn keep_remote_discards_local() {
    let remote = Arc::new(MemoryRemote::new());
    let a = common::device(&remote, "alice");
    let b = common::device(&remote, "alice");
    make_conflict(&a, &b, "stacks::s1", json!({"name": "a"}), json!({"name": "b"})).await;

    a.sync
        .set_resolver(Some(Arc::new(PolicyResolver::new(Resolution::KeepRemote))));
    a.sync.sync().await.unwrap();

    let on_a: Value = a.sync.get_entry("stacks::s1").await.unwrap();
    assert_eq!(on_a, json!({"name": "b"}));
}

#[tokio::test]
async fn keep_both_moves_local_copy_to_new_id() {
    let remote = Arc::new(MemoryRemote::new());
    let a = common::device(&remote, "alice");
    let b = common::device(&remote, "alice");
    make_conflict(
        &a,
        &b,
        "stacks::s1",
        json!({"id": "s1", "name": "mine", "items": [1]}),
        json!({"id": "s1", "name": "theirs", "items": [2]}),
    )
    .await;

    a.sync
        .set_resolver(Some(Arc::new(PolicyResolver::new(Resolution::KeepBoth))));
    a.sync.sync().await.unwrap();

    let keys = a.store.get_keys("stacks::", true).await.unwrap();
    assert_eq!(keys.len(), 2);
    let copy_key = keys.iter().find(|k| *k != "stacks::s1").unwrap().clone();
    let copy_id = copy_key.strip_prefix("stacks::").unwrap();

    let original: Value = a.sync.get_entry("stacks::s1").await.unwrap();
    assert_eq!(original["name"], "theirs");

    let copy: Value = b.sync.get_entry(&copy_key).await.unwrap();
    assert_eq!(copy["name"], "mine--local_copy");
    assert_eq!(copy["id"], copy_id);
    assert_eq!(copy["items"], json!([1]));
}

#[tokio::test]
async fn keep_both_needs_a_name() {
    let remote = Arc::new(MemoryRemote::new());
    let a = common::device(&remote, "alice");
    let b = common::device(&remote, "alice");
    make_conflict(&a, &b, "plain", json!(1), json!(2)).await;

    a.sync
        .set_resolver(Some(Arc::new(PolicyResolver::new(Resolution::KeepBoth))));
    let err = a.sync.sync().await.unwrap_err();
    assert_eq!(err.conflicts()[0].key, "plain");
}
