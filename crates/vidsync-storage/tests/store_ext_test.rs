//! Typed accessor behaviour shared by both backends.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use vidsync_storage::{JsonFileStore, LocalStore, LocalStoreExt, MemoryStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    name: String,
    count: u32,
}

async fn exercise(store: Arc<dyn LocalStore>) {
    let record = Record {
        name: "first".into(),
        count: 3,
    };
    store.set("ns::one", &record).await.unwrap();
    store.set("ns::two", &record).await.unwrap();
    store.set("other", &true).await.unwrap();

    let loaded: Option<Record> = store.get("ns::one").await.unwrap();
    assert_eq!(loaded, Some(record));

    let mut keys = store.keys_with_prefix("ns::").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["one".to_string(), "two".to_string()]);

    let fallback: Vec<String> = store.get_or("missing", vec!["x".into()]).await.unwrap();
    assert_eq!(fallback, vec!["x".to_string()]);

    store.delete("missing").await.unwrap();
    store.delete("ns::one").await.unwrap();
    assert!(store.get_value("ns::one").await.unwrap().is_none());
}

#[tokio::test]
async fn memory_store_typed_access() {
    exercise(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn file_store_typed_access() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(&dir.path().join("store.json"))
        .await
        .unwrap();
    exercise(Arc::new(store)).await;
}

#[tokio::test]
async fn wrong_type_is_a_json_error() {
    let store = MemoryStore::new();
    store.set("n", &"not a number").await.unwrap();
    let result: Result<Option<u32>, _> = store.get("n").await;
    assert!(matches!(result, Err(vidsync_core::VidsyncError::Json(_))));
}
