//! In-memory backend, used for session storage and in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use vidsync_core::VidsyncResult;

use crate::LocalStore;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get_value(&self, key: &str) -> VidsyncResult<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> VidsyncResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> VidsyncResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> VidsyncResult<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}
