//! vidsync-storage: local key/value persistence
//!
//! Every value is a JSON document stored under a flat string key. Two tiers
//! use the same interface:
//!   - the persistent store (entries, login, download jobs)
//!   - the session store (current watch stack, player resume state)

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use vidsync_core::VidsyncResult;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Flat JSON key/value store.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_value(&self, key: &str) -> VidsyncResult<Option<serde_json::Value>>;
    async fn set_value(&self, key: &str, value: serde_json::Value) -> VidsyncResult<()>;
    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> VidsyncResult<()>;
    async fn list_keys(&self) -> VidsyncResult<Vec<String>>;
}

/// Typed accessors on top of [`LocalStore`].
#[async_trait]
pub trait LocalStoreExt: LocalStore {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> VidsyncResult<Option<T>> {
        match self.get_value(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn get_or<T: DeserializeOwned + Send>(&self, key: &str, default: T) -> VidsyncResult<T> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> VidsyncResult<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value).await
    }

    /// Keys starting with `prefix`, with the prefix stripped.
    async fn keys_with_prefix(&self, prefix: &str) -> VidsyncResult<Vec<String>> {
        Ok(self
            .list_keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect())
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}
