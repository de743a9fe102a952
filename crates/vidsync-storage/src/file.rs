//! JSON file backend: the whole store is loaded into memory on open and
//! written back atomically (temp file + rename) after every mutation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use vidsync_core::{VidsyncError, VidsyncResult};

use crate::LocalStore;

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl JsonFileStore {
    /// Load or create a store at the given path.
    /// If the file doesn't exist, starts empty; the file is created on first write.
    pub async fn open(path: &Path) -> VidsyncResult<Self> {
        let entries = match tokio::fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| VidsyncError::CorruptStore {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(VidsyncError::store_io("reading", path, e)),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "local store opened");

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, serde_json::Value>) -> VidsyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| VidsyncError::store_io("creating directory of", &self.path, e))?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| VidsyncError::store_io("writing", &tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| VidsyncError::store_io("replacing", &self.path, e))?;

        Ok(())
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn get_value(&self, key: &str) -> VidsyncResult<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> VidsyncResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn delete(&self, key: &str) -> VidsyncResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }

    async fn list_keys(&self) -> VidsyncResult<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}
