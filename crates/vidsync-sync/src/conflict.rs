//! Conflict routing on top of the [`EntryStore`].
//!
//! A sync pass may fail with conflicts nested anywhere inside an aggregate.
//! The coordinator pulls them out, offers them to the registered
//! [`ConflictResolver`] and only fails the caller for what stays unhandled.

use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vidsync_core::generate_unique_id;
use vidsync_core::keys::{
    PLAYLIST_GROUPS_PREFIX, STACKS_PREFIX, SUBSCRIBED_PLAYLISTS, SUBSCRIBED_PLAYLISTS_INITIALIZED,
    SUBSCRIPTIONS_DATA, SUBSCRIPTIONS_TIMES,
};

use crate::entry::EntryStore;
use crate::error::{SyncConflict, SyncError, SyncResult};
use crate::warn::SyncWarnHandler;

/// Suffix appended to the `name` of the local copy kept by a rename.
const LOCAL_COPY_SUFFIX: &str = "--local_copy";
const ID_SEPARATOR: &str = "::";

// ── Resolution ────────────────────────────────────────────────────────────────

/// How to settle one conflicting entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the local version, overwrite remote.
    KeepLocal,
    /// Keep the remote version, overwrite local.
    KeepRemote,
    /// Keep both: remote stays under the key, local moves to a fresh id.
    KeepBoth,
    /// Leave the conflict for later.
    Defer,
}

impl FromStr for Resolution {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" | "keep_local" => Ok(Resolution::KeepLocal),
            "remote" | "keep_remote" => Ok(Resolution::KeepRemote),
            "rename" | "both" | "keep_both" => Ok(Resolution::KeepBoth),
            "defer" => Ok(Resolution::Defer),
            other => Err(SyncError::Invalid(format!(
                "unknown conflict resolution '{other}' (expected local, remote, rename or defer)"
            ))),
        }
    }
}

/// Resolves conflicts reported by a sync pass.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    /// Returns the indexes of the `conflicts` that were handled.
    async fn resolve(
        &self,
        coordinator: &ConflictCoordinator,
        conflicts: &[SyncConflict],
    ) -> Vec<usize>;
}

/// Applies the same [`Resolution`] to every conflict.
#[derive(Debug, Clone, Copy)]
pub struct PolicyResolver {
    pub resolution: Resolution,
}

impl PolicyResolver {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }
}

#[async_trait]
impl ConflictResolver for PolicyResolver {
    async fn resolve(
        &self,
        coordinator: &ConflictCoordinator,
        conflicts: &[SyncConflict],
    ) -> Vec<usize> {
        let mut handled = Vec::new();
        for (idx, conflict) in conflicts.iter().enumerate() {
            match coordinator.resolve(&conflict.key, self.resolution).await {
                Ok(true) => handled.push(idx),
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    key = %conflict.key,
                    resolution = ?self.resolution,
                    error = %e,
                    "failed to resolve conflict"
                ),
            }
        }
        handled
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

pub struct ConflictCoordinator {
    store: Arc<EntryStore>,
    resolver: RwLock<Option<Arc<dyn ConflictResolver>>>,
}

impl ConflictCoordinator {
    pub fn new(store: Arc<EntryStore>) -> Self {
        Self {
            store,
            resolver: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }

    pub fn set_resolver(&self, resolver: Option<Arc<dyn ConflictResolver>>) {
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = resolver;
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_warn_handler(&self, handler: Option<Arc<dyn SyncWarnHandler>>) {
        self.store.warnings().set_handler(handler);
    }

    // sync api

    pub async fn sync(&self) -> SyncResult<()> {
        match self.store.sync().await {
            Ok(()) => Ok(()),
            Err(e) => self.handle_error(e).await,
        }
    }

    pub async fn get_entry<T: DeserializeOwned>(&self, key: &str) -> SyncResult<T> {
        self.store.get_entry(key).await
    }

    pub async fn set_entry<T: Serialize + Sync>(&self, key: &str, value: &T) -> SyncResult<()> {
        match self.store.set_entry(key, value).await {
            Ok(()) => Ok(()),
            Err(e) => self.handle_error(e).await,
        }
    }

    pub async fn delete_entry(&self, key: &str) -> SyncResult<()> {
        self.store.delete_entry(key).await
    }

    // resolve api

    /// Apply `resolution` to `key`. Returns `false` for [`Resolution::Defer`].
    pub async fn resolve(&self, key: &str, resolution: Resolution) -> SyncResult<bool> {
        match resolution {
            Resolution::KeepLocal => self.resolve_with_local(key).await?,
            Resolution::KeepRemote => self.resolve_with_remote(key).await?,
            Resolution::KeepBoth => self.resolve_with_rename(key).await?,
            Resolution::Defer => return Ok(false),
        }
        tracing::info!(key, ?resolution, "conflict resolved");
        Ok(true)
    }

    /// Discard the remote version and keep the local one.
    pub async fn resolve_with_local(&self, key: &str) -> SyncResult<()> {
        let data: Value = self
            .store
            .get_local_entry(key, true)
            .await?
            .ok_or_else(|| SyncError::NotStored(key.to_string()))?;
        self.store.delete_entry(key).await?;
        self.store.set_entry(key, &data).await
    }

    /// Discard the local version and keep the remote one.
    pub async fn resolve_with_remote(&self, key: &str) -> SyncResult<()> {
        self.store.delete_entry_local(key).await?;
        self.store.get_entry::<Value>(key).await?;
        Ok(())
    }

    /// Keep both versions. The remote one stays under `key`, the local one is
    /// stored under a new id in the same key scope with its name suffixed.
    pub async fn resolve_with_rename(&self, key: &str) -> SyncResult<()> {
        let mut data: Value = self
            .store
            .get_local_entry(key, true)
            .await?
            .ok_or_else(|| SyncError::NotStored(key.to_string()))?;

        let Some(obj) = data.as_object_mut() else {
            return Err(SyncError::Invalid(
                "not renameable: entry has no valid name property".into(),
            ));
        };
        let Some(name) = obj.get("name").and_then(Value::as_str) else {
            return Err(SyncError::Invalid(
                "not renameable: entry has no valid name property".into(),
            ));
        };
        let renamed = format!("{name}{LOCAL_COPY_SUFFIX}");
        obj.insert("name".into(), Value::String(renamed));

        let prefix = key_scope(key);
        let in_scope: Vec<String> = self
            .store
            .get_keys(prefix, true)
            .await?
            .into_iter()
            .map(|k| k[prefix.len()..].to_string())
            .collect();
        let new_id = generate_unique_id(&in_scope);

        if let Some(old_id) = obj.get("id").filter(|v| !v.is_null()) {
            let Some(old_id) = old_id.as_str() else {
                return Err(SyncError::Invalid(
                    "can not reassign id: entry has unsupported id property".into(),
                ));
            };
            if old_id != &key[prefix.len()..] {
                return Err(SyncError::Invalid(
                    "can not reassign id: id has unexpected format".into(),
                ));
            }
            obj.insert("id".into(), Value::String(new_id.clone()));
        }

        self.resolve_with_remote(key).await?;
        self.store.set_entry(&format!("{prefix}{new_id}"), &data).await
    }

    // helpers

    /// Display name of the kind of item stored under `key`.
    pub fn item_type_name(key: &str) -> Option<&'static str> {
        if key.starts_with(PLAYLIST_GROUPS_PREFIX) {
            Some("Playlist Group")
        } else if key.starts_with(STACKS_PREFIX) {
            Some("Stack")
        } else if key == SUBSCRIBED_PLAYLISTS || key == SUBSCRIBED_PLAYLISTS_INITIALIZED {
            Some("Subscribed Playlists")
        } else if key == SUBSCRIPTIONS_DATA || key == SUBSCRIPTIONS_TIMES {
            Some("Subscriptions")
        } else {
            None
        }
    }

    /// User-visible name of the item, if its kind has one.
    pub fn item_name(key: &str, item: &Value) -> Option<String> {
        if key.starts_with(PLAYLIST_GROUPS_PREFIX) || key.starts_with(STACKS_PREFIX) {
            item.get("name").and_then(Value::as_str).map(str::to_string)
        } else {
            None
        }
    }

    pub async fn publish_sync_warning(&self, message: &str, error: Option<&SyncError>) {
        self.store.warnings().publish(message, error).await;
    }

    async fn handle_error(&self, error: SyncError) -> SyncResult<()> {
        let conflicts: Vec<SyncConflict> = error.conflicts().into_iter().cloned().collect();
        if conflicts.is_empty() {
            return Err(error);
        }

        tracing::warn!(
            keys = ?conflicts.iter().map(|c| c.key.as_str()).collect::<Vec<_>>(),
            "got sync conflicts"
        );

        let resolver = self
            .resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(resolver) = resolver else {
            return Err(error);
        };

        let handled = resolver.resolve(self, &conflicts).await;
        if (0..conflicts.len()).any(|idx| !handled.contains(&idx)) {
            return Err(error);
        }

        let mut rest = error.into_non_conflicts();
        match rest.len() {
            0 => Ok(()),
            1 => Err(rest.remove(0)),
            _ => Err(SyncError::Aggregate(rest)),
        }
    }
}

impl std::fmt::Debug for ConflictCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictCoordinator")
            .field("store", &self.store)
            .field("resolver", &self.has_resolver())
            .finish()
    }
}

/// Key prefix up to and including the last `::`; empty if there is none.
fn key_scope(key: &str) -> &str {
    match key.rfind(ID_SEPARATOR) {
        Some(idx) => &key[..idx + ID_SEPARATOR.len()],
        None => "",
    }
}
