//! Sync of the Piped front-end settings.
//!
//! Unlike the Invidious account data, the settings travel as ordinary synced
//! entries of the [`EntryStore`]: a versioned snapshot plus the
//! `{syncTime, hash}` of the export that wrote it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use vidsync_core::keys::{
    PIPED_BACKGROUND_SYNC, PIPED_LAST_SYNC_TIME, PIPED_LAST_SYNC_TIMES, PIPED_SETTINGS_DATA,
};
use vidsync_core::now_millis;
use vidsync_core::types::SyncTimeWithHash;
use vidsync_storage::{LocalStore, LocalStoreExt};

use crate::entry::EntryStore;
use crate::error::SyncResult;
use crate::platform::PipedSettingsSource;

/// Version written by this crate
pub const SETTINGS_VERSION: &str = "1";

/// Settings bound to the device or the instance
const EXCLUDED_PREFIXES: &[&str] = &["authToken"];
const EXCLUDED_KEYS: &[&str] = &["authInstance", "auth_instance_url", "instance"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipedSyncOutcome {
    /// Settings were up to date or there was nothing to send
    None,
    /// Remote settings were applied
    Imported,
    /// Local settings were exported
    Exported,
    /// Remote settings are newer than the last sync of this domain
    Conflict,
    /// Background sync already ran or is disabled
    Skipped,
}

/// Snapshot stored under [`PIPED_SETTINGS_DATA`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllSettings {
    pub version: String,
    pub settings: BTreeMap<String, String>,
}

impl AllSettings {
    pub fn new(settings: BTreeMap<String, String>) -> Self {
        Self {
            version: SETTINGS_VERSION.to_string(),
            settings,
        }
    }

    /// Read a stored snapshot of any known version.
    ///
    /// Unversioned data is the bare settings map. Version 2 wraps the map
    /// next to data this crate does not sync. Unknown versions yield `None`.
    pub fn upgrade(data: Value) -> Option<Self> {
        let Value::Object(mut obj) = data else {
            return None;
        };

        match obj.get("version").cloned() {
            None => Some(Self::new(string_map(Value::Object(obj))?)),
            Some(v) if is_version(&v, 1) => {
                let settings = obj.remove("settings")?;
                Some(Self::new(string_map(settings)?))
            }
            Some(v) if is_version(&v, 2) => {
                tracing::debug!("upgrading Piped settings from version 2");
                let settings = obj.remove("settings")?;
                Some(Self::new(string_map(settings)?))
            }
            Some(v) => {
                tracing::warn!(version = %v, "unsupported Piped settings version");
                None
            }
        }
    }
}

pub struct PipedDataSync {
    store: Arc<EntryStore>,
    local: Arc<dyn LocalStore>,
    source: Arc<dyn PipedSettingsSource>,
    domain: String,
    did_auto_sync: AtomicBool,
}

impl PipedDataSync {
    pub fn new(
        store: Arc<EntryStore>,
        local: Arc<dyn LocalStore>,
        source: Arc<dyn PipedSettingsSource>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            local,
            source,
            domain: domain.into(),
            did_auto_sync: AtomicBool::new(false),
        }
    }

    pub async fn is_background_sync_enabled(&self) -> SyncResult<bool> {
        self.get_entry_or_init(PIPED_BACKGROUND_SYNC, false).await
    }

    pub async fn set_background_sync_enabled(&self, enabled: bool) -> SyncResult<()> {
        self.store.set_entry(PIPED_BACKGROUND_SYNC, &enabled).await
    }

    /// One background sync per session, only when enabled.
    pub async fn auto_sync(&self) -> SyncResult<PipedSyncOutcome> {
        if self.did_auto_sync.load(Ordering::SeqCst) || !self.is_background_sync_enabled().await? {
            return Ok(PipedSyncOutcome::Skipped);
        }
        if self.did_auto_sync.swap(true, Ordering::SeqCst) {
            return Ok(PipedSyncOutcome::Skipped);
        }

        self.sync(true).await
    }

    /// Import if the remote settings are newer than this domain's last sync.
    /// With `with_export`, local settings are exported when their fingerprint differs.
    pub async fn sync(&self, with_export: bool) -> SyncResult<PipedSyncOutcome> {
        let local_time = self.last_sync_time().await?;
        let remote = self.remote_sync_time().await?;

        if remote.sync_time == -1 && with_export {
            tracing::debug!("no Piped settings stored yet; exporting");
            self.export_data(false).await
        } else if local_time < remote.sync_time {
            tracing::debug!(local_time, remote_time = remote.sync_time, "importing Piped settings");
            self.import_data().await
        } else if with_export {
            let data = self.load_settings().await?;
            let fingerprint = compute_settings_fingerprint(&data)?;

            if fingerprint == remote.hash {
                tracing::debug!("Piped settings are up to date");
                return Ok(PipedSyncOutcome::None);
            }

            self.do_export(&data, false, fingerprint).await
        } else {
            Ok(PipedSyncOutcome::None)
        }
    }

    /// Export the local settings. Without `force`, newer remote settings
    /// are reported as [`PipedSyncOutcome::Conflict`] instead of overwritten.
    pub async fn export_data(&self, force: bool) -> SyncResult<PipedSyncOutcome> {
        let data = self.load_settings().await?;
        let fingerprint = compute_settings_fingerprint(&data)?;
        self.do_export(&data, force, fingerprint).await
    }

    pub async fn import_data(&self) -> SyncResult<PipedSyncOutcome> {
        let data: Value = self.get_entry_or_init(PIPED_SETTINGS_DATA, Value::Null).await?;
        if data.is_null() {
            return Ok(PipedSyncOutcome::None);
        }
        let Some(mut data) = AllSettings::upgrade(data) else {
            return Ok(PipedSyncOutcome::None);
        };

        data.settings.retain(|key, _| is_synced_setting(key));
        self.source.store_settings(&data.settings).await?;

        let remote = self.remote_sync_time().await?;
        self.set_last_sync_time(remote.sync_time).await?;

        tracing::info!(time = remote.sync_time, "Piped settings imported");
        Ok(PipedSyncOutcome::Imported)
    }

    async fn do_export(
        &self,
        data: &AllSettings,
        force: bool,
        fingerprint: String,
    ) -> SyncResult<PipedSyncOutcome> {
        if !force && data.settings.is_empty() {
            tracing::debug!("no Piped settings to export");
            return Ok(PipedSyncOutcome::None);
        }

        let remote = self.remote_sync_time().await?;
        if !force && self.last_sync_time().await? < remote.sync_time {
            tracing::info!(remote_time = remote.sync_time, "remote Piped settings are newer");
            return Ok(PipedSyncOutcome::Conflict);
        }

        // strictly after the replaced export, so other devices see it as newer
        let time = now_millis().max(remote.sync_time + 1);
        self.store.set_entry(PIPED_SETTINGS_DATA, data).await?;
        self.store
            .set_entry(
                PIPED_LAST_SYNC_TIME,
                &SyncTimeWithHash {
                    sync_time: time,
                    hash: fingerprint,
                },
            )
            .await?;
        self.set_last_sync_time(time).await?;

        tracing::info!(time, "Piped settings exported");
        Ok(PipedSyncOutcome::Exported)
    }

    async fn load_settings(&self) -> SyncResult<AllSettings> {
        let mut settings = self.source.load_settings().await?;
        settings.retain(|key, _| is_synced_setting(key));
        Ok(AllSettings::new(settings))
    }

    /// Read `key`, storing `default` first if no device wrote it yet.
    async fn get_entry_or_init<T>(&self, key: &str, default: T) -> SyncResult<T>
    where
        T: Serialize + DeserializeOwned + Sync,
    {
        if !self.store.has_key(key).await? {
            self.store.set_entry(key, &default).await?;
        }
        self.store.get_entry(key).await
    }

    async fn remote_sync_time(&self) -> SyncResult<SyncTimeWithHash> {
        self.get_entry_or_init(
            PIPED_LAST_SYNC_TIME,
            SyncTimeWithHash {
                sync_time: -1,
                hash: String::new(),
            },
        )
        .await
    }

    async fn last_sync_time(&self) -> SyncResult<i64> {
        let times: BTreeMap<String, i64> = self
            .local
            .get_or(PIPED_LAST_SYNC_TIMES, BTreeMap::new())
            .await?;
        Ok(times.get(&self.domain).copied().unwrap_or(-1))
    }

    async fn set_last_sync_time(&self, time: i64) -> SyncResult<()> {
        let mut times: BTreeMap<String, i64> = self
            .local
            .get_or(PIPED_LAST_SYNC_TIMES, BTreeMap::new())
            .await?;
        times.insert(self.domain.clone(), time);
        Ok(self.local.set(PIPED_LAST_SYNC_TIMES, &times).await?)
    }
}

/// SHA-256 (lowercase hex) of the snapshot. Keys are hashed in sorted order.
pub fn compute_settings_fingerprint(data: &AllSettings) -> SyncResult<String> {
    let json = serde_json::to_vec(data)?;
    Ok(hex::encode(Sha256::digest(&json)))
}

fn is_synced_setting(key: &str) -> bool {
    !EXCLUDED_PREFIXES.iter().any(|p| key.starts_with(p)) && !EXCLUDED_KEYS.contains(&key)
}

fn is_version(v: &Value, n: i64) -> bool {
    v.as_i64() == Some(n) || v.as_str() == Some(n.to_string().as_str())
}

/// Settings are strings in the front-end storage; other values are kept as their JSON text.
fn string_map(value: Value) -> Option<BTreeMap<String, String>> {
    let Value::Object(obj) = value else {
        return None;
    };
    Some(
        obj.into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect(),
    )
}
