//! Sync of the Invidious account data (preferences, subscriptions, history).
//!
//! The whole export is one encrypted blob on the server. Uploads carry a
//! fingerprint so a device can tell whether its data differs from the stored
//! blob without downloading it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use vidsync_core::keys::{INVIDIOUS_BACKGROUND_SYNC, INVIDIOUS_LAST_SYNC_TIMES};
use vidsync_core::types::{AccountDataUpdate, SyncTimeWithHash};
use vidsync_crypto::Login;
use vidsync_storage::{LocalStore, LocalStoreExt};

use crate::api::AccountDataApi;
use crate::error::{SyncError, SyncResult};
use crate::platform::AccountDataSource;
use crate::session::LoginSlot;

const CIPHER_TAG: &str = "InvidiousDataSync-cipher";

/// Parts of the export that are synced by other means
const EXPORT_EXCLUDED: &[&str] = &["playlists"];

/// Preferences not every instance supports; hashing them would never converge
const FINGERPRINT_EXCLUDED: &[&str] = &[
    "preferences.quality",
    "preferences.quality_dash",
    "preferences.local",
    "preferences.dark_mode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSyncOutcome {
    /// Data was up to date
    None,
    /// Remote data was imported
    Imported,
    /// Local data was exported
    Exported,
}

pub struct InvidiousDataSync {
    remote: Arc<dyn AccountDataApi>,
    local: Arc<dyn LocalStore>,
    login: LoginSlot,
    source: Arc<dyn AccountDataSource>,
    domain: String,
}

impl InvidiousDataSync {
    pub fn new(
        remote: Arc<dyn AccountDataApi>,
        local: Arc<dyn LocalStore>,
        login: LoginSlot,
        source: Arc<dyn AccountDataSource>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            local,
            login,
            source,
            domain: domain.into(),
        }
    }

    pub fn has_login(&self) -> bool {
        self.login.is_set()
    }

    /// Swap the session. With `clear_storage`, sync times and the background flag are reset.
    pub async fn set_login(&self, login: Option<Login>, clear_storage: bool) -> SyncResult<()> {
        self.login.set(login);
        if clear_storage {
            self.local.delete(INVIDIOUS_LAST_SYNC_TIMES).await?;
            self.local.set(INVIDIOUS_BACKGROUND_SYNC, &false).await?;
        }
        Ok(())
    }

    pub async fn is_background_sync_enabled(&self) -> SyncResult<bool> {
        Ok(self.local.get_or(INVIDIOUS_BACKGROUND_SYNC, false).await?)
    }

    pub async fn set_background_sync_enabled(&self, enabled: bool) -> SyncResult<()> {
        Ok(self.local.set(INVIDIOUS_BACKGROUND_SYNC, &enabled).await?)
    }

    /// Import if the remote data is newer than this domain's last sync.
    /// With `with_export`, local data is uploaded when its fingerprint differs.
    pub async fn sync(&self, with_export: bool) -> SyncResult<AccountSyncOutcome> {
        let login = self.login.get().ok_or(SyncError::NoLogin)?;

        let local_time = self.last_sync_time().await?;
        let remote = self.fetch_last_sync_time(&login).await?;

        if remote.sync_time == -1 && with_export {
            tracing::debug!("no account data stored yet; exporting");
            self.export_data().await
        } else if local_time < remote.sync_time {
            tracing::debug!(local_time, remote_time = remote.sync_time, "importing account data");
            self.import_data().await
        } else if with_export {
            let data = self.download_data().await?;
            let fingerprint = compute_fingerprint(&data)?;

            if fingerprint == remote.hash {
                tracing::debug!("account data is up to date");
                return Ok(AccountSyncOutcome::None);
            }

            tracing::debug!("account data changed; exporting");
            let time = self.send_data(&login, &data, fingerprint).await?;
            self.set_last_sync_time(time).await?;
            Ok(AccountSyncOutcome::Exported)
        } else {
            tracing::debug!("account data is up to date");
            Ok(AccountSyncOutcome::None)
        }
    }

    pub async fn export_data(&self) -> SyncResult<AccountSyncOutcome> {
        let login = self.login.get().ok_or(SyncError::NoLogin)?;

        let data = self.download_data().await?;
        let fingerprint = compute_fingerprint(&data)?;
        let time = self.send_data(&login, &data, fingerprint).await?;
        self.set_last_sync_time(time).await?;

        tracing::info!(time, "account data exported");
        Ok(AccountSyncOutcome::Exported)
    }

    pub async fn import_data(&self) -> SyncResult<AccountSyncOutcome> {
        let login = self.login.get().ok_or(SyncError::NoLogin)?;

        let Some(data) = self.receive_data(&login).await? else {
            return Ok(AccountSyncOutcome::None);
        };
        let remote = self.fetch_last_sync_time(&login).await?;

        self.source.import_data(&data).await?;
        self.set_last_sync_time(remote.sync_time).await?;

        tracing::info!(time = remote.sync_time, "account data imported");
        Ok(AccountSyncOutcome::Imported)
    }

    /// Export from the platform without the excluded parts.
    async fn download_data(&self) -> SyncResult<String> {
        let raw = self.source.export_data().await?;
        let mut json: Value = serde_json::from_str(&raw)?;
        for path in EXPORT_EXCLUDED {
            delete_prop(path, &mut json);
        }
        Ok(serde_json::to_string(&json)?)
    }

    async fn send_data(&self, login: &Login, data: &str, fingerprint: String) -> SyncResult<i64> {
        let cipher = login.digest().derive_key(CIPHER_TAG)?;
        let body = AccountDataUpdate {
            expected_last_sync: self.last_sync_time().await?,
            hash: fingerprint,
            data: cipher.seal(data.as_bytes(), &[])?,
        };

        Ok(self
            .remote
            .put_account_data(login.api_credentials(), &body)
            .await?
            .time)
    }

    async fn receive_data(&self, login: &Login) -> SyncResult<Option<String>> {
        let sealed = match self.remote.account_data(login.api_credentials()).await {
            Ok(d) => d.data,
            Err(e) if e.is_status(404) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cipher = login.digest().derive_key(CIPHER_TAG)?;
        Ok(Some(cipher.open_string(&sealed, &[])?))
    }

    async fn fetch_last_sync_time(&self, login: &Login) -> SyncResult<SyncTimeWithHash> {
        match self
            .remote
            .account_last_sync_time(login.api_credentials())
            .await
        {
            Ok(t) => Ok(t),
            Err(e) if e.is_status(404) => Ok(SyncTimeWithHash {
                sync_time: -1,
                hash: String::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn last_sync_time(&self) -> SyncResult<i64> {
        let times: BTreeMap<String, i64> = self
            .local
            .get_or(INVIDIOUS_LAST_SYNC_TIMES, BTreeMap::new())
            .await?;
        Ok(times.get(&self.domain).copied().unwrap_or(-1))
    }

    async fn set_last_sync_time(&self, time: i64) -> SyncResult<()> {
        let mut times: BTreeMap<String, i64> = self
            .local
            .get_or(INVIDIOUS_LAST_SYNC_TIMES, BTreeMap::new())
            .await?;
        times.insert(self.domain.clone(), time);
        Ok(self.local.set(INVIDIOUS_LAST_SYNC_TIMES, &times).await?)
    }
}

/// SHA-256 (lowercase hex) of the data without instance-specific preferences.
pub fn compute_fingerprint(data: &str) -> SyncResult<String> {
    let mut json: Value = serde_json::from_str(data)?;
    for path in FINGERPRINT_EXCLUDED {
        delete_prop(path, &mut json);
    }
    let trimmed = serde_json::to_string(&json)?;
    Ok(hex::encode(Sha256::digest(trimmed.as_bytes())))
}

/// Remove the property at a dot-separated `path`. Missing parents are ignored.
fn delete_prop(path: &str, json: &mut Value) {
    let (parents, last) = match path.rsplit_once('.') {
        Some((parents, last)) => (Some(parents), last),
        None => (None, path),
    };

    let mut current = json;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        let Some(next) = current.get_mut(segment) else {
            return;
        };
        current = next;
    }

    if let Some(obj) = current.as_object_mut() {
        obj.remove(last);
    }
}
