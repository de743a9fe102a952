//! Encrypted remote entry store.
//!
//! Every logical entry is a JSON value under a plaintext key. Locally it lives
//! in up to two slots:
//!   - synced: the last content known to match the server, with the server time
//!   - unsynced: a local write the server has not confirmed yet; wins for reads
//!
//! Remotely, the key is encrypted deterministically (so lookups work) and the
//! value is sealed under a per-key sub-key with a random nonce and the
//! encrypted key as AAD.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use vidsync_core::keys::{DELETED_ENTRIES, ENTRY_PREFIX, ENTRY_UNSYNCED_PREFIX};
use vidsync_core::now_millis;
use vidsync_core::types::{DataPost, DataPut, Entry};
use vidsync_crypto::Login;
use vidsync_storage::{LocalStore, LocalStoreExt};

use crate::api::ExtensionDataApi;
use crate::error::{SyncConflict, SyncError, SyncResult};
use crate::lock::SyncLatch;
use crate::session::LoginSlot;
use crate::warn::WarningPublisher;

/// HKDF tag for remote key names
const KEY_TAG: &str = "ExtensionDataSync-key--";
/// HKDF tag prefix for entry values; the plaintext key is appended
const CIPHER_TAG: &str = "ExtensionDataSync-cipher--";

const REMOTE_FAIL_WARNING: &str = "failed to sync with remote; data may be inconsistent";

/// Sentinel for "no expectation": newer side wins, no conflict possible.
const ANY_REMOTE_TIME: i64 = -1;

#[derive(Debug, Default)]
struct StoredKeys {
    synced: BTreeSet<String>,
    unsynced: BTreeSet<String>,
}

impl StoredKeys {
    fn all(&self) -> BTreeSet<String> {
        self.synced.union(&self.unsynced).cloned().collect()
    }
}

pub struct EntryStore {
    remote: Arc<dyn ExtensionDataApi>,
    local: Arc<dyn LocalStore>,
    login: LoginSlot,
    latch: SyncLatch,
    warnings: WarningPublisher,
}

impl EntryStore {
    pub fn new(
        remote: Arc<dyn ExtensionDataApi>,
        local: Arc<dyn LocalStore>,
        login: LoginSlot,
        warnings: WarningPublisher,
    ) -> Self {
        Self {
            remote,
            local,
            login,
            latch: SyncLatch::new(),
            warnings,
        }
    }

    pub fn login_slot(&self) -> &LoginSlot {
        &self.login
    }

    pub fn warnings(&self) -> &WarningPublisher {
        &self.warnings
    }

    pub fn has_login(&self) -> bool {
        self.login.is_set()
    }

    /// Swap the session. With `clear_storage`, every local entry is dropped
    /// once a running sync has finished.
    pub async fn set_login(&self, login: Option<Login>, clear_storage: bool) -> SyncResult<()> {
        self.login.set(login);

        if clear_storage {
            self.latch.wait().await;
            self.clear_storage().await?;
        }
        Ok(())
    }

    /// Full reconciliation pass.
    ///
    /// Concurrent callers do not start a second pass; they wait for the
    /// running one and return. Per-key failures are collected and returned
    /// together as [`SyncError::Aggregate`].
    pub async fn sync(&self) -> SyncResult<()> {
        let Some(login) = self.login.get() else {
            return Ok(());
        };

        let Some(_guard) = self.latch.try_lock() else {
            tracing::debug!("sync already running; waiting for it");
            self.latch.wait().await;
            return Ok(());
        };

        let stored = self.list_stored_keys().await?;
        let remote_keys = self.remote.all_keys(login.api_credentials()).await?;

        let mut remote_times = BTreeMap::new();
        for k in remote_keys {
            let key = decrypt_remote_key(&login, &k.key)?;
            remote_times.insert(key, k.sync_time);
        }

        let mut errors = Vec::new();

        let (deleted, still_pending) = self.sync_deleted(&login, &mut errors).await?;
        for key in &deleted {
            remote_times.remove(key);
        }

        // a delete that failed again must not bring the entry back
        let adoptable: BTreeMap<String, i64> = remote_times
            .iter()
            .filter(|(key, _)| !still_pending.contains(*key))
            .map(|(key, &time)| (key.clone(), time))
            .collect();

        self.sync_missing_local(&login, &stored, &adoptable, &mut errors)
            .await;
        self.sync_missing_remote(&login, &stored, &remote_times, &mut errors)
            .await;
        self.sync_existing(&login, &stored, &remote_times, &mut errors)
            .await;

        if errors.is_empty() {
            tracing::info!(
                local = stored.all().len(),
                remote = remote_times.len(),
                "sync pass complete"
            );
            Ok(())
        } else {
            tracing::warn!(failed = errors.len(), "sync pass finished with errors");
            Err(SyncError::Aggregate(errors))
        }
    }

    /// All known keys starting with `prefix`. The remote listing is best-effort.
    pub async fn get_keys(
        &self,
        prefix: &str,
        include_unsynced: bool,
    ) -> SyncResult<BTreeSet<String>> {
        let mut keys = BTreeSet::new();

        if let Some(login) = self.login.get() {
            self.latch.wait().await;

            match self.remote_keys(&login).await {
                Ok(remote) => keys.extend(remote),
                Err(e) => {
                    self.report_remote_failure(
                        "failed to receive remote keys; only local keys are returned",
                        &e,
                    )
                    .await
                }
            }
        }

        let local = self.list_stored_keys().await?;
        keys.extend(local.synced);
        if include_unsynced {
            keys.extend(local.unsynced);
        }

        keys.retain(|k| k.starts_with(prefix));
        Ok(keys)
    }

    pub async fn has_key(&self, key: &str) -> SyncResult<bool> {
        Ok(self.get_keys(key, true).await?.contains(key))
    }

    /// Latest known content of `key`.
    ///
    /// An unsynced local write is returned without touching the network.
    /// Otherwise the remote copy is fetched if it is newer. Network failures
    /// fall back to the local copy when there is one.
    pub async fn get_entry<T: DeserializeOwned>(&self, key: &str) -> SyncResult<T> {
        self.latch.wait().await;

        if let Some(unsynced) = self.local_slot(&unsynced_slot(key)).await? {
            tracing::debug!(key, "returning unsynced copy");
            return Ok(serde_json::from_value(unsynced.content)?);
        }

        let local = self.local_slot(&synced_slot(key)).await?;

        let Some(login) = self.login.get() else {
            return match local {
                Some(entry) => Ok(serde_json::from_value(entry.content)?),
                None => Err(SyncError::NotStored(key.to_string())),
            };
        };

        match self.fetch_if_newer(&login, key, local.as_ref()).await {
            Ok(Some(content)) => {
                tracing::debug!(key, "returning remote copy");
                Ok(serde_json::from_value(content)?)
            }
            Ok(None) => match local {
                Some(entry) => Ok(serde_json::from_value(entry.content)?),
                None => Err(SyncError::NotStored(key.to_string())),
            },
            Err(e) => {
                self.report_remote_failure(
                    "exception while syncing entry; returning local copy if available",
                    &e,
                )
                .await;
                match local {
                    Some(entry) => Ok(serde_json::from_value(entry.content)?),
                    None => Err(e),
                }
            }
        }
    }

    /// Pure local read. With `allow_unsynced`, the unsynced slot wins.
    pub async fn get_local_entry<T: DeserializeOwned>(
        &self,
        key: &str,
        allow_unsynced: bool,
    ) -> SyncResult<Option<T>> {
        if allow_unsynced {
            if let Some(entry) = self.local_slot(&unsynced_slot(key)).await? {
                return Ok(Some(serde_json::from_value(entry.content)?));
            }
        }

        match self.local_slot(&synced_slot(key)).await? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.content)?)),
            None => Ok(None),
        }
    }

    /// Store `value` locally as unsynced and try to push it right away.
    ///
    /// Only local failures are returned. A failed push is reported through
    /// the warning publisher and leaves the write for the next [`sync`](Self::sync).
    pub async fn set_entry<T: Serialize + Sync>(&self, key: &str, value: &T) -> SyncResult<()> {
        self.latch.wait().await;

        let content = serde_json::to_value(value)?;
        self.local
            .set(
                &unsynced_slot(key),
                &Entry {
                    content: &content,
                    time: now_millis(),
                },
            )
            .await?;

        let Some(login) = self.login.get() else {
            return Ok(());
        };

        match self.send_entry(&login, key, &content, false).await {
            Ok(time) => {
                self.local.delete(&unsynced_slot(key)).await?;
                self.local
                    .set(&synced_slot(key), &Entry { content, time })
                    .await?;
                tracing::debug!(key, time, "entry pushed");
            }
            Err(e) => {
                self.report_remote_failure("failed to push entry; keeping it as unsynced", &e)
                    .await;
            }
        }
        Ok(())
    }

    /// Delete locally, then remotely. A failed remote delete is retried by the next sync.
    pub async fn delete_entry(&self, key: &str) -> SyncResult<()> {
        self.delete_entry_local(key).await?;

        let Some(login) = self.login.get() else {
            return Ok(());
        };

        if let Err(e) = self.delete_remote(&login, key).await {
            self.report_remote_failure(
                "failed to delete remote copy; marked for deletion on next sync",
                &e,
            )
            .await;

            let mut deleted: Vec<String> = self.local.get_or(DELETED_ENTRIES, Vec::new()).await?;
            if !deleted.iter().any(|k| k == key) {
                deleted.push(key.to_string());
                self.local.set(DELETED_ENTRIES, &deleted).await?;
            }
        }
        Ok(())
    }

    pub async fn delete_entry_local(&self, key: &str) -> SyncResult<()> {
        self.latch.wait().await;

        self.local.delete(&synced_slot(key)).await?;
        self.local.delete(&unsynced_slot(key)).await?;
        Ok(())
    }

    /// Settle a conflict on `key`: force-push the local copy, or adopt the remote one.
    pub async fn resolve_conflict(&self, key: &str, use_local: bool) -> SyncResult<()> {
        self.latch.wait().await;

        let login = self.login.get().ok_or(SyncError::NoLogin)?;

        if use_local {
            let entry = match self.local_slot(&unsynced_slot(key)).await? {
                Some(entry) => entry,
                None => self
                    .local_slot(&synced_slot(key))
                    .await?
                    .ok_or_else(|| SyncError::NotStored(key.to_string()))?,
            };

            let time = self.send_entry(&login, key, &entry.content, true).await?;

            self.local.delete(&unsynced_slot(key)).await?;
            self.local
                .set(
                    &synced_slot(key),
                    &Entry {
                        content: entry.content,
                        time,
                    },
                )
                .await?;
            tracing::info!(key, time, "conflict resolved with local copy");
        } else {
            let content = self.receive_entry(&login, key).await?;
            let remote_key = encrypt_remote_key(&login, key)?;
            let time = self
                .remote
                .last_sync_time(login.api_credentials(), &remote_key)
                .await?
                .time;

            self.local.delete(&unsynced_slot(key)).await?;
            self.local
                .set(&synced_slot(key), &Entry { content, time })
                .await?;
            tracing::info!(key, time, "conflict resolved with remote copy");
        }
        Ok(())
    }

    // ── sync pass steps ───────────────────────────────────────────────────────

    /// Retry pending remote deletes. Returns the keys that are gone remotely
    /// now and the keys whose delete is still pending.
    async fn sync_deleted(
        &self,
        login: &Login,
        errors: &mut Vec<SyncError>,
    ) -> SyncResult<(BTreeSet<String>, BTreeSet<String>)> {
        let pending: Vec<String> = self.local.get_or(DELETED_ENTRIES, Vec::new()).await?;
        if pending.is_empty() {
            return Ok((BTreeSet::new(), BTreeSet::new()));
        }

        let results = join_all(pending.iter().map(|key| self.delete_remote(login, key))).await;

        let mut deleted = BTreeSet::new();
        let mut failed = Vec::new();
        for (key, result) in pending.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    deleted.insert(key);
                }
                Err(e) => {
                    failed.push(key);
                    errors.push(e);
                }
            }
        }

        tracing::debug!(
            deleted = deleted.len(),
            failed = failed.len(),
            "pending deletions flushed"
        );
        self.local.set(DELETED_ENTRIES, &failed).await?;
        Ok((deleted, failed.into_iter().collect()))
    }

    /// Download entries that only exist remotely.
    async fn sync_missing_local(
        &self,
        login: &Login,
        stored: &StoredKeys,
        remote: &BTreeMap<String, i64>,
        errors: &mut Vec<SyncError>,
    ) {
        let local = stored.all();
        let tasks = remote
            .iter()
            .filter(|(key, _)| !local.contains(*key))
            .map(|(key, &time)| async move {
                let content = self.receive_entry(login, key).await?;
                self.local
                    .set(&synced_slot(key), &Entry { content, time })
                    .await?;
                tracing::debug!(key = %key, time, "adopted remote entry");
                Ok::<_, SyncError>(())
            });

        collect_errors(join_all(tasks).await, errors);
    }

    /// Upload entries that only exist locally. Unsynced writes go first.
    async fn sync_missing_remote(
        &self,
        login: &Login,
        stored: &StoredKeys,
        remote: &BTreeMap<String, i64>,
        errors: &mut Vec<SyncError>,
    ) {
        let unsynced = stored
            .unsynced
            .iter()
            .filter(|key| !remote.contains_key(*key))
            .map(|key| async move {
                let entry = self.required_slot(&unsynced_slot(key)).await?;
                let time = self.send_entry(login, key, &entry.content, false).await?;
                self.local
                    .set(
                        &synced_slot(key),
                        &Entry {
                            content: entry.content,
                            time,
                        },
                    )
                    .await?;
                self.local.delete(&unsynced_slot(key)).await?;
                tracing::debug!(key = %key, time, "pushed unsynced entry");
                Ok::<_, SyncError>(())
            });
        collect_errors(join_all(unsynced).await, errors);

        let synced = stored
            .synced
            .iter()
            .filter(|key| !remote.contains_key(*key) && !stored.unsynced.contains(*key))
            .map(|key| async move {
                let entry = self.required_slot(&synced_slot(key)).await?;
                let time = self.send_entry(login, key, &entry.content, false).await?;
                self.local
                    .set(
                        &synced_slot(key),
                        &Entry {
                            content: entry.content,
                            time,
                        },
                    )
                    .await?;
                tracing::debug!(key = %key, time, "re-created remote entry");
                Ok::<_, SyncError>(())
            });
        collect_errors(join_all(synced).await, errors);
    }

    /// Reconcile entries present on both sides.
    async fn sync_existing(
        &self,
        login: &Login,
        stored: &StoredKeys,
        remote: &BTreeMap<String, i64>,
        errors: &mut Vec<SyncError>,
    ) {
        let unsynced = stored
            .unsynced
            .iter()
            .filter(|key| remote.contains_key(*key))
            .map(|key| async move {
                let entry = self.required_slot(&unsynced_slot(key)).await?;
                let past = self
                    .local_slot(&synced_slot(key))
                    .await?
                    .ok_or_else(|| {
                        SyncError::Assertion(format!(
                            "unsynced entry '{key}' has no previously synced version"
                        ))
                    })?;

                let synced = self.sync_entry(login, key, entry, past.time).await?;
                self.local.set(&synced_slot(key), &synced).await?;
                self.local.delete(&unsynced_slot(key)).await?;
                Ok::<_, SyncError>(())
            });
        collect_errors(join_all(unsynced).await, errors);

        let synced = stored
            .synced
            .iter()
            .filter(|key| remote.contains_key(*key) && !stored.unsynced.contains(*key))
            .map(|key| async move {
                let entry = self.required_slot(&synced_slot(key)).await?;
                let synced = self.sync_entry(login, key, entry, ANY_REMOTE_TIME).await?;
                self.local.set(&synced_slot(key), &synced).await?;
                Ok::<_, SyncError>(())
            });
        collect_errors(join_all(synced).await, errors);
    }

    /// Send or receive one entry.
    ///
    /// With `expected_remote_time == -1` the newer side wins. Otherwise the
    /// remote time must equal `expected_remote_time` or the key is in conflict.
    async fn sync_entry(
        &self,
        login: &Login,
        key: &str,
        entry: Entry<Value>,
        expected_remote_time: i64,
    ) -> SyncResult<Entry<Value>> {
        let remote_key = encrypt_remote_key(login, key)?;
        let remote_time = self
            .remote
            .last_sync_time(login.api_credentials(), &remote_key)
            .await?
            .time;

        if expected_remote_time != ANY_REMOTE_TIME {
            if remote_time != expected_remote_time {
                tracing::debug!(key, remote_time, expected_remote_time, "remote changed since last sync");
                return Err(SyncConflict::new(key, None).into());
            }

            // remote is unchanged since the last sync, so the pending write is newer
            tracing::debug!(key, remote_time, "pushing pending local write");
            let time = self.send_entry(login, key, &entry.content, false).await?;
            return Ok(Entry {
                content: entry.content,
                time,
            });
        }

        if remote_time > entry.time {
            tracing::debug!(key, remote_time, local_time = entry.time, "remote is newer");
            let content = self.receive_entry(login, key).await?;
            Ok(Entry {
                content,
                time: remote_time,
            })
        } else {
            Ok(entry)
        }
    }

    // ── remote primitives ─────────────────────────────────────────────────────

    /// Create or update `key` remotely. Returns the new server time.
    async fn send_entry(
        &self,
        login: &Login,
        key: &str,
        content: &Value,
        force: bool,
    ) -> SyncResult<i64> {
        let remote_key = encrypt_remote_key(login, key)?;
        let data = encrypt_entry_data(login, key, &remote_key, content)?;

        let Some(old) = self.local_slot(&synced_slot(key)).await? else {
            return self.create_entry(login, key, &remote_key, data).await;
        };

        let body = DataPut {
            data,
            force,
            expected_last_sync: old.time,
        };
        match self
            .remote
            .put_data(login.api_credentials(), &remote_key, &body)
            .await
        {
            Ok(time) => Ok(time.time),
            Err(e) if e.is_status(409) || e.is_status(412) => {
                Err(SyncConflict::new(key, Some(e)).into())
            }
            Err(e) if e.is_status(404) => {
                tracing::warn!(key, "entry is missing remotely although it was synced; recreating it");
                self.create_entry(login, key, &remote_key, body.data).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_entry(
        &self,
        login: &Login,
        key: &str,
        remote_key: &str,
        data: String,
    ) -> SyncResult<i64> {
        let created = self
            .remote
            .post_data(login.api_credentials(), remote_key, &DataPost { data })
            .await
            .map_err(|e| {
                if e.is_status(409) {
                    tracing::error!(key, "remote has the key stored but local is missing it");
                    SyncError::from(SyncConflict::new(key, Some(e)))
                } else {
                    e.into()
                }
            })?;

        if created.key != remote_key {
            return Err(SyncError::Assertion(
                "data post responded with a different key".into(),
            ));
        }
        Ok(created.sync_time)
    }

    async fn receive_entry(&self, login: &Login, key: &str) -> SyncResult<Value> {
        let remote_key = encrypt_remote_key(login, key)?;
        let data = self
            .remote
            .get_data(login.api_credentials(), &remote_key)
            .await?;
        decrypt_entry_data(login, key, &remote_key, &data)
    }

    /// Remote content if the remote copy is newer than `local`.
    async fn fetch_if_newer(
        &self,
        login: &Login,
        key: &str,
        local: Option<&Entry<Value>>,
    ) -> SyncResult<Option<Value>> {
        let remote_key = encrypt_remote_key(login, key)?;
        let remote_time = match self
            .remote
            .last_sync_time(login.api_credentials(), &remote_key)
            .await
        {
            Ok(t) => t.time,
            Err(e) if e.is_status(404) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if remote_time <= local.map_or(ANY_REMOTE_TIME, |e| e.time) {
            return Ok(None);
        }

        let content = self.receive_entry(login, key).await?;
        self.local
            .set(
                &synced_slot(key),
                &Entry {
                    content: &content,
                    time: remote_time,
                },
            )
            .await?;
        Ok(Some(content))
    }

    /// Remote delete where an already missing entry counts as deleted.
    async fn delete_remote(&self, login: &Login, key: &str) -> SyncResult<()> {
        let remote_key = encrypt_remote_key(login, key)?;
        match self
            .remote
            .delete_entry(login.api_credentials(), &remote_key)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_status(404) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remote_keys(&self, login: &Login) -> SyncResult<Vec<String>> {
        let keys = self.remote.all_keys(login.api_credentials()).await?;
        keys.iter()
            .map(|k| decrypt_remote_key(login, &k.key))
            .collect()
    }

    // ── local slots ───────────────────────────────────────────────────────────

    async fn local_slot(&self, slot: &str) -> SyncResult<Option<Entry<Value>>> {
        Ok(self.local.get(slot).await?)
    }

    async fn required_slot(&self, slot: &str) -> SyncResult<Entry<Value>> {
        self.local_slot(slot)
            .await?
            .ok_or_else(|| SyncError::Assertion(format!("local slot '{slot}' vanished during sync")))
    }

    async fn list_stored_keys(&self) -> SyncResult<StoredKeys> {
        let mut stored = StoredKeys::default();
        for key in self.local.list_keys().await? {
            if let Some(k) = key.strip_prefix(ENTRY_UNSYNCED_PREFIX) {
                stored.unsynced.insert(k.to_string());
            } else if let Some(k) = key.strip_prefix(ENTRY_PREFIX) {
                stored.synced.insert(k.to_string());
            }
        }
        Ok(stored)
    }

    async fn clear_storage(&self) -> SyncResult<()> {
        let mut cleared = 0usize;
        for key in self.local.list_keys().await? {
            if key.starts_with(ENTRY_PREFIX)
                || key.starts_with(ENTRY_UNSYNCED_PREFIX)
                || key == DELETED_ENTRIES
            {
                self.local.delete(&key).await?;
                cleared += 1;
            }
        }
        tracing::info!(cleared, "local entry storage cleared");
        Ok(())
    }

    async fn report_remote_failure(&self, message: &str, error: &SyncError) {
        tracing::warn!(error = %error, "{message}");
        self.warnings.publish(REMOTE_FAIL_WARNING, Some(error)).await;
    }
}

impl std::fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("logged_in", &self.login.is_set())
            .field("syncing", &self.latch.is_locked())
            .finish()
    }
}

fn synced_slot(key: &str) -> String {
    format!("{ENTRY_PREFIX}{key}")
}

fn unsynced_slot(key: &str) -> String {
    format!("{ENTRY_UNSYNCED_PREFIX}{key}")
}

fn collect_errors(results: Vec<SyncResult<()>>, errors: &mut Vec<SyncError>) {
    errors.extend(results.into_iter().filter_map(Result::err));
}

fn encrypt_remote_key(login: &Login, key: &str) -> SyncResult<String> {
    Ok(login.digest().encrypt_string(KEY_TAG, key)?)
}

fn decrypt_remote_key(login: &Login, remote_key: &str) -> SyncResult<String> {
    Ok(login.digest().decrypt_string(KEY_TAG, remote_key)?)
}

fn encrypt_entry_data(
    login: &Login,
    key: &str,
    remote_key: &str,
    content: &Value,
) -> SyncResult<String> {
    let cipher = login.digest().derive_key(&format!("{CIPHER_TAG}{key}"))?;
    let plaintext = serde_json::to_vec(content)?;
    Ok(cipher.seal(&plaintext, remote_key.as_bytes())?)
}

fn decrypt_entry_data(
    login: &Login,
    key: &str,
    remote_key: &str,
    data: &str,
) -> SyncResult<Value> {
    let cipher = login.digest().derive_key(&format!("{CIPHER_TAG}{key}"))?;
    let plaintext = cipher.open(data, remote_key.as_bytes())?;
    serde_json::from_slice(&plaintext).map_err(|e| {
        SyncError::Assertion(format!("entry '{key}' does not decrypt to JSON: {e}"))
    })
}
