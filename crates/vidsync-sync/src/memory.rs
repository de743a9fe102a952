//! In-memory sync server for tests and offline development.
//!
//! Honours the same status codes as the real server: 401 on a password
//! mismatch, 404 for missing entries, 409 on create-if-exists and on an
//! `expectedLastSync` mismatch without `force`. Toggle [`MemoryRemote::set_online`]
//! to simulate network loss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use secrecy::ExposeSecret;

use vidsync_core::now_millis;
use vidsync_core::types::{
    AccountDataUpdate, DataGet, DataPost, DataPut, DownloadId, DownloadJobState, DownloadProgress,
    DownloadRequest, FileExtension, FileType, KeyWithSyncTime, Registration, SyncTime,
    SyncTimeWithHash,
};
use vidsync_crypto::ApiCredentials;

use crate::api::{AccountDataApi, DownloadApi, ExtensionDataApi, TransportResult, UserApi};
use crate::error::TransportError;

#[derive(Debug, Clone)]
struct StoredEntry {
    data: String,
    time: i64,
}

#[derive(Debug, Clone)]
struct StoredAccountData {
    data: String,
    hash: String,
    time: i64,
}

#[derive(Debug, Clone)]
struct StoredDownload {
    state: DownloadJobState,
    progress: f32,
    dest_type: FileType,
    failing: bool,
}

#[derive(Debug, Default)]
struct UserData {
    password: Option<String>,
    entries: HashMap<String, StoredEntry>,
    account: Option<StoredAccountData>,
    downloads: HashMap<String, StoredDownload>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, UserData>,
    last_time: i64,
}

impl State {
    /// Strictly increasing server time.
    fn next_time(&mut self) -> i64 {
        let time = now_millis().max(self.last_time + 1);
        self.last_time = time;
        time
    }
}

#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<State>,
    online: AtomicBool,
    next_job: AtomicU64,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            online: AtomicBool::new(true),
            next_job: AtomicU64::new(1),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Encrypted entries of `username` as `(remote key, payload, time)`.
    pub fn raw_entries(&self, username: &str) -> Vec<(String, String, i64)> {
        let state = self.lock();
        let mut entries: Vec<_> = state
            .users
            .get(username)
            .map(|user| {
                user.entries
                    .iter()
                    .map(|(k, e)| (k.clone(), e.data.clone(), e.time))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort();
        entries
    }

    /// Move a download job to `state`.
    pub fn set_download_state(&self, username: &str, id: &str, state: DownloadJobState, progress: f32) {
        let mut guard = self.lock();
        if let Some(job) = guard
            .users
            .get_mut(username)
            .and_then(|u| u.downloads.get_mut(id))
        {
            job.state = state;
            job.progress = progress;
        }
    }

    /// Make progress polls for a job answer 500.
    pub fn fail_download_progress(&self, username: &str, id: &str, failing: bool) {
        let mut guard = self.lock();
        if let Some(job) = guard
            .users
            .get_mut(username)
            .and_then(|u| u.downloads.get_mut(id))
        {
            job.failing = failing;
        }
    }

    pub fn has_download(&self, username: &str, id: &str) -> bool {
        self.lock()
            .users
            .get(username)
            .is_some_and(|u| u.downloads.contains_key(id))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self, path: &str) -> TransportResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(TransportError::Network {
                url: path.to_string(),
                message: "remote is offline".into(),
            })
        }
    }

    /// Lock the state and authenticate. Unknown users are created on first use.
    fn user<'a>(
        &self,
        state: &'a mut State,
        auth: &ApiCredentials,
        path: &str,
    ) -> TransportResult<&'a mut UserData> {
        let user = state.users.entry(auth.username.clone()).or_default();
        match &user.password {
            Some(password) if password != auth.password.expose_secret() => {
                Err(status(path, 401, "invalid credentials"))
            }
            _ => Ok(user),
        }
    }
}

fn status(path: &str, status: u16, body: &str) -> TransportError {
    TransportError::Status {
        url: path.to_string(),
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl ExtensionDataApi for MemoryRemote {
    async fn all_keys(&self, auth: &ApiCredentials) -> TransportResult<Vec<KeyWithSyncTime>> {
        let path = "/sync/extension/allKeys";
        self.check_online(path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, path)?;
        let mut keys: Vec<_> = user
            .entries
            .iter()
            .map(|(key, e)| KeyWithSyncTime {
                key: key.clone(),
                sync_time: e.time,
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(keys)
    }

    async fn last_sync_time(&self, auth: &ApiCredentials, key: &str) -> TransportResult<SyncTime> {
        let path = format!("/sync/extension/entry/{key}/lastSyncTime");
        self.check_online(&path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, &path)?;
        user.entries
            .get(key)
            .map(|e| SyncTime { time: e.time })
            .ok_or_else(|| status(&path, 404, "entry not found"))
    }

    async fn get_data(&self, auth: &ApiCredentials, key: &str) -> TransportResult<String> {
        let path = format!("/sync/extension/entry/{key}/data");
        self.check_online(&path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, &path)?;
        user.entries
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| status(&path, 404, "entry not found"))
    }

    async fn post_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPost,
    ) -> TransportResult<KeyWithSyncTime> {
        let path = format!("/sync/extension/entry/{key}/data");
        self.check_online(&path)?;
        let mut state = self.lock();
        let time = state.next_time();
        let user = self.user(&mut state, auth, &path)?;
        if user.entries.contains_key(key) {
            return Err(status(&path, 409, "entry already exists"));
        }
        user.entries.insert(
            key.to_string(),
            StoredEntry {
                data: body.data.clone(),
                time,
            },
        );
        Ok(KeyWithSyncTime {
            key: key.to_string(),
            sync_time: time,
        })
    }

    async fn put_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPut,
    ) -> TransportResult<SyncTime> {
        let path = format!("/sync/extension/entry/{key}/data");
        self.check_online(&path)?;
        let mut state = self.lock();
        let time = state.next_time();
        let user = self.user(&mut state, auth, &path)?;
        let entry = user
            .entries
            .get_mut(key)
            .ok_or_else(|| status(&path, 404, "entry not found"))?;
        if !body.force && entry.time != body.expected_last_sync {
            return Err(status(&path, 409, "expectedLastSync does not match"));
        }
        entry.data = body.data.clone();
        entry.time = time;
        Ok(SyncTime { time })
    }

    async fn delete_entry(&self, auth: &ApiCredentials, key: &str) -> TransportResult<()> {
        let path = format!("/sync/extension/entry/{key}");
        self.check_online(&path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, &path)?;
        user.entries.remove(key);
        Ok(())
    }
}

#[async_trait]
impl AccountDataApi for MemoryRemote {
    async fn account_last_sync_time(
        &self,
        auth: &ApiCredentials,
    ) -> TransportResult<SyncTimeWithHash> {
        let path = "/sync/invidious/lastSyncTime";
        self.check_online(path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, path)?;
        user.account
            .as_ref()
            .map(|a| SyncTimeWithHash {
                sync_time: a.time,
                hash: a.hash.clone(),
            })
            .ok_or_else(|| status(path, 404, "no data stored"))
    }

    async fn account_data(&self, auth: &ApiCredentials) -> TransportResult<DataGet> {
        let path = "/sync/invidious/data";
        self.check_online(path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, path)?;
        user.account
            .as_ref()
            .map(|a| DataGet {
                data: a.data.clone(),
            })
            .ok_or_else(|| status(path, 404, "no data stored"))
    }

    async fn put_account_data(
        &self,
        auth: &ApiCredentials,
        body: &AccountDataUpdate,
    ) -> TransportResult<SyncTime> {
        let path = "/sync/invidious/data";
        self.check_online(path)?;
        let mut state = self.lock();
        let time = state.next_time();
        let user = self.user(&mut state, auth, path)?;
        if let Some(current) = &user.account {
            if current.time != body.expected_last_sync {
                return Err(status(path, 409, "expectedLastSync does not match"));
            }
        }
        user.account = Some(StoredAccountData {
            data: body.data.clone(),
            hash: body.hash.clone(),
            time,
        });
        Ok(SyncTime { time })
    }
}

#[async_trait]
impl DownloadApi for MemoryRemote {
    async fn request_download(
        &self,
        auth: &ApiCredentials,
        body: &DownloadRequest,
    ) -> TransportResult<DownloadId> {
        let path = "/download";
        self.check_online(path)?;
        let id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
        let mut state = self.lock();
        let user = self.user(&mut state, auth, path)?;
        user.downloads.insert(
            id.clone(),
            StoredDownload {
                state: DownloadJobState::Init,
                progress: 0.0,
                dest_type: body.dest_type,
                failing: false,
            },
        );
        Ok(DownloadId { id })
    }

    async fn download_progress(
        &self,
        auth: &ApiCredentials,
        id: &str,
    ) -> TransportResult<DownloadProgress> {
        let path = format!("/download/progress?id={id}");
        self.check_online(&path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, &path)?;
        let job = user
            .downloads
            .get(id)
            .ok_or_else(|| status(&path, 404, "job not found"))?;
        if job.failing {
            return Err(status(&path, 500, "progress unavailable"));
        }
        Ok(DownloadProgress {
            id: id.to_string(),
            state: job.state,
            progress: job.progress,
        })
    }

    async fn download_extension(
        &self,
        auth: &ApiCredentials,
        id: &str,
    ) -> TransportResult<FileExtension> {
        let path = format!("/download/extension?id={id}");
        self.check_online(&path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, &path)?;
        let job = user
            .downloads
            .get(id)
            .ok_or_else(|| status(&path, 404, "job not found"))?;
        let extension = match (job.state, job.dest_type) {
            (DownloadJobState::Done, FileType::Mp3) => Some("mp3".to_string()),
            (DownloadJobState::Done, FileType::Video) => Some("mp4".to_string()),
            _ => None,
        };
        Ok(FileExtension { extension })
    }

    async fn cancel_download(&self, auth: &ApiCredentials, id: &str) -> TransportResult<()> {
        let path = format!("/download?id={id}");
        self.check_online(&path)?;
        let mut state = self.lock();
        let user = self.user(&mut state, auth, &path)?;
        user.downloads
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| status(&path, 404, "job not found"))
    }
}

#[async_trait]
impl UserApi for MemoryRemote {
    async fn register(&self, body: &Registration) -> TransportResult<()> {
        let path = "/user/register";
        self.check_online(path)?;
        let mut state = self.lock();
        let user = state.users.entry(body.username.clone()).or_default();
        if user.password.is_some() {
            return Err(status(path, 409, "user already exists"));
        }
        user.password = Some(body.password.clone());
        Ok(())
    }

    async fn test_login(&self, auth: &ApiCredentials) -> TransportResult<()> {
        let path = "/user/testLogin";
        self.check_online(path)?;
        let state = self.lock();
        match state.users.get(&auth.username).and_then(|u| u.password.as_ref()) {
            Some(password) if password == auth.password.expose_secret() => Ok(()),
            _ => Err(status(path, 401, "invalid credentials")),
        }
    }
}
