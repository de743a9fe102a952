//! Shared fixtures: devices that sync through one in-memory server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use vidsync_core::types::{DataPost, DataPut, KeyWithSyncTime, SyncTime};
use vidsync_crypto::{ApiCredentials, KdfHash, KdfParams, Login};
use vidsync_storage::MemoryStore;
use vidsync_sync::{
    ConflictCoordinator, EntryStore, ExtensionDataApi, LoginSlot, MemoryRemote, TransportError,
    TransportResult, WarningPublisher,
};

const TEST_KDF: KdfParams = KdfParams {
    version: "test",
    introduced: "2024-01-01T00:00:00Z",
    algorithm: KdfHash::Sha512,
    iterations: 16,
};

pub fn login(username: &str) -> Login {
    Login::from_credentials(
        username,
        &SecretString::from(format!("{username}-password")),
        Some(&TEST_KDF),
    )
    .expect("derive test login")
}

/// One client with its own local storage.
pub struct Device {
    pub local: Arc<MemoryStore>,
    pub login: LoginSlot,
    pub store: Arc<EntryStore>,
    pub sync: Arc<ConflictCoordinator>,
}

pub fn device(remote: &Arc<MemoryRemote>, username: &str) -> Device {
    device_on(remote.clone(), username)
}

pub fn device_on(remote: Arc<dyn ExtensionDataApi>, username: &str) -> Device {
    let local = Arc::new(MemoryStore::new());
    let login = LoginSlot::new(Some(self::login(username)));
    let store = Arc::new(EntryStore::new(
        remote,
        local.clone(),
        login.clone(),
        WarningPublisher::new(),
    ));
    let sync = Arc::new(ConflictCoordinator::new(store.clone()));
    Device {
        local,
        login,
        store,
        sync,
    }
}

/// Wraps a [`MemoryRemote`]: slows down and counts key listings, and can
/// refuse deletes while everything else keeps working.
pub struct ScriptedRemote {
    inner: Arc<MemoryRemote>,
    listing_delay: Duration,
    listings: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl ScriptedRemote {
    pub fn new(inner: Arc<MemoryRemote>, listing_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner,
            listing_delay,
            listings: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
        })
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExtensionDataApi for ScriptedRemote {
    async fn all_keys(&self, auth: &ApiCredentials) -> TransportResult<Vec<KeyWithSyncTime>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.listing_delay).await;
        self.inner.all_keys(auth).await
    }

    async fn last_sync_time(&self, auth: &ApiCredentials, key: &str) -> TransportResult<SyncTime> {
        self.inner.last_sync_time(auth, key).await
    }

    async fn get_data(&self, auth: &ApiCredentials, key: &str) -> TransportResult<String> {
        self.inner.get_data(auth, key).await
    }

    async fn post_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPost,
    ) -> TransportResult<KeyWithSyncTime> {
        self.inner.post_data(auth, key, body).await
    }

    async fn put_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPut,
    ) -> TransportResult<SyncTime> {
        self.inner.put_data(auth, key, body).await
    }

    async fn delete_entry(&self, auth: &ApiCredentials, key: &str) -> TransportResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                url: format!("/sync/extension/entry/{key}"),
                status: 503,
                body: "deletes unavailable".into(),
            });
        }
        self.inner.delete_entry(auth, key).await
    }
}
