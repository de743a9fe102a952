//! REST contract of the sync server, one trait per endpoint group.
//!
//! Keys passed to [`ExtensionDataApi`] are already encrypted. Implementations
//! only move bytes; conflict interpretation of 404/409/412 belongs to callers.

use async_trait::async_trait;
use vidsync_core::types::{
    AccountDataUpdate, DataGet, DataPost, DataPut, DownloadId, DownloadProgress, DownloadRequest,
    FileExtension, KeyWithSyncTime, Registration, SyncTime, SyncTimeWithHash,
};
use vidsync_crypto::ApiCredentials;

use crate::error::TransportError;

pub type TransportResult<T> = Result<T, TransportError>;

/// `/sync/extension`
#[async_trait]
pub trait ExtensionDataApi: Send + Sync {
    async fn all_keys(&self, auth: &ApiCredentials) -> TransportResult<Vec<KeyWithSyncTime>>;

    async fn last_sync_time(&self, auth: &ApiCredentials, key: &str) -> TransportResult<SyncTime>;

    /// The sealed `iv$ciphertext` payload
    async fn get_data(&self, auth: &ApiCredentials, key: &str) -> TransportResult<String>;

    /// 409 if the key exists
    async fn post_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPost,
    ) -> TransportResult<KeyWithSyncTime>;

    /// 409/412 on an `expected_last_sync` mismatch without `force`, 404 if missing
    async fn put_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPut,
    ) -> TransportResult<SyncTime>;

    async fn delete_entry(&self, auth: &ApiCredentials, key: &str) -> TransportResult<()>;
}

/// `/sync/invidious`
#[async_trait]
pub trait AccountDataApi: Send + Sync {
    /// 404 if nothing was stored yet
    async fn account_last_sync_time(
        &self,
        auth: &ApiCredentials,
    ) -> TransportResult<SyncTimeWithHash>;

    /// 404 if nothing was stored yet
    async fn account_data(&self, auth: &ApiCredentials) -> TransportResult<DataGet>;

    async fn put_account_data(
        &self,
        auth: &ApiCredentials,
        body: &AccountDataUpdate,
    ) -> TransportResult<SyncTime>;
}

/// `/download`
#[async_trait]
pub trait DownloadApi: Send + Sync {
    async fn request_download(
        &self,
        auth: &ApiCredentials,
        body: &DownloadRequest,
    ) -> TransportResult<DownloadId>;

    async fn download_progress(
        &self,
        auth: &ApiCredentials,
        id: &str,
    ) -> TransportResult<DownloadProgress>;

    async fn download_extension(
        &self,
        auth: &ApiCredentials,
        id: &str,
    ) -> TransportResult<FileExtension>;

    async fn cancel_download(&self, auth: &ApiCredentials, id: &str) -> TransportResult<()>;
}

/// `/user`
#[async_trait]
pub trait UserApi: Send + Sync {
    /// 409 if the user exists
    async fn register(&self, body: &Registration) -> TransportResult<()>;

    /// 204 for valid credentials
    async fn test_login(&self, auth: &ApiCredentials) -> TransportResult<()>;
}
