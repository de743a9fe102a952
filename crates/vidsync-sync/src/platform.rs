//! Capabilities the sync managers need from the video platform front-end.
//!
//! Implemented per platform outside this crate and injected into the managers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use vidsync_core::VidsyncResult;

/// Channel subscriptions and channel groups of the front-end.
#[async_trait]
pub trait SubscriptionController: Send + Sync {
    /// Subscribed channel ids
    async fn load_subscriptions(&self) -> VidsyncResult<Vec<String>>;

    async fn store_subscriptions(&self, subscriptions: &[String]) -> VidsyncResult<()>;

    /// Opaque channel group records
    async fn load_channel_groups(&self) -> VidsyncResult<Vec<Value>>;

    async fn store_channel_groups(&self, groups: &[Value]) -> VidsyncResult<()>;
}

/// Playlists the user saved from other channels.
#[async_trait]
pub trait SavedPlaylists: Send + Sync {
    async fn saved_playlists(&self) -> VidsyncResult<Vec<String>>;

    async fn subscribe(&self, playlist_id: &str) -> VidsyncResult<()>;

    async fn unsubscribe(&self, playlist_id: &str) -> VidsyncResult<()>;
}

/// Export and import of the account data of an Invidious instance.
#[async_trait]
pub trait AccountDataSource: Send + Sync {
    /// The account data as a JSON document
    async fn export_data(&self) -> VidsyncResult<String>;

    async fn import_data(&self, data: &str) -> VidsyncResult<()>;
}

/// Key-value settings of a Piped front-end (its local storage).
#[async_trait]
pub trait PipedSettingsSource: Send + Sync {
    /// Every stored setting, including auth and instance records
    async fn load_settings(&self) -> VidsyncResult<BTreeMap<String, String>>;

    /// Overwrite the given settings. Others are left alone.
    async fn store_settings(&self, settings: &BTreeMap<String, String>) -> VidsyncResult<()>;
}
