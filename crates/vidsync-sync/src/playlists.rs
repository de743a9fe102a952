//! Playlist groups and the synced set of subscribed playlists.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use vidsync_core::generate_unique_id;
use vidsync_core::keys::{
    PLAYLIST_GROUPS_PREFIX, SUBSCRIBED_PLAYLISTS, SUBSCRIBED_PLAYLISTS_INITIALIZED,
};

use crate::conflict::ConflictCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::platform::SavedPlaylists;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistsGroup {
    pub id: String,
    pub name: String,
    /// playlist ids
    pub playlists: Vec<String>,
}

pub struct PlaylistManager {
    sync: Arc<ConflictCoordinator>,
}

impl PlaylistManager {
    pub fn new(sync: Arc<ConflictCoordinator>) -> Self {
        Self { sync }
    }

    // ── groups ────────────────────────────────────────────────────────────────

    pub async fn load_groups(&self) -> SyncResult<Vec<PlaylistsGroup>> {
        let keys = self
            .sync
            .store()
            .get_keys(PLAYLIST_GROUPS_PREFIX, true)
            .await?;
        try_join_all(keys.iter().map(|key| self.sync.get_entry(key))).await
    }

    pub async fn load_group(&self, id: &str) -> SyncResult<PlaylistsGroup> {
        self.sync.get_entry(&group_key(id)).await
    }

    pub async fn groups_for_playlist(&self, playlist_id: &str) -> SyncResult<Vec<PlaylistsGroup>> {
        let mut groups = self.load_groups().await?;
        groups.retain(|g| g.playlists.iter().any(|p| p == playlist_id));
        Ok(groups)
    }

    /// Create a group, or return the existing one with the same name.
    pub async fn add_group(&self, name: &str) -> SyncResult<PlaylistsGroup> {
        let groups = self.load_groups().await?;
        if let Some(group) = groups.iter().find(|g| g.name == name) {
            return Ok(group.clone());
        }

        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        let group = PlaylistsGroup {
            id: generate_unique_id(&ids),
            name: name.to_string(),
            playlists: Vec::new(),
        };
        self.save_group(&group).await?;
        tracing::debug!(id = %group.id, name, "playlist group created");
        Ok(group)
    }

    pub async fn remove_group(&self, id: &str) -> SyncResult<()> {
        self.sync.delete_entry(&group_key(id)).await
    }

    /// Make `playlist_id` a member of exactly the groups in `group_ids`.
    pub async fn set_playlist_groups(&self, playlist_id: &str, group_ids: &[&str]) -> SyncResult<()> {
        for mut group in self.load_groups().await? {
            let member = group.playlists.iter().position(|p| p == playlist_id);
            let wanted = group_ids.contains(&group.id.as_str());

            match (wanted, member) {
                (true, None) => {
                    group.playlists.push(playlist_id.to_string());
                    self.save_group(&group).await?;
                }
                (false, Some(idx)) => {
                    group.playlists.remove(idx);
                    self.save_group(&group).await?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub async fn rename_group(&self, group: &mut PlaylistsGroup, new_name: &str) -> SyncResult<()> {
        let groups = self.load_groups().await?;
        if groups.iter().any(|g| g.name == new_name && g.id != group.id) {
            return Err(SyncError::Invalid(
                "a group with this name does already exist".into(),
            ));
        }

        group.name = new_name.to_string();
        self.save_group(group).await
    }

    async fn save_group(&self, group: &PlaylistsGroup) -> SyncResult<()> {
        self.sync.set_entry(&group_key(&group.id), group).await
    }

    // ── subscribed playlists ──────────────────────────────────────────────────

    pub async fn load_subscribed_playlists(&self) -> SyncResult<Vec<String>> {
        match self.sync.get_entry(SUBSCRIBED_PLAYLISTS).await {
            Err(SyncError::NotStored(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Record a new subscription. Returns `false` if it was already recorded.
    pub async fn add_subscribed_playlist(&self, id: &str) -> SyncResult<bool> {
        let mut stored = self.load_subscribed_playlists().await?;
        if stored.iter().any(|p| p == id) {
            tracing::warn!(id, "playlist subscription is already stored");
            return Ok(false);
        }

        stored.push(id.to_string());
        self.sync.set_entry(SUBSCRIBED_PLAYLISTS, &stored).await?;
        Ok(true)
    }

    /// Forget a subscription. Returns `false` if it was not recorded.
    pub async fn remove_subscribed_playlist(&self, id: &str) -> SyncResult<bool> {
        let mut stored = self.load_subscribed_playlists().await?;
        let Some(idx) = stored.iter().position(|p| p == id) else {
            tracing::warn!(id, "playlist subscription is not stored");
            return Ok(false);
        };

        stored.remove(idx);
        self.sync.set_entry(SUBSCRIBED_PLAYLISTS, &stored).await?;
        Ok(true)
    }

    /// Bring the platform's saved playlists in line with the synced set.
    ///
    /// The first run only records the current set. Returns whether the
    /// platform state was changed.
    pub async fn sync_subscribed_playlists(&self, platform: &dyn SavedPlaylists) -> SyncResult<bool> {
        if !self.initial_subscriptions_stored().await? {
            let current = platform.saved_playlists().await?;
            self.sync.set_entry(SUBSCRIBED_PLAYLISTS, &current).await?;
            self.sync
                .set_entry(SUBSCRIBED_PLAYLISTS_INITIALIZED, &true)
                .await?;
            tracing::debug!(count = current.len(), "initial playlist subscriptions stored");
            return Ok(false);
        }

        let expected: BTreeSet<String> = self.load_subscribed_playlists().await?.into_iter().collect();
        let actual: BTreeSet<String> = platform.saved_playlists().await?.into_iter().collect();
        let mut changed = false;

        for id in expected.difference(&actual) {
            tracing::debug!(id = %id, "subscribing to playlist");
            platform.subscribe(id).await?;
            changed = true;
        }
        for id in actual.difference(&expected) {
            tracing::debug!(id = %id, "unsubscribing from playlist");
            platform.unsubscribe(id).await?;
            changed = true;
        }

        if changed {
            tracing::info!("subscribed playlists were updated by sync");
        } else {
            tracing::debug!("subscribed playlists are up to date");
        }
        Ok(changed)
    }

    async fn initial_subscriptions_stored(&self) -> SyncResult<bool> {
        let keys = self
            .sync
            .store()
            .get_keys(SUBSCRIBED_PLAYLISTS_INITIALIZED, true)
            .await?;
        if keys.is_empty() {
            Ok(false)
        } else {
            self.sync.get_entry(SUBSCRIBED_PLAYLISTS_INITIALIZED).await
        }
    }
}

fn group_key(id: &str) -> String {
    format!("{PLAYLIST_GROUPS_PREFIX}{id}")
}
