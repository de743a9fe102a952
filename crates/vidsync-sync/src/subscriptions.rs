//! All-or-nothing sync of channel subscriptions and channel groups.
//!
//! One snapshot is stored for all devices. Each domain records the snapshot
//! time it last applied or wrote, so a device knows whether the stored
//! snapshot is newer than its own state.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use vidsync_core::keys::{SUBSCRIPTIONS_DATA, SUBSCRIPTIONS_TIMES};
use vidsync_core::now_millis;

use crate::conflict::ConflictCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::platform::SubscriptionController;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    /// unix-time ms of the last update
    pub time: i64,
    pub subscriptions: Vec<String>,
    pub channel_groups: Vec<Value>,
}

/// Domain -> unix-time ms of the last applied snapshot
pub type SubscriptionSyncTimes = BTreeMap<String, i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Overwrite the stored snapshot with the local state
    Local,
    /// Overwrite the local state with the stored snapshot
    Remote,
    /// Pull if the stored snapshot is newer than this domain's last sync, else push
    #[default]
    Auto,
}

impl FromStr for SyncDirection {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(SyncDirection::Local),
            "remote" => Ok(SyncDirection::Remote),
            "auto" => Ok(SyncDirection::Auto),
            other => Err(SyncError::Invalid(format!(
                "unknown sync direction '{other}' (expected local, remote or auto)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionSyncOutcome {
    Pushed,
    Pulled,
}

pub struct SubscriptionManager {
    sync: Arc<ConflictCoordinator>,
    controller: Arc<dyn SubscriptionController>,
    domain: String,
}

impl SubscriptionManager {
    pub fn new(
        sync: Arc<ConflictCoordinator>,
        controller: Arc<dyn SubscriptionController>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            sync,
            controller,
            domain: domain.into(),
        }
    }

    pub async fn sync_subscriptions_and_groups(
        &self,
        direction: SyncDirection,
    ) -> SyncResult<SubscriptionSyncOutcome> {
        let store = self.sync.store();
        if !store.has_key(SUBSCRIPTIONS_DATA).await? {
            self.sync_to_remote().await?;
            return Ok(SubscriptionSyncOutcome::Pushed);
        }

        let stored: SubscriptionSnapshot = self.sync.get_entry(SUBSCRIPTIONS_DATA).await?;
        let pull = match direction {
            SyncDirection::Local => false,
            SyncDirection::Remote => true,
            SyncDirection::Auto => self.sync_time().await? < stored.time,
        };

        if pull {
            self.sync_from_remote(&stored).await?;
            Ok(SubscriptionSyncOutcome::Pulled)
        } else {
            self.sync_to_remote().await?;
            Ok(SubscriptionSyncOutcome::Pushed)
        }
    }

    /// Time of the snapshot this domain last applied, or -1.
    pub async fn sync_time(&self) -> SyncResult<i64> {
        Ok(self
            .sync_times()
            .await?
            .get(&self.domain)
            .copied()
            .unwrap_or(-1))
    }

    async fn sync_times(&self) -> SyncResult<SubscriptionSyncTimes> {
        if self.sync.store().has_key(SUBSCRIPTIONS_TIMES).await? {
            self.sync.get_entry(SUBSCRIPTIONS_TIMES).await
        } else {
            Ok(SubscriptionSyncTimes::new())
        }
    }

    async fn set_sync_time(&self, time: i64) -> SyncResult<()> {
        let mut times = self.sync_times().await?;
        times.insert(self.domain.clone(), time);
        self.sync.set_entry(SUBSCRIPTIONS_TIMES, &times).await
    }

    async fn sync_to_remote(&self) -> SyncResult<()> {
        let snapshot = SubscriptionSnapshot {
            time: now_millis(),
            subscriptions: self.controller.load_subscriptions().await?,
            channel_groups: self.controller.load_channel_groups().await?,
        };

        self.sync.set_entry(SUBSCRIPTIONS_DATA, &snapshot).await?;
        self.set_sync_time(snapshot.time).await?;
        tracing::info!(
            subscriptions = snapshot.subscriptions.len(),
            groups = snapshot.channel_groups.len(),
            "subscriptions stored"
        );
        Ok(())
    }

    async fn sync_from_remote(&self, snapshot: &SubscriptionSnapshot) -> SyncResult<()> {
        self.controller
            .store_subscriptions(&snapshot.subscriptions)
            .await?;
        self.controller
            .store_channel_groups(&snapshot.channel_groups)
            .await?;

        self.set_sync_time(snapshot.time).await?;
        tracing::info!(
            subscriptions = snapshot.subscriptions.len(),
            groups = snapshot.channel_groups.len(),
            "subscriptions applied"
        );
        Ok(())
    }
}
