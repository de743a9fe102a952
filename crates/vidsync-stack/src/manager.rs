//! Named watch stacks and the session's current watch stack.
//!
//! Named stacks are synced entries under `stacks::{id}`. The current stack is
//! rebuilt per session and lives in the session store only.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vidsync_core::generate_unique_id;
use vidsync_core::keys::{ACTIVE_STACK, CURRENT_STACK, STACKS_PREFIX};
use vidsync_storage::{LocalStore, LocalStoreExt};
use vidsync_sync::ConflictCoordinator;

use crate::error::{StackError, StackResult};
use crate::item::StackItem;
use crate::platform::{LocationController, PlayerController, UrlExtractor};
use crate::watchstack::WatchStack;

/// Id of the session's current watch stack.
pub const STACK_ID_CURRENT: &str = "~~watch_stack~~";
/// Placeholder id of a stack that gets a fresh id when it is first saved.
pub const STACK_ID_TO_BE_SET: &str = "~~undefined~~";

const CURRENT_STACK_NAME: &str = "Current Stack";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackNameWithId {
    pub id: String,
    pub name: String,
}

impl From<&WatchStack> for StackNameWithId {
    fn from(stack: &WatchStack) -> Self {
        Self {
            id: stack.id.clone(),
            name: stack.name.clone(),
        }
    }
}

/// What [`StackManager::update_current_watch_stack`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackUpdate {
    /// The top item already matched the playing video.
    Unchanged,
    /// The top item was refreshed with new metadata of the same video.
    Replaced,
    /// Playback moved on within the top item's playlist.
    Advanced,
    Pushed,
    /// The user went back to the previous video.
    Popped,
    /// Not on a player page; current and active stack were dropped.
    Reset,
}

pub struct StackManager {
    sync: Arc<ConflictCoordinator>,
    session: Arc<dyn LocalStore>,
    urls: Arc<dyn UrlExtractor>,
    location: Arc<dyn LocationController>,
    player: Arc<dyn PlayerController>,
}

impl StackManager {
    pub fn new(
        sync: Arc<ConflictCoordinator>,
        session: Arc<dyn LocalStore>,
        urls: Arc<dyn UrlExtractor>,
        location: Arc<dyn LocationController>,
        player: Arc<dyn PlayerController>,
    ) -> Self {
        Self {
            sync,
            session,
            urls,
            location,
            player,
        }
    }

    /// Record the playing video in the current stack. Run on page load and
    /// before navigating away.
    pub async fn update_current_watch_stack(&self) -> StackResult<StackUpdate> {
        let on_player = self
            .location
            .current_url()
            .is_some_and(|url| self.urls.is_on_player(&url));

        if on_player {
            self.update_current_stack().await
        } else {
            self.reset_current_stack(true).await?;
            Ok(StackUpdate::Reset)
        }
    }

    pub async fn load_stack(&self, id: &str) -> StackResult<WatchStack> {
        if id == STACK_ID_CURRENT {
            self.load_current_watch_stack().await
        } else {
            Ok(self.sync.get_entry(&stack_key(id)).await?)
        }
    }

    /// Store `stack`. Returns the id it was stored under.
    pub async fn save_stack(&self, stack: &WatchStack) -> StackResult<String> {
        if stack.id == STACK_ID_CURRENT {
            self.save_current_watch_stack(stack).await?;
            return Ok(stack.id.clone());
        }

        if stack.id == STACK_ID_TO_BE_SET {
            let id = self.generate_stack_id().await?;
            let stack = WatchStack::create_from_copy(id, stack);
            self.sync.set_entry(&stack_key(&stack.id), &stack).await?;
            info!(id = %stack.id, name = %stack.name, "stack created");
            return Ok(stack.id);
        }

        self.sync.set_entry(&stack_key(&stack.id), stack).await?;
        debug!(id = %stack.id, "stack saved");
        Ok(stack.id.clone())
    }

    pub async fn delete_stack(&self, id: &str) -> StackResult<()> {
        if id == STACK_ID_CURRENT {
            return Err(StackError::CurrentNotDeletable);
        }
        self.sync.delete_entry(&stack_key(id)).await?;
        info!(id, "stack deleted");
        Ok(())
    }

    /// Named stacks, without the current stack.
    pub async fn list_stacks(&self) -> StackResult<Vec<StackNameWithId>> {
        let keys = self.sync.store().get_keys(STACKS_PREFIX, true).await?;
        let stacks = try_join_all(keys.iter().map(|key| self.sync.get_entry::<WatchStack>(key))).await?;
        Ok(stacks.iter().map(StackNameWithId::from).collect())
    }

    pub async fn get_active_stack(&self) -> StackResult<Option<StackNameWithId>> {
        Ok(self.session.get(ACTIVE_STACK).await?)
    }

    /// Select the stack the next current stack starts from. `None` clears it.
    pub async fn set_active_stack(&self, stack: Option<&StackNameWithId>) -> StackResult<()> {
        match stack {
            Some(stack) => {
                self.session.set(ACTIVE_STACK, stack).await?;
                // rebuilt from the new active stack on the next load
                self.reset_current_stack(false).await
            }
            None => Ok(self.session.delete(ACTIVE_STACK).await?),
        }
    }

    /// The current stack. A session without one starts from the active stack.
    pub async fn load_current_watch_stack(&self) -> StackResult<WatchStack> {
        if let Some(stack) = self.session.get::<WatchStack>(CURRENT_STACK).await? {
            return Ok(stack);
        }

        let mut stack = WatchStack::new(STACK_ID_CURRENT, CURRENT_STACK_NAME);
        if let Some(active) = self.get_active_stack().await? {
            let active = Box::pin(self.load_stack(&active.id)).await?;
            for item in active.items() {
                stack.push(item.clone());
            }
            debug!(active = %active.id, items = stack.len(), "current stack prefilled");
        }

        self.save_current_watch_stack(&stack).await?;
        Ok(stack)
    }

    async fn save_current_watch_stack(&self, stack: &WatchStack) -> StackResult<()> {
        Ok(self.session.set(CURRENT_STACK, stack).await?)
    }

    async fn reset_current_stack(&self, also_active: bool) -> StackResult<()> {
        self.session.delete(CURRENT_STACK).await?;
        if also_active {
            Box::pin(self.set_active_stack(None)).await?;
        }
        Ok(())
    }

    async fn update_current_stack(&self) -> StackResult<StackUpdate> {
        let mut stack = self.load_current_watch_stack().await?;

        let update = if self.pop_if_went_back(&mut stack) {
            StackUpdate::Popped
        } else {
            let current = self.player.current_video_item().ok_or(StackError::NoVideo)?;
            let update = match stack.peek(0) {
                Some(top) if *top == current => return Ok(StackUpdate::Unchanged),
                Some(top) if top.same_video(&current) => StackUpdate::Replaced,
                Some(top) if is_same_playlist(top, &current) => StackUpdate::Advanced,
                _ => StackUpdate::Pushed,
            };

            match update {
                StackUpdate::Pushed => stack.push(current),
                _ => {
                    stack.replace(current, 0);
                }
            }
            update
        };

        self.save_current_watch_stack(&stack).await?;
        debug!(?update, items = stack.len(), "current stack updated");
        Ok(update)
    }

    /// The playing video is the one below the top: the user went back.
    fn pop_if_went_back(&self, stack: &mut WatchStack) -> bool {
        let (Some(top), Some(below)) = (stack.peek(0), stack.peek(1)) else {
            return false;
        };
        let Some(current_id) = self
            .location
            .current_url()
            .and_then(|url| self.urls.video_id(&url))
        else {
            return false;
        };

        // the same video may sit at the top and below it
        if current_id != top.id() && current_id == below.id() {
            stack.pop(0);
            return true;
        }
        false
    }

    async fn generate_stack_id(&self) -> StackResult<String> {
        let existing: Vec<String> = self
            .list_stacks()
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        Ok(generate_unique_id(&existing))
    }
}

fn stack_key(id: &str) -> String {
    format!("{STACKS_PREFIX}{id}")
}

fn is_same_playlist(top: &StackItem, current: &StackItem) -> bool {
    matches!(current, StackItem::PlaylistVideo(_)) && top.same_playlist(current)
}
