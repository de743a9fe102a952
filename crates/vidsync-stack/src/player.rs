//! Player resume state machine.
//!
//! Opening a stack may reload the page. The state is kept in the session
//! store so the next page load can pick up where the last one stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use vidsync_core::keys::{PLAYER_REVERSE_PLAYLIST, PLAYER_STATE};
use vidsync_storage::{LocalStore, LocalStoreExt};

use crate::error::{StackError, StackResult};
use crate::item::{PlaylistVideoInfo, StackItem};
use crate::manager::{StackManager, StackUpdate};
use crate::platform::{ListenMode, LocationController, PlayerController, PlaylistController, UrlExtractor};

/// Seconds between the stored and the requested position below which the
/// position is not restored.
const TIME_RESTORE_THRESHOLD: f64 = 2.0;
/// Seconds before the end at which reverse playback jumps to the previous video.
const REVERSE_JUMP_WINDOW: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpeningPhase {
    #[default]
    None,
    OpenStack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub active: bool,
    pub opening_phase: OpeningPhase,
    pub uses_active_stack: bool,
}

pub struct PlayerManager {
    stacks: Arc<StackManager>,
    session: Arc<dyn LocalStore>,
    urls: Arc<dyn UrlExtractor>,
    location: Arc<dyn LocationController>,
    player: Arc<dyn PlayerController>,
    playlists: Option<Arc<dyn PlaylistController>>,
    state: Mutex<PlayerState>,
    reverse_playlist: AtomicBool,
}

impl PlayerManager {
    pub fn new(
        stacks: Arc<StackManager>,
        session: Arc<dyn LocalStore>,
        urls: Arc<dyn UrlExtractor>,
        location: Arc<dyn LocationController>,
        player: Arc<dyn PlayerController>,
    ) -> Self {
        Self {
            stacks,
            session,
            urls,
            location,
            player,
            playlists: None,
            state: Mutex::new(PlayerState::default()),
            reverse_playlist: AtomicBool::new(false),
        }
    }

    /// Resolve playlist ids through `playlists` before opening them.
    pub fn with_playlists(mut self, playlists: Arc<dyn PlaylistController>) -> Self {
        self.playlists = Some(playlists);
        self
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Continue whatever the previous page load left unfinished.
    pub async fn pickup_state(&self) -> StackResult<()> {
        let state = self
            .session
            .get::<PlayerState>(PLAYER_STATE)
            .await?
            .unwrap_or_default();
        self.replace_state(state);
        let reverse = self
            .session
            .get_or(PLAYER_REVERSE_PLAYLIST, false)
            .await?;
        self.set_reverse_playlist(reverse).await?;

        if !state.active {
            return Ok(());
        }

        if !self.is_on_player() {
            debug!("stale player state reset");
            self.update_state(|s| s.active = false).await?;
            return self.set_reverse_playlist(false).await;
        }

        match state.opening_phase {
            OpeningPhase::OpenStack => self.open_active_stack().await,
            OpeningPhase::None => self.restore_time().await,
        }
    }

    /// Open the top item of the active stack.
    pub async fn open_active_stack(&self) -> StackResult<()> {
        let active = self
            .stacks
            .get_active_stack()
            .await?
            .ok_or(StackError::NoActiveStack)?;
        let stack = self.stacks.load_stack(&active.id).await?;
        let top = stack
            .peek(0)
            .cloned()
            .ok_or_else(|| StackError::EmptyStack(active.id.clone()))?;

        self.update_state(|s| {
            s.active = true;
            s.uses_active_stack = true;
            s.opening_phase = OpeningPhase::OpenStack;
        })
        .await?;

        info!(stack = %active.id, video = top.id(), "opening active stack");
        if self.open_stack_item(&top).await? {
            // continued by pickup_state after the reload
            return Ok(());
        }

        self.update_state(|s| s.opening_phase = OpeningPhase::None).await
    }

    /// Open `item` at its watched position. Returns whether the page reloads.
    pub async fn open_stack_item(&self, item: &StackItem) -> StackResult<bool> {
        match item {
            StackItem::PlaylistVideo(pl) => self.open_stack_playlist(pl).await,
            StackItem::Video(video) => {
                self.open_video(&video.id, video.time_current, ListenMode::for_item(item))
                    .await
            }
        }
    }

    pub async fn open_video(&self, id: &str, time: Option<f64>, mode: ListenMode) -> StackResult<bool> {
        Ok(self.player.open_video(id, time, mode).await?)
    }

    pub async fn open_playlist(
        &self,
        playlist_id: &str,
        idx: u32,
        video_id: &str,
        time: Option<f64>,
        mode: ListenMode,
    ) -> StackResult<bool> {
        Ok(self
            .player
            .open_playlist(playlist_id, idx, video_id, time, mode)
            .await?)
    }

    /// Manually activate player management, e.g. to restore the position
    /// after the stack was popped.
    pub async fn set_active(&self) -> StackResult<()> {
        self.update_state(|s| s.active = true).await
    }

    pub async fn set_reverse_playlist(&self, reverse: bool) -> StackResult<()> {
        self.reverse_playlist.store(reverse, Ordering::Relaxed);
        Ok(self.session.set(PLAYER_REVERSE_PLAYLIST, &reverse).await?)
    }

    pub fn is_reverse_playlist(&self) -> bool {
        self.reverse_playlist.load(Ordering::Relaxed)
    }

    /// Where to navigate instead of the next playlist video when playing in
    /// reverse. `None` leaves navigation alone.
    pub fn reverse_playlist_target(&self) -> Option<Url> {
        if !self.is_reverse_playlist() {
            return None;
        }

        let time = self.player.time_current().filter(|t| *t != 0.0)?;
        let length = self.player.time_total().filter(|t| *t != 0.0)?;
        if length - time > REVERSE_JUMP_WINDOW {
            return None;
        }

        let mut target = self.player.prev_playlist_link()?;
        let listening = self
            .location
            .current_url()
            .is_some_and(|url| self.urls.is_listen_mode(&url));
        if listening && !self.urls.is_listen_mode(&target) {
            let pairs: Vec<(String, String)> = target
                .query_pairs()
                .filter(|(k, _)| k != "listen")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            target
                .query_pairs_mut()
                .clear()
                .extend_pairs(pairs)
                .append_pair("listen", "1");
        }
        Some(target)
    }

    /// Update the current stack for the playing video.
    pub async fn track_current_video(&self) -> StackResult<StackUpdate> {
        let update = self.stacks.update_current_watch_stack().await?;
        if update == StackUpdate::Popped {
            self.set_active().await?;
        }
        Ok(update)
    }

    /// The history may have been popped: seek to the stored position.
    async fn restore_time(&self) -> StackResult<()> {
        let Some(url) = self.location.current_url() else {
            return Ok(());
        };
        let stack = self.stacks.load_current_watch_stack().await?;
        let Some(item) = stack.peek(0) else {
            return Ok(());
        };
        if self.urls.video_id(&url).as_deref() != Some(item.id()) {
            return Ok(());
        }
        let Some(stored) = item.video().time_current else {
            return Ok(());
        };
        if let Some(requested) = self.urls.video_start_time(&url) {
            if (stored - requested).abs() < TIME_RESTORE_THRESHOLD {
                return Ok(());
            }
        }

        debug!(video = item.id(), time = stored, "restoring position");
        self.open_stack_item(item).await?;
        Ok(())
    }

    async fn open_stack_playlist(&self, item: &PlaylistVideoInfo) -> StackResult<bool> {
        let resolved = match &self.playlists {
            Some(playlists) => playlists.resolve_playlist_id(&item.playlist_id).await?,
            None => None,
        };
        let playlist_id = resolved.as_deref().unwrap_or(&item.playlist_id);
        let mode = if item.video.listen_mode {
            ListenMode::Audio
        } else {
            ListenMode::Video
        };

        self.open_playlist(
            playlist_id,
            item.playlist_idx,
            &item.video.id,
            item.video.time_current,
            mode,
        )
        .await
    }

    fn is_on_player(&self) -> bool {
        self.location
            .current_url()
            .is_some_and(|url| self.urls.is_on_player(&url))
    }

    fn replace_state(&self, state: PlayerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    async fn update_state(&self, f: impl FnOnce(&mut PlayerState)) -> StackResult<()> {
        let state = {
            let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard);
            *guard
        };
        Ok(self.session.set(PLAYER_STATE, &state).await?)
    }
}
