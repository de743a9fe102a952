//! Shared fixtures: a scripted front-end page and stack services on top of an
//! in-memory sync server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use url::Url;
use vidsync_core::VidsyncResult;
use vidsync_crypto::{KdfHash, KdfParams, Login};
use vidsync_stack::platform::{InvidiousUrlExtractor, SavedPlaylists};
use vidsync_stack::{
    ListenMode, LocationController, PlayerController, PlayerManager, PlaylistController,
    PlaylistVideoInfo, StackItem, StackManager, VideoInfo,
};
use vidsync_storage::MemoryStore;
use vidsync_sync::{ConflictCoordinator, EntryStore, LoginSlot, MemoryRemote, WarningPublisher};

const TEST_KDF: KdfParams = KdfParams {
    version: "test",
    introduced: "2024-01-01T00:00:00Z",
    algorithm: KdfHash::Sha512,
    iterations: 16,
};

pub const HOST: &str = "https://inv.example";

pub fn login(username: &str) -> Login {
    Login::from_credentials(
        username,
        &SecretString::from(format!("{username}-password")),
        Some(&TEST_KDF),
    )
    .expect("derive test login")
}

pub fn video(id: &str) -> StackItem {
    StackItem::from(VideoInfo {
        title: format!("title of {id}"),
        ..VideoInfo::new(id)
    })
}

pub fn playlist_video(id: &str, playlist_id: &str, idx: u32) -> StackItem {
    StackItem::from(PlaylistVideoInfo {
        video: VideoInfo::new(id),
        playlist_id: playlist_id.to_string(),
        playlist_idx: idx,
    })
}

pub fn url(path_and_query: &str) -> Url {
    Url::parse(&format!("{HOST}{path_and_query}")).expect("test url")
}

// ── page ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Opened {
    Video {
        id: String,
        time: Option<f64>,
        mode: ListenMode,
    },
    Playlist {
        playlist_id: String,
        idx: u32,
        video_id: String,
        time: Option<f64>,
        mode: ListenMode,
    },
}

/// A front-end page whose URL and player are set by the test.
#[derive(Default)]
pub struct FakePage {
    url: Mutex<Option<Url>>,
    current: Mutex<Option<StackItem>>,
    times: Mutex<(Option<f64>, Option<f64>)>,
    prev_link: Mutex<Option<Url>>,
    opened: Mutex<Vec<Opened>>,
    reloads: AtomicBool,
}

impl FakePage {
    /// Navigate to the player page of `item` and play it.
    pub fn watch(&self, item: &StackItem) {
        let mut query = format!("/watch?v={}", item.id());
        if let StackItem::PlaylistVideo(pl) = item {
            query.push_str(&format!("&list={}&index={}", pl.playlist_id, pl.playlist_idx));
        }
        self.set_url(&query);
        *self.current.lock().unwrap() = Some(item.clone());
    }

    pub fn set_url(&self, path_and_query: &str) {
        *self.url.lock().unwrap() = Some(url(path_and_query));
    }

    pub fn set_times(&self, current: f64, total: f64) {
        *self.times.lock().unwrap() = (Some(current), Some(total));
    }

    pub fn set_prev_link(&self, path_and_query: &str) {
        *self.prev_link.lock().unwrap() = Some(url(path_and_query));
    }

    /// Whether opening a video reloads the page.
    pub fn set_reloads(&self, reloads: bool) {
        self.reloads.store(reloads, Ordering::SeqCst);
    }

    pub fn take_opened(&self) -> Vec<Opened> {
        std::mem::take(&mut *self.opened.lock().unwrap())
    }
}

impl LocationController for FakePage {
    fn current_url(&self) -> Option<Url> {
        self.url.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerController for FakePage {
    fn current_video_item(&self) -> Option<StackItem> {
        self.current.lock().unwrap().clone()
    }

    fn time_current(&self) -> Option<f64> {
        self.times.lock().unwrap().0
    }

    fn time_total(&self) -> Option<f64> {
        self.times.lock().unwrap().1
    }

    fn prev_playlist_link(&self) -> Option<Url> {
        self.prev_link.lock().unwrap().clone()
    }

    async fn open_video(&self, id: &str, time: Option<f64>, mode: ListenMode) -> VidsyncResult<bool> {
        self.opened.lock().unwrap().push(Opened::Video {
            id: id.to_string(),
            time,
            mode,
        });
        Ok(self.reloads.load(Ordering::SeqCst))
    }

    async fn open_playlist(
        &self,
        playlist_id: &str,
        idx: u32,
        video_id: &str,
        time: Option<f64>,
        mode: ListenMode,
    ) -> VidsyncResult<bool> {
        self.opened.lock().unwrap().push(Opened::Playlist {
            playlist_id: playlist_id.to_string(),
            idx,
            video_id: video_id.to_string(),
            time,
            mode,
        });
        Ok(self.reloads.load(Ordering::SeqCst))
    }
}

/// Playlists known to the front-end under other ids.
#[derive(Default)]
pub struct FakePlaylists {
    pub aliases: HashMap<String, String>,
}

#[async_trait]
impl SavedPlaylists for FakePlaylists {
    async fn saved_playlists(&self) -> VidsyncResult<Vec<String>> {
        Ok(self.aliases.values().cloned().collect())
    }

    async fn subscribe(&self, _playlist_id: &str) -> VidsyncResult<()> {
        Ok(())
    }

    async fn unsubscribe(&self, _playlist_id: &str) -> VidsyncResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PlaylistController for FakePlaylists {
    async fn resolve_playlist_id(&self, id: &str) -> VidsyncResult<Option<String>> {
        Ok(self.aliases.get(id).cloned())
    }
}

// ── services ──────────────────────────────────────────────────────────────────

/// Stack services of one browser tab.
pub struct Tab {
    pub sync: Arc<ConflictCoordinator>,
    pub session: Arc<MemoryStore>,
    pub page: Arc<FakePage>,
    pub stacks: Arc<StackManager>,
    pub player: PlayerManager,
}

impl Tab {
    /// The same tab after a page reload: same session, fresh services.
    pub fn reload(&self) -> Tab {
        build(self.sync.clone(), self.session.clone(), self.page.clone())
    }
}

pub fn tab(remote: &Arc<MemoryRemote>, username: &str) -> Tab {
    let local = Arc::new(MemoryStore::new());
    let store = Arc::new(EntryStore::new(
        remote.clone(),
        local,
        LoginSlot::new(Some(login(username))),
        WarningPublisher::new(),
    ));
    let sync = Arc::new(ConflictCoordinator::new(store));
    build(sync, Arc::new(MemoryStore::new()), Arc::new(FakePage::default()))
}

fn build(sync: Arc<ConflictCoordinator>, session: Arc<MemoryStore>, page: Arc<FakePage>) -> Tab {
    let urls = Arc::new(InvidiousUrlExtractor);
    let stacks = Arc::new(StackManager::new(
        sync.clone(),
        session.clone(),
        urls.clone(),
        page.clone(),
        page.clone(),
    ));
    let player = PlayerManager::new(stacks.clone(), session.clone(), urls, page.clone(), page.clone());
    Tab {
        sync,
        session,
        page,
        stacks,
        player,
    }
}
