//! Capabilities the stack and player managers need from the video platform front-end.
//!
//! The platform is picked once, from configuration or by looking at a page URL,
//! and its implementations are injected into the managers.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use vidsync_core::VidsyncResult;

use crate::error::StackError;
use crate::item::StackItem;

pub use vidsync_sync::platform::{SavedPlaylists, SubscriptionController};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Invidious,
    Piped,
}

impl Platform {
    /// Guess the platform from a page URL. Piped front-ends run on hosts
    /// named after it; everything else is treated as Invidious.
    pub fn detect(url: &Url) -> Self {
        match url.host_str() {
            Some(host) if host.split('.').any(|part| part.starts_with("piped")) => Platform::Piped,
            _ => Platform::Invidious,
        }
    }

    pub fn url_extractor(self) -> Arc<dyn UrlExtractor> {
        match self {
            Platform::Invidious => Arc::new(InvidiousUrlExtractor),
            Platform::Piped => Arc::new(PipedUrlExtractor),
        }
    }
}

impl FromStr for Platform {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "invidious" => Ok(Platform::Invidious),
            "piped" => Ok(Platform::Piped),
            other => Err(StackError::Url(format!("unsupported platform '{other}'"))),
        }
    }
}

// ── URL extraction ────────────────────────────────────────────────────────────

/// Reads page kinds and ids out of front-end URLs.
pub trait UrlExtractor: Send + Sync {
    fn is_on_player(&self, url: &Url) -> bool {
        url.path() == "/watch"
    }

    fn video_id(&self, url: &Url) -> Option<String> {
        if !self.is_on_player(url) {
            return None;
        }
        query_param(url, "v")
    }

    fn is_listen_mode(&self, url: &Url) -> bool {
        if !self.is_on_player(url) {
            return false;
        }
        matches!(query_param(url, "listen").as_deref(), Some("1" | "true"))
    }

    /// Start time in seconds requested by the URL.
    fn video_start_time(&self, url: &Url) -> Option<f64>;

    fn is_playing_playlist(&self, url: &Url) -> bool {
        self.is_on_player(url) && self.playlist_id(url).is_some()
    }

    fn playlist_index(&self, url: &Url) -> Option<u32> {
        if !self.is_playing_playlist(url) {
            return None;
        }
        query_param(url, "index")?.parse().ok()
    }

    fn is_on_channel(&self, url: &Url) -> bool {
        url.path().starts_with("/channel/")
    }

    fn channel_id(&self, url: &Url) -> Option<String> {
        let mut segments = url.path_segments()?;
        if segments.next() != Some("channel") {
            return None;
        }
        segments
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    fn is_on_playlists_overview(&self, url: &Url) -> bool;

    fn is_on_playlist_details(&self, url: &Url) -> bool {
        url.path() == "/playlist"
    }

    fn playlist_id(&self, url: &Url) -> Option<String> {
        if !self.is_on_player(url) && !self.is_on_playlist_details(url) {
            return None;
        }
        query_param(url, "list")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvidiousUrlExtractor;

impl InvidiousUrlExtractor {
    pub fn is_on_playlist_unsubscribe(&self, url: &Url) -> bool {
        url.path() == "/delete_playlist"
    }
}

impl UrlExtractor for InvidiousUrlExtractor {
    fn video_start_time(&self, url: &Url) -> Option<f64> {
        if !self.is_on_player(url) {
            return None;
        }
        parse_duration(&query_param(url, "t")?)
    }

    fn is_on_playlists_overview(&self, url: &Url) -> bool {
        url.path() == "/feed/playlists"
    }

    fn playlist_id(&self, url: &Url) -> Option<String> {
        if !self.is_on_player(url)
            && !self.is_on_playlist_details(url)
            && !self.is_on_playlist_unsubscribe(url)
        {
            return None;
        }
        query_param(url, "list")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipedUrlExtractor;

impl UrlExtractor for PipedUrlExtractor {
    /// Piped does not put the start time into the URL.
    fn video_start_time(&self, _url: &Url) -> Option<f64> {
        None
    }

    fn is_on_playlists_overview(&self, url: &Url) -> bool {
        url.path() == "/playlists"
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// `90`, `90s` or `1h2m3s` to seconds.
fn parse_duration(value: &str) -> Option<f64> {
    if let Ok(secs) = value.parse::<f64>() {
        return Some(secs);
    }

    let mut total = 0.0;
    let mut number = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let factor = match c {
            'h' => 3600.0,
            'm' => 60.0,
            's' => 1.0,
            _ => return None,
        };
        total += number.parse::<f64>().ok()? * factor;
        number.clear();
    }
    if !number.is_empty() {
        return None;
    }
    Some(total)
}

// ── page controllers ──────────────────────────────────────────────────────────

/// The page the user is looking at.
pub trait LocationController: Send + Sync {
    fn current_url(&self) -> Option<Url>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenMode {
    Video,
    Audio,
    #[default]
    Keep,
}

impl ListenMode {
    pub fn for_item(item: &StackItem) -> Self {
        if item.video().listen_mode {
            ListenMode::Audio
        } else {
            ListenMode::Video
        }
    }
}

/// Playback control of the front-end.
///
/// The `open_*` methods return whether a page reload was triggered.
#[async_trait]
pub trait PlayerController: Send + Sync {
    /// Snapshot of the video being played.
    fn current_video_item(&self) -> Option<StackItem>;

    fn time_current(&self) -> Option<f64>;

    fn time_total(&self) -> Option<f64>;

    /// Link to the previous video of the playing playlist.
    fn prev_playlist_link(&self) -> Option<Url>;

    async fn open_video(&self, id: &str, time: Option<f64>, mode: ListenMode) -> VidsyncResult<bool>;

    async fn open_playlist(
        &self,
        playlist_id: &str,
        idx: u32,
        video_id: &str,
        time: Option<f64>,
        mode: ListenMode,
    ) -> VidsyncResult<bool>;
}

/// Saved playlists of the front-end.
#[async_trait]
pub trait PlaylistController: SavedPlaylists {
    /// Id under which the front-end knows the synced playlist `id`.
    async fn resolve_playlist_id(&self, id: &str) -> VidsyncResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_detect() {
        assert_eq!(Platform::detect(&url("https://piped.video/watch?v=1")), Platform::Piped);
        assert_eq!(
            Platform::detect(&url("https://piped.kavin.rocks/")),
            Platform::Piped
        );
        assert_eq!(Platform::detect(&url("https://yewtu.be/")), Platform::Invidious);
        assert_eq!("Piped".parse::<Platform>().unwrap(), Platform::Piped);
        assert!("youtube".parse::<Platform>().is_err());
    }

    #[test]
    fn test_player_urls() {
        let ex = InvidiousUrlExtractor;
        let u = url("https://inv.example/watch?v=abc&list=PL1&index=4&listen=1&t=1m30s");
        assert!(ex.is_on_player(&u));
        assert_eq!(ex.video_id(&u).as_deref(), Some("abc"));
        assert!(ex.is_listen_mode(&u));
        assert_eq!(ex.video_start_time(&u), Some(90.0));
        assert!(ex.is_playing_playlist(&u));
        assert_eq!(ex.playlist_id(&u).as_deref(), Some("PL1"));
        assert_eq!(ex.playlist_index(&u), Some(4));

        let piped = PipedUrlExtractor;
        assert_eq!(piped.video_start_time(&u), None);
        assert_eq!(piped.video_id(&u).as_deref(), Some("abc"));

        let plain = url("https://inv.example/watch?v=abc&listen=0");
        assert!(!ex.is_listen_mode(&plain));
        assert!(!ex.is_playing_playlist(&plain));
        assert_eq!(ex.playlist_index(&plain), None);
        assert_eq!(ex.video_start_time(&plain), None);
    }

    #[test]
    fn test_channel_and_playlist_pages() {
        let inv = InvidiousUrlExtractor;
        let piped = PipedUrlExtractor;

        let chan = url("https://inv.example/channel/UC123/videos?sort=new");
        assert!(inv.is_on_channel(&chan));
        assert_eq!(inv.channel_id(&chan).as_deref(), Some("UC123"));
        assert_eq!(inv.video_id(&chan), None);

        assert!(inv.is_on_playlists_overview(&url("https://inv.example/feed/playlists")));
        assert!(piped.is_on_playlists_overview(&url("https://piped.example/playlists")));
        assert!(!piped.is_on_playlists_overview(&url("https://piped.example/feed/playlists")));

        let details = url("https://inv.example/playlist?list=PL9");
        assert!(inv.is_on_playlist_details(&details));
        assert_eq!(piped.playlist_id(&details).as_deref(), Some("PL9"));

        let unsub = url("https://inv.example/delete_playlist?list=PL9");
        assert_eq!(inv.playlist_id(&unsub).as_deref(), Some("PL9"));
        assert_eq!(piped.playlist_id(&unsub), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("42"), Some(42.0));
        assert_eq!(parse_duration("42s"), Some(42.0));
        assert_eq!(parse_duration("1h2m3s"), Some(3723.0));
        assert_eq!(parse_duration("12x"), None);
        assert_eq!(parse_duration("1m3"), None);
    }
}
