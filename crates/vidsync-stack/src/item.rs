//! Entries of a watch stack.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upload date as Unix timestamp (number)
pub const EXTRA_UPLOAD_DATE: &str = "uploadDate";
/// Channel id of the publisher (string)
pub const EXTRA_PUBLISHER_CHAN_ID: &str = "publisherChanId";
/// Name of the publisher (string)
pub const EXTRA_PUBLISHER_NAME: &str = "publisherName";
/// Name of the playlist the video was played from (string)
pub const EXTRA_PLAYLIST_NAME: &str = "playlistName";

/// Metadata of one watched video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumb_url: String,
    /// Length of the video in seconds
    pub time_total: Option<f64>,
    /// Watched position in seconds
    pub time_current: Option<f64>,
    #[serde(default)]
    pub listen_mode: bool,
    /// Platform-specific metadata, see the `EXTRA_*` keys
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

impl VideoInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            thumb_url: String::new(),
            time_total: None,
            time_current: None,
            listen_mode: false,
            extras: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideoInfo {
    #[serde(flatten)]
    pub video: VideoInfo,
    pub playlist_id: String,
    /// Index of the video in the playlist
    pub playlist_idx: u32,
}

/// A stack entry. Serialized with a `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StackItem {
    Video(VideoInfo),
    PlaylistVideo(PlaylistVideoInfo),
}

impl StackItem {
    pub fn video(&self) -> &VideoInfo {
        match self {
            StackItem::Video(v) => v,
            StackItem::PlaylistVideo(p) => &p.video,
        }
    }

    pub fn video_mut(&mut self) -> &mut VideoInfo {
        match self {
            StackItem::Video(v) => v,
            StackItem::PlaylistVideo(p) => &mut p.video,
        }
    }

    pub fn id(&self) -> &str {
        &self.video().id
    }

    pub fn playlist_id(&self) -> Option<&str> {
        match self {
            StackItem::Video(_) => None,
            StackItem::PlaylistVideo(p) => Some(&p.playlist_id),
        }
    }

    /// Same video, regardless of the rest of the metadata.
    pub fn same_video(&self, other: &StackItem) -> bool {
        self.id() == other.id()
    }

    /// Both items were played from the same playlist.
    pub fn same_playlist(&self, other: &StackItem) -> bool {
        matches!(
            (self.playlist_id(), other.playlist_id()),
            (Some(a), Some(b)) if a == b
        )
    }
}

impl From<VideoInfo> for StackItem {
    fn from(v: VideoInfo) -> Self {
        StackItem::Video(v)
    }
}

impl From<PlaylistVideoInfo> for StackItem {
    fn from(p: PlaylistVideoInfo) -> Self {
        StackItem::PlaylistVideo(p)
    }
}
