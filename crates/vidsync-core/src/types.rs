use serde::{Deserialize, Serialize};

/// A locally stored sync unit: content plus the last-known-synced time (ms epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    pub content: T,
    pub time: i64,
}

// ── Extension data sync ───────────────────────────────────────────────────────

/// Remote (encrypted) key with its last sync time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyWithSyncTime {
    pub key: String,
    /// unix-time ms
    pub sync_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTime {
    /// unix-time ms
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPost {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPut {
    pub data: String,
    /// Write even if `expected_last_sync` does not match
    pub force: bool,
    /// unix-time ms
    pub expected_last_sync: i64,
}

/// Body of a data GET when the server wraps the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataGet {
    pub data: String,
}

// ── Account data sync ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTimeWithHash {
    /// unix-time ms; -1 if nothing was stored yet
    pub sync_time: i64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDataUpdate {
    pub expected_last_sync: i64,
    pub hash: String,
    pub data: String,
}

// ── User ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
}

// ── Downloads ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Mp3,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagField {
    Title,
    Artist,
    Genre,
    Album,
    AlbumArtist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValue {
    pub field: TagField,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadJobState {
    Init,
    Started,
    Cancelled,
    Done,
    Failed,
}

impl DownloadJobState {
    pub fn is_running(self) -> bool {
        matches!(self, DownloadJobState::Init | DownloadJobState::Started)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub video_id: String,
    pub dest_type: FileType,
    pub tags: Option<Vec<TagValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadId {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub id: String,
    pub state: DownloadJobState,
    /// between 0.0 and 1.0
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExtension {
    pub extension: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let put = DataPut {
            data: "iv$ct".into(),
            force: false,
            expected_last_sync: 42,
        };
        let json = serde_json::to_value(&put).unwrap();
        assert_eq!(json["expectedLastSync"], 42);
        assert_eq!(json["force"], false);

        let key: KeyWithSyncTime =
            serde_json::from_str(r#"{"key":"abc","syncTime":7}"#).unwrap();
        assert_eq!(key.sync_time, 7);
    }

    #[test]
    fn test_download_enums_use_server_names() {
        let req = DownloadRequest {
            video_id: "dQw4w9WgXcQ".into(),
            dest_type: FileType::Mp3,
            tags: Some(vec![TagValue {
                field: TagField::AlbumArtist,
                value: "someone".into(),
            }]),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""destType":"MP3""#), "{json}");
        assert!(json.contains(r#""field":"ALBUM_ARTIST""#), "{json}");

        let prog: DownloadProgress =
            serde_json::from_str(r#"{"id":"j1","state":"STARTED","progress":0.5}"#).unwrap();
        assert!(prog.state.is_running());
        assert!(!DownloadJobState::Done.is_running());
    }
}
