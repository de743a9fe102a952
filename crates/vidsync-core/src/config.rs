use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VidsyncConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub downloads: DownloadsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the sync server (no trailing slash needed)
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures (429, 5xx, connect errors)
    pub max_retries: u32,
    /// Reject plaintext `http://` base URLs instead of warning
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persistent local store (entries, login, jobs)
    pub data_file: PathBuf,
    /// Session-scoped store (current stack, player state)
    pub session_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Conflict resolution mode: "defer", "local", "remote" or "rename"
    pub conflict_mode: String,
    /// Front-end platform: "invidious" or "piped"
    pub platform: String,
    /// Host used to key per-domain sync times
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Progress poll interval
    pub poll_interval_ms: u64,
    /// Consecutive failed polls before a job is cancelled
    pub max_update_fails: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chocolatecakecodes.goip.de/InvidiousExt".into(),
            timeout_secs: 10,
            max_retries: 3,
            enforce_tls: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("~/.local/share/vidsync/data.json"),
            session_file: PathBuf::from("~/.local/share/vidsync/session.json"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_mode: "defer".into(),
            platform: "invidious".into(),
            domain: "localhost".into(),
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_update_fails: 3,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Expand a leading `~/` using `$HOME`. Other paths are returned unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
