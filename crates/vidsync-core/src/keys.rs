//! Names of the entries and local records shared between crates.
//!
//! Synced entry keys are plaintext on the device and encrypted before they
//! reach the server. Local record keys never leave the device.

// ── Synced entry keys ─────────────────────────────────────────────────────────

/// Named watch stacks: `stacks::{id}`
pub const STACKS_PREFIX: &str = "stacks::";

/// Playlist groups: `playlists::groups::{id}`
pub const PLAYLIST_GROUPS_PREFIX: &str = "playlists::groups::";

/// Ids of playlists the user subscribed to
pub const SUBSCRIBED_PLAYLISTS: &str = "playlists::subscribed_playlists";

/// Whether the initial set of subscribed playlists was stored
pub const SUBSCRIBED_PLAYLISTS_INITIALIZED: &str = "playlists::subscribed_playlists_initialized";

/// All-or-nothing channel subscription snapshot
pub const SUBSCRIPTIONS_DATA: &str = "subscriptions::sync::data";

/// Per-domain time of the last applied subscription snapshot
pub const SUBSCRIPTIONS_TIMES: &str = "subscriptions::sync::times";

/// Whether Piped settings are synced in the background
pub const PIPED_BACKGROUND_SYNC: &str = "piped::settings::doBackgroundSync";

/// `{syncTime, hash}` of the last Piped settings export
pub const PIPED_LAST_SYNC_TIME: &str = "piped::settings::lastSyncTime";

/// Versioned Piped settings snapshot
pub const PIPED_SETTINGS_DATA: &str = "piped::settings::data";

// ── Local records ─────────────────────────────────────────────────────────────

/// Exported login `{username, baseKey}`
pub const LOGIN: &str = "sync::login";

/// Synced entry slot prefix
pub const ENTRY_PREFIX: &str = "sync-extension::entry::";

/// Unsynced entry slot prefix
pub const ENTRY_UNSYNCED_PREFIX: &str = "sync-extension::entry-unsynced::";

/// Keys whose remote delete is still pending
pub const DELETED_ENTRIES: &str = "sync-extension::deleted_entries";

/// Per-domain last sync time of the account data
pub const INVIDIOUS_LAST_SYNC_TIMES: &str = "sync-invidious::lastSyncTimes";

/// Whether account data is synced in the background
pub const INVIDIOUS_BACKGROUND_SYNC: &str = "sync-invidious::doBackgroundSync";

/// Per-domain last sync time of the Piped settings
pub const PIPED_LAST_SYNC_TIMES: &str = "sync-piped::lastSyncTimes";

/// Download jobs that are still running
pub const DOWNLOAD_JOBS: &str = "download::jobs";

// ── Session records ───────────────────────────────────────────────────────────

/// Stack selected as the base of the current stack
pub const ACTIVE_STACK: &str = "stack::active";

/// Snapshot of the current watch stack
pub const CURRENT_STACK: &str = "stack::watch_stack";

/// Player resume state
pub const PLAYER_STATE: &str = "player::state";

/// Reverse playlist playback flag
pub const PLAYER_REVERSE_PLAYLIST: &str = "player::reversePlaylist";
