//! vidsync-sync: end-to-end encrypted sync engine
//!
//! Layers, leaves first:
//!   - [`api`] / [`http`] / [`memory`]: REST contract of the sync server and its transports
//!   - [`entry`]: keyed JSON entries with per-entry optimistic concurrency
//!   - [`conflict`]: routes conflicts of a sync pass to a pluggable resolver
//!   - [`subscriptions`], [`playlists`], [`invidious`], [`piped`]: domain sync policies
//!   - [`download`]: server-side download jobs
//!
//! Services share the current login through a [`LoginSlot`].

pub mod account;
pub mod api;
pub mod conflict;
pub mod download;
pub mod entry;
pub mod error;
pub mod http;
pub mod invidious;
pub mod lock;
pub mod memory;
pub mod piped;
pub mod platform;
pub mod playlists;
pub mod session;
pub mod subscriptions;
pub mod warn;

pub use api::{AccountDataApi, DownloadApi, ExtensionDataApi, TransportResult, UserApi};
pub use conflict::{ConflictCoordinator, ConflictResolver, PolicyResolver, Resolution};
pub use download::{DownloadJob, DownloadQueue, ProgressListener};
pub use entry::EntryStore;
pub use error::{SyncConflict, SyncError, SyncResult, TransportError};
pub use http::HttpRemote;
pub use invidious::{AccountSyncOutcome, InvidiousDataSync};
pub use memory::MemoryRemote;
pub use piped::{AllSettings, PipedDataSync, PipedSyncOutcome};
pub use playlists::{PlaylistManager, PlaylistsGroup};
pub use session::LoginSlot;
pub use subscriptions::{SubscriptionManager, SyncDirection};
pub use warn::{SyncWarnHandler, WarningPublisher};
