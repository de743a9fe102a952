//! vidsync-stack: watch stacks and the player resume state machine
//!
//!   - [`item`] / [`watchstack`]: stack entries and the LIFO they live in
//!   - [`moves`]: moving selected items towards one end of a collection
//!   - [`manager`]: named stacks (synced) and the current stack (session)
//!   - [`player`]: resuming playback across page reloads
//!   - [`platform`]: URL parsing and page capabilities per front-end

pub mod error;
pub mod item;
pub mod manager;
pub mod moves;
pub mod platform;
pub mod player;
pub mod watchstack;

pub use error::{StackError, StackResult};
pub use item::{PlaylistVideoInfo, StackItem, VideoInfo};
pub use manager::{StackManager, StackNameWithId, StackUpdate, STACK_ID_CURRENT, STACK_ID_TO_BE_SET};
pub use moves::{move_items, MoveAction, MoveDirection, MoveTarget};
pub use platform::{
    ListenMode, LocationController, Platform, PlayerController, PlaylistController, UrlExtractor,
};
pub use player::{OpeningPhase, PlayerManager, PlayerState};
pub use watchstack::WatchStack;
