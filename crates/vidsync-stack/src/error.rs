use thiserror::Error;
use vidsync_core::VidsyncError;
use vidsync_sync::SyncError;

pub type StackResult<T> = Result<T, StackError>;

#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Local(#[from] VidsyncError),

    #[error("invalid stack data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the current watch stack can not be deleted")]
    CurrentNotDeletable,

    #[error("no active stack is set")]
    NoActiveStack,

    #[error("stack '{0}' is empty")]
    EmptyStack(String),

    #[error("no video is playing")]
    NoVideo,

    #[error("invalid URL: {0}")]
    Url(String),
}
