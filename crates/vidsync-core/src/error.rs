use std::path::PathBuf;

use thiserror::Error;

pub type VidsyncResult<T> = Result<T, VidsyncError>;

/// Failures of on-device state and of the front-end page.
#[derive(Debug, Error)]
pub enum VidsyncError {
    /// The local store file could not be read or written.
    #[error("{op} local store {}: {source}", path.display())]
    StoreIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local store {} is not valid JSON: {source}", path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A stored value does not have the shape the caller asked for.
    #[error("unexpected stored value: {0}")]
    Json(#[from] serde_json::Error),

    /// The page, player or playlist controller could not do what was asked.
    #[error("front-end: {0}")]
    Controller(String),
}

impl VidsyncError {
    pub fn store_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VidsyncError::StoreIo {
            op,
            path: path.into(),
            source,
        }
    }
}
