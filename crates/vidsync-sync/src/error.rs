use thiserror::Error;
use vidsync_core::VidsyncError;
use vidsync_crypto::CryptoError;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure talking to the sync server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("insecure server URL: {0}")]
    Insecure(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_status(&self, code: u16) -> bool {
        self.status() == Some(code)
    }
}

/// Remote state of `key` diverged from what the local write expected.
#[derive(Debug, Clone, Error)]
#[error("unable to sync: conflict with remote version; key: {key}")]
pub struct SyncConflict {
    pub key: String,
    /// The server's rejection, if the conflict was reported by the server
    #[source]
    pub response: Option<TransportError>,
}

impl SyncConflict {
    pub fn new(key: impl Into<String>, response: Option<TransportError>) -> Self {
        Self {
            key: key.into(),
            response,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Conflict(#[from] SyncConflict),

    #[error(transparent)]
    Transport(TransportError),

    /// The server answered with something the protocol does not allow.
    #[error("protocol assertion failed: {0}")]
    Assertion(String),

    #[error("failed to sync {} entries", .0.len())]
    Aggregate(Vec<SyncError>),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Local(#[from] VidsyncError),

    #[error("entry '{0}' is not stored")]
    NotStored(String),

    #[error("this operation needs a login")]
    NoLogin,

    #[error("invalid entry payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Payload { url, message } => {
                SyncError::Assertion(format!("{url}: {message}"))
            }
            other => SyncError::Transport(other),
        }
    }
}

impl SyncError {
    /// Every conflict in this error, including those nested in aggregates.
    pub fn conflicts(&self) -> Vec<&SyncConflict> {
        match self {
            SyncError::Conflict(c) => vec![c],
            SyncError::Aggregate(errors) => errors.iter().flat_map(SyncError::conflicts).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict(_))
    }

    /// Flatten aggregates and drop every conflict.
    pub fn into_non_conflicts(self) -> Vec<SyncError> {
        match self {
            SyncError::Conflict(_) => Vec::new(),
            SyncError::Aggregate(errors) => errors
                .into_iter()
                .flat_map(SyncError::into_non_conflicts)
                .collect(),
            other => vec![other],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            url: "https://example.com/x".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_conflicts_are_found_in_nested_aggregates() {
        let err = SyncError::Aggregate(vec![
            SyncConflict::new("a", None).into(),
            SyncError::Transport(status(500)),
            SyncError::Aggregate(vec![SyncConflict::new("b", Some(status(409))).into()]),
        ]);

        let keys: Vec<&str> = err.conflicts().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_payload_errors_become_assertions() {
        let err: SyncError = TransportError::Payload {
            url: "u".into(),
            message: "missing field".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Assertion(_)));

        let err: SyncError = status(404).into();
        assert!(matches!(err, SyncError::Transport(ref t) if t.is_status(404)));
    }

    #[test]
    fn test_non_conflicts_survive_flattening() {
        let err = SyncError::Aggregate(vec![
            SyncConflict::new("a", None).into(),
            SyncError::Aggregate(vec![
                SyncError::Transport(status(500)),
                SyncConflict::new("b", None).into(),
            ]),
        ]);

        let rest = err.into_non_conflicts();
        assert_eq!(rest.len(), 1);
        assert!(matches!(&rest[0], SyncError::Transport(t) if t.is_status(500)));
    }

    #[test]
    fn test_aggregate_message_counts_entries() {
        let err = SyncError::Aggregate(vec![SyncError::NoLogin, SyncError::NoLogin]);
        assert_eq!(err.to_string(), "failed to sync 2 entries");
    }
}
