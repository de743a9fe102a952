//! Routing of best-effort failures to whoever shows them to the user.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::SyncError;

/// Receives warnings about failures that are not propagated to a caller.
#[async_trait]
pub trait SyncWarnHandler: Send + Sync {
    async fn warn(&self, message: &str, error: Option<&SyncError>) -> anyhow::Result<()>;
}

/// Cloneable handle to the registered [`SyncWarnHandler`], if any.
#[derive(Clone, Default)]
pub struct WarningPublisher {
    handler: Arc<RwLock<Option<Arc<dyn SyncWarnHandler>>>>,
}

impl WarningPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_handler(&self, handler: Option<Arc<dyn SyncWarnHandler>>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Hand the warning to the handler. A failing handler is logged, never propagated.
    pub async fn publish(&self, message: &str, error: Option<&SyncError>) {
        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            return;
        };

        if let Err(e) = handler.warn(message, error).await {
            tracing::error!(
                error = %e,
                warning = message,
                cause = ?error.map(ToString::to_string),
                "sync warning handler failed"
            );
        }
    }
}

impl std::fmt::Debug for WarningPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("WarningPublisher")
            .field("handler", &registered)
            .finish()
    }
}
