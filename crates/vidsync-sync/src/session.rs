use std::sync::{Arc, PoisonError, RwLock};

use vidsync_crypto::Login;

/// The current login, shared between the services that talk to the server.
///
/// Swapping the login in one place makes every holder of a clone see it.
#[derive(Debug, Clone, Default)]
pub struct LoginSlot {
    inner: Arc<RwLock<Option<Arc<Login>>>>,
}

impl LoginSlot {
    pub fn new(login: Option<Login>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(login.map(Arc::new))),
        }
    }

    pub fn get(&self) -> Option<Arc<Login>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, login: Option<Login>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = login.map(Arc::new);
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
