//! Single-slot latch around the full sync pass.
//!
//! At most one holder at a time. Other callers never queue for it: they wait
//! for the current holder to finish and carry on without acquiring.

use tokio::sync::watch;

#[derive(Debug)]
pub struct SyncLatch {
    locked: watch::Sender<bool>,
}

impl Default for SyncLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncLatch {
    pub fn new() -> Self {
        let (locked, _) = watch::channel(false);
        Self { locked }
    }

    /// Acquire the latch if it is free. Released when the guard drops.
    pub fn try_lock(&self) -> Option<SyncLatchGuard<'_>> {
        let acquired = self.locked.send_if_modified(|locked| {
            if *locked {
                false
            } else {
                *locked = true;
                true
            }
        });
        acquired.then_some(SyncLatchGuard { latch: self })
    }

    pub fn is_locked(&self) -> bool {
        *self.locked.borrow()
    }

    /// Resolve once the latch is free. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.locked.subscribe();
        // the sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(|locked| !*locked).await;
    }
}

#[derive(Debug)]
pub struct SyncLatchGuard<'a> {
    latch: &'a SyncLatch,
}

impl Drop for SyncLatchGuard<'_> {
    fn drop(&mut self) {
        self.latch.locked.send_replace(false);
    }
}
