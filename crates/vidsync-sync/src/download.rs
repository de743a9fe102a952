//! Server-side downloads and the local queue that tracks them.
//!
//! Jobs are persisted under [`DOWNLOAD_JOBS`] so a restart keeps polling
//! them. [`DownloadQueue::run`] polls on a fixed interval until cancelled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vidsync_core::keys::DOWNLOAD_JOBS;
use vidsync_core::types::{DownloadJobState, DownloadProgress, DownloadRequest, FileType, TagValue};
use vidsync_crypto::Login;
use vidsync_storage::{LocalStore, LocalStoreExt};

use crate::api::DownloadApi;
use crate::error::{SyncError, SyncResult};
use crate::session::LoginSlot;

/// Consecutive failed polls after which a job is cancelled
pub const DEFAULT_MAX_UPDATE_FAILS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: String,
    pub state: DownloadJobState,
    pub progress: f32,
    /// Name the finished file should be saved as, without extension
    pub filename: String,
}

impl DownloadJob {
    fn with_state(&self, state: DownloadJobState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    fn updated(&self, progress: &DownloadProgress) -> Self {
        Self {
            state: progress.state,
            progress: progress.progress,
            ..self.clone()
        }
    }
}

/// Receives job events. All methods default to no-ops.
pub trait ProgressListener: Send + Sync {
    fn on_new_job(&self, _job: &DownloadJob) {}

    fn on_progress_update(&self, _job: &DownloadJob) {}

    fn on_job_finished(&self, _job: &DownloadJob, _extension: &str) {}
}

pub struct DownloadQueue {
    remote: Arc<dyn DownloadApi>,
    local: Arc<dyn LocalStore>,
    login: LoginSlot,
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
    max_update_fails: u32,
    update_fails: Mutex<HashMap<String, u32>>,
    /// Serialises read-modify-write cycles of the stored job list
    jobs_lock: tokio::sync::Mutex<()>,
}

impl DownloadQueue {
    pub fn new(remote: Arc<dyn DownloadApi>, local: Arc<dyn LocalStore>, login: LoginSlot) -> Self {
        Self {
            remote,
            local,
            login,
            listeners: RwLock::new(Vec::new()),
            max_update_fails: DEFAULT_MAX_UPDATE_FAILS,
            update_fails: Mutex::new(HashMap::new()),
            jobs_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_max_update_fails(mut self, max: u32) -> Self {
        self.max_update_fails = max.max(1);
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ProgressListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Jobs that are still running on the server, as last polled.
    pub async fn running_jobs(&self) -> SyncResult<Vec<DownloadJob>> {
        Ok(self.local.get_or(DOWNLOAD_JOBS, Vec::new()).await?)
    }

    pub async fn request_download(
        &self,
        video_id: &str,
        format: FileType,
        filename: &str,
        tags: Option<Vec<TagValue>>,
    ) -> SyncResult<DownloadJob> {
        let login = self.login.get().ok_or(SyncError::NoLogin)?;
        let auth = login.api_credentials();

        let request = DownloadRequest {
            video_id: video_id.to_string(),
            dest_type: format,
            tags,
        };
        let job_id = self.remote.request_download(auth, &request).await?;
        let progress = self.remote.download_progress(auth, &job_id.id).await?;

        let job = DownloadJob {
            id: progress.id,
            state: progress.state,
            progress: progress.progress,
            filename: filename.to_string(),
        };

        {
            let _guard = self.jobs_lock.lock().await;
            let mut jobs = self.running_jobs().await?;
            jobs.push(job.clone());
            self.local.set(DOWNLOAD_JOBS, &jobs).await?;
        }
        self.fail_counts().insert(job.id.clone(), 0);

        info!(id = %job.id, video_id, "download requested");
        self.notify(|l| l.on_new_job(&job));
        Ok(job)
    }

    pub async fn cancel_download(&self, job_id: &str) -> SyncResult<()> {
        let login = self.login.get().ok_or(SyncError::NoLogin)?;
        self.remote
            .cancel_download(login.api_credentials(), job_id)
            .await?;

        info!(id = job_id, "download cancelled");
        self.remove_job(job_id).await
    }

    /// Poll every stored job once.
    ///
    /// Without a login every job is reported cancelled and dropped. Jobs
    /// whose poll fails too often are cancelled on the server, or only
    /// locally if that fails too.
    pub async fn update_progresses(&self) -> SyncResult<()> {
        let jobs = self.running_jobs().await?;
        if jobs.is_empty() {
            return Ok(());
        }

        let Some(login) = self.login.get() else {
            warn!(count = jobs.len(), "logged out while downloads were running; dropping them");
            let _guard = self.jobs_lock.lock().await;
            for job in &jobs {
                let cancelled = job.with_state(DownloadJobState::Cancelled);
                self.notify(|l| l.on_progress_update(&cancelled));
            }
            self.fail_counts().clear();
            return Ok(self.local.set(DOWNLOAD_JOBS, &Vec::<DownloadJob>::new()).await?);
        };

        let results = join_all(jobs.iter().map(|job| self.update_progress(&login, job))).await;

        // id -> replacement; `None` drops the job
        let mut outcomes: HashMap<String, Option<DownloadJob>> = HashMap::new();
        for (job, result) in jobs.into_iter().zip(results) {
            match result {
                Ok(updated) if updated.state.is_running() => {
                    // the cap counts consecutive failures only
                    self.fail_counts().insert(job.id.clone(), 0);
                    outcomes.insert(job.id, Some(updated));
                }
                Ok(updated) => {
                    debug!(id = %updated.id, state = ?updated.state, "download ended");
                    self.fail_counts().remove(&updated.id);
                    outcomes.insert(job.id, None);
                }
                Err(e) => {
                    let fails = {
                        let mut counts = self.fail_counts();
                        let count = counts.entry(job.id.clone()).or_insert(0);
                        *count += 1;
                        *count
                    };
                    warn!(id = %job.id, fails, error = %e, "updating download progress failed");

                    if fails >= self.max_update_fails {
                        self.abandon(&login, &job).await;
                        outcomes.insert(job.id, None);
                    }
                }
            }
        }

        let _guard = self.jobs_lock.lock().await;
        let mut stored = self.running_jobs().await?;
        stored.retain_mut(|job| match outcomes.get(&job.id) {
            Some(Some(updated)) => {
                *job = updated.clone();
                true
            }
            Some(None) => false,
            // requested while polling
            None => true,
        });
        Ok(self.local.set(DOWNLOAD_JOBS, &stored).await?)
    }

    /// Poll on `interval` until `cancel` fires. Poll failures are logged.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = interval.as_millis() as u64, "download queue started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("download queue stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.update_progresses().await {
                        warn!(error = %e, "download queue poll failed");
                    }
                }
            }
        }
    }

    async fn update_progress(&self, login: &Login, job: &DownloadJob) -> SyncResult<DownloadJob> {
        let auth = login.api_credentials();
        let progress = self.remote.download_progress(auth, &job.id).await?;
        let updated = job.updated(&progress);
        self.notify(|l| l.on_progress_update(&updated));

        if updated.state == DownloadJobState::Done {
            let extension = self
                .remote
                .download_extension(auth, &updated.id)
                .await?
                .extension
                .ok_or_else(|| {
                    SyncError::Assertion(format!(
                        "server reported no file extension for finished job {}",
                        updated.id
                    ))
                })?;
            self.notify(|l| l.on_job_finished(&updated, &extension));
        }

        Ok(updated)
    }

    /// Cancel a job that failed too often. The caller drops it from storage.
    async fn abandon(&self, login: &Login, job: &DownloadJob) {
        error!(id = %job.id, "download progress failed too often; cancelling");
        if let Err(e) = self
            .remote
            .cancel_download(login.api_credentials(), &job.id)
            .await
        {
            warn!(id = %job.id, error = %e, "cancelling failed download failed; removing it locally");
        }

        self.fail_counts().remove(&job.id);
        let cancelled = job.with_state(DownloadJobState::Cancelled);
        self.notify(|l| l.on_progress_update(&cancelled));
    }

    async fn remove_job(&self, job_id: &str) -> SyncResult<()> {
        let removed = {
            let _guard = self.jobs_lock.lock().await;
            let mut jobs = self.running_jobs().await?;
            let removed = jobs
                .iter()
                .position(|j| j.id == job_id)
                .map(|idx| jobs.remove(idx));
            self.local.set(DOWNLOAD_JOBS, &jobs).await?;
            removed
        };

        self.fail_counts().remove(job_id);
        if let Some(job) = removed {
            let cancelled = job.with_state(DownloadJobState::Cancelled);
            self.notify(|l| l.on_progress_update(&cancelled));
        }
        Ok(())
    }

    fn fail_counts(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.update_fails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: impl Fn(&dyn ProgressListener)) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            event(listener.as_ref());
        }
    }
}
