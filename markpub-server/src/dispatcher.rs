//! Fire-and-forget scheduling of per-user sync runs.
//!
//! Each scheduled uid gets a background task. While a task for a uid is
//! alive, further requests for that uid only mark it for one more pass, so
//! a burst of notifications collapses into at most two runs. A semaphore
//! caps how many runs execute at once across all users. Nothing is retried
//! and nothing survives a restart.

use markpub_cloud::SyncEngine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, warn};

/// What [`SyncDispatcher::schedule`] did with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheduled {
    /// A new background task was started.
    Spawned,
    /// A run is already pending or active; it will make one more pass.
    Coalesced,
}

struct Inner {
    engine: Arc<SyncEngine>,
    permits: Semaphore,
    /// uid -> rerun requested while a run was pending or active.
    pending: Mutex<HashMap<String, bool>>,
    idle: Notify,
}

/// Schedules `SyncEngine::run` in the background, one task per user.
#[derive(Clone)]
pub struct SyncDispatcher {
    inner: Arc<Inner>,
}

impl SyncDispatcher {
    pub fn new(engine: Arc<SyncEngine>, max_concurrent_syncs: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                permits: Semaphore::new(max_concurrent_syncs.max(1)),
                pending: Mutex::new(HashMap::new()),
                idle: Notify::new(),
            }),
        }
    }

    /// Queues a run for `uid` and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, uid: &str) -> Scheduled {
        {
            let mut pending = self.inner.lock_pending();
            if let Some(rerun) = pending.get_mut(uid) {
                *rerun = true;
                debug!(uid = %uid, "sync already pending, coalesced");
                return Scheduled::Coalesced;
            }
            pending.insert(uid.to_string(), false);
        }

        let inner = Arc::clone(&self.inner);
        let uid = uid.to_string();
        tokio::spawn(async move { inner.drive(uid).await });
        Scheduled::Spawned
    }

    /// Number of users with a run pending or in progress.
    pub fn pending(&self) -> usize {
        self.inner.lock_pending().len()
    }

    /// Resolves once no run is pending or in progress.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, bool>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn drive(self: Arc<Self>, uid: String) {
        let mut slot = PendingSlot {
            inner: Arc::clone(&self),
            uid,
            armed: true,
        };
        loop {
            match self.permits.acquire().await {
                Ok(_permit) => self.run_once(&slot.uid).await,
                Err(e) => error!(uid = %slot.uid, "sync permits closed: {e}"),
            }

            let mut pending = self.lock_pending();
            match pending.get_mut(&slot.uid) {
                Some(rerun) if *rerun => *rerun = false,
                _ => {
                    self.release(&mut pending, &slot.uid);
                    slot.armed = false;
                    return;
                }
            }
        }
    }

    fn release(&self, pending: &mut HashMap<String, bool>, uid: &str) {
        pending.remove(uid);
        if pending.is_empty() {
            self.idle.notify_waiters();
        }
    }

    async fn run_once(&self, uid: &str) {
        match self.engine.run(uid).await {
            Ok(report) => debug!(
                uid = %uid,
                run_id = %report.run_id,
                "background sync published {} documents",
                report.published.len()
            ),
            // Run failures are already logged by the engine with their stage.
            Err(e) if e.is_missing_credential() => {
                warn!(uid = %uid, "notification for a user without a stored credential");
            }
            Err(_) => {}
        }
    }
}

/// Clears a uid's pending entry if its task unwinds mid-run.
struct PendingSlot {
    inner: Arc<Inner>,
    uid: String,
    armed: bool,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        error!(uid = %self.uid, "background sync aborted; dropping pending reruns");
        let mut pending = self.inner.lock_pending();
        self.inner.release(&mut pending, &self.uid);
    }
}
