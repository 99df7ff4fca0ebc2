use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::SyncConfig;
use crate::error::{CoreError, Result};
use crate::models::{SyncHistoryEntry, SyncKind, SyncRun, SyncSnapshot, SyncStatus};

struct TrackerInner {
    run: SyncRun,
    history: VecDeque<SyncHistoryEntry>,
    last_success_time: Option<chrono::DateTime<Utc>>,
    /// Deadline after which a terminal run reverts to idle.
    revert_at: Option<Instant>,
    /// Bumped on every terminal transition so a stale revert callback
    /// scheduled for an earlier run cannot reset a newer one.
    generation: u64,
}

/// Single-flight sync run tracker.
///
/// Owns the whole run lifecycle: `start` -> progress updates -> exactly one of
/// `complete`/`error`/`cancelled`. The check-and-set in `start` happens under
/// one lock acquisition, so two concurrent starts can never both succeed.
/// Instances are independent; tests can create as many as they need.
pub struct SyncTracker {
    inner: Mutex<TrackerInner>,
    history_limit: usize,
    idle_revert: Duration,
}

impl SyncTracker {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                run: SyncRun::idle(),
                history: VecDeque::new(),
                last_success_time: None,
                revert_at: None,
                generation: 0,
            }),
            history_limit: config.history_limit.max(1),
            idle_revert: Duration::from_secs(config.idle_revert_secs),
        }
    }

    /// Begin a new run. Rejected while another run is `Running`; a terminal
    /// run that has not yet reverted to idle does not block a fresh start.
    pub fn start(&self, kind: SyncKind, dry_run: bool) -> Result<()> {
        let mut inner = self.lock();
        if inner.run.status == SyncStatus::Running {
            return Err(CoreError::SyncAlreadyRunning);
        }
        inner.run = SyncRun::started(kind, dry_run);
        inner.revert_at = None;
        Ok(())
    }

    /// Cooperative cancellation. Returns false when no cancellable run exists.
    pub fn request_cancel(&self) -> bool {
        let mut inner = self.lock();
        if inner.run.status != SyncStatus::Running {
            return false;
        }
        inner.run.cancel_requested = true;
        inner.run.phase = "Cancellation requested...".to_string();
        true
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().run.cancel_requested
    }

    /// No-op unless running, which shields the run state from stale updates
    /// arriving after termination (e.g. a delayed page-fetch callback).
    pub fn update_phase(&self, phase: impl Into<String>) {
        let mut inner = self.lock();
        if inner.run.status == SyncStatus::Running {
            inner.run.phase = phase.into();
        }
    }

    pub fn update_progress(&self, processed: u64, total: u64) {
        let mut inner = self.lock();
        if inner.run.status == SyncStatus::Running {
            inner.run.processed = inner.run.processed.max(processed);
            inner.run.total = inner.run.total.max(total);
        }
    }

    pub fn update_stats(&self, imported: u64, skipped: u64, approved: u64, pending: u64) {
        let mut inner = self.lock();
        if inner.run.status == SyncStatus::Running {
            inner.run.imported = inner.run.imported.max(imported);
            inner.run.skipped = inner.run.skipped.max(skipped);
            inner.run.approved = inner.run.approved.max(approved);
            inner.run.pending = inner.run.pending.max(pending);
        }
    }

    /// Terminate the run successfully. When cancellation was requested the
    /// run is coerced to `Cancelled` instead: a cancel must never be observed
    /// as `Completed`, even if the runner races its final page in.
    pub fn complete(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.run.status != SyncStatus::Running {
            return Err(CoreError::InvalidTransition {
                from: inner.run.status,
                to: SyncStatus::Completed,
            });
        }
        if inner.run.cancel_requested {
            inner.run.status = SyncStatus::Cancelled;
            inner.run.phase = "Sync cancelled".to_string();
        } else {
            inner.run.status = SyncStatus::Completed;
            inner.run.phase = "Sync completed".to_string();
            if !inner.run.dry_run {
                inner.last_success_time = Some(Utc::now());
            }
        }
        self.finalize(&mut inner);
        Ok(())
    }

    /// Terminate a cancelled run. Valid only after `request_cancel`.
    pub fn cancelled(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.run.status != SyncStatus::Running || !inner.run.cancel_requested {
            return Err(CoreError::InvalidTransition {
                from: inner.run.status,
                to: SyncStatus::Cancelled,
            });
        }
        inner.run.status = SyncStatus::Cancelled;
        inner.run.phase = "Sync cancelled".to_string();
        self.finalize(&mut inner);
        Ok(())
    }

    /// Record a fatal failure. Reachable from any state, since an exception
    /// can surface before or after the run is nominally running; a history
    /// entry is always written so the failure stays visible to operators.
    pub fn error(&self, message: impl Into<String>) {
        let mut inner = self.lock();
        inner.run.status = SyncStatus::Error;
        inner.run.error = Some(message.into());
        inner.run.phase = "Sync failed".to_string();
        self.finalize(&mut inner);
    }

    pub fn last_success_time(&self) -> Option<chrono::DateTime<Utc>> {
        self.lock().last_success_time
    }

    /// Most recent history entries, newest first, up to `limit`.
    pub fn history(&self, limit: usize) -> Vec<SyncHistoryEntry> {
        self.lock().history.iter().take(limit).cloned().collect()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let inner = self.lock();
        let run = &inner.run;
        SyncSnapshot {
            status: run.status,
            kind: run.kind,
            phase: run.phase.clone(),
            processed: run.processed,
            total: run.total,
            imported: run.imported,
            skipped: run.skipped,
            approved: run.approved,
            pending: run.pending,
            start_time: run.start_time,
            end_time: run.end_time,
            error: run.error.clone(),
            cancel_requested: run.cancel_requested,
            dry_run: run.dry_run,
            last_success_time: inner.last_success_time,
        }
    }

    /// Schedule the revert-to-idle callback on the current runtime. The
    /// generation stamp makes the callback a no-op once a newer run exists,
    /// so the timer can neither block nor clobber anything.
    #[cfg(feature = "async")]
    pub fn spawn_revert(self: &std::sync::Arc<Self>) {
        let generation = self.lock().generation;
        let tracker = std::sync::Arc::clone(self);
        let delay = self.idle_revert;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracker.try_revert(generation);
        });
    }

    /// Revert a terminal run to idle once its grace window has elapsed.
    /// Housekeeping only: `start` never depends on this having fired.
    pub fn try_revert(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.run.status.is_terminal() {
            return false;
        }
        let due = inner
            .revert_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false);
        if due {
            inner.run = SyncRun::idle();
            inner.revert_at = None;
        }
        due
    }

    /// Current generation stamp, paired with `try_revert`.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn finalize(&self, inner: &mut TrackerInner) {
        if inner.run.end_time.is_none() {
            inner.run.end_time = Some(Utc::now());
        }
        inner
            .history
            .push_front(SyncHistoryEntry::from_run(&inner.run));
        inner.history.truncate(self.history_limit);
        inner.revert_at = Some(Instant::now() + self.idle_revert);
        inner.generation += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
