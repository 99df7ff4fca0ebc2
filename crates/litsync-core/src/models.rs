use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a sync run. At most one run is `Running` per tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Full,
    Incremental,
}

/// One orchestrated job. Counters are monotone while the run is active;
/// `end_time` is written exactly once, on the terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub status: SyncStatus,
    pub kind: SyncKind,
    pub phase: String,
    pub processed: u64,
    pub total: u64,
    pub imported: u64,
    pub skipped: u64,
    pub approved: u64,
    pub pending: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub dry_run: bool,
}

impl SyncRun {
    pub fn idle() -> Self {
        Self {
            status: SyncStatus::Idle,
            kind: SyncKind::Full,
            phase: String::new(),
            processed: 0,
            total: 0,
            imported: 0,
            skipped: 0,
            approved: 0,
            pending: 0,
            start_time: None,
            end_time: None,
            error: None,
            cancel_requested: false,
            dry_run: false,
        }
    }

    pub fn started(kind: SyncKind, dry_run: bool) -> Self {
        Self {
            status: SyncStatus::Running,
            kind,
            phase: "Starting sync...".to_string(),
            start_time: Some(Utc::now()),
            dry_run,
            ..Self::idle()
        }
    }
}

/// Immutable snapshot of a terminated run, kept for audit and troubleshooting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub kind: SyncKind,
    pub status: SyncStatus,
    pub processed: u64,
    pub total: u64,
    pub imported: u64,
    pub skipped: u64,
    pub approved: u64,
    pub pending: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub dry_run: bool,
}

impl SyncHistoryEntry {
    pub fn from_run(run: &SyncRun) -> Self {
        Self {
            kind: run.kind,
            status: run.status,
            processed: run.processed,
            total: run.total,
            imported: run.imported,
            skipped: run.skipped,
            approved: run.approved,
            pending: run.pending,
            start_time: run.start_time,
            end_time: run.end_time,
            error: run.error.clone(),
            dry_run: run.dry_run,
        }
    }
}

/// Read model polled by a UI or CLI. No side effects on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub kind: SyncKind,
    pub phase: String,
    pub processed: u64,
    pub total: u64,
    pub imported: u64,
    pub skipped: u64,
    pub approved: u64,
    pub pending: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub dry_run: bool,
    pub last_success_time: Option<DateTime<Utc>>,
}
