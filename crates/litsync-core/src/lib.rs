//! litsync core: sync run lifecycle, history, and the storage boundary.

pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tracker;

pub use config::SyncConfig;
pub use error::{CoreError, Result};
pub use models::{SyncHistoryEntry, SyncKind, SyncRun, SyncSnapshot, SyncStatus};
pub use store::{MemoryStore, PublicationRecord, PublicationStore};
pub use tracker::SyncTracker;
