use thiserror::Error;

use crate::models::SyncStatus;

/// All errors that can occur in litsync-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a sync run is already in progress")]
    SyncAlreadyRunning,

    #[error("invalid sync transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SyncStatus, to: SyncStatus },

    #[error("publication not found: {0}")]
    PublicationNotFound(String),

    #[error("duplicate publication: {0}")]
    DuplicatePublication(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
