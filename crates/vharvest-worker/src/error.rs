//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input table: {0}")]
    InvalidTable(String),

    #[error("A batch is already running")]
    AlreadyRunning,

    /// The stop flag is still set from an earlier run.
    #[error("Harvesting is stopped; reset before starting a new batch")]
    Stopped,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] vharvest_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vharvest_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_table(msg: impl Into<String>) -> Self {
        Self::InvalidTable(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Errors a caller can clear by waiting or resetting.
    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkerError::AlreadyRunning | WorkerError::Stopped)
    }
}
