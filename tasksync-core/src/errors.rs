//! Error types for the sync layer

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type SyncResult<T> = Result<T, SyncError>;
