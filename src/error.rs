//! Error taxonomy shared by the pipeline stages.
//!
//! Library code returns [`PipelineError`]; the binary wraps it in
//! `anyhow::Error` with context. Provider failures are recoverable per item,
//! integrity and migration failures are fatal to the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::migrate::MigrationState;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// HTTP failure, non-success status or undecodable JSON from a metadata provider.
    #[error("{provider} request failed: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Staging validation findings; promotion is refused until they are resolved.
    #[error("integrity check failed: {}", .0.join("; "))]
    Integrity(Vec<String>),

    /// Any failure inside the migration transaction. The original tables are untouched.
    #[error("migration failed after {state:?}: {message}")]
    Migration {
        state: MigrationState,
        message: String,
    },

    #[error("unsafe path {path}: {reason}")]
    Unsafe { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Provider {
            provider,
            message: message.into(),
        }
    }

    /// True for errors the batch loops skip over instead of aborting.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Provider { .. })
    }
}
