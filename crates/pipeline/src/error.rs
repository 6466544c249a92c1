//! Pipeline error types.

use thiserror::Error;

use seenkey_core::RemoteError;
use seenkey_store::StoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("executor queue closed")]
    QueueClosed,
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Task(err.to_string())
    }
}
