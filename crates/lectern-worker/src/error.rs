//! Worker error types.

use thiserror::Error;

use lectern_models::VideoId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job rejected: {queued} jobs already waiting")]
    Rejected { queued: usize },

    #[error("Dispatcher is shutting down")]
    ShuttingDown,

    #[error("Video disappeared during processing: {0}")]
    VideoMissing(VideoId),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] lectern_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] lectern_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] lectern_queue::QueueError),

    #[error("ML service error: {0}")]
    Ml(#[from] lectern_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this error was an admission refusal rather than a run failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, WorkerError::Rejected { .. } | WorkerError::ShuttingDown)
    }
}
