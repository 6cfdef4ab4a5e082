use thiserror::Error;

/// Failure kinds for queue operations (spec.md §7).
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("job '{0}' not found")]
    JobNotFound(String),
    #[error("queue is closed")]
    QueueClosed,
    #[error("job failed: {message}")]
    JobFailed { message: String, cause: Option<String> },
    #[error("operation failed: {message}")]
    OperationFailed { message: String, cause: Option<String> },
    #[error("connection error: {0}")]
    ConnectionError(String),
}
