//! Scheduler error types.

use thiserror::Error;

/// Errors from scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A cron expression failed validation.
    #[error("invalid cron expression {expr:?}: {detail}")]
    InvalidCron {
        /// The offending expression.
        expr: String,
        /// Why it was rejected.
        detail: String,
    },

    /// The journal could not be read or written.
    #[error("scheduler journal I/O error at {path}: {source}")]
    JournalIo {
        /// Journal path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A journal record could not be serialized or deserialized.
    #[error("scheduler journal serialization error: {0}")]
    JournalSerialize(#[from] serde_json::Error),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
