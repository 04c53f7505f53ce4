//! Sleep-cycle error types.

use thiserror::Error;

/// Errors from the sleep-cycle supervisor.
#[derive(Debug, Error)]
pub enum SleepError {
    /// A run was requested while one is in progress.
    #[error("sleep cycle already running")]
    AlreadyRunning,

    /// A phase failed; the run stopped there.
    #[error("phase {phase} failed: {message}")]
    PhaseFailed {
        /// The failing phase.
        phase: String,
        /// The error it reported.
        message: String,
    },

    /// A proposal could not be written.
    #[error("proposal I/O error at {path}: {source}")]
    ProposalIo {
        /// Path being written.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sleep-cycle operations.
pub type SleepResult<T> = Result<T, SleepError>;
