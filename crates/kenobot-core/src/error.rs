//! Core error types.

use thiserror::Error;

/// Errors from foundation operations (paths, PID files).
#[derive(Debug, Error)]
pub enum CoreError {
    /// An I/O operation on daemon state failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A state file held unparseable content.
    #[error("malformed state file {path}: {detail}")]
    Malformed {
        /// Path of the offending file.
        path: String,
        /// What was wrong.
        detail: String,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
