//! Bus error types.

use thiserror::Error;

/// Errors from bus operations.
///
/// Dispatch itself is infallible by design — handler failures become
/// `ERROR` signals — so these cover only the audit trail.
#[derive(Debug, Error)]
pub enum BusError {
    /// The audit log could not be opened or written.
    #[error("audit trail I/O error at {path}: {source}")]
    AuditIo {
        /// Path of the audit log.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A signal could not be serialized or deserialized.
    #[error("audit trail serialization error: {0}")]
    AuditSerialize(#[from] serde_json::Error),
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
