//! Gateway error types.

use thiserror::Error;

/// Errors from gateway lifecycle operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The listener could not bind.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A conversation is already being processed.
    #[error("a request for chat {chat_id} is already in flight")]
    ChatBusy {
        /// The busy conversation.
        chat_id: String,
    },
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
