//! Runtime error types.

use thiserror::Error;

/// Errors from assembling or running a [`crate::Kenobot`] instance.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Data directory scaffolding failed.
    #[error(transparent)]
    Core(#[from] kenobot_core::CoreError),

    /// The bus audit trail could not be enabled.
    #[error(transparent)]
    Bus(#[from] kenobot_events::BusError),

    /// The conversation store failed to open.
    #[error(transparent)]
    Store(#[from] kenobot_store::StoreError),

    /// The scheduler failed to open or load its journal.
    #[error(transparent)]
    Scheduler(#[from] kenobot_scheduler::SchedulerError),

    /// The HTTP gateway failed to start.
    #[error(transparent)]
    Gateway(#[from] kenobot_gateway::GatewayError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
