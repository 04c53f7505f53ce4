//! Prelude module - commonly used types for convenient import.

pub use crate::{LogConfig, LogFormat, TelemetryError, TelemetryResult, setup_logging};
