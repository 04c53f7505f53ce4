//! KenoBot Telemetry - Logging setup for the KenoBot assistant daemon.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Per-crate level directives via the env-filter syntax
//!
//! # Example
//!
//! ```rust,no_run
//! use kenobot_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), kenobot_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("kenobot_gateway=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("daemon starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
