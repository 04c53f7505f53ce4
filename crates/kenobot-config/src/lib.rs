//! KenoBot Config - Layered configuration for the KenoBot assistant daemon.
//!
//! This crate provides:
//! - Typed configuration sections with production defaults
//! - Layered loading: embedded defaults → config file → `KENOBOT_*` env
//!   overrides
//! - Validation with actionable error messages
//!
//! Every section implements [`Default`] so a bare `[section]` header in
//! TOML produces a working configuration.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod loader;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_from_str};
pub use types::{
    AuthSection, BreakerSection, BudgetSection, Config, LimitsSection, LoggingSection,
    OwnerSection, ProviderSection, SchedulerSection, ServerSection, SleepSection, WatchdogSection,
};
