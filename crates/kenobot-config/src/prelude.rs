//! Prelude module - commonly used types for convenient import.

pub use crate::{Config, ConfigError, ConfigResult, load, load_from_str};
