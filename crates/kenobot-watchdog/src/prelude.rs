//! Prelude module - commonly used types for convenient import.

pub use crate::{
    CheckReport, CheckResult, CheckStatus, FnProbe, HealthProbe, ProbeError, SystemState,
    Watchdog, WatchdogStatus, rss_bytes,
};
