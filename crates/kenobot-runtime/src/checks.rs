//! Canonical watchdog checks.
//!
//! The watchdog itself is check-agnostic; these adapters cover the three
//! the daemon always runs: provider circuit state (critical), process RSS
//! thresholds, and sleep-cycle staleness.

use std::sync::Arc;

use async_trait::async_trait;

use kenobot_llm::BreakerState;
use kenobot_sleep::{SleepCycle, SleepStatus};
use kenobot_watchdog::{CheckResult, HealthProbe, ProbeError, rss_bytes};

const MIB: u64 = 1024 * 1024;

/// Circuit-breaker state: open fails, half-open warns.
pub struct BreakerCheck {
    probe: kenobot_gateway::BreakerProbe,
}

impl BreakerCheck {
    /// Wrap a breaker status reader.
    #[must_use]
    pub fn new(probe: kenobot_gateway::BreakerProbe) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl HealthProbe for BreakerCheck {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        let status = (self.probe)();
        Ok(match status.state {
            BreakerState::Open => CheckResult::fail(format!(
                "provider circuit open after {} consecutive failures",
                status.failures
            )),
            BreakerState::HalfOpen => CheckResult::warn("provider circuit probing"),
            BreakerState::Closed => CheckResult::ok(),
        })
    }
}

/// Process RSS thresholds: 256 MiB warns, 512 MiB fails.
pub struct MemoryCheck {
    warn_bytes: u64,
    fail_bytes: u64,
}

impl MemoryCheck {
    /// Default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            warn_bytes: 256 * MIB,
            fail_bytes: 512 * MIB,
        }
    }

    /// Custom thresholds in bytes.
    #[must_use]
    pub fn with_thresholds(warn_bytes: u64, fail_bytes: u64) -> Self {
        Self {
            warn_bytes,
            fail_bytes,
        }
    }
}

impl Default for MemoryCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for MemoryCheck {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        let Some(rss) = rss_bytes() else {
            return Ok(CheckResult::ok_with("rss not available on this platform"));
        };
        let mib = rss / MIB;
        Ok(if rss >= self.fail_bytes {
            CheckResult::fail(format!("rss {mib} MiB"))
        } else if rss >= self.warn_bytes {
            CheckResult::warn(format!("rss {mib} MiB"))
        } else {
            CheckResult::ok_with(format!("rss {mib} MiB"))
        })
    }
}

/// Sleep-cycle health: a failed run warns, so does a stale one.
pub struct SleepCheck {
    sleep: Arc<SleepCycle>,
    stale_after: chrono::Duration,
}

impl SleepCheck {
    /// Stale when the last run is older than `stale_after_hours`.
    #[must_use]
    pub fn new(sleep: Arc<SleepCycle>, stale_after_hours: u64) -> Self {
        Self {
            sleep,
            stale_after: chrono::Duration::hours(i64::try_from(stale_after_hours).unwrap_or(48)),
        }
    }
}

#[async_trait]
impl HealthProbe for SleepCheck {
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        let state = self.sleep.state();
        if state.status == SleepStatus::Failed {
            let error = state.error.unwrap_or_else(|| "unknown error".to_string());
            return Ok(CheckResult::warn(format!("last sleep cycle failed: {error}")));
        }
        match state.last_run {
            Some(last) if chrono::Utc::now() - last > self.stale_after => Ok(CheckResult::warn(
                format!("last sleep cycle at {last}, overdue"),
            )),
            _ => Ok(CheckResult::ok()),
        }
    }
}
