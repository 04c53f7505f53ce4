//! The watchdog: tick loop, state machine, and signal emission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use kenobot_events::{HealthTransition, SignalBus, SignalPayload, SignalType};

use crate::check::{CheckResult, HealthProbe};
use crate::memory::rss_bytes;
use crate::state::SystemState;

struct RegisteredCheck {
    name: String,
    critical: bool,
    probe: Arc<dyn HealthProbe>,
    last: RwLock<Option<(CheckResult, DateTime<Utc>)>>,
}

/// Latest result of one check, as exposed by `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Latest result, absent before the first tick.
    pub result: Option<CheckResult>,
    /// Whether a failure of this check makes the system unhealthy.
    pub critical: bool,
    /// When the check last ran.
    pub checked_at: Option<DateTime<Utc>>,
}

/// Snapshot of the watchdog.
#[derive(Debug, Clone, Serialize)]
pub struct WatchdogStatus {
    /// Current derived state.
    pub state: SystemState,
    /// Seconds since the watchdog was created.
    pub uptime_secs: u64,
    /// Process RSS in bytes, when the platform exposes it.
    pub memory_rss_bytes: Option<u64>,
    /// Per-check latest results.
    pub checks: HashMap<String, CheckReport>,
}

/// Periodically evaluates registered checks and fires `HEALTH_*` signals
/// on state edges.
///
/// Checks run concurrently each tick, each under a bounded timeout so one
/// slow probe cannot stall the rest. No signal is fired when the state is
/// unchanged.
pub struct Watchdog {
    bus: Arc<SignalBus>,
    interval: Duration,
    check_timeout: Duration,
    checks: RwLock<Vec<Arc<RegisteredCheck>>>,
    state: Mutex<SystemState>,
    started: Instant,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Watchdog {
    /// Create a watchdog ticking every `interval`, awaiting each check at
    /// most `check_timeout`.
    #[must_use]
    pub fn new(bus: Arc<SignalBus>, interval: Duration, check_timeout: Duration) -> Self {
        Self {
            bus,
            interval,
            check_timeout,
            checks: RwLock::new(Vec::new()),
            state: Mutex::new(SystemState::Healthy),
            started: Instant::now(),
            ticker: Mutex::new(None),
        }
    }

    /// Register a check.
    pub fn register_check(
        &self,
        name: impl Into<String>,
        probe: impl HealthProbe + 'static,
        critical: bool,
    ) {
        self.checks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Arc::new(RegisteredCheck {
                name: name.into(),
                critical,
                probe: Arc::new(probe),
                last: RwLock::new(None),
            }));
    }

    /// Start the tick loop. A started watchdog ignores further calls.
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self
            .ticker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if ticker.is_some() {
            return;
        }
        let watchdog = Arc::clone(self);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(watchdog.interval);
            // The immediate first tick would race startup registration.
            interval.tick().await;
            loop {
                interval.tick().await;
                watchdog.tick().await;
            }
        }));
    }

    /// Stop the tick loop. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self
            .ticker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Run all checks once and update the derived state.
    ///
    /// Exposed so the runtime can force an immediate evaluation (and so
    /// tests need not wait out the interval).
    pub async fn tick(&self) {
        let checks: Vec<Arc<RegisteredCheck>> = self
            .checks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        let timeout = self.check_timeout;
        let runs = checks.iter().map(|check| {
            let probe = Arc::clone(&check.probe);
            async move {
                match tokio::time::timeout(timeout, probe.check()).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => CheckResult::fail(e.to_string()),
                    Err(_) => CheckResult::fail(format!(
                        "check timed out after {}s",
                        timeout.as_secs()
                    )),
                }
            }
        });
        let results = join_all(runs).await;

        let now = Utc::now();
        for (check, result) in checks.iter().zip(&results) {
            debug!(check = %check.name, status = ?result.status, "check completed");
            *check
                .last
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner) =
                Some((result.clone(), now));
        }

        let new_state =
            SystemState::derive(checks.iter().zip(&results).map(|(c, r)| (r, c.critical)));
        let detail = Self::describe(&checks, &results, new_state);

        let previous = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let previous = *state;
            *state = new_state;
            previous
        };

        if new_state != previous {
            warn!(%previous, current = %new_state, %detail, "health state changed");
            let signal_type = match new_state {
                SystemState::Healthy => SignalType::HealthRecovered,
                SystemState::Degraded => SignalType::HealthDegraded,
                SystemState::Unhealthy => SignalType::HealthUnhealthy,
            };
            self.bus.fire(
                signal_type,
                SignalPayload::Health(HealthTransition {
                    previous: previous.to_string(),
                    detail,
                }),
                "watchdog",
            );
        }
    }

    /// Current state, uptime, memory, and per-check results.
    #[must_use]
    pub fn status(&self) -> WatchdogStatus {
        let checks = self
            .checks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let reports = checks
            .iter()
            .map(|check| {
                let last = check
                    .last
                    .read()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clone();
                (
                    check.name.clone(),
                    CheckReport {
                        result: last.as_ref().map(|(r, _)| r.clone()),
                        critical: check.critical,
                        checked_at: last.map(|(_, at)| at),
                    },
                )
            })
            .collect();

        WatchdogStatus {
            state: *self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
            uptime_secs: self.started.elapsed().as_secs(),
            memory_rss_bytes: rss_bytes(),
            checks: reports,
        }
    }

    /// Summarize the non-ok checks (or the recovery) for the transition
    /// payload.
    fn describe(
        checks: &[Arc<RegisteredCheck>],
        results: &[CheckResult],
        state: SystemState,
    ) -> String {
        if state == SystemState::Healthy {
            return "all checks passing".to_string();
        }
        let offenders: Vec<String> = checks
            .iter()
            .zip(results)
            .filter(|(_, r)| !r.is_ok())
            .map(|(c, r)| format!("{}: {:?} ({})", c.name, r.status, r.detail))
            .collect();
        offenders.join("; ")
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckStatus, FnProbe, ProbeError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn watchdog() -> (Arc<SignalBus>, Arc<Watchdog>) {
        let bus = Arc::new(SignalBus::new());
        let watchdog = Arc::new(Watchdog::new(
            Arc::clone(&bus),
            Duration::from_secs(60),
            Duration::from_millis(200),
        ));
        (bus, watchdog)
    }

    struct SwitchProbe(Arc<AtomicBool>);

    #[async_trait]
    impl HealthProbe for SwitchProbe {
        async fn check(&self) -> Result<CheckResult, ProbeError> {
            if self.0.load(Ordering::SeqCst) {
                Ok(CheckResult::fail("switched off"))
            } else {
                Ok(CheckResult::ok())
            }
        }
    }

    /// Critical failure fires HEALTH_UNHEALTHY once; an identical second
    /// tick emits nothing; recovery fires HEALTH_RECOVERED.
    #[tokio::test]
    async fn test_edge_triggered_signals() {
        let (bus, watchdog) = watchdog();
        let failing = Arc::new(AtomicBool::new(false));
        watchdog.register_check("provider", SwitchProbe(Arc::clone(&failing)), true);

        let (_i1, mut unhealthy_rx) = bus.subscribe_channel(SignalType::HealthUnhealthy);
        let (_i2, mut recovered_rx) = bus.subscribe_channel(SignalType::HealthRecovered);

        // Healthy → healthy: nothing fires.
        watchdog.tick().await;
        assert!(unhealthy_rx.try_recv().is_err());

        failing.store(true, Ordering::SeqCst);
        watchdog.tick().await;
        let signal = unhealthy_rx.try_recv().unwrap();
        match &signal.payload {
            SignalPayload::Health(t) => {
                assert_eq!(t.previous, "healthy");
                assert!(t.detail.contains("provider"));
            },
            other => panic!("unexpected payload: {other:?}"),
        }

        // Same failing state again: no second signal.
        watchdog.tick().await;
        assert!(unhealthy_rx.try_recv().is_err());

        failing.store(false, Ordering::SeqCst);
        watchdog.tick().await;
        let signal = recovered_rx.try_recv().unwrap();
        match &signal.payload {
            SignalPayload::Health(t) => assert_eq!(t.previous, "unhealthy"),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(watchdog.status().state, SystemState::Healthy);
    }

    #[tokio::test]
    async fn test_probe_error_becomes_failing_result() {
        let (_bus, watchdog) = watchdog();
        watchdog.register_check(
            "flaky",
            FnProbe::new(|| Err("io error: connection refused".into())),
            false,
        );

        watchdog.tick().await;
        let status = watchdog.status();
        assert_eq!(status.state, SystemState::Degraded);
        let report = &status.checks["flaky"];
        let result = report.result.as_ref().unwrap();
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.detail.contains("connection refused"));
    }

    struct SlowProbe;

    #[async_trait]
    impl HealthProbe for SlowProbe {
        async fn check(&self) -> Result<CheckResult, ProbeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(CheckResult::ok())
        }
    }

    #[tokio::test]
    async fn test_slow_check_is_bounded_by_timeout() {
        let (_bus, watchdog) = watchdog();
        watchdog.register_check("slow", SlowProbe, false);
        watchdog.register_check("fast", FnProbe::new(|| Ok(CheckResult::ok())), false);

        let started = Instant::now();
        watchdog.tick().await;
        assert!(started.elapsed() < Duration::from_secs(5));

        let status = watchdog.status();
        let slow = status.checks["slow"].result.as_ref().unwrap();
        assert_eq!(slow.status, CheckStatus::Fail);
        assert!(slow.detail.contains("timed out"));
        assert!(status.checks["fast"].result.as_ref().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (_bus, watchdog) = watchdog();
        watchdog.start();
        watchdog.start();
        assert!(watchdog.ticker.lock().unwrap().is_some());
        watchdog.stop();
        assert!(watchdog.ticker.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_reports_uptime_and_memory() {
        let (_bus, watchdog) = watchdog();
        let status = watchdog.status();
        assert!(status.checks.is_empty());
        #[cfg(target_os = "linux")]
        assert!(status.memory_rss_bytes.unwrap() > 0);
    }
}
