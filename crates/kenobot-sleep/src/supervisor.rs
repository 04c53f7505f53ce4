//! The sleep-cycle supervisor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Timelike, Utc};
use tracing::{error, info};

use crate::error::{SleepError, SleepResult};
use crate::phase::SleepPhase;
use crate::state::{SleepCycleState, SleepStatus};

/// Runs the phases sequentially and owns the single-writer state.
///
/// `run()` rejects while a run is in progress; there is no queueing. A
/// failing phase stops the run — remaining phases are skipped and nothing
/// is retried until the next trigger.
pub struct SleepCycle {
    phases: Vec<Arc<dyn SleepPhase>>,
    state: Mutex<SleepCycleState>,
    period: chrono::Duration,
    target_hour: u8,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SleepCycle {
    /// Create a supervisor over `phases`, running every `period_hours`
    /// with runs preferred at `target_hour` (UTC).
    #[must_use]
    pub fn new(phases: Vec<Arc<dyn SleepPhase>>, period_hours: u64, target_hour: u8) -> Self {
        Self {
            phases,
            state: Mutex::new(SleepCycleState::new()),
            period: chrono::Duration::hours(i64::try_from(period_hours).unwrap_or(24)),
            target_hour,
            ticker: Mutex::new(None),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SleepCycleState {
        self.lock_state().clone()
    }

    /// Whether a run is due: never run, or the period has elapsed.
    #[must_use]
    pub fn should_run(&self) -> bool {
        let state = self.lock_state();
        if state.status == SleepStatus::Running {
            return false;
        }
        match state.last_run {
            None => true,
            Some(last) => Utc::now() >= last + self.period,
        }
    }

    /// Run all phases once.
    ///
    /// # Errors
    ///
    /// [`SleepError::AlreadyRunning`] when a run is in progress;
    /// [`SleepError::PhaseFailed`] when a phase errors (the run stops
    /// there and the error is stored in state).
    pub async fn run(&self) -> SleepResult<()> {
        {
            let mut state = self.lock_state();
            if state.status == SleepStatus::Running {
                return Err(SleepError::AlreadyRunning);
            }
            state.status = SleepStatus::Running;
            state.error = None;
            state.current_phase = None;
            state.phase_reports.clear();
        }
        info!(phases = self.phases.len(), "sleep cycle starting");

        for phase in &self.phases {
            let name = phase.name().to_string();
            self.lock_state().current_phase = Some(name.clone());

            match phase.run().await {
                Ok(report) => {
                    info!(phase = %name, counters = ?report.counters, "phase complete");
                    self.lock_state().phase_reports.insert(name, report);
                },
                Err(e) => {
                    let message = e.to_string();
                    error!(phase = %name, error = %message, "phase failed, run aborted");
                    let mut state = self.lock_state();
                    state.status = SleepStatus::Failed;
                    state.current_phase = None;
                    state.error = Some(message.clone());
                    return Err(SleepError::PhaseFailed {
                        phase: name,
                        message,
                    });
                },
            }
        }

        let mut state = self.lock_state();
        state.status = SleepStatus::Success;
        state.current_phase = None;
        state.last_run = Some(Utc::now());
        info!("sleep cycle complete");
        Ok(())
    }

    /// Start the hourly trigger: runs when due and the clock is at the
    /// target hour. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self
            .ticker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if ticker.is_some() {
            return;
        }
        let cycle = Arc::clone(self);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            interval.tick().await;
            loop {
                interval.tick().await;
                let at_target = Utc::now().hour() == u32::from(cycle.target_hour);
                if at_target && cycle.should_run() {
                    // AlreadyRunning just means another trigger won the race.
                    if let Err(e) = cycle.run().await {
                        error!(error = %e, "scheduled sleep cycle failed");
                    }
                }
            }
        }));
    }

    /// Stop the trigger. The current run, if any, completes its phase and
    /// then stops (phases are not preempted).
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

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SleepCycleState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for SleepCycle {
    fn drop(&mut self) {
        self.stop();
    }
}
