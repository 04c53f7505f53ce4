//! Sleep-cycle state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::PhaseReport;

/// Lifecycle status of the sleep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStatus {
    /// Never run, or between runs.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run completed all phases.
    Success,
    /// The last run stopped at a failing phase.
    Failed,
}

impl std::fmt::Display for SleepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Single-instance state, mutated only by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepCycleState {
    /// Lifecycle status.
    pub status: SleepStatus,
    /// When the last successful run finished.
    pub last_run: Option<DateTime<Utc>>,
    /// Phase currently executing, while running.
    pub current_phase: Option<String>,
    /// Error of the last failed run.
    pub error: Option<String>,
    /// Counters from the most recent run, per phase.
    pub phase_reports: BTreeMap<String, PhaseReport>,
}

impl SleepCycleState {
    /// Fresh idle state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: SleepStatus::Idle,
            last_run: None,
            current_phase: None,
            error: None,
            phase_reports: BTreeMap::new(),
        }
    }
}

impl Default for SleepCycleState {
    fn default() -> Self {
        Self::new()
    }
}
