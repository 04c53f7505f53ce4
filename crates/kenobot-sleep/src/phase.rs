//! Sleep-cycle phases.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error returned by a failing phase.
pub type PhaseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The four standard phases, in execution order.
pub const STANDARD_PHASES: [&str; 4] = [
    "consolidation",
    "errorAnalysis",
    "pruning",
    "selfImprovement",
];

/// Counters a phase reports back (entries distilled, files pruned, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseReport {
    /// Counter name → value.
    pub counters: BTreeMap<String, u64>,
}

impl PhaseReport {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a counter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: u64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }
}

/// One phase of the sleep cycle.
///
/// Phases are not individually cancellable; cooperative cancellation means
/// the supervisor does not start the next phase after a stop.
#[async_trait]
pub trait SleepPhase: Send + Sync {
    /// Phase name as it appears in state and reports.
    fn name(&self) -> &str;

    /// Run the phase to completion.
    async fn run(&self) -> Result<PhaseReport, PhaseError>;
}

/// A phase that does nothing. Placeholder wiring and tests.
pub struct NoopPhase {
    name: String,
}

impl NoopPhase {
    /// Create a no-op phase with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The four standard phases as no-ops.
    #[must_use]
    pub fn standard_set() -> Vec<std::sync::Arc<dyn SleepPhase>> {
        STANDARD_PHASES
            .iter()
            .map(|name| std::sync::Arc::new(Self::new(*name)) as std::sync::Arc<dyn SleepPhase>)
            .collect()
    }
}

#[async_trait]
impl SleepPhase for NoopPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<PhaseReport, PhaseError> {
        Ok(PhaseReport::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_builder() {
        let report = PhaseReport::new().with("distilled", 4).with("pruned", 2);
        assert_eq!(report.counters["distilled"], 4);
        assert_eq!(report.counters.len(), 2);
    }

    #[tokio::test]
    async fn test_standard_noop_set() {
        let phases = NoopPhase::standard_set();
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0].name(), "consolidation");
        assert!(phases[3].run().await.is_ok());
    }
}
