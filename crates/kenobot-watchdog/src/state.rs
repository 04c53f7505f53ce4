//! Coarse system state derived from check results.

use serde::{Deserialize, Serialize};

use crate::check::{CheckResult, CheckStatus};

/// Overall system state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    /// All checks passing.
    Healthy,
    /// Some non-critical issue.
    Degraded,
    /// A critical check is failing.
    Unhealthy,
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl SystemState {
    /// Derive the state from the latest results.
    ///
    /// Any critical failure is `Unhealthy`; any other non-ok result is
    /// `Degraded`; otherwise (including no checks at all) `Healthy`.
    #[must_use]
    pub fn derive<'a>(results: impl IntoIterator<Item = (&'a CheckResult, bool)>) -> Self {
        let mut state = Self::Healthy;
        for (result, critical) in results {
            if critical && result.status == CheckStatus::Fail {
                return Self::Unhealthy;
            }
            if result.status != CheckStatus::Ok {
                state = Self::Degraded;
            }
        }
        state
    }
}
