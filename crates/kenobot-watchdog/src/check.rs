//! Health check probes and results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error returned by a failing probe; converted into a failing result.
pub type ProbeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome class of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The component is fine.
    Ok,
    /// The component works but needs attention.
    Warn,
    /// The component is broken.
    Fail,
}

/// Result of one check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Outcome class.
    pub status: CheckStatus,
    /// Human-readable detail.
    pub detail: String,
}

impl CheckResult {
    /// A passing result.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: CheckStatus::Ok,
            detail: String::new(),
        }
    }

    /// A passing result with detail.
    #[must_use]
    pub fn ok_with(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    /// A warning result.
    #[must_use]
    pub fn warn(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    /// A failing result.
    #[must_use]
    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }

    /// Whether the result is `Ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// A pluggable health check.
///
/// The watchdog awaits each probe under a bounded timeout; a probe error
/// becomes a failing [`CheckResult`] carrying the error message.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Run the check once.
    async fn check(&self) -> Result<CheckResult, ProbeError>;
}

/// Adapter turning a plain closure into a probe.
pub struct FnProbe<F>(F);

impl<F> FnProbe<F>
where
    F: Fn() -> Result<CheckResult, ProbeError> + Send + Sync,
{
    /// Wrap a synchronous closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> HealthProbe for FnProbe<F>
where
    F: Fn() -> Result<CheckResult, ProbeError> + Send + Sync,
{
    async fn check(&self) -> Result<CheckResult, ProbeError> {
        (self.0)()
    }
}
