//! Failure-isolating circuit breaker around a chat provider.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{LlmError, LlmResult};
use crate::provider::{ChatProvider, ChatReply, ChatRequest};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls fail fast without invoking the provider.
    Open,
    /// The next call is attempted as a probe.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Snapshot of the breaker for health checks and stats.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BreakerStatus {
    /// Current state.
    pub state: BreakerState,
    /// Consecutive failures observed.
    pub failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    opened_at: Option<Instant>,
}

/// Wraps a provider and fails fast after `threshold` consecutive failures.
///
/// Transitions: CLOSED→OPEN on reaching the threshold, OPEN→HALF_OPEN once
/// the cooldown elapses, HALF_OPEN→CLOSED on a successful probe,
/// HALF_OPEN→OPEN on a failed one.
pub struct CircuitBreaker<P> {
    inner: P,
    threshold: u32,
    cooldown: Duration,
    state: Mutex<Inner>,
}

impl<P> CircuitBreaker<P> {
    /// Wrap `inner`, opening after `threshold` consecutive failures and
    /// probing again after `cooldown`.
    #[must_use]
    pub fn new(inner: P, threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner,
            threshold,
            cooldown,
            state: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Current state and failure count.
    #[must_use]
    pub fn status(&self) -> BreakerStatus {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);
        BreakerStatus {
            state: inner.state,
            failures: inner.failures,
        }
    }

    /// The wrapped provider.
    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// OPEN turns into HALF_OPEN once the cooldown has elapsed.
    fn maybe_half_open(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            let elapsed = inner.opened_at.map(|t| t.elapsed());
            if elapsed.is_some_and(|e| e >= self.cooldown) {
                inner.state = BreakerState::HalfOpen;
                info!("circuit half-open, probing provider");
            }
        }
    }

    /// Decide whether this call may proceed; fail fast when open.
    fn admit(&self) -> LlmResult<()> {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);
        if inner.state == BreakerState::Open {
            let elapsed = inner.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
            let retry_after = self.cooldown.saturating_sub(elapsed);
            return Err(LlmError::CircuitOpen {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }
        Ok(())
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            info!("circuit closed after successful call");
        }
        inner.state = BreakerState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("probe failed, circuit re-opened");
            },
            BreakerState::Closed if inner.failures >= self.threshold => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                warn!(failures = inner.failures, "circuit opened");
            },
            _ => {},
        }
    }
}

#[async_trait]
impl<P: ChatProvider> ChatProvider for CircuitBreaker<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn chat(&self, request: &ChatRequest) -> LlmResult<ChatReply> {
        self.admit()?;
        match self.inner.chat(request).await {
            Ok(reply) => {
                self.on_success();
                Ok(reply)
            },
            Err(err) => {
                self.on_failure();
                Err(err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Provider whose behavior is flipped by a switch, counting real calls.
    struct SwitchProvider {
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl SwitchProvider {
        fn new(failing: bool) -> Self {
            Self {
                failing: AtomicBool::new(failing),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for SwitchProvider {
        fn name(&self) -> &str {
            "switch"
        }
        fn model(&self) -> &str {
            "test-model"
        }
        async fn chat(&self, _request: &ChatRequest) -> LlmResult<ChatReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(LlmError::ApiRequestFailed("simulated outage".into()))
            } else {
                Ok(ChatReply {
                    text: "ok".into(),
                    usage: crate::provider::Usage::default(),
                })
            }
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::from_user_text("ping")
    }

    /// Threshold failures open the circuit; further calls never reach the
    /// provider until the cooldown elapses; a successful probe closes it.
    #[tokio::test]
    async fn test_opens_fails_fast_then_recovers() {
        let provider = SwitchProvider::new(true);
        let breaker = CircuitBreaker::new(provider, 3, Duration::from_millis(50));

        for _ in 0..3 {
            assert!(breaker.chat(&request()).await.is_err());
        }
        assert_eq!(breaker.status().state, BreakerState::Open);
        assert_eq!(breaker.inner().calls.load(Ordering::SeqCst), 3);

        // Fast-fail without invoking the provider.
        let err = breaker.chat(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::CircuitOpen { .. }));
        assert_eq!(breaker.inner().calls.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_millis(60)).await;
        breaker.inner().failing.store(false, Ordering::SeqCst);

        breaker.chat(&request()).await.unwrap();
        let status = breaker.status();
        assert_eq!(status.state, BreakerState::Closed);
        assert_eq!(status.failures, 0);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let provider = SwitchProvider::new(true);
        let breaker = CircuitBreaker::new(provider, 1, Duration::from_millis(20));

        assert!(breaker.chat(&request()).await.is_err());
        assert_eq!(breaker.status().state, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(breaker.status().state, BreakerState::HalfOpen);

        // Probe fails: straight back to open.
        assert!(breaker.chat(&request()).await.is_err());
        assert_eq!(breaker.status().state, BreakerState::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let provider = SwitchProvider::new(true);
        let breaker = CircuitBreaker::new(provider, 3, Duration::from_secs(60));

        assert!(breaker.chat(&request()).await.is_err());
        assert!(breaker.chat(&request()).await.is_err());
        assert_eq!(breaker.status().failures, 2);

        breaker.inner().failing.store(false, Ordering::SeqCst);
        breaker.chat(&request()).await.unwrap();
        assert_eq!(breaker.status().failures, 0);
        assert_eq!(breaker.status().state, BreakerState::Closed);
    }
}
