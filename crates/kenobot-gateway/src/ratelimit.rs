//! Per-IP sliding-window rate limiter.
//!
//! State is an ordered list of request timestamps per IP, pruned on
//! access. Applied before authentication, so public endpoints count too.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Seconds until a slot frees up (for the `Retry-After` header).
    pub retry_after_secs: u64,
}

/// Sliding-window limiter: at most `limit` requests per IP per `window`.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `ip` and decide whether it is admitted.
    pub fn check(&self, ip: IpAddr) -> RateDecision {
        let now = Instant::now();
        let mut hits = self
            .hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let window = hits.entry(ip).or_default();

        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            window.pop_front();
        }

        if window.len() < self.limit as usize {
            window.push_back(now);
            return RateDecision {
                allowed: true,
                retry_after_secs: 0,
            };
        }

        let retry_after = window.front().map_or(self.window, |oldest| {
            self.window.saturating_sub(now.duration_since(*oldest))
        });
        RateDecision {
            allowed: false,
            retry_after_secs: retry_after.as_secs().max(1),
        }
    }

    /// Drop all recorded state (shutdown).
    pub fn clear(&self) {
        self.hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Number of IPs currently tracked.
    #[must_use]
    pub fn tracked_ips(&self) -> usize {
        self.hits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    /// Within one window, at most `limit` requests are admitted.
    #[test]
    fn test_limit_enforced_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.check(ip(1)).allowed);
        assert!(limiter.check(ip(1)).allowed);

        let third = limiter.check(ip(1));
        assert!(!third.allowed);
        assert!(third.retry_after_secs >= 1);
    }

    #[test]
    fn test_ips_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check(ip(1)).allowed);
        assert!(limiter.check(ip(2)).allowed);
        assert!(!limiter.check(ip(1)).allowed);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_millis(40));
        assert!(limiter.check(ip(1)).allowed);
        assert!(limiter.check(ip(1)).allowed);
        assert!(!limiter.check(ip(1)).allowed);

        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.check(ip(1)).allowed);
    }

    #[test]
    fn test_clear_releases_state() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check(ip(1));
        assert_eq!(limiter.tracked_ips(), 1);
        limiter.clear();
        assert_eq!(limiter.tracked_ips(), 0);
    }
}
