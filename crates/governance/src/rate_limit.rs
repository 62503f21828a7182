//! Per-identity sliding-window rate limiter.
//!
//! Each identity owns a deque of admission timestamps. Timestamps older than
//! the window are pruned on every check, so the count is exact over any
//! rolling window. The map is a DashMap, so identities on different shards
//! never contend.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fitforge_core::config::RateLimitConfig;

/// Bucket shared by callers without an identity.
pub const ANONYMOUS: &str = "anonymous";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Rejected; the oldest request in the window frees up after `retry_after`.
    RateLimited { retry_after: Duration },
}

/// Sliding-window request limiter keyed by identity.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_requests, Duration::from_secs(cfg.window_secs))
    }

    /// Admit and record one request for `identity`, or report when to retry.
    pub fn check_and_consume(&self, identity: Option<&str>) -> Admission {
        self.check_and_consume_at(identity, Instant::now())
    }

    /// Check + record with explicit timestamp (for testing).
    pub fn check_and_consume_at(&self, identity: Option<&str>, now: Instant) -> Admission {
        let key = identity.unwrap_or(ANONYMOUS);
        let mut deque = self.windows.entry(key.to_string()).or_default();
        prune_window(&mut deque, now, self.window);

        if deque.len() >= self.max_requests {
            let retry_after = deque
                .front()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            tracing::debug!(
                identity = key,
                in_window = deque.len(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limited"
            );
            return Admission::RateLimited { retry_after };
        }

        deque.push_back(now);
        Admission::Allowed
    }

    /// Requests still available to `identity` in the current window.
    pub fn remaining(&self, identity: Option<&str>) -> usize {
        let key = identity.unwrap_or(ANONYMOUS);
        let now = Instant::now();
        self.windows
            .get(key)
            .map(|d| d.iter().filter(|t| now.duration_since(**t) < self.window).count())
            .map_or(self.max_requests, |used| self.max_requests.saturating_sub(used))
    }

    /// Drop identities with no requests in the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows.retain(|_, deque| {
            prune_window(deque, now, self.window);
            !deque.is_empty()
        });
    }

    /// Identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = deque.front() {
        if now.duration_since(*front) >= window {
            deque.pop_front();
        } else {
            break;
        }
    }
}
