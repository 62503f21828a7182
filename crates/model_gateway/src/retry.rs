//! Exponential backoff for provider retries.

use rand::Rng;
use std::time::Duration;

use fitforge_core::config::BackoffConfig;

/// Delay schedule between provider attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_ms: u64,
    pub factor: f64,
    pub cap_ms: u64,
    /// Relative jitter, e.g. `0.2` for +/-20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for RetryPolicy {
    fn from(cfg: &BackoffConfig) -> Self {
        Self {
            base_ms: cfg.base_ms,
            factor: cfg.factor,
            cap_ms: cfg.cap_ms,
            jitter: cfg.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            base_ms: 0,
            factor: 1.0,
            cap_ms: 0,
            jitter: 0.0,
        }
    }

    /// Delay before retry number `retry` (1-based); zero for the first attempt.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 || self.base_ms == 0 {
            return Duration::ZERO;
        }
        let exp = (retry - 1) as f64;
        let mut delay = (self.base_ms as f64 * self.factor.powf(exp)).min(self.cap_ms as f64);
        if self.jitter > 0.0 {
            let jitter = rand::thread_rng().gen_range(-self.jitter..self.jitter);
            delay *= 1.0 + jitter;
        }
        Duration::from_millis(delay.max(0.0).round() as u64)
    }
}
