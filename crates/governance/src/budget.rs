//! Per-identity generation token budget.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fitforge_core::{config::BudgetConfig, Error, LlmUsage, Result};

use crate::rate_limit::ANONYMOUS;

/// Token spend of one identity over the rolling window.
#[derive(Debug, Default)]
struct BudgetEntry {
    /// (when, tokens) per fresh generation.
    charges: VecDeque<(Instant, u64)>,
}

impl BudgetEntry {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some((at, _)) = self.charges.front() {
            if now.duration_since(*at) >= window {
                self.charges.pop_front();
            } else {
                break;
            }
        }
    }

    fn used(&self) -> u64 {
        self.charges.iter().map(|(_, t)| t).sum()
    }
}

/// Token budget controller using in-memory storage.
///
/// Consulted only before a fresh generation; cache hits cost nothing.
/// A limit of zero disables the budget.
#[derive(Debug)]
pub struct GenerationBudget {
    budgets: DashMap<String, BudgetEntry>,
    limit: u64,
    window: Duration,
}

impl GenerationBudget {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            budgets: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn from_config(cfg: &BudgetConfig) -> Self {
        Self::new(cfg.tokens_per_window, Duration::from_secs(cfg.window_secs))
    }

    /// Budget that never rejects.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::from_secs(3600))
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Fail with `BudgetExceeded` when `identity` has spent its window.
    pub fn check(&self, identity: Option<&str>) -> Result<()> {
        self.check_at(identity, Instant::now())
    }

    pub fn check_at(&self, identity: Option<&str>, now: Instant) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let key = identity.unwrap_or(ANONYMOUS);
        let Some(mut entry) = self.budgets.get_mut(key) else {
            return Ok(());
        };
        entry.prune(now, self.window);

        let used = entry.used();
        if used >= self.limit {
            // Earliest point where expiring charges bring spend under the limit.
            let mut left = used;
            let retry_after = entry
                .charges
                .iter()
                .find_map(|(at, tokens)| {
                    left -= *tokens;
                    (left < self.limit).then(|| (*at + self.window).saturating_duration_since(now))
                })
                .unwrap_or(self.window);
            return Err(Error::BudgetExceeded {
                used,
                limit: self.limit,
                retry_after,
            });
        }
        Ok(())
    }

    /// Charge provider-reported usage to `identity`.
    pub fn record_usage(&self, identity: Option<&str>, usage: LlmUsage) {
        self.record_usage_at(identity, usage, Instant::now())
    }

    pub fn record_usage_at(&self, identity: Option<&str>, usage: LlmUsage, now: Instant) {
        if !self.is_enabled() || usage.total() == 0 {
            return;
        }
        let key = identity.unwrap_or(ANONYMOUS);
        let mut entry = self.budgets.entry(key.to_string()).or_default();
        entry.prune(now, self.window);
        entry.charges.push_back((now, usage.total()));

        tracing::debug!(
            identity = key,
            prompt = usage.prompt_tokens,
            completion = usage.completion_tokens,
            used = entry.used(),
            limit = self.limit,
            "Recorded token usage"
        );
    }

    /// Tokens left to `identity` in the current window.
    pub fn remaining(&self, identity: Option<&str>) -> u64 {
        let key = identity.unwrap_or(ANONYMOUS);
        let now = Instant::now();
        match self.budgets.get_mut(key) {
            Some(mut entry) => {
                entry.prune(now, self.window);
                self.limit.saturating_sub(entry.used())
            }
            None => self.limit,
        }
    }

    /// Clean up identities with nothing left in the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.budgets.retain(|_, entry| {
            entry.prune(now, self.window);
            !entry.charges.is_empty()
        });
    }
}
