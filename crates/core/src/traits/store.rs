//! Cache tier traits.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{CachedPlan, RequestFingerprint};

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The plan was stored.
    Written,
    /// A plan with a newer `created_at` was already stored; nothing changed.
    SkippedStale,
}

/// Keyed plan storage with per-entry expiry.
///
/// Both the fast and the durable cache tier implement this. Expired entries
/// must read as `None`, never as an error.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Backend name for logs and metrics.
    fn name(&self) -> &str;

    /// Fetch a live entry and count the hit.
    async fn get(&self, fingerprint: &RequestFingerprint) -> Result<Option<CachedPlan>>;

    /// Store `plan` for `ttl`, unless a newer plan is already stored.
    async fn put(&self, plan: &CachedPlan, ttl: Duration) -> Result<WriteOutcome>;

    /// Remove an entry.
    async fn invalidate(&self, fingerprint: &RequestFingerprint) -> Result<()>;

    /// Drop expired entries; returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}
