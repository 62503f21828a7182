//! Tiered cache orchestration.
//!
//! Each request walks `CheckFast -> CheckDurable -> Generate -> WriteBack`,
//! leaving early on the first hit. Tier failures never reach the caller:
//! they are logged, counted and read as a miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fitforge_core::config::{CacheConfig, TierPolicy};
use fitforge_core::{
    CacheSource, CachedPlan, Error, IntentCategory, PlanStore, RequestFingerprint, Result, WriteOutcome,
};
use fitforge_governance::metrics as plan_metrics;

const TIER_FAST: &str = "fast";
const TIER_DURABLE: &str = "durable";

/// Orchestrator stage.
#[derive(Debug)]
enum Stage {
    CheckFast,
    CheckDurable,
    Generate,
    WriteBack(CachedPlan),
    Done(CachedPlan),
}

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub fast: usize,
    pub durable: usize,
}

/// Fast + durable plan cache with per-category expiry policy.
pub struct TieredPlanCache {
    fast: Arc<dyn PlanStore>,
    durable: Arc<dyn PlanStore>,
    policy: CacheConfig,
}

impl TieredPlanCache {
    pub fn new(fast: Arc<dyn PlanStore>, durable: Arc<dyn PlanStore>, policy: CacheConfig) -> Self {
        Self {
            fast,
            durable,
            policy,
        }
    }

    pub fn policy(&self, category: IntentCategory) -> &TierPolicy {
        self.policy.policy(category)
    }

    /// Fast-tier lookup only, for serving hits without joining a flight.
    pub async fn peek_fast(&self, fingerprint: &RequestFingerprint) -> Option<CachedPlan> {
        self.read(self.fast.as_ref(), TIER_FAST, fingerprint)
            .await
            .map(|plan| tagged(plan, CacheSource::Fast))
    }

    /// Serve `fingerprint` from the tiers, or run `generate` and write the
    /// result back to both.
    ///
    /// `generate` runs at most once and only after both tiers missed.
    pub async fn resolve<G, Fut>(
        &self,
        fingerprint: &RequestFingerprint,
        category: IntentCategory,
        generate: G,
    ) -> Result<CachedPlan>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedPlan>>,
    {
        self.walk(Stage::CheckFast, fingerprint, category, generate).await
    }

    /// Like [`resolve`](Self::resolve) for callers that already missed
    /// [`peek_fast`](Self::peek_fast); starts at the durable tier.
    pub async fn resolve_after_fast_miss<G, Fut>(
        &self,
        fingerprint: &RequestFingerprint,
        category: IntentCategory,
        generate: G,
    ) -> Result<CachedPlan>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedPlan>>,
    {
        self.walk(Stage::CheckDurable, fingerprint, category, generate).await
    }

    async fn walk<G, Fut>(
        &self,
        start: Stage,
        fingerprint: &RequestFingerprint,
        category: IntentCategory,
        generate: G,
    ) -> Result<CachedPlan>
    where
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedPlan>>,
    {
        let policy = *self.policy(category);
        let mut generate = Some(generate);
        let mut stage = start;

        loop {
            stage = match stage {
                Stage::CheckFast => match self.peek_fast(fingerprint).await {
                    Some(plan) => Stage::Done(plan),
                    None => Stage::CheckDurable,
                },
                Stage::CheckDurable => {
                    match self.read(self.durable.as_ref(), TIER_DURABLE, fingerprint).await {
                        Some(plan) => {
                            // Backfill, never outliving the durable copy.
                            let ttl = policy.fast_ttl().min(plan.remaining_ttl());
                            self.write(self.fast.as_ref(), TIER_FAST, &plan, ttl).await;
                            Stage::Done(tagged(plan, CacheSource::Durable))
                        }
                        None => Stage::Generate,
                    }
                }
                Stage::Generate => {
                    let generate = generate
                        .take()
                        .ok_or_else(|| Error::internal("generate stage entered twice"))?;
                    Stage::WriteBack(generate().await?)
                }
                Stage::WriteBack(plan) => {
                    tokio::join!(
                        self.write(self.durable.as_ref(), TIER_DURABLE, &plan, policy.durable_ttl()),
                        self.write(self.fast.as_ref(), TIER_FAST, &plan, policy.fast_ttl()),
                    );
                    Stage::Done(plan)
                }
                Stage::Done(plan) => return Ok(plan),
            };
        }
    }

    /// Remove `fingerprint` from both tiers.
    pub async fn invalidate(&self, fingerprint: &RequestFingerprint) {
        for (store, tier) in [(&self.fast, TIER_FAST), (&self.durable, TIER_DURABLE)] {
            if let Err(e) = store.invalidate(fingerprint).await {
                absorb(store.as_ref(), tier, "invalidate", &e);
            }
        }
        tracing::info!(fingerprint = fingerprint.short(), "Invalidated cached plan");
    }

    /// Drop expired entries from both tiers.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for (store, tier, slot) in [
            (&self.fast, TIER_FAST, &mut report.fast),
            (&self.durable, TIER_DURABLE, &mut report.durable),
        ] {
            match store.purge_expired().await {
                Ok(n) => *slot = n,
                Err(e) => absorb(store.as_ref(), tier, "sweep", &e),
            }
        }
        if report.fast + report.durable > 0 {
            tracing::debug!(fast = report.fast, durable = report.durable, "Swept expired plans");
        }
        report
    }

    async fn read(
        &self,
        store: &dyn PlanStore,
        tier: &'static str,
        fingerprint: &RequestFingerprint,
    ) -> Option<CachedPlan> {
        match store.get(fingerprint).await {
            Ok(hit) => {
                plan_metrics::record_cache_lookup(tier, hit.is_some());
                hit
            }
            Err(e) => {
                absorb(store, tier, "get", &e);
                None
            }
        }
    }

    async fn write(&self, store: &dyn PlanStore, tier: &'static str, plan: &CachedPlan, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        match store.put(plan, ttl).await {
            Ok(WriteOutcome::Written) => {}
            Ok(WriteOutcome::SkippedStale) => {
                tracing::debug!(
                    tier,
                    fingerprint = plan.fingerprint.short(),
                    "Newer plan already cached, write skipped"
                );
            }
            Err(e) => absorb(store, tier, "put", &e),
        }
    }
}

fn tagged(mut plan: CachedPlan, source: CacheSource) -> CachedPlan {
    plan.source = source;
    plan
}

fn absorb(store: &dyn PlanStore, tier: &str, op: &str, err: &Error) {
    tracing::warn!(tier, backend = store.name(), op, error = %err, "Cache tier unavailable, treating as miss");
    plan_metrics::record_cache_backend_error(tier);
}
