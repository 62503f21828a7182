//! In-memory plan store implementation using DashMap.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

use fitforge_core::{CachedPlan, PlanStore, RequestFingerprint, Result, WriteOutcome};

/// In-memory plan store using DashMap for concurrent access.
///
/// DashMap shards its keys across independently locked buckets, so lookups
/// for unrelated fingerprints never contend on one lock. This is the fast
/// tier; with a longer TTL it also stands in for the durable tier in
/// development and tests.
#[derive(Debug)]
pub struct InMemoryPlanStore {
    name: String,
    entries: DashMap<RequestFingerprint, CachedPlan>,
}

impl InMemoryPlanStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create a store reporting `name` in logs and metrics.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for InMemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, fingerprint: &RequestFingerprint) -> Result<Option<CachedPlan>> {
        let now = Utc::now();
        if let Some(mut entry) = self.entries.get_mut(fingerprint) {
            if !entry.is_expired_at(now) {
                entry.hit_count += 1;
                entry.last_accessed_at = Some(now);
                return Ok(Some(entry.value().clone()));
            }
        }

        // Expired entries read as misses and are dropped lazily.
        self.entries
            .remove_if(fingerprint, |_, plan| plan.is_expired_at(now));
        Ok(None)
    }

    async fn put(&self, plan: &CachedPlan, ttl: Duration) -> Result<WriteOutcome> {
        let stored = plan.for_tier(ttl);
        match self.entries.entry(plan.fingerprint.clone()) {
            Entry::Occupied(mut existing) => {
                let current = existing.get();
                if !current.is_expired() && current.created_at > plan.created_at {
                    tracing::debug!(
                        store = %self.name,
                        fingerprint = %plan.fingerprint.short(),
                        "Skipped stale write"
                    );
                    return Ok(WriteOutcome::SkippedStale);
                }
                existing.insert(stored);
            }
            Entry::Vacant(slot) => {
                slot.insert(stored);
            }
        }
        Ok(WriteOutcome::Written)
    }

    async fn invalidate(&self, fingerprint: &RequestFingerprint) -> Result<()> {
        self.entries.remove(fingerprint);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        self.entries.retain(|_, plan| {
            let keep = !plan.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use fitforge_core::{
        FilterStats, GeneratedPlan, Intent, MealSlot, ValidationReport,
    };

    fn plan(fp: &str) -> CachedPlan {
        CachedPlan::fresh(
            RequestFingerprint::from_string(fp),
            GeneratedPlan {
                intent: Intent::Meal {
                    meal_slot: MealSlot::Dinner,
                },
                title: Some("Dinner".into()),
                entries: vec![],
            },
            FilterStats::default(),
            ValidationReport::default(),
        )
    }

    #[tokio::test]
    async fn test_put_get_counts_hits() {
        let store = InMemoryPlanStore::new();
        let p = plan("a");
        assert_eq!(
            store.put(&p, Duration::from_secs(60)).await.unwrap(),
            WriteOutcome::Written
        );

        let first = store.get(&p.fingerprint).await.unwrap().unwrap();
        let second = store.get(&p.fingerprint).await.unwrap().unwrap();
        assert_eq!(first.hit_count, 1);
        assert_eq!(second.hit_count, 2);
        assert!(second.last_accessed_at.is_some());
        assert_eq!(second.payload, p.payload);
    }

    #[tokio::test]
    async fn test_expired_reads_as_miss() {
        let store = InMemoryPlanStore::new();
        let p = plan("a");
        store.put(&p, Duration::ZERO).await.unwrap();

        assert!(store.get(&p.fingerprint).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_older_write_does_not_overwrite_newer() {
        let store = InMemoryPlanStore::new();
        let mut newer = plan("a");
        newer.payload.title = Some("newer".into());
        let mut older = plan("a");
        older.created_at = newer.created_at - ChronoDuration::seconds(10);

        store.put(&newer, Duration::from_secs(60)).await.unwrap();
        let outcome = store.put(&older, Duration::from_secs(60)).await.unwrap();

        assert_eq!(outcome, WriteOutcome::SkippedStale);
        let stored = store.get(&newer.fingerprint).await.unwrap().unwrap();
        assert_eq!(stored.created_at, newer.created_at);
    }

    #[tokio::test]
    async fn test_purge_and_invalidate() {
        let store = InMemoryPlanStore::new();
        store.put(&plan("live"), Duration::from_secs(60)).await.unwrap();
        store.put(&plan("dead-1"), Duration::ZERO).await.unwrap();
        store.put(&plan("dead-2"), Duration::ZERO).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert_eq!(store.len(), 1);

        store
            .invalidate(&RequestFingerprint::from_string("live"))
            .await
            .unwrap();
        assert!(store.is_empty());
    }
}
