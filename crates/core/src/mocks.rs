//! Mock implementations of core traits for testing.
//!
//! Shared by the unit and integration tests of every crate: a scripted
//! completion provider, a cache backend that is always down, and synthetic
//! catalog fixtures.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{
    traits::{CompletionProvider, CompletionRequest, CompletionResponse, LlmUsage, PlanStore, WriteOutcome},
    types::{CachedPlan, CatalogItem, ExperienceLevel, ItemKind, RawModelOutput, RequestFingerprint},
    Error, Result,
};

// =============================================================================
// Scripted Provider
// =============================================================================

/// Completion provider that replays queued results.
///
/// Once the queue is drained it echoes the first `desired_entries`
/// candidate ids, which is always a valid plan.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<CompletionResponse>>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Create a provider with a queue of results.
    pub fn new(script: Vec<Result<CompletionResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            latency: None,
            last_request: Mutex::new(None),
        }
    }

    /// Provider that always echoes valid candidates.
    pub fn echo() -> Self {
        Self::new(vec![])
    }

    /// Sleep before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made to this provider.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request received.
    pub async fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().await.clone()
    }

    /// Structured response selecting the given ids.
    pub fn plan_of(ids: &[&str]) -> Result<CompletionResponse> {
        let entries: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "sets": 3, "reps": 10, "rest_seconds": 60 }))
            .collect();
        Ok(CompletionResponse {
            output: RawModelOutput::Structured(json!({ "title": "Scripted", "entries": entries })),
            usage: LlmUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
            },
        })
    }

    /// Free-text response that contains no JSON.
    pub fn garbage() -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            output: RawModelOutput::Text("Sure! Here is a great workout for you.".into()),
            usage: LlmUsage::default(),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(next) = self.script.lock().await.pop_front() {
            return next;
        }

        let ids: Vec<&str> = request
            .candidate_ids
            .iter()
            .take(request.desired_entries.max(1))
            .map(String::as_str)
            .collect();
        Self::plan_of(&ids)
    }
}

// =============================================================================
// Failing Plan Store
// =============================================================================

/// Cache backend that fails every operation.
#[derive(Default)]
pub struct FailingPlanStore {
    attempts: AtomicUsize,
}

impl FailingPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations attempted against this store.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::storage("connection refused"))
    }
}

#[async_trait]
impl PlanStore for FailingPlanStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get(&self, _fingerprint: &RequestFingerprint) -> Result<Option<CachedPlan>> {
        self.fail()
    }

    async fn put(&self, _plan: &CachedPlan, _ttl: Duration) -> Result<WriteOutcome> {
        self.fail()
    }

    async fn invalidate(&self, _fingerprint: &RequestFingerprint) -> Result<()> {
        self.fail()
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.fail()
    }
}

// =============================================================================
// Catalog Fixtures
// =============================================================================

const CATEGORIES: [&str; 5] = ["strength", "cardio", "hiit", "mobility", "full_body"];
const EQUIPMENT: [&str; 6] = ["", "bodyweight", "dumbbell", "barbell", "kettlebell", "bodyweight"];
const REGIONS: [&str; 4] = ["legs", "chest", "back", "core"];
const LEVELS: [ExperienceLevel; 3] = [
    ExperienceLevel::Beginner,
    ExperienceLevel::Intermediate,
    ExperienceLevel::Advanced,
];

/// Deterministic exercise catalog of `n` items with ids `ex-0000..`.
///
/// Tags cycle with coprime periods so every combination is represented;
/// every eleventh item is contraindicated for `knee_injury`.
pub fn synthetic_catalog(n: usize) -> Vec<CatalogItem> {
    (0..n)
        .map(|i| {
            let id = format!("ex-{:04}", i);
            let equipment = match EQUIPMENT[i % EQUIPMENT.len()] {
                "" => BTreeSet::new(),
                tag => [tag.to_string()].into(),
            };
            let contraindications = if i % 11 == 0 {
                ["knee_injury".to_string()].into()
            } else {
                BTreeSet::new()
            };
            CatalogItem {
                name: format!("Exercise {}", i),
                kind: ItemKind::Exercise,
                categories: [CATEGORIES[i % CATEGORIES.len()].to_string()].into(),
                equipment,
                regions: [REGIONS[i % REGIONS.len()].to_string()].into(),
                contraindications,
                difficulty: Some(LEVELS[i % LEVELS.len()]),
                media_ref: format!("https://media.fitforge.example/exercises/{}.gif", id),
                instructions: vec![format!("Perform exercise {} with control.", i)],
                calories_per_serving: None,
                id,
            }
        })
        .collect()
}

/// Deterministic food catalog of `n` items with ids `food-0000..`.
///
/// Every fifth item contains `peanut`.
pub fn synthetic_foods(n: usize) -> Vec<CatalogItem> {
    const SLOTS: [&str; 4] = ["breakfast", "lunch", "dinner", "snack"];
    (0..n)
        .map(|i| {
            let id = format!("food-{:04}", i);
            let contraindications = if i % 5 == 0 {
                ["peanut".to_string()].into()
            } else {
                BTreeSet::new()
            };
            CatalogItem {
                name: format!("Food {}", i),
                kind: ItemKind::Food,
                categories: [SLOTS[i % SLOTS.len()].to_string()].into(),
                equipment: BTreeSet::new(),
                regions: BTreeSet::new(),
                contraindications,
                difficulty: None,
                media_ref: format!("https://media.fitforge.example/foods/{}.jpg", id),
                instructions: vec![],
                calories_per_serving: Some(150 + (i as u32 % 6) * 50),
                id,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(candidates: &[&str], desired: usize) -> CompletionRequest {
        CompletionRequest {
            messages: vec![],
            candidate_ids: candidates.iter().map(|s| s.to_string()).collect(),
            desired_entries: desired,
        }
    }

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let provider = ScriptedProvider::new(vec![Err(Error::provider("503"))]);
        let req = request(&["a", "b", "c"], 2);

        assert!(provider.complete(&req).await.is_err());
        let second = provider.complete(&req).await.unwrap();
        let plan = second.output.parse_plan().unwrap();

        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].id.as_deref(), Some("a"));
        assert_eq!(provider.calls(), 2);
        assert_eq!(provider.last_request().await, Some(req));
    }

    #[tokio::test]
    async fn test_failing_store_counts_attempts() {
        let store = FailingPlanStore::new();
        let fp = RequestFingerprint::from_string("x");
        assert!(store.get(&fp).await.is_err());
        assert!(store.invalidate(&fp).await.is_err());
        assert_eq!(store.attempts(), 2);
    }

    #[test]
    fn test_synthetic_catalog_is_deterministic() {
        let items = synthetic_catalog(30);
        assert_eq!(items.len(), 30);
        assert_eq!(items[0].id, "ex-0000");
        assert!(items[0].equipment.is_empty());
        assert!(items[1].equipment.contains("bodyweight"));
        assert!(items[11].contraindications.contains("knee_injury"));
        assert_eq!(synthetic_catalog(30), items);
    }
}
