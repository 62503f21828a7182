//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use fitforge_catalog::CatalogIndex;
use fitforge_core::config::AppConfig;
use fitforge_core::mocks::ScriptedProvider;
use fitforge_core::{
    CatalogItem, Constraints, ExperienceLevel, GenerationRequest, Intent, PlanStore, WorkoutType,
};
use fitforge_gateway::GenerationGateway;
use fitforge_store::InMemoryPlanStore;

/// Gateway wired with in-memory tiers and a scripted provider.
pub struct Harness {
    pub gateway: Arc<GenerationGateway>,
    pub provider: Arc<ScriptedProvider>,
    pub fast: Arc<InMemoryPlanStore>,
    pub durable: Arc<InMemoryPlanStore>,
}

/// Defaults with no backoff between provider attempts.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.provider.backoff.base_ms = 0;
    config
}

pub fn harness(provider: ScriptedProvider, items: Vec<CatalogItem>) -> Harness {
    harness_with(provider, items, test_config())
}

pub fn harness_with(provider: ScriptedProvider, items: Vec<CatalogItem>, config: AppConfig) -> Harness {
    let fast = Arc::new(InMemoryPlanStore::named("fast"));
    let durable = Arc::new(InMemoryPlanStore::named("durable"));
    let provider = Arc::new(provider);
    let gateway = build(&config, items, provider.clone(), fast.clone(), durable.clone());
    Harness {
        gateway,
        provider,
        fast,
        durable,
    }
}

pub fn build(
    config: &AppConfig,
    items: Vec<CatalogItem>,
    provider: Arc<ScriptedProvider>,
    fast: Arc<dyn PlanStore>,
    durable: Arc<dyn PlanStore>,
) -> Arc<GenerationGateway> {
    let catalog = Arc::new(CatalogIndex::load(items).unwrap());
    Arc::new(GenerationGateway::from_config(config, catalog, provider, fast, durable))
}

/// 30-minute beginner workout with only bodyweight equipment.
pub fn workout(identity: Option<&str>, workout_type: WorkoutType) -> GenerationRequest {
    GenerationRequest {
        identity: identity.map(String::from),
        constraints: Constraints {
            equipment: ["bodyweight".to_string()].into(),
            experience_level: ExperienceLevel::Beginner,
            exclusions: Default::default(),
        },
        intent: Intent::Workout { workout_type },
        target: 30.0,
    }
}
