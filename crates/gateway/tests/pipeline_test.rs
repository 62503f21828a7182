mod common;

use std::sync::Arc;
use std::time::Duration;

use fitforge_catalog::CandidateFilter;
use fitforge_core::mocks::{synthetic_catalog, synthetic_foods, FailingPlanStore, ScriptedProvider};
use fitforge_core::{CacheSource, EntryParams, Error, Intent, MealSlot, WorkoutType};
use fitforge_store::InMemoryPlanStore;

use common::{build, harness, harness_with, test_config, workout};

#[tokio::test]
async fn test_repeat_request_served_from_fast_tier() {
    let h = harness(ScriptedProvider::echo(), synthetic_catalog(300));

    let first = h
        .gateway
        .generate(workout(Some("alice"), WorkoutType::Cardio))
        .await
        .unwrap();
    let second = h
        .gateway
        .generate(workout(Some("alice"), WorkoutType::Cardio))
        .await
        .unwrap();

    assert_eq!(first.metadata.cache_source, CacheSource::Fresh);
    assert!(!first.metadata.cached);
    assert_eq!(second.metadata.cache_source, CacheSource::Fast);
    assert!(second.metadata.cached);
    assert_eq!(first.plan, second.plan);
    assert_eq!(first.metadata.fingerprint, second.metadata.fingerprint);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_identical_requests_call_provider_once() {
    let h = harness(
        ScriptedProvider::echo().with_latency(Duration::from_millis(200)),
        synthetic_catalog(300),
    );

    let requests = (0..8).map(|i| {
        let gateway = h.gateway.clone();
        let identity = format!("user-{}", i);
        async move {
            gateway
                .generate(workout(Some(&identity), WorkoutType::Hiit))
                .await
        }
    });
    let responses = futures::future::join_all(requests).await;

    assert_eq!(h.provider.calls(), 1);
    let plans: Vec<_> = responses.into_iter().map(|r| r.unwrap().plan).collect();
    assert!(plans.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(h.gateway.in_flight(), 0);
}

#[tokio::test]
async fn test_bodyweight_beginner_scenario_repairs_one_entry() {
    let items = synthetic_catalog(1500);
    let h = harness(ScriptedProvider::echo(), items);
    let request = workout(None, WorkoutType::Cardio);

    let candidate_ids = {
        let normalized = request.clone().normalized().unwrap();
        let candidates = CandidateFilter::new(h.gateway.catalog())
            .filter(&normalized.constraints, &normalized.intent)
            .unwrap();
        candidates.ids(5)
    };
    // ex-0003 needs a barbell, so it is in the catalog but not a candidate.
    let mut proposed: Vec<&str> = candidate_ids.iter().map(String::as_str).collect();
    proposed.insert(2, "ex-0003");

    let h = harness(
        ScriptedProvider::new(vec![ScriptedProvider::plan_of(&proposed)]),
        synthetic_catalog(1500),
    );
    let response = h.gateway.generate(request).await.unwrap();

    let stats = &response.metadata.filter_stats;
    assert_eq!(stats.catalog_size, 1500);
    assert!(stats.candidate_count < 1500);

    let validation = &response.metadata.validation;
    assert_eq!(validation.invalid_found, 1);
    assert_eq!(validation.replacements_made, 1);

    let entries = &response.plan.entries;
    assert_eq!(entries.len(), 6);
    let bodyweight = ["bodyweight".to_string()].into();
    for entry in entries {
        let item = h.gateway.catalog().lookup(&entry.item_id).unwrap();
        assert!(item.equipment.is_subset(&bodyweight), "{} needs equipment", item.id);
        assert!(!entry.media_ref.is_empty());
    }
    assert!(entries.iter().all(|e| e.item_id != "ex-0003"));
    assert!(entries[2].replacement_note.is_some());
}

#[tokio::test]
async fn test_every_entry_resolves_with_media() {
    let mut items = synthetic_catalog(200);
    items.extend(synthetic_foods(40));
    let h = harness(ScriptedProvider::echo(), items);

    let mut meal = workout(Some("bob"), WorkoutType::Strength);
    meal.intent = Intent::Meal {
        meal_slot: MealSlot::Lunch,
    };
    meal.constraints.equipment.clear();
    meal.constraints.exclusions = ["peanut".to_string()].into();
    meal.target = 600.0;

    let requests = vec![
        workout(Some("bob"), WorkoutType::Strength),
        workout(Some("bob"), WorkoutType::Mobility),
        meal,
    ];

    for request in requests {
        let response = h.gateway.generate(request).await.unwrap();
        assert!(!response.plan.entries.is_empty());
        for entry in &response.plan.entries {
            let item = h.gateway.catalog().lookup(&entry.item_id).unwrap();
            assert!(!item.media_ref.is_empty());
            assert_eq!(entry.media_ref, item.media_ref);
            assert!(!item.contraindications.contains("peanut"));
            if let EntryParams::Portion { servings, .. } = entry.params {
                assert!(servings > 0.0);
            }
        }
    }
}

#[tokio::test]
async fn test_quota_exhausted_identity_is_limited() {
    let mut config = test_config();
    config.rate_limit.max_requests = 3;
    let h = harness_with(ScriptedProvider::echo(), synthetic_catalog(100), config);

    for _ in 0..3 {
        h.gateway
            .generate(workout(Some("alice"), WorkoutType::Cardio))
            .await
            .unwrap();
    }

    let err = h
        .gateway
        .generate(workout(Some("alice"), WorkoutType::Cardio))
        .await
        .unwrap_err();
    match err {
        Error::RateLimited { retry_after } => assert!(retry_after <= Duration::from_secs(3600)),
        other => panic!("expected RateLimited, got {:?}", other),
    }

    h.gateway
        .generate(workout(Some("bob"), WorkoutType::Cardio))
        .await
        .unwrap();
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_durable_hit_backfills_fast_tier() {
    let config = test_config();
    let durable = Arc::new(InMemoryPlanStore::named("durable"));

    let first_provider = Arc::new(ScriptedProvider::echo());
    let first = build(
        &config,
        synthetic_catalog(100),
        first_provider.clone(),
        Arc::new(InMemoryPlanStore::named("fast-a")),
        durable.clone(),
    );
    let generated = first
        .generate(workout(None, WorkoutType::Strength))
        .await
        .unwrap();

    // A second replica with a cold fast tier and the same durable tier.
    let second_provider = Arc::new(ScriptedProvider::echo());
    let fast = Arc::new(InMemoryPlanStore::named("fast-b"));
    let second = build(
        &config,
        synthetic_catalog(100),
        second_provider.clone(),
        fast.clone(),
        durable,
    );

    let from_durable = second
        .generate(workout(None, WorkoutType::Strength))
        .await
        .unwrap();
    assert_eq!(from_durable.metadata.cache_source, CacheSource::Durable);
    assert_eq!(from_durable.plan, generated.plan);
    assert_eq!(fast.len(), 1);

    let from_fast = second
        .generate(workout(None, WorkoutType::Strength))
        .await
        .unwrap();
    assert_eq!(from_fast.metadata.cache_source, CacheSource::Fast);
    assert_eq!(second_provider.calls(), 0);
    assert_eq!(first_provider.calls(), 1);
}

#[tokio::test]
async fn test_unavailable_cache_degrades_to_generation() {
    let provider = Arc::new(ScriptedProvider::echo());
    let fast = Arc::new(FailingPlanStore::new());
    let durable = Arc::new(FailingPlanStore::new());
    let gateway = build(
        &test_config(),
        synthetic_catalog(100),
        provider.clone(),
        fast.clone(),
        durable.clone(),
    );

    for _ in 0..2 {
        let response = gateway
            .generate(workout(None, WorkoutType::Cardio))
            .await
            .unwrap();
        assert_eq!(response.metadata.cache_source, CacheSource::Fresh);
    }

    assert_eq!(provider.calls(), 2);
    assert!(fast.attempts() > 0);
    assert!(durable.attempts() > 0);
}

#[tokio::test]
async fn test_deadline_detaches_without_cancelling_generation() {
    let mut config = test_config();
    config.gateway.request_deadline_ms = 50;
    let h = harness_with(
        ScriptedProvider::echo().with_latency(Duration::from_millis(300)),
        synthetic_catalog(100),
        config,
    );

    let err = h
        .gateway
        .generate(workout(None, WorkoutType::Mobility))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "DeadlineExceeded");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.gateway.in_flight(), 0);
    assert_eq!(h.fast.len(), 1);
    assert_eq!(h.durable.len(), 1);

    let response = h
        .gateway
        .generate(workout(None, WorkoutType::Mobility))
        .await
        .unwrap();
    assert_eq!(response.metadata.cache_source, CacheSource::Fast);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_budget_blocks_fresh_generation_only() {
    let mut config = test_config();
    config.budget.tokens_per_window = 100;
    let h = harness_with(
        ScriptedProvider::new(vec![ScriptedProvider::plan_of(&[
            "ex-0000", "ex-0006", "ex-0012",
        ])]),
        synthetic_catalog(100),
        config,
    );

    h.gateway
        .generate(workout(Some("carol"), WorkoutType::Cardio))
        .await
        .unwrap();

    let err = h
        .gateway
        .generate(workout(Some("carol"), WorkoutType::Strength))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "BudgetExceeded");
    assert!(err.retry_after().is_some());

    let cached = h
        .gateway
        .generate(workout(Some("carol"), WorkoutType::Cardio))
        .await
        .unwrap();
    assert!(cached.metadata.cached);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_invalid_target_rejected_before_admission() {
    let mut config = test_config();
    config.rate_limit.max_requests = 1;
    let h = harness_with(ScriptedProvider::echo(), synthetic_catalog(50), config);

    let mut bad = workout(Some("dave"), WorkoutType::Cardio);
    bad.target = -5.0;
    assert_eq!(
        h.gateway.generate(bad).await.unwrap_err().kind(),
        "InvalidRequest"
    );

    h.gateway
        .generate(workout(Some("dave"), WorkoutType::Cardio))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalidate_forces_regeneration() {
    let h = harness(ScriptedProvider::echo(), synthetic_catalog(100));
    let first = h
        .gateway
        .generate(workout(None, WorkoutType::Hiit))
        .await
        .unwrap();

    let fp = fitforge_core::RequestFingerprint::from_string(first.metadata.fingerprint.clone());
    h.gateway.invalidate(&fp).await;
    assert!(h.fast.is_empty());
    assert!(h.durable.is_empty());

    let again = h
        .gateway
        .generate(workout(None, WorkoutType::Hiit))
        .await
        .unwrap();
    assert_eq!(again.metadata.cache_source, CacheSource::Fresh);
    assert_eq!(h.provider.calls(), 2);
}

#[tokio::test]
async fn test_budget_rejection_stays_with_its_owner() {
    let mut config = test_config();
    config.budget.tokens_per_window = 100;
    let h = harness_with(ScriptedProvider::echo(), synthetic_catalog(100), config);

    // 150 tokens, over carol's limit.
    h.gateway
        .generate(workout(Some("carol"), WorkoutType::Strength))
        .await
        .unwrap();

    // Same fingerprint for both: no exclusions, so identity is not part of it.
    // carol is polled first and leads the flight; dave joins it.
    let (carol, dave) = tokio::join!(
        h.gateway.generate(workout(Some("carol"), WorkoutType::Cardio)),
        h.gateway.generate(workout(Some("dave"), WorkoutType::Cardio)),
    );

    match carol.unwrap_err() {
        Error::BudgetExceeded { used, limit, .. } => {
            assert_eq!(used, 150);
            assert_eq!(limit, 100);
        }
        other => panic!("expected BudgetExceeded, got {:?}", other),
    }
    let dave = dave.unwrap();
    assert_eq!(dave.metadata.cache_source, CacheSource::Fresh);
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.gateway.in_flight(), 0);
}

#[tokio::test]
async fn test_exclusion_tags_with_separators_get_their_own_plan() {
    let h = harness(ScriptedProvider::echo(), synthetic_catalog(300));

    let mut joined = workout(None, WorkoutType::Strength);
    joined.constraints.exclusions = ["knee_injury,zzz".to_string()].into();
    let mut split = workout(None, WorkoutType::Strength);
    split.constraints.exclusions = ["knee_injury".to_string(), "zzz".to_string()].into();

    let first = h.gateway.generate(joined).await.unwrap();
    let second = h.gateway.generate(split).await.unwrap();

    assert_ne!(first.metadata.fingerprint, second.metadata.fingerprint);
    assert_eq!(second.metadata.cache_source, CacheSource::Fresh);
    for entry in &second.plan.entries {
        let item = h.gateway.catalog().lookup(&entry.item_id).unwrap();
        assert!(!item.contraindications.contains("knee_injury"), "{} is contraindicated", item.id);
    }
    assert_eq!(h.provider.calls(), 2);
}
