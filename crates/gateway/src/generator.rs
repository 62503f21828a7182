//! Fresh plan generation: filter, prompt the provider, validate.

use std::sync::Arc;
use std::time::Instant;

use fitforge_catalog::{CandidateFilter, CatalogIndex, PlanValidator};
use fitforge_core::{CachedPlan, GenerationRequest, LlmUsage, RequestFingerprint, Result};
use fitforge_governance::metrics as plan_metrics;
use fitforge_model_gateway::ProviderAdapter;

/// A freshly generated plan and what it cost.
#[derive(Debug, Clone)]
pub struct Generated {
    pub plan: CachedPlan,
    pub usage: LlmUsage,
}

/// Runs the catalog-constrained generation pipeline.
pub struct PlanGenerator {
    catalog: Arc<CatalogIndex>,
    adapter: ProviderAdapter,
}

impl PlanGenerator {
    pub fn new(catalog: Arc<CatalogIndex>, adapter: ProviderAdapter) -> Self {
        Self { catalog, adapter }
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    pub fn provider_name(&self) -> &str {
        self.adapter.provider_name()
    }

    /// Generate a plan for `request`.
    ///
    /// Fails with `InsufficientCatalogCoverage` before any provider call when
    /// the constraints leave no candidates.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        fingerprint: &RequestFingerprint,
    ) -> Result<Generated> {
        let started = Instant::now();

        let candidates = CandidateFilter::new(&self.catalog).filter(&request.constraints, &request.intent)?;
        let desired = request.desired_entries();

        tracing::debug!(
            fingerprint = fingerprint.short(),
            intent = %request.intent,
            candidates = candidates.len(),
            desired,
            "Generating plan"
        );

        let output = self
            .adapter
            .generate(request, candidates.items(), desired)
            .await?;

        let (plan, report) = PlanValidator::new(&self.catalog).validate(&output.plan, &candidates, request)?;

        plan_metrics::record_replacements(report.replacements_made);
        plan_metrics::track_tokens(
            self.adapter.provider_name(),
            output.usage.prompt_tokens,
            output.usage.completion_tokens,
        );
        plan_metrics::record_generation_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            fingerprint = fingerprint.short(),
            entries = plan.entries.len(),
            replacements = report.replacements_made,
            dropped = report.dropped,
            attempts = output.attempts,
            strict = output.strict,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Plan generated"
        );

        Ok(Generated {
            plan: CachedPlan::fresh(fingerprint.clone(), plan, candidates.stats().clone(), report),
            usage: output.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitforge_core::mocks::{synthetic_catalog, ScriptedProvider};
    use fitforge_core::{Constraints, ExperienceLevel, Intent, WorkoutType};
    use fitforge_model_gateway::AdapterSettings;

    fn request(exclusions: &[&str]) -> GenerationRequest {
        GenerationRequest {
            identity: None,
            constraints: Constraints {
                equipment: ["bodyweight".to_string()].into(),
                experience_level: ExperienceLevel::Beginner,
                exclusions: exclusions.iter().map(|s| s.to_string()).collect(),
            },
            intent: Intent::Workout {
                workout_type: WorkoutType::Cardio,
            },
            target: 30.0,
        }
        .normalized()
        .unwrap()
    }

    fn generator(provider: Arc<ScriptedProvider>) -> PlanGenerator {
        let catalog = Arc::new(CatalogIndex::load(synthetic_catalog(300)).unwrap());
        PlanGenerator::new(catalog, ProviderAdapter::new(provider, AdapterSettings::default()))
    }

    #[tokio::test]
    async fn test_generates_catalog_backed_plan() {
        let provider = Arc::new(ScriptedProvider::echo());
        let generator = generator(provider.clone());
        let fp = RequestFingerprint::from_string("gen-1");

        let generated = generator.generate(&request(&[]), &fp).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(generated.plan.payload.entries.len(), 6);
        assert_eq!(generated.plan.filter_stats.catalog_size, 300);
        for entry in &generated.plan.payload.entries {
            let item = generator.catalog().lookup(&entry.item_id).unwrap();
            assert!(!item.media_ref.is_empty());
            assert_eq!(entry.media_ref, item.media_ref);
        }
    }

    #[tokio::test]
    async fn test_no_candidates_skips_provider() {
        let provider = Arc::new(ScriptedProvider::echo());
        let generator = generator(provider.clone());
        let mut req = request(&[]);
        req.constraints.equipment = ["hovercraft".to_string()].into();
        // Items without equipment remain eligible, so exclude them too.
        req.constraints.exclusions = ["strength", "cardio", "hiit", "mobility", "full_body"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let err = generator
            .generate(&req, &RequestFingerprint::from_string("gen-2"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "InsufficientCatalogCoverage");
        assert_eq!(provider.calls(), 0);
    }
}
