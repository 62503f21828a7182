//! Generation gateway façade.
//!
//! Orders the request path: normalize, rate limit, fingerprint, fast-tier
//! peek, then single-flight around the tiered cache and fresh generation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fitforge_catalog::CatalogIndex;
use fitforge_core::config::{AppConfig, GatewayConfig, Personalization};
use fitforge_core::{
    CacheSource, CachedPlan, CompletionProvider, Error, GenerationRequest, PlanResponse, PlanStore,
    RequestFingerprint, ResponseMetadata, Result,
};
use fitforge_governance::metrics as plan_metrics;
use fitforge_governance::{Admission, GenerationBudget, RateLimiter};
use fitforge_model_gateway::{AdapterSettings, ProviderAdapter, RetryPolicy};

use crate::generator::PlanGenerator;
use crate::orchestrator::{SweepReport, TieredPlanCache};
use crate::single_flight::{FlightHandle, Role, SingleFlight};

/// Entry point for plan generation.
pub struct GenerationGateway {
    cache: Arc<TieredPlanCache>,
    generator: Arc<PlanGenerator>,
    flights: SingleFlight<CachedPlan>,
    limiter: RateLimiter,
    budget: Arc<GenerationBudget>,
    schema_version: String,
    deadline: Duration,
}

impl GenerationGateway {
    pub fn new(
        config: &GatewayConfig,
        cache: TieredPlanCache,
        generator: PlanGenerator,
        limiter: RateLimiter,
        budget: GenerationBudget,
    ) -> Self {
        Self {
            cache: Arc::new(cache),
            generator: Arc::new(generator),
            flights: SingleFlight::new(),
            limiter,
            budget: Arc::new(budget),
            schema_version: config.schema_version.clone(),
            deadline: config.request_deadline(),
        }
    }

    /// Wire a gateway from application configuration.
    pub fn from_config(
        config: &AppConfig,
        catalog: Arc<CatalogIndex>,
        provider: Arc<dyn CompletionProvider>,
        fast: Arc<dyn PlanStore>,
        durable: Arc<dyn PlanStore>,
    ) -> Self {
        let settings = AdapterSettings::from_config(
            &config.provider,
            config.gateway.max_prompt_candidates,
            config.gateway.strict_prompt_candidates,
        );
        let adapter = ProviderAdapter::new(provider, settings)
            .with_retry(RetryPolicy::from(&config.provider.backoff));

        Self::new(
            &config.gateway,
            TieredPlanCache::new(fast, durable, config.cache.clone()),
            PlanGenerator::new(catalog, adapter),
            RateLimiter::from_config(&config.rate_limit),
            GenerationBudget::from_config(&config.budget),
        )
    }

    pub fn catalog(&self) -> &CatalogIndex {
        self.generator.catalog()
    }

    /// Generations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Serve a plan for `request`.
    pub async fn generate(&self, request: GenerationRequest) -> Result<PlanResponse> {
        let intent = request.intent.category().as_str();
        let result = self.serve(request).await;

        let outcome = match &result {
            Ok(response) => response.metadata.cache_source.as_str(),
            Err(e) => e.kind(),
        };
        plan_metrics::record_plan_request(intent, outcome);
        result
    }

    async fn serve(&self, request: GenerationRequest) -> Result<PlanResponse> {
        let started = Instant::now();
        let request = request.normalized()?;

        if let Admission::RateLimited { retry_after } =
            self.limiter.check_and_consume(request.identity.as_deref())
        {
            plan_metrics::record_rate_limited();
            return Err(Error::RateLimited { retry_after });
        }

        let category = request.intent.category();
        let include_identity = match self.cache.policy(category).personalization {
            Personalization::Never => false,
            Personalization::Always => true,
            Personalization::WhenExclusions => !request.constraints.exclusions.is_empty(),
        };
        let fingerprint = RequestFingerprint::compute(&request, &self.schema_version, include_identity);

        if let Some(plan) = self.cache.peek_fast(&fingerprint).await {
            tracing::debug!(fingerprint = fingerprint.short(), "Served from fast tier");
            return Ok(respond(plan, started));
        }

        let remaining = self.deadline.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, self.await_flight(&request, &fingerprint)).await {
            Ok(result) => Ok(respond(result?, started)),
            Err(_) => {
                tracing::warn!(
                    fingerprint = fingerprint.short(),
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Request deadline exceeded, detaching from generation"
                );
                Err(Error::DeadlineExceeded(self.deadline))
            }
        }
    }

    /// Lead or join the flight for `fingerprint` until it yields an outcome
    /// that belongs to this caller.
    ///
    /// The budget is checked by the leader only. A waiter that receives the
    /// leader's `BudgetExceeded` re-checks its own budget and either reports
    /// its own rejection or starts over on a fresh flight.
    async fn await_flight(
        &self,
        request: &GenerationRequest,
        fingerprint: &RequestFingerprint,
    ) -> Result<CachedPlan> {
        let identity = request.identity.as_deref();
        loop {
            let handle = self.launch(request, fingerprint);
            let role = handle.role();
            if role == Role::Waiter {
                plan_metrics::record_singleflight_join();
                tracing::debug!(fingerprint = fingerprint.short(), "Joined in-flight generation");
            }

            match handle.wait().await {
                Err(Error::BudgetExceeded { .. }) if role == Role::Waiter => {
                    self.budget.check(identity)?;
                    tracing::debug!(
                        fingerprint = fingerprint.short(),
                        "Flight leader was over budget, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    fn launch(&self, request: &GenerationRequest, fingerprint: &RequestFingerprint) -> FlightHandle<CachedPlan> {
        self.flights.acquire_or_join(fingerprint, || {
            let cache = self.cache.clone();
            let generator = self.generator.clone();
            let budget = self.budget.clone();
            let request = request.clone();
            let fingerprint = fingerprint.clone();
            async move {
                let category = request.intent.category();
                cache
                    .resolve_after_fast_miss(&fingerprint, category, || async {
                        let identity = request.identity.as_deref();
                        budget.check(identity)?;
                        let generated = generator.generate(&request, &fingerprint).await?;
                        budget.record_usage(identity, generated.usage);
                        Ok(generated.plan)
                    })
                    .await
            }
        })
    }

    /// Drop a cached plan from both tiers.
    pub async fn invalidate(&self, fingerprint: &RequestFingerprint) {
        self.cache.invalidate(fingerprint).await;
    }

    /// Periodic housekeeping: expired plans and idle limiter state.
    pub async fn sweep(&self) -> SweepReport {
        self.limiter.cleanup();
        self.budget.cleanup();
        self.cache.sweep().await
    }
}

fn respond(plan: CachedPlan, started: Instant) -> PlanResponse {
    PlanResponse {
        metadata: ResponseMetadata {
            cached: plan.source != CacheSource::Fresh,
            cache_source: plan.source,
            generation_time_ms: started.elapsed().as_millis() as u64,
            filter_stats: plan.filter_stats,
            validation: plan.validation,
            fingerprint: plan.fingerprint.0,
        },
        plan: plan.payload,
    }
}
