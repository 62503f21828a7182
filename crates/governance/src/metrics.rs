//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use fitforge_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Count one served (or failed) plan request.
pub fn record_plan_request(intent: &str, outcome: &str) {
    metrics::counter!(
        "plan_requests_total",
        "intent" => intent.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count a cache tier lookup.
pub fn record_cache_lookup(tier: &str, hit: bool) {
    metrics::counter!(
        "plan_cache_lookups_total",
        "tier" => tier.to_string(),
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Count a cache backend failure that was absorbed as a miss.
pub fn record_cache_backend_error(tier: &str) {
    metrics::counter!("plan_cache_backend_errors_total", "tier" => tier.to_string()).increment(1);
}

/// Count one provider call by outcome (`ok` or an error kind).
pub fn record_provider_call(provider: &str, outcome: &str) {
    metrics::counter!(
        "provider_calls_total",
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Time spent in a fresh generation.
pub fn record_generation_duration(seconds: f64) {
    metrics::histogram!("plan_generation_duration_seconds").record(seconds);
}

pub fn record_replacements(count: usize) {
    if count > 0 {
        metrics::counter!("plan_replacements_total").increment(count as u64);
    }
}

pub fn record_rate_limited() {
    metrics::counter!("rate_limited_total").increment(1);
}

/// Count a caller that joined an in-flight generation.
pub fn record_singleflight_join() {
    metrics::counter!("singleflight_joins_total").increment(1);
}

/// Helper to track token usage.
pub fn track_tokens(provider: &str, prompt: u64, completion: u64) {
    metrics::counter!("llm_token_usage_total", "provider" => provider.to_string(), "type" => "prompt").increment(prompt);
    metrics::counter!("llm_token_usage_total", "provider" => provider.to_string(), "type" => "completion").increment(completion);
}
