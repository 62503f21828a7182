#![deny(unused)]
//! FitForge - AI plan generation gateway
//!
//! Serves workout and meal plans generated by an LLM but constrained to a
//! fixed catalog, behind tiered caching, single-flight coordination and
//! per-identity rate limiting.

use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

use fitforge_catalog::{dataset, CatalogIndex};
use fitforge_core::config::AppConfig;
use fitforge_core::PlanStore;
use fitforge_gateway::{GatewayServer, GenerationGateway};
use fitforge_store::InMemoryPlanStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize tracing
    fitforge_governance::configure_tracing(config.observability.json_logs)?;

    tracing::info!("Starting FitForge v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Catalog (fail fast on a bad dataset)
    // =========================================================================
    let catalog = match &config.catalog.path {
        Some(path) => {
            tracing::info!(path = %path, "Loading catalog from file");
            CatalogIndex::from_path(path)?
        }
        None => {
            tracing::info!("Loading built-in catalog");
            dataset::builtin()?
        }
    };
    let catalog = Arc::new(catalog);
    tracing::info!(items = catalog.len(), "Catalog loaded");

    // =========================================================================
    // Cache tiers
    // =========================================================================
    let fast: Arc<dyn PlanStore> = Arc::new(InMemoryPlanStore::named("memory-fast"));
    let redis_url = config.cache.redis_url.as_ref().map(|url| url.expose_secret().as_str());
    let durable = fitforge_store::durable_store(redis_url, &config.cache.key_prefix)?;

    tracing::info!(
        fast = fast.name(),
        durable = durable.name(),
        "Cache tiers initialized"
    );

    // =========================================================================
    // Completion provider
    // =========================================================================
    let provider = fitforge_model_gateway::create_provider(&config.provider)?;
    tracing::info!(provider = provider.name(), model = %config.provider.model, "Completion provider initialized");

    // =========================================================================
    // Gateway
    // =========================================================================
    let gateway = Arc::new(GenerationGateway::from_config(
        &config,
        catalog.clone(),
        provider,
        fast,
        durable,
    ));

    spawn_sweeper(gateway.clone(), Duration::from_secs(config.cache.sweep_interval_secs.max(1)));

    let mut server = GatewayServer::new(config.server.clone(), gateway);
    if config.observability.metrics_enabled {
        let metrics_handle = fitforge_governance::setup_metrics_recorder()?;
        server = server.with_metrics(metrics_handle);
    }

    // =========================================================================
    // Print startup banner
    // =========================================================================
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     FitForge v{}", env!("CARGO_PKG_VERSION"));
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Endpoints:");
    println!("║    POST   /v1/plans/generate           - Generate a plan");
    println!("║    DELETE /v1/plans/cache/:fingerprint - Invalidate a plan");
    println!("║    GET    /v1/catalog/:id              - Catalog lookup");
    println!("║    GET    /health                      - Health check");
    println!("║    GET    /metrics                     - Prometheus metrics");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Catalog: {} items", catalog.len());
    println!("║  Server:  http://{}:{}", config.server.host, config.server.port);
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    server.run().await?;

    Ok(())
}

/// Periodically drop expired plans and idle limiter state.
fn spawn_sweeper(gateway: Arc<GenerationGateway>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = gateway.sweep().await;
            tracing::debug!(fast = report.fast, durable = report.durable, "Sweep complete");
        }
    });
}
