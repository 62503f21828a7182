//! Distributed tracing configuration.

use fitforge_core::{Error, Result};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Configure distributed tracing with OpenTelemetry and stdout logging.
///
/// `json_logs` switches the stdout layer to one JSON object per line. The
/// OTLP exporter is installed only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
pub fn configure_tracing(json_logs: bool) -> Result<()> {
    // Basic EnvFilter
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,fitforge=debug".into()),
    );

    // Stdout formatting layer
    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    // Registry with fmt and filter
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    // Check OTLP endpoint
    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint.clone()),
            )
            .with_trace_config(
                sdktrace::config().with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    "fitforge-gateway",
                )])),
            )
            .install_batch(runtime::Tokio)
            .map_err(|e| Error::Config(format!("Failed to install OTLP pipeline: {}", e)))?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        registry
            .with(otel_layer)
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))?;
        tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing initialized");
    } else {
        registry
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))?;
    }

    Ok(())
}
