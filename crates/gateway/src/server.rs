//! Axum-based HTTP server for the gateway.

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use fitforge_core::{
    config::ServerConfig, Error, GenerationEnvelope, GenerationRequest, RequestFingerprint, Result,
};

use crate::gateway::GenerationGateway;

/// Header carrying the identity verified by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state.
pub struct AppState {
    pub gateway: Arc<GenerationGateway>,
}

/// Gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(config: ServerConfig, gateway: Arc<GenerationGateway>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { gateway }),
            metrics_handle: None,
        }
    }

    /// Set metrics handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/v1/plans/generate", post(generate_handler))
            .route("/v1/plans/cache/:fingerprint", delete(invalidate_handler))
            .route("/v1/catalog/:id", get(catalog_handler))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        if self.config.enable_cors {
            router = router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub catalog_size: usize,
}

/// Error response for non-generation endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog_size: state.gateway.catalog().len(),
    })
}

async fn generate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<GenerationRequest>, JsonRejection>,
) -> Response {
    let trace_id = Uuid::new_v4().to_string();

    let mut request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(trace_id = %trace_id, error = %rejection, "Rejected request body");
            return failure(&Error::invalid_request(rejection.body_text()));
        }
    };

    if let Some(user) = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
        request.identity = Some(user.to_string());
    }

    tracing::info!(
        trace_id = %trace_id,
        intent = %request.intent,
        identity = request.identity.as_deref().unwrap_or("-"),
        "Plan request"
    );

    match state.gateway.generate(request).await {
        Ok(response) => {
            tracing::info!(
                trace_id = %trace_id,
                source = response.metadata.cache_source.as_str(),
                entries = response.plan.entries.len(),
                elapsed_ms = response.metadata.generation_time_ms,
                "Plan served"
            );
            (StatusCode::OK, Json(GenerationEnvelope::from(response))).into_response()
        }
        Err(e) => {
            tracing::warn!(trace_id = %trace_id, kind = e.kind(), error = %e, "Plan request failed");
            failure(&e)
        }
    }
}

async fn invalidate_handler(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Response {
    let valid = fingerprint.len() == 64 && fingerprint.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                code: "InvalidRequest".to_string(),
                message: "fingerprint must be a 64-character hex digest".to_string(),
                trace_id: None,
            }),
        )
            .into_response();
    }

    state
        .gateway
        .invalidate(&RequestFingerprint::from_string(fingerprint.to_lowercase()))
        .await;
    StatusCode::NO_CONTENT.into_response()
}

async fn catalog_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.gateway.catalog().lookup(&id) {
        Some(item) => Json(item.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                code: "NotFound".to_string(),
                message: format!("catalog item '{}' not found", id),
                trace_id: None,
            }),
        )
            .into_response(),
    }
}

/// Status code for an error surfaced to clients.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::RateLimited { .. } | Error::BudgetExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::InsufficientCatalogCoverage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::ProviderTimeout(_) | Error::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::ProviderError { .. }
        | Error::SchemaViolation(_)
        | Error::GenerationUnusable(_)
        | Error::NoSafeReplacement(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: &Error) -> Response {
    let mut response = (status_for(err), Json(GenerationEnvelope::from(err))).into_response();
    if let Some(retry_after) = err.retry_after() {
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(retry_after.as_secs().max(1)),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::RateLimited {
                retry_after: Duration::from_secs(5)
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&Error::InsufficientCatalogCoverage("none".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&Error::DeadlineExceeded(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(status_for(&Error::schema("bad")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&Error::storage("down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_failure_sets_retry_after() {
        let response = failure(&Error::BudgetExceeded {
            used: 10,
            limit: 5,
            retry_after: Duration::from_millis(2500),
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
