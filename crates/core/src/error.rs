//! Error types for FitForge.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using FitForge's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for FitForge.
///
/// `Clone` so a single generation outcome can be handed to every caller
/// waiting on the same fingerprint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Admission Errors
    // =========================================================================
    #[error("Rate limited: retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Generation budget exceeded: used {used}, limit {limit}")]
    BudgetExceeded {
        used: u64,
        limit: u64,
        retry_after: Duration,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request deadline of {}ms exceeded", .0.as_millis())]
    DeadlineExceeded(Duration),

    // =========================================================================
    // Catalog Errors
    // =========================================================================
    #[error("Catalog load rejected: {0}")]
    CatalogLoad(String),

    #[error("Insufficient catalog coverage: {0}")]
    InsufficientCatalogCoverage(String),

    // =========================================================================
    // Provider Errors
    // =========================================================================
    #[error("Provider timed out after {}ms", .0.as_millis())]
    ProviderTimeout(Duration),

    #[error("Provider error: {message}")]
    ProviderError { message: String, transient: bool },

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("No safe replacement: {0}")]
    NoSafeReplacement(String),

    #[error("Generation unusable: {0}")]
    GenerationUnusable(String),

    // =========================================================================
    // Cache Errors
    // =========================================================================
    #[error("Cache backend unavailable: {0}")]
    CacheBackendUnavailable(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a catalog load error.
    pub fn catalog_load(msg: impl Into<String>) -> Self {
        Self::CatalogLoad(msg.into())
    }

    /// Create a transient provider error (5xx-equivalent, network).
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderError {
            message: msg.into(),
            transient: true,
        }
    }

    /// Create a provider error that retrying will not fix.
    pub fn provider_fatal(msg: impl Into<String>) -> Self {
        Self::ProviderError {
            message: msg.into(),
            transient: false,
        }
    }

    /// Create a schema violation error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Create a cache backend error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::CacheBackendUnavailable(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable kind, surfaced to clients as `errorKind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "RateLimited",
            Self::BudgetExceeded { .. } => "BudgetExceeded",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::DeadlineExceeded(_) => "DeadlineExceeded",
            Self::CatalogLoad(_) => "CatalogLoad",
            Self::InsufficientCatalogCoverage(_) => "InsufficientCatalogCoverage",
            Self::ProviderTimeout(_) => "ProviderTimeout",
            Self::ProviderError { .. } => "ProviderError",
            Self::SchemaViolation(_) => "SchemaViolation",
            Self::NoSafeReplacement(_) => "NoSafeReplacement",
            Self::GenerationUnusable(_) => "GenerationUnusable",
            Self::CacheBackendUnavailable(_) => "CacheBackendUnavailable",
            Self::Config(_) => "Config",
            Self::Serialization(_) => "Serialization",
            Self::Internal(_) => "Internal",
        }
    }

    /// Whether the same request may succeed if retried unchanged.
    ///
    /// Structural failures (`InsufficientCatalogCoverage`, `InvalidRequest`)
    /// need adjusted constraints instead.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderError { transient, .. } => *transient,
            Self::RateLimited { .. }
            | Self::BudgetExceeded { .. }
            | Self::DeadlineExceeded(_)
            | Self::ProviderTimeout(_)
            | Self::SchemaViolation(_)
            | Self::GenerationUnusable(_)
            | Self::CacheBackendUnavailable(_) => true,
            _ => false,
        }
    }

    /// How long the caller should wait before retrying, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            Self::BudgetExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
