use serde::{Deserialize, Serialize};

use super::plan::{CacheSource, FilterStats, GeneratedPlan, ValidationReport};
use crate::error::Error;

// =============================================================================
// Response Types
// =============================================================================

/// Metadata describing how a plan was served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub cached: bool,
    pub cache_source: CacheSource,
    pub generation_time_ms: u64,
    pub filter_stats: FilterStats,
    pub validation: ValidationReport,
    pub fingerprint: String,
}

/// A successfully served plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub plan: GeneratedPlan,
    pub metadata: ResponseMetadata,
}

/// Wire envelope returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationEnvelope {
    Success {
        success: bool,
        plan: GeneratedPlan,
        metadata: ResponseMetadata,
    },
    Failure {
        success: bool,
        #[serde(rename = "errorKind")]
        error_kind: String,
        message: String,
        retryable: bool,
        #[serde(rename = "retryAfterSecs", skip_serializing_if = "Option::is_none")]
        retry_after_secs: Option<u64>,
    },
}

impl From<PlanResponse> for GenerationEnvelope {
    fn from(r: PlanResponse) -> Self {
        Self::Success {
            success: true,
            plan: r.plan,
            metadata: r.metadata,
        }
    }
}

impl From<&Error> for GenerationEnvelope {
    fn from(e: &Error) -> Self {
        Self::Failure {
            success: false,
            error_kind: e.kind().to_string(),
            message: e.to_string(),
            retryable: e.is_transient(),
            retry_after_secs: e.retry_after().map(|d| d.as_secs().max(1)),
        }
    }
}
