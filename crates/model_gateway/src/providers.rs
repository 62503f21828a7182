//! Built-in provider implementations.

use async_trait::async_trait;
use serde_json::{json, Value};

use fitforge_core::{
    CompletionProvider, CompletionRequest, CompletionResponse, LlmUsage, RawModelOutput, Result,
};

/// Deterministic provider that needs no network.
///
/// Picks the first `desired_entries` candidate ids with moderate default
/// parameters. Used when no LLM credentials are configured, so the service
/// still returns catalog-valid plans.
#[derive(Debug, Clone, Default)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let entries: Vec<Value> = request
            .candidate_ids
            .iter()
            .take(request.desired_entries.max(1))
            .map(|id| json!({ "id": id, "sets": 3, "reps": 10, "rest_seconds": 60, "servings": 1 }))
            .collect();

        let output = json!({ "title": "Quick plan", "entries": entries });
        let prompt: String = request.messages.iter().map(|m| m.content.as_str()).collect();

        Ok(CompletionResponse {
            usage: LlmUsage::estimate(&prompt, &output.to_string()),
            output: RawModelOutput::Structured(output),
        })
    }
}
