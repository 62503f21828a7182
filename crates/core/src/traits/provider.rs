//! Completion provider traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::RawModelOutput;

/// Abstract LLM endpoint.
///
/// Implementations only transport the request; prompt construction, retry
/// and validation live above this seam.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Run a single completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Chat message for LLM interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (system, user, assistant).
    pub role: String,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A constrained generation request sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Prompt messages. The system message carries the output schema and
    /// the user message enumerates the candidate ids.
    pub messages: Vec<ChatMessage>,
    /// Ids the provider is instructed to choose from.
    pub candidate_ids: Vec<String>,
    /// Number of entries requested.
    pub desired_entries: usize,
}

/// Response from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Untrusted output.
    pub output: RawModelOutput,
    /// Token usage.
    pub usage: LlmUsage,
}

/// Token usage from LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
}

impl LlmUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Rough estimate (4 bytes per token) for providers that report nothing.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self {
            prompt_tokens: (prompt.len() / 4) as u64,
            completion_tokens: (completion.len() / 4) as u64,
        }
    }
}

impl std::ops::AddAssign for LlmUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
    }
}
