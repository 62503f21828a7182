//! Rig completion provider.
//!
//! Wraps Rig's Agent for integration with our CompletionProvider trait.

use async_trait::async_trait;

use fitforge_core::{
    config::ProviderConfig, ChatMessage, CompletionProvider, CompletionRequest,
    CompletionResponse, Error, LlmUsage, RawModelOutput, Result,
};

// Import required Rig traits
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;

/// Provider type for Rig clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigProvider {
    OpenAI,
    Anthropic,
}

impl RigProvider {
    /// Parse a configured vendor name.
    pub fn from_vendor(vendor: &str) -> Option<Self> {
        match vendor.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    /// Environment variable the vendor SDK reads its key from.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Whether the API key is present in the environment.
    pub fn has_credentials(self) -> bool {
        std::env::var(self.api_key_var()).is_ok()
    }
}

/// Configuration for Rig client.
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// Provider to use.
    pub provider: RigProvider,
    /// Model name.
    pub model: String,
    /// Temperature (0.0 - 1.0).
    pub temperature: f64,
    /// Max tokens.
    pub max_tokens: u64,
}

impl RigConfig {
    /// Build from provider configuration.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let provider = RigProvider::from_vendor(&cfg.vendor)
            .ok_or_else(|| Error::Config(format!("unsupported provider vendor '{}'", cfg.vendor)))?;
        Ok(Self {
            provider,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }

    /// Create config for OpenAI.
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            provider: RigProvider::OpenAI,
            model: model.into(),
            temperature: 0.4,
            max_tokens: 2048,
        }
    }

    /// Create config for Anthropic.
    pub fn anthropic(model: impl Into<String>) -> Self {
        Self {
            provider: RigProvider::Anthropic,
            ..Self::openai(model)
        }
    }
}

/// Rig-backed completion provider.
///
/// The system message becomes the agent preamble; the remaining messages are
/// flattened into one prompt. Output is returned as free text for the
/// adapter to parse.
pub struct RigCompletionProvider {
    config: RigConfig,
}

impl RigCompletionProvider {
    /// Create a new Rig provider with the given configuration.
    pub fn new(config: RigConfig) -> Self {
        Self { config }
    }

    /// Split messages into preamble and prompt.
    fn build_prompt(&self, messages: &[ChatMessage]) -> (String, String) {
        let mut preamble = String::new();
        let mut prompt = String::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => {
                    preamble.push_str(&msg.content);
                    preamble.push('\n');
                }
                "user" => {
                    prompt.push_str(&msg.content);
                    prompt.push_str("\n\n");
                }
                _ => {
                    prompt.push_str(&format!("{}: {}\n\n", msg.role, msg.content));
                }
            }
        }

        (preamble, prompt)
    }

    /// Call OpenAI via Rig.
    async fn call_openai(&self, preamble: &str, prompt: &str) -> Result<String> {
        use rig::providers::openai;

        // Check env var first to avoid panic
        if !RigProvider::OpenAI.has_credentials() {
            return Err(Error::provider_fatal("OPENAI_API_KEY not set"));
        }

        let client = openai::Client::from_env();
        let agent = client
            .agent(&self.config.model)
            .preamble(preamble)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| classify(format!("OpenAI error: {}", e)))
    }

    /// Call Anthropic via Rig.
    async fn call_anthropic(&self, preamble: &str, prompt: &str) -> Result<String> {
        use rig::providers::anthropic;

        // Check env var first to avoid panic
        if !RigProvider::Anthropic.has_credentials() {
            return Err(Error::provider_fatal("ANTHROPIC_API_KEY not set"));
        }

        let client = anthropic::Client::from_env();
        let agent = client
            .agent(&self.config.model)
            .preamble(preamble)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| classify(format!("Anthropic error: {}", e)))
    }
}

#[async_trait]
impl CompletionProvider for RigCompletionProvider {
    fn name(&self) -> &str {
        match self.config.provider {
            RigProvider::OpenAI => "openai",
            RigProvider::Anthropic => "anthropic",
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let (preamble, prompt) = self.build_prompt(&request.messages);

        tracing::debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            prompt_len = prompt.len(),
            candidates = request.candidate_ids.len(),
            "Calling LLM"
        );

        let text = match self.config.provider {
            RigProvider::OpenAI => self.call_openai(&preamble, &prompt).await?,
            RigProvider::Anthropic => self.call_anthropic(&preamble, &prompt).await?,
        };

        Ok(CompletionResponse {
            usage: LlmUsage::estimate(&format!("{}{}", preamble, prompt), &text),
            output: RawModelOutput::Text(text),
        })
    }
}

/// Authentication and bad-request failures will not succeed on retry.
fn classify(message: String) -> Error {
    let lower = message.to_lowercase();
    let fatal = ["401", "403", "invalid api key", "invalid_api_key", "unauthorized", "model_not_found"]
        .iter()
        .any(|marker| lower.contains(marker));
    if fatal {
        Error::provider_fatal(message)
    } else {
        Error::provider(message)
    }
}
