//! Completion provider adapter.
//!
//! Wraps a [`CompletionProvider`] with a per-call timeout, a bounded retry
//! loop for transient failures, and a stricter regeneration pass once the
//! provider keeps returning output that does not parse as a plan.

use std::sync::Arc;
use std::time::Duration;

use fitforge_core::{
    config::ProviderConfig, raw_plan_schema, CatalogItem, CompletionProvider, CompletionRequest,
    Error, GenerationRequest, LlmUsage, RawPlan, Result,
};
use fitforge_governance::metrics as plan_metrics;

use crate::prompt::{build_messages, PromptContext};
use crate::retry::RetryPolicy;

/// Limits applied to provider calls.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Wall-clock budget for one provider call.
    pub timeout: Duration,
    /// Attempts in the regular pass.
    pub max_attempts: u32,
    /// Schema failures that trigger the strict pass.
    pub schema_failures_before_strict: u32,
    /// Attempts in the strict pass.
    pub strict_attempts: u32,
    /// Candidates listed in the regular prompt.
    pub max_candidates: usize,
    /// Candidates listed in the strict prompt.
    pub strict_candidates: usize,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default(), 60, 20)
    }
}

impl AdapterSettings {
    pub fn from_config(cfg: &ProviderConfig, max_candidates: usize, strict_candidates: usize) -> Self {
        Self {
            timeout: cfg.timeout(),
            max_attempts: cfg.max_attempts.max(1),
            schema_failures_before_strict: cfg.schema_failures_before_strict.max(1),
            strict_attempts: cfg.strict_attempts,
            max_candidates: max_candidates.max(1),
            strict_candidates: strict_candidates.max(1),
        }
    }
}

/// Parsed, still untrusted provider output.
#[derive(Debug, Clone)]
pub struct AdapterOutput {
    pub plan: RawPlan,
    /// Usage summed over every attempt.
    pub usage: LlmUsage,
    /// Provider calls made.
    pub attempts: u32,
    /// Whether the strict pass produced the output.
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Regular,
    Strict,
}

impl Pass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Strict => "strict",
        }
    }
}

/// Why a pass ended without output.
enum PassFailure {
    /// Retrying will not help.
    Fatal(Error),
    /// Attempts exhausted; the last error was transient.
    Transient(Error),
    /// Enough unparseable outputs to escalate.
    Schema(Error),
}

/// Provider adapter with timeout, retry and strict regeneration.
pub struct ProviderAdapter {
    provider: Arc<dyn CompletionProvider>,
    settings: AdapterSettings,
    retry: RetryPolicy,
}

impl ProviderAdapter {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: AdapterSettings) -> Self {
        Self {
            provider,
            settings,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the provider for a plan drawn from `candidates`.
    ///
    /// `candidates` must be in rank order; the regular pass lists the first
    /// `max_candidates`, the strict pass the first `strict_candidates`.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        candidates: &[&CatalogItem],
        desired_entries: usize,
    ) -> Result<AdapterOutput> {
        let mut usage = LlmUsage::default();
        let mut attempts = 0;

        let regular = self
            .run_pass(Pass::Regular, request, candidates, desired_entries, None, &mut usage, &mut attempts)
            .await;

        let schema_err = match regular {
            Ok(plan) => {
                return Ok(AdapterOutput {
                    plan,
                    usage,
                    attempts,
                    strict: false,
                })
            }
            Err(PassFailure::Fatal(e)) | Err(PassFailure::Transient(e)) => return Err(e),
            Err(PassFailure::Schema(e)) => e,
        };

        if self.settings.strict_attempts == 0 {
            return Err(schema_violation(attempts, &schema_err));
        }

        tracing::info!(
            provider = self.provider.name(),
            attempts,
            error = %schema_err,
            "Escalating to strict regeneration pass"
        );

        let feedback = schema_err.to_string();
        let strict = self
            .run_pass(
                Pass::Strict,
                request,
                candidates,
                desired_entries,
                Some(&feedback),
                &mut usage,
                &mut attempts,
            )
            .await;

        match strict {
            Ok(plan) => Ok(AdapterOutput {
                plan,
                usage,
                attempts,
                strict: true,
            }),
            Err(PassFailure::Schema(e)) => Err(schema_violation(attempts, &e)),
            Err(PassFailure::Fatal(e)) | Err(PassFailure::Transient(e)) => Err(e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pass(
        &self,
        pass: Pass,
        request: &GenerationRequest,
        candidates: &[&CatalogItem],
        desired_entries: usize,
        feedback: Option<&str>,
        usage: &mut LlmUsage,
        attempts: &mut u32,
    ) -> std::result::Result<RawPlan, PassFailure> {
        let (max_attempts, limit) = match pass {
            Pass::Regular => (self.settings.max_attempts, self.settings.max_candidates),
            Pass::Strict => (self.settings.strict_attempts, self.settings.strict_candidates),
        };
        let listed = &candidates[..limit.min(candidates.len())];
        let schema = raw_plan_schema();

        let completion = CompletionRequest {
            messages: build_messages(&PromptContext {
                request,
                candidates: listed,
                desired_entries,
                feedback,
                schema: &schema,
            }),
            candidate_ids: listed.iter().map(|i| i.id.clone()).collect(),
            desired_entries,
        };

        let mut schema_failures = 0;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.delay(attempt - 1)).await;
            }
            *attempts += 1;

            let err = match self.call(&completion).await {
                Ok(response) => {
                    *usage += response.usage;
                    match response.output.parse_plan() {
                        Ok(plan) => {
                            plan_metrics::record_provider_call(self.provider.name(), "ok");
                            tracing::debug!(
                                provider = self.provider.name(),
                                pass = pass.as_str(),
                                attempt,
                                entries = plan.entries.len(),
                                "Provider returned a plan"
                            );
                            return Ok(plan);
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            plan_metrics::record_provider_call(self.provider.name(), err.kind());
            tracing::warn!(
                provider = self.provider.name(),
                pass = pass.as_str(),
                attempt,
                error = %err,
                "Provider attempt failed"
            );

            match err {
                Error::SchemaViolation(_) => {
                    schema_failures += 1;
                    if pass == Pass::Regular
                        && schema_failures >= self.settings.schema_failures_before_strict
                    {
                        return Err(PassFailure::Schema(err));
                    }
                }
                ref e if e.is_transient() => {}
                _ => return Err(PassFailure::Fatal(err)),
            }
            last_error = Some(err);
        }

        match last_error {
            Some(e @ Error::SchemaViolation(_)) => Err(PassFailure::Schema(e)),
            Some(e) => Err(PassFailure::Transient(e)),
            None => Err(PassFailure::Fatal(Error::internal("provider pass made no attempts"))),
        }
    }

    async fn call(&self, request: &CompletionRequest) -> Result<fitforge_core::CompletionResponse> {
        match tokio::time::timeout(self.settings.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ProviderTimeout(self.settings.timeout)),
        }
    }
}

fn schema_violation(attempts: u32, last: &Error) -> Error {
    let detail = match last {
        Error::SchemaViolation(msg) => msg.clone(),
        other => other.to_string(),
    };
    Error::schema(format!(
        "output unusable after {} attempts: {}",
        attempts, detail
    ))
}
