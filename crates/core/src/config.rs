use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use crate::types::IntentCategory;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub budget: BudgetConfig,
    pub catalog: CatalogConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Tag mixed into every fingerprint; bumping it invalidates all caches.
    pub schema_version: String,
    /// Overall deadline a caller waits for a plan.
    pub request_deadline_ms: u64,
    /// Candidates listed in the regular prompt.
    pub max_prompt_candidates: usize,
    /// Candidates listed in the stricter regeneration prompt.
    pub strict_prompt_candidates: usize,
}

impl GatewayConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

/// When `identity` participates in the fingerprint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Personalization {
    /// Plans are shared by every user with the same constraints.
    Never,
    /// Plans are always per user.
    Always,
    /// Per user only when exclusions (injuries, allergies) are present.
    WhenExclusions,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TierPolicy {
    pub fast_ttl_secs: u64,
    pub durable_ttl_secs: u64,
    pub personalization: Personalization,
}

impl TierPolicy {
    pub fn fast_ttl(&self) -> Duration {
        Duration::from_secs(self.fast_ttl_secs)
    }

    pub fn durable_ttl(&self) -> Duration {
        Duration::from_secs(self.durable_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub workout: TierPolicy,
    pub meal: TierPolicy,
    pub redis_url: Option<Secret<String>>,
    pub key_prefix: String,
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn policy(&self, category: IntentCategory) -> &TierPolicy {
        match category {
            IntentCategory::Workout => &self.workout,
            IntentCategory::Meal => &self.meal,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Vendor LLM through rig.
    Rig,
    /// Deterministic catalog sampler; no network.
    Offline,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub vendor: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub schema_failures_before_strict: u32,
    pub strict_attempts: u32,
    pub backoff: BackoffConfig,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub factor: f64,
    pub cap_ms: u64,
    pub jitter: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BudgetConfig {
    /// Tokens one identity may spend on fresh generations per window; 0 disables.
    pub tokens_per_window: u64,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON or YAML dataset; the built-in catalog is used when unset.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub json_logs: bool,
    pub metrics_enabled: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("FITFORGE_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map APP__SERVER__PORT=3000 to server.port
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            enable_cors: true,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            schema_version: "plan-v1".into(),
            request_deadline_ms: 45_000,
            max_prompt_candidates: 60,
            strict_prompt_candidates: 20,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            workout: TierPolicy {
                fast_ttl_secs: 3600,
                durable_ttl_secs: 30 * 24 * 3600,
                personalization: Personalization::WhenExclusions,
            },
            meal: TierPolicy {
                fast_ttl_secs: 3600,
                durable_ttl_secs: 7 * 24 * 3600,
                personalization: Personalization::Always,
            },
            redis_url: None,
            key_prefix: "fitforge:plan".into(),
            sweep_interval_secs: 300,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Rig,
            vendor: "openai".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.4,
            max_tokens: 2048,
            timeout_ms: 20_000,
            max_attempts: 3,
            schema_failures_before_strict: 2,
            strict_attempts: 1,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 250,
            factor: 2.0,
            cap_ms: 4_000,
            jitter: 0.2,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 50,
            window_secs: 3600,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            tokens_per_window: 200_000,
            window_secs: 24 * 3600,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            metrics_enabled: true,
        }
    }
}
