#![deny(unused)]
//! Model gateway for FitForge.
//!
//! This crate provides:
//! - Constrained prompt construction
//! - Timeout, retry and strict regeneration around provider calls
//! - Rig-backed and offline completion providers

pub mod adapter;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod rig_client;

use std::sync::Arc;

use fitforge_core::{
    config::{ProviderConfig, ProviderKind},
    CompletionProvider, Result,
};

pub use adapter::{AdapterOutput, AdapterSettings, ProviderAdapter};
pub use providers::OfflineProvider;
pub use retry::RetryPolicy;
pub use rig_client::{RigCompletionProvider, RigConfig, RigProvider};

/// Create the configured completion provider.
///
/// Falls back to the offline provider when the vendor's API key is missing,
/// so the service keeps serving catalog-valid plans.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.kind {
        ProviderKind::Offline => {
            tracing::info!("Using offline completion provider");
            Ok(Arc::new(OfflineProvider::new()))
        }
        ProviderKind::Rig => {
            let rig = RigConfig::from_config(config)?;
            if !rig.provider.has_credentials() {
                tracing::warn!(
                    vendor = %config.vendor,
                    "{} not set, falling back to offline provider",
                    rig.provider.api_key_var()
                );
                return Ok(Arc::new(OfflineProvider::new()));
            }
            tracing::info!(vendor = %config.vendor, model = %config.model, "Using Rig completion provider");
            Ok(Arc::new(RigCompletionProvider::new(rig)))
        }
    }
}
