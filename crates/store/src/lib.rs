#![deny(unused)]
//! Cache tier backends for FitForge.
//!
//! Both tiers implement [`PlanStore`]: the sharded in-memory store serves
//! as the fast tier, Redis as the durable tier.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use fitforge_core::PlanStore;

pub use memory::InMemoryPlanStore;
pub use redis::RedisPlanStore;

/// Durable tier for the given Redis URL, or an in-memory stand-in when unset.
pub fn durable_store(redis_url: Option<&str>, prefix: &str) -> fitforge_core::Result<Arc<dyn PlanStore>> {
    match redis_url {
        Some(url) => {
            tracing::info!("Using Redis durable plan store");
            Ok(Arc::new(RedisPlanStore::new(url, prefix)?))
        }
        None => {
            tracing::warn!("No Redis URL configured, durable tier is in-memory");
            Ok(Arc::new(InMemoryPlanStore::named("memory-durable")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_store_fallback() {
        let store = durable_store(None, "fitforge:plan").unwrap();
        assert_eq!(store.name(), "memory-durable");
    }
}
