#![deny(unused)]
//! Governance for FitForge.
//!
//! This crate provides:
//! - Per-identity rate limiting
//! - Generation token budgets
//! - Distributed tracing
//! - Prometheus metrics

pub mod budget;
pub mod metrics;
pub mod rate_limit;
pub mod tracing_layer;

pub use budget::GenerationBudget;
pub use metrics::setup_metrics_recorder;
pub use rate_limit::{Admission, RateLimiter};
pub use tracing_layer::configure_tracing;
