#![deny(unused)]
//! Plan generation gateway for FitForge.
//!
//! This crate provides the HTTP entry point for the system and the
//! request path behind it: single-flight coordination, tiered plan
//! caching and the generation pipeline.

pub mod gateway;
pub mod generator;
pub mod orchestrator;
pub mod server;
pub mod single_flight;

pub use gateway::GenerationGateway;
pub use generator::{Generated, PlanGenerator};
pub use orchestrator::{SweepReport, TieredPlanCache};
pub use server::{GatewayServer, USER_ID_HEADER};
pub use single_flight::{FlightHandle, Role, SingleFlight};
