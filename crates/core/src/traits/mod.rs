//! Core traits for FitForge.
//!
//! These traits define the seams between the gateway and its external
//! collaborators: the completion provider and the cache tier backends.

pub mod provider;
pub mod store;

pub use provider::*;
pub use store::*;
