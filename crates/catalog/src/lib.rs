#![deny(unused)]
//! Catalog layer for FitForge.
//!
//! Owns the immutable catalog index and the two components that keep model
//! output tied to it: the candidate filter (before generation) and the plan
//! validator (after generation).

pub mod dataset;
pub mod filter;
pub mod index;
pub mod validator;

pub use filter::{CandidateFilter, Candidates};
pub use index::{CatalogIndex, CatalogQuery};
pub use validator::PlanValidator;
