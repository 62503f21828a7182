//! Core type definitions for FitForge.
//!
//! Broken down into submodules by the stage of the generation pipeline
//! that owns them.

pub mod catalog;
pub mod fingerprint;
pub mod plan;
pub mod raw;
pub mod request;
pub mod response;

pub use catalog::*;
pub use fingerprint::*;
pub use plan::*;
pub use raw::*;
pub use request::*;
pub use response::*;
