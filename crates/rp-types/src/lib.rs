//! Shared types for Reprise: bounds, run configuration, results and errors.

pub mod bounds;
pub mod config;
pub mod errors;
pub mod result;

pub use bounds::*;
pub use config::*;
pub use errors::*;
pub use result::*;
