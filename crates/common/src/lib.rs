//! exdiff Common Library
//!
//! Shared types and errors for the exdiff comparison pipeline.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// exdiff version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
