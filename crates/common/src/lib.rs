//! Clubhouse Common Library
//!
//! Shared vocabulary for the access harness: the actor roles, the
//! capabilities under test, the outcomes a probe can observe, and the
//! expectation matrix that acts as the oracle for every assertion.

pub mod error;
pub mod matrix;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use matrix::ExpectationMatrix;
pub use types::*;

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
