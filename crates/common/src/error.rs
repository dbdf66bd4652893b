//! Error types for the shared domain model

use thiserror::Error;

use crate::types::{Capability, Role};

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Expectation matrix is incomplete, missing: {}", format_pairs(.missing))]
    MatrixIncomplete { missing: Vec<(Role, Capability)> },

    #[error("Unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),
}

fn format_pairs(pairs: &[(Role, Capability)]) -> String {
    pairs
        .iter()
        .map(|(role, capability)| format!("{role}/{capability}"))
        .collect::<Vec<_>>()
        .join(", ")
}
