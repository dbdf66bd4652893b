//! Error types for the access harness

use clubhouse_common::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Credentials for role '{0}' are missing or still placeholders")]
    CredentialsMissing(Role),

    #[error("Authentication as '{role}' failed: {reason}")]
    AuthenticationFailed { role: Role, reason: String },

    #[error("A session for role '{0}' is still active; tear it down before switching roles")]
    SessionStillActive(Role),

    #[error("Fixture not found: {0}")]
    FixtureMissing(String),

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Target failed to start: {0}")]
    TargetStartup(String),

    #[error("Target health check failed after {0} attempts")]
    TargetHealthCheck(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] clubhouse_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
