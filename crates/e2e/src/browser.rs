//! Browser automation seam
//!
//! The harness only needs a handful of operations from a browser driver:
//! navigation, locating elements by a declarative selector, bounded waits
//! that report a timeout instead of failing, reading text and attributes,
//! and wiping client-side state. [`PlaywrightDriver`](crate::playwright::PlaywrightDriver)
//! implements this against a real browser and
//! `SimulatedClubApp` (behind the `mock` feature) against an in-memory model
//! of the application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::E2eResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// Result of a bounded wait. A timeout is an answer, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied)
    }
}

#[async_trait]
pub trait BrowserAutomation: Send {
    /// Navigate to an absolute URL or a path relative to the target base URL
    async fn navigate(&mut self, url: &str) -> E2eResult<()>;

    /// Path and query of the current page, e.g. `/clubs/7?tab=members`
    async fn current_path(&mut self) -> E2eResult<String>;

    async fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<WaitOutcome>;

    async fn is_visible(&mut self, selector: &str) -> E2eResult<bool>;

    /// `false` when the element is missing or disabled
    async fn is_enabled(&mut self, selector: &str) -> E2eResult<bool>;

    async fn click(&mut self, selector: &str) -> E2eResult<()>;

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()>;

    /// Text content of the first match, `None` when nothing matches
    async fn text(&mut self, selector: &str) -> E2eResult<Option<String>>;

    async fn attribute(&mut self, selector: &str, name: &str) -> E2eResult<Option<String>>;

    /// Clear cookies plus local and session storage
    async fn clear_client_state(&mut self) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

/// Join a relative path onto a base URL
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}

/// Strip scheme and host from a URL, keeping path and query
pub fn path_of(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));

    match without_scheme {
        Some(rest) => match rest.find('/') {
            Some(idx) => rest[idx..].to_string(),
            None => "/".to_string(),
        },
        None => url.to_string(),
    }
}

/// Whether `path` is `route` or a query/fragment variant of it
pub fn path_matches(path: &str, route: &str) -> bool {
    let bare = path.split(['?', '#']).next().unwrap_or(path);
    bare.trim_end_matches('/') == route.trim_end_matches('/')
}
