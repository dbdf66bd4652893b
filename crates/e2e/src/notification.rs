//! Structured notification probe
//!
//! Actions are settled by the kind carried on the notification element
//! (`data-kind="success"` / `"error"`), not by matching the message text.
//! The message is only kept for diagnostics; wording changes in the
//! application must not flip an outcome.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::browser::{BrowserAutomation, WaitState};
use crate::config::NotificationConfig;
use crate::error::E2eResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Other(String),
}

impl NotificationKind {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "ok" => NotificationKind::Success,
            "error" | "danger" | "failure" => NotificationKind::Error,
            other => NotificationKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: Option<String>,
}

pub struct NotificationProbe {
    config: NotificationConfig,
}

impl NotificationProbe {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Wait up to `timeout` for a notification, `None` if none appears
    pub async fn await_notification<B>(
        &self,
        browser: &mut B,
        timeout: Duration,
    ) -> E2eResult<Option<Notification>>
    where
        B: BrowserAutomation + ?Sized,
    {
        let shown = browser
            .wait_for(&self.config.selector, WaitState::Visible, timeout)
            .await?;
        if !shown.is_satisfied() {
            return Ok(None);
        }

        let kind = browser
            .attribute(&self.config.selector, &self.config.kind_attribute)
            .await?
            .map(|raw| NotificationKind::parse(&raw))
            .unwrap_or_else(|| NotificationKind::Other(String::new()));
        let message = browser
            .text(&self.config.selector)
            .await?
            .map(|text| text.trim().to_string());

        debug!("Notification: {:?} {:?}", kind, message);
        Ok(Some(Notification { kind, message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("success", NotificationKind::Success)]
    #[test_case(" Error ", NotificationKind::Error)]
    #[test_case("danger", NotificationKind::Error)]
    #[test_case("info", NotificationKind::Other("info".to_string()))]
    fn parses_kinds(raw: &str, expected: NotificationKind) {
        assert_eq!(NotificationKind::parse(raw), expected);
    }
}
