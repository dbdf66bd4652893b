//! Harness configuration
//!
//! Everything the harness needs to know about the application under test
//! that is not a scenario: where it lives, how its routes are shaped, which
//! selectors mark login and readiness, and the timeout budget. Loaded from
//! YAML with every section optional; environment variables override the
//! file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::CapabilityCatalog;
use crate::error::{E2eError, E2eResult};

/// Upper bound for one probe wait cycle
pub const MAX_PROBE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub target: TargetConfig,
    pub browser: BrowserConfig,
    pub timeouts: Timeouts,
    pub routes: RouteConfig,
    pub login: LoginSelectors,
    pub notification: NotificationConfig,
    pub fixture: FixtureConfig,
    pub catalog: CapabilityCatalog,
    pub paths: PathConfig,
}

impl HarnessConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.catalog.fill_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        debug!("Loading harness config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Apply `CLUBHOUSE_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CLUBHOUSE_BASE_URL") {
            info!("Using base URL from environment: {}", url);
            self.target.base_url = url;
        }
        if let Ok(value) = std::env::var("CLUBHOUSE_HEADLESS") {
            self.browser.headless = !matches!(value.as_str(), "0" | "false" | "no");
        }
        if let Ok(dir) = std::env::var("CLUBHOUSE_NODE_MODULES") {
            self.browser.node_modules = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.timeouts.probe_ms == 0 || self.timeouts.probe_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(E2eError::Config(format!(
                "timeouts.probe_ms must be between 1 and {} (got {})",
                MAX_PROBE_TIMEOUT_MS, self.timeouts.probe_ms
            )));
        }
        if self.timeouts.affordance_ms > self.timeouts.probe_ms {
            return Err(E2eError::Config(
                "timeouts.affordance_ms cannot exceed timeouts.probe_ms".to_string(),
            ));
        }
        if self.target.base_url.is_empty() {
            return Err(E2eError::Config("target.base_url is empty".to_string()));
        }
        regex::Regex::new(&self.fixture.club_id_pattern)?;
        regex::Regex::new(&self.fixture.discussion_id_pattern)?;
        Ok(())
    }
}

/// Where the application under test lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,

    /// Path polled until the application answers
    pub health_path: String,

    pub startup_timeout_secs: u64,

    /// Spawn a local instance instead of using a deployed one
    pub launch: Option<LaunchConfig>,
}

impl TargetConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            health_path: "/".to_string(),
            startup_timeout_secs: 30,
            launch: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub command: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Port passed as `PORT` (None = find a free one)
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// `node_modules` directory that contains `playwright`
    pub node_modules: Option<PathBuf>,

    /// Upper bound for one driver round trip
    pub request_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_modules: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Page readiness wait per probe attempt
    pub probe_ms: u64,

    /// Wait for an affordance once the page is ready
    pub affordance_ms: u64,

    /// Wait for the notification that settles an action
    pub action_ms: u64,

    /// Wait for the authenticated marker after submitting the login form
    pub auth_ms: u64,

    /// Whole-scenario deadline, cleanup excluded
    pub scenario_ms: u64,

    /// Budget for each compensating step
    pub cleanup_ms: u64,
}

impl Timeouts {
    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn affordance(&self) -> Duration {
        Duration::from_millis(self.affordance_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }

    pub fn cleanup(&self) -> Duration {
        Duration::from_millis(self.cleanup_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_ms: 10_000,
            affordance_ms: 1_500,
            action_ms: 10_000,
            auth_ms: 10_000,
            scenario_ms: 120_000,
            cleanup_ms: 30_000,
        }
    }
}

/// Fixed application routes. Per-capability routes live in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub home: String,
    pub login: String,
    pub logout: Option<String>,
    pub clubs: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            home: "/".to_string(),
            login: "/login".to_string(),
            logout: Some("/logout".to_string()),
            clubs: "/clubs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub identifier: String,
    pub password: String,
    pub submit: String,
    pub error: String,

    /// Present only for an authenticated session; its text is the display name
    pub authenticated_marker: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            identifier: r#"[data-testid="login-identifier-input"]"#.to_string(),
            password: r#"[data-testid="login-password-input"]"#.to_string(),
            submit: r#"[data-testid="login-submit"]"#.to_string(),
            error: r#"[data-testid="login-error"]"#.to_string(),
            authenticated_marker: r#"[data-testid="user-menu"]"#.to_string(),
        }
    }
}

/// Structured notification element used to settle actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub selector: String,

    /// Attribute carrying `success` or `error`
    pub kind_attribute: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            selector: r#"[data-testid="toast"]"#.to_string(),
            kind_attribute: "data-kind".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Link to a club on the discovery page; `{fixture}` is the club name
    pub club_link: String,

    /// Ready marker of the discovery page
    pub ready: String,

    /// Club page listing its discussions
    pub club_route: String,

    /// Link to a discussion on the club page; `{discussion}` is its title
    pub discussion_link: String,

    pub club_id_pattern: String,
    pub discussion_id_pattern: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            club_link: r#"[data-testid="club-link"][data-club-name="{fixture}"]"#.to_string(),
            ready: r#"[data-testid="page-ready"]"#.to_string(),
            club_route: "/clubs/{club_id}".to_string(),
            discussion_link: r#"[data-testid="discussion-link"][data-discussion-title="{discussion}"]"#
                .to_string(),
            club_id_pattern: r"/clubs/(\d+)".to_string(),
            discussion_id_pattern: r"/discussions/(\d+)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
    pub matrix: Option<PathBuf>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            matrix: None,
        }
    }
}
