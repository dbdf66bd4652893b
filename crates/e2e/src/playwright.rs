//! Playwright browser automation
//!
//! Runs one long-lived `node` process executing a small Playwright driver
//! script and talks to it over JSON lines on stdin/stdout. Keeping the
//! process (and its browser context) alive across calls is what lets a
//! signed-in session survive from one probe to the next.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::browser::{path_of, resolve_url, BrowserAutomation, WaitOutcome, WaitState};
use crate::config::BrowserConfig;
use crate::error::{E2eError, E2eResult};

const DRIVER_SCRIPT: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

const config = JSON.parse(process.env.CLUBHOUSE_DRIVER_CONFIG);
const send = (message) => process.stdout.write(JSON.stringify(message) + '\n');

(async () => {
  const browser = await playwright[config.browser].launch({ headless: config.headless });
  const newContext = () => browser.newContext({
    viewport: { width: config.width, height: config.height },
  });

  let context = await newContext();
  let page = await context.newPage();
  const first = (selector) => page.locator(selector).first();

  const handlers = {
    navigate: async (req) => {
      await page.goto(req.url, { waitUntil: 'domcontentloaded' });
      return null;
    },
    current_url: async () => page.url(),
    wait_for: async (req) => {
      try {
        await page.waitForSelector(req.selector, { state: req.state, timeout: req.timeout_ms });
        return true;
      } catch (error) {
        if (error.name === 'TimeoutError') return false;
        throw error;
      }
    },
    is_visible: async (req) => first(req.selector).isVisible(),
    is_enabled: async (req) => {
      const locator = first(req.selector);
      return (await locator.count()) > 0 && (await locator.isEnabled());
    },
    click: async (req) => {
      await first(req.selector).click({ timeout: req.timeout_ms });
      return null;
    },
    fill: async (req) => {
      await first(req.selector).fill(req.value, { timeout: req.timeout_ms });
      return null;
    },
    text: async (req) => {
      const locator = first(req.selector);
      return (await locator.count()) > 0 ? await locator.textContent() : null;
    },
    attribute: async (req) => {
      const locator = first(req.selector);
      return (await locator.count()) > 0 ? await locator.getAttribute(req.name) : null;
    },
    clear_state: async () => {
      // A fresh context drops cookies plus local and session storage for every origin.
      await context.close();
      context = await newContext();
      page = await context.newPage();
      return null;
    },
    close: async () => {
      await browser.close();
      return null;
    },
  };

  send({ id: 0, ok: true, value: browser.version() });

  const lines = readline.createInterface({ input: process.stdin });
  for await (const line of lines) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      const handler = handlers[req.op];
      if (!handler) throw new Error('unknown op: ' + req.op);
      send({ id: req.id, ok: true, value: await handler(req) });
    } catch (error) {
      send({ id: req.id, ok: false, error: error.message });
    }
    if (req.op === 'close') process.exit(0);
  }
  await browser.close();
})().catch((error) => {
  console.error(error.stack || String(error));
  process.exit(1);
});
"#;

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: DriverCommand<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Navigate { url: &'a str },
    CurrentUrl,
    WaitFor { selector: &'a str, state: &'static str, timeout_ms: u64 },
    IsVisible { selector: &'a str },
    IsEnabled { selector: &'a str },
    Click { selector: &'a str, timeout_ms: u64 },
    Fill { selector: &'a str, value: &'a str, timeout_ms: u64 },
    Text { selector: &'a str },
    Attribute { selector: &'a str, name: &'a str },
    ClearState,
    Close,
}

impl DriverCommand<'_> {
    fn op_timeout(&self) -> Duration {
        match self {
            DriverCommand::WaitFor { timeout_ms, .. }
            | DriverCommand::Click { timeout_ms, .. }
            | DriverCommand::Fill { timeout_ms, .. } => Duration::from_millis(*timeout_ms),
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Browser driven by a persistent Playwright node process
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    responses: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    base_url: String,
    request_timeout: Duration,
    interaction_timeout_ms: u64,

    /// Holds the generated driver script for the process lifetime
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Launch node + browser and wait for the driver to report ready
    pub async fn launch(config: &BrowserConfig, base_url: &str) -> E2eResult<Self> {
        Self::check_playwright_installed().await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        let driver_config = serde_json::json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "width": config.viewport_width,
            "height": config.viewport_height,
        });

        let mut cmd = Command::new("node");
        cmd.arg(&script_path)
            .env("CLUBHOUSE_DRIVER_CONFIG", driver_config.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(node_modules) = &config.node_modules {
            cmd.env("NODE_PATH", node_modules);
        }

        debug!("Launching Playwright driver: {}", script_path.display());
        let mut child = cmd.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Browser("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Browser("driver stdout unavailable".to_string()))?;

        let mut driver = Self {
            child,
            stdin,
            responses: BufReader::new(stdout).lines(),
            next_id: 0,
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            interaction_timeout_ms: 5_000,
            _script_dir: script_dir,
        };

        // Browser startup is slower than a normal round trip.
        let startup_budget = driver.request_timeout * 2;
        let ready = driver.read_response(0, startup_budget).await?;
        info!(
            "Playwright {} ready (version {})",
            config.browser.as_str(),
            ready.as_str().unwrap_or("unknown")
        );
        Ok(driver)
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed() -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn request(&mut self, command: DriverCommand<'_>) -> E2eResult<serde_json::Value> {
        self.next_id += 1;
        let id = self.next_id;
        let budget = self.request_timeout + command.op_timeout();

        let mut line = serde_json::to_string(&Request { id, command })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        self.read_response(id, budget).await
    }

    async fn read_response(&mut self, id: u64, budget: Duration) -> E2eResult<serde_json::Value> {
        let response = timeout(budget, self.next_response_for(id))
            .await
            .map_err(|_| E2eError::Timeout(format!("driver response {id}")))??;

        if response.ok {
            Ok(response.value)
        } else {
            Err(E2eError::Browser(
                response.error.unwrap_or_else(|| "unknown driver error".to_string()),
            ))
        }
    }

    async fn next_response_for(&mut self, id: u64) -> E2eResult<Response> {
        loop {
            let line = self
                .responses
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Browser("Playwright driver exited".to_string()))?;

            let response: Response = match serde_json::from_str(&line) {
                Ok(response) => response,
                Err(_) => {
                    debug!("[driver] {}", line);
                    continue;
                }
            };

            if response.id == id {
                return Ok(response);
            }
            warn!("Discarding stale driver response {} (waiting for {})", response.id, id);
        }
    }

    fn optional_string(value: serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[async_trait]
impl BrowserAutomation for PlaywrightDriver {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        let url = resolve_url(&self.base_url, url);
        debug!("navigate: {}", url);
        self.request(DriverCommand::Navigate { url: &url }).await?;
        Ok(())
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        let value = self.request(DriverCommand::CurrentUrl).await?;
        let url = Self::optional_string(value).unwrap_or_default();
        Ok(path_of(&url))
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<WaitOutcome> {
        let value = self
            .request(DriverCommand::WaitFor {
                selector,
                state: state.as_str(),
                timeout_ms: timeout.as_millis() as u64,
            })
            .await?;

        Ok(if value.as_bool().unwrap_or(false) {
            WaitOutcome::Satisfied
        } else {
            WaitOutcome::TimedOut
        })
    }

    async fn is_visible(&mut self, selector: &str) -> E2eResult<bool> {
        let value = self.request(DriverCommand::IsVisible { selector }).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&mut self, selector: &str) -> E2eResult<bool> {
        let value = self.request(DriverCommand::IsEnabled { selector }).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        let timeout_ms = self.interaction_timeout_ms;
        self.request(DriverCommand::Click { selector, timeout_ms }).await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        let timeout_ms = self.interaction_timeout_ms;
        self.request(DriverCommand::Fill { selector, value, timeout_ms }).await?;
        Ok(())
    }

    async fn text(&mut self, selector: &str) -> E2eResult<Option<String>> {
        let value = self.request(DriverCommand::Text { selector }).await?;
        Ok(Self::optional_string(value))
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        let value = self.request(DriverCommand::Attribute { selector, name }).await?;
        Ok(Self::optional_string(value))
    }

    async fn clear_client_state(&mut self) -> E2eResult<()> {
        self.request(DriverCommand::ClearState).await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if let Err(e) = self.request(DriverCommand::Close).await {
            warn!("Driver close request failed: {}", e);
        }
        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(status) => {
                debug!("Playwright driver exited: {}", status?);
            }
            Err(_) => {
                warn!("Playwright driver did not exit, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}
