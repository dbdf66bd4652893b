//! Target management - optionally spawning and health checking the application

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::resolve_url;
use crate::config::{LaunchConfig, TargetConfig};
use crate::error::{E2eError, E2eResult};

/// The application under test, either spawned locally or already deployed
pub struct TargetHandle {
    child: Option<Child>,
    base_url: String,
}

impl TargetHandle {
    /// Launch the target if configured, then wait until it answers.
    pub async fn start(config: &TargetConfig) -> E2eResult<Self> {
        let handle = match &config.launch {
            Some(launch) => Self::spawn(launch)?,
            None => {
                info!("Using deployed target at {}", config.base_url);
                Self {
                    child: None,
                    base_url: config.base_url.clone(),
                }
            }
        };

        handle
            .wait_for_healthy(&config.health_path, config.startup_timeout())
            .await?;

        info!("Target is healthy at {}", handle.base_url);
        Ok(handle)
    }

    fn spawn(launch: &LaunchConfig) -> E2eResult<Self> {
        let port = match launch.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", launch.command.display(), port);

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args)
            .envs(&launch.env)
            .env("PORT", port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| {
            E2eError::TargetStartup(format!(
                "Failed to spawn {}: {}",
                launch.command.display(),
                e
            ))
        })?;

        Ok(Self {
            child: Some(child),
            base_url,
        })
    }

    /// Wait for the target to respond to health checks
    async fn wait_for_healthy(&self, health_path: &str, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = resolve_url(&self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for target at {}...", health_url);
                    }
                    // Connection refused is expected while a spawned target boots
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(E2eError::TargetHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_spawned(&self) -> bool {
        self.child.is_some()
    }

    /// Stop a spawned target; a deployed one is left alone
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping target (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        if child.try_wait()?.is_none() {
            let _ = child.kill();
        }
        child.wait()?;

        Ok(())
    }
}

impl Drop for TargetHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop target: {}", e);
        }
    }
}

/// Find a free port to use
fn find_free_port() -> std::io::Result<u16> {
    use std::net::TcpListener;

    Ok(TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}
