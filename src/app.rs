//! Application process management - spawning and health checking the driven app
//!
//! The application under test exposes a small HTTP automation endpoint:
//! `GET /health`, `POST /navigate` with a JSON view name, and `GET /screenshot`
//! returning the current window as a PNG body.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::driver::AppDriver;
use crate::error::{SnapError, SnapResult};

/// Handle to a running application process.
#[derive(Debug)]
pub struct AppHandle {
    child: Mutex<Child>,
    base_url: String,
    port: u16,
    client: reqwest::Client,
}

impl AppHandle {
    /// Spawn the application binary and wait for its automation endpoint.
    pub async fn launch(config: AppConfig) -> SnapResult<Self> {
        let port = config.port.unwrap_or_else(find_free_port);
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Launching application on port {}", port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.args(&config.args)
            .env("APP_AUTOMATION_PORT", port.to_string())
            .env("APP_AUTOMATION_HOST", "127.0.0.1");

        // Deterministic renders need the app compiled against canned data
        if config.mock_data {
            cmd.env("APP_USE_MOCK_DATA", "1");
        }

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            SnapError::Startup(format!(
                "failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let handle = AppHandle {
            child: Mutex::new(child),
            base_url,
            port,
            client,
        };

        handle.wait_until_ready(config.startup_timeout).await?;

        info!("Application ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the health endpoint until the app responds or the timeout elapses.
    async fn wait_until_ready(&self, timeout: Duration) -> SnapResult<()> {
        let health_url = format!("{}/health", self.base_url);
        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match self.client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application to start...");
                    }
                    // Connection refused is expected while the app is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(SnapError::StartupTimeout(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl AppDriver for AppHandle {
    async fn navigate(&self, view: &str) -> SnapResult<()> {
        let url = format!("{}/navigate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "view": view }))
            .send()
            .await
            .map_err(|e| SnapError::Navigation {
                view: view.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(SnapError::Navigation {
                view: view.to_string(),
                reason: format!("automation endpoint returned {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn capture_window(&self) -> SnapResult<Vec<u8>> {
        let url = format!("{}/screenshot", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SnapError::Capture(format!("screenshot request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(SnapError::Capture(format!(
                "screenshot endpoint returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SnapError::Capture(format!("screenshot body truncated: {}", e)))?;
        Ok(bytes.to_vec())
    }

    fn is_running(&self) -> bool {
        self.child
            .lock()
            .map(|mut child| matches!(child.try_wait(), Ok(None)))
            .unwrap_or(false)
    }

    fn stop(&self) -> SnapResult<()> {
        let Ok(mut child) = self.child.lock() else {
            return Ok(());
        };

        info!("Stopping application (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                // Give it a moment to shut down gracefully
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        let _ = AppDriver::stop(self);
    }
}

/// Configuration for spawning the application under test.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the application binary
    pub binary_path: PathBuf,

    /// Extra arguments passed to the binary
    pub args: Vec<String>,

    /// Automation port (None = find free port)
    pub port: Option<u16>,

    /// Timeout for application startup
    pub startup_timeout: Duration,

    /// Run the app against canned data for deterministic renders
    pub mock_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("target/debug/app"),
            args: vec![],
            port: None,
            startup_timeout: Duration::from_secs(30),
            mock_data: true,
        }
    }
}

/// Find a free port to use
fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}
