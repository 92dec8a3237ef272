//! App server management - spawning and health checking the web app

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to the web app under test.
///
/// Either a process this harness spawned, or an app somebody else runs
/// (`E2E_BASE_URL`), in which case there is nothing to stop.
pub struct AppServer {
    child: Option<Child>,
    base_url: String,
}

impl AppServer {
    /// Use an already running deployment
    pub fn external(base_url: impl Into<String>) -> Self {
        Self {
            child: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Spawn the app with `npm run start` and wait until it serves pages
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning app server on port {}", port);

        let mut cmd = Command::new(&config.npm_binary);
        cmd.args(["run", &config.script])
            .current_dir(&config.app_dir)
            .env("PORT", port.to_string())
            .env("HOSTNAME", "127.0.0.1")
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        // npm forks the real server; a group of its own lets stop() reach both
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {} run {} in {}: {}",
                config.npm_binary.display(),
                config.script,
                config.app_dir.display(),
                e
            ))
        })?;

        let handle = AppServer {
            child: Some(child),
            base_url: base_url.clone(),
        };

        handle.wait_for_healthy(config.startup_timeout).await?;

        info!("App server is healthy at {}", base_url);
        Ok(handle)
    }

    /// Poll the login page until the app answers.
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}/login", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
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
                        info!("Waiting for app server to start...");
                    }
                    // refused connections are normal while the app boots
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(500)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_managed(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the app if this handle spawned it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping app server (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            // the child leads its own process group
            let group = Pid::from_raw(child.id() as i32);
            if killpg(group, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
            let _ = killpg(group, Signal::SIGKILL);
        }

        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning the app
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory with the app's `package.json`
    pub app_dir: PathBuf,

    pub npm_binary: PathBuf,

    /// npm script that serves a production build
    pub script: String,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    pub startup_timeout: Duration,

    /// Extra environment for the app process
    pub env: Vec<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_dir: PathBuf::from("."),
            npm_binary: PathBuf::from("npm"),
            script: "start".to_string(),
            port: None,
            startup_timeout: Duration::from_secs(120),
            env: Vec::new(),
        }
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
