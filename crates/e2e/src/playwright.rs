//! Playwright browser automation
//!
//! Each session spawns `node` on an embedded bridge script that owns one
//! browser and one page. Commands and replies are newline-delimited JSON,
//! one request in flight at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{
    DialogAction, Driver, ElementAction, LoadState, ResponseInfo, ResponseMatcher,
    ResponseWaiter, Selector, SessionFactory,
};
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Budget for commands that carry no timeout of their own
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra time the bridge gets on top of a command's own timeout
const BRIDGE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Driver(format!("Unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Delay Playwright inserts between operations
    pub slow_mo_ms: u64,
    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,
    pub node_binary: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            slow_mo_ms: 0,
            project_dir: PathBuf::from("."),
            node_binary: PathBuf::from("node"),
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: BridgeCommand<'a>,
}

#[derive(Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Launch {
        browser: &'static str,
        headless: bool,
        viewport_width: u32,
        viewport_height: u32,
        slow_mo_ms: u64,
    },
    Goto {
        url: &'a str,
        wait_until: LoadState,
    },
    Url,
    Title,
    WaitForLoadState {
        state: LoadState,
        timeout_ms: u64,
    },
    Count {
        selector: &'a Selector,
    },
    IsVisible {
        selector: &'a Selector,
    },
    IsChecked {
        selector: &'a Selector,
    },
    TextContent {
        selector: &'a Selector,
    },
    InputValue {
        selector: &'a Selector,
    },
    GetAttribute {
        selector: &'a Selector,
        name: &'a str,
    },
    Perform {
        selector: &'a Selector,
        op: &'a ElementAction,
        timeout_ms: u64,
    },
    PressKey {
        key: &'a str,
    },
    ArmResponse {
        waiter: u64,
        matcher: &'a ResponseMatcher,
    },
    AwaitResponse {
        waiter: u64,
        timeout_ms: u64,
    },
    DisarmResponse {
        waiter: u64,
    },
    HandleNextDialog {
        action: DialogAction,
    },
    Screenshot {
        path: &'a Path,
        full_page: bool,
    },
    Close,
}

impl BridgeCommand<'_> {
    fn name(&self) -> &'static str {
        match self {
            BridgeCommand::Launch { .. } => "launch",
            BridgeCommand::Goto { .. } => "goto",
            BridgeCommand::Url => "url",
            BridgeCommand::Title => "title",
            BridgeCommand::WaitForLoadState { .. } => "wait_for_load_state",
            BridgeCommand::Count { .. } => "count",
            BridgeCommand::IsVisible { .. } => "is_visible",
            BridgeCommand::IsChecked { .. } => "is_checked",
            BridgeCommand::TextContent { .. } => "text_content",
            BridgeCommand::InputValue { .. } => "input_value",
            BridgeCommand::GetAttribute { .. } => "get_attribute",
            BridgeCommand::Perform { .. } => "perform",
            BridgeCommand::PressKey { .. } => "press_key",
            BridgeCommand::ArmResponse { .. } => "arm_response",
            BridgeCommand::AwaitResponse { .. } => "await_response",
            BridgeCommand::DisarmResponse { .. } => "disarm_response",
            BridgeCommand::HandleNextDialog { .. } => "handle_next_dialog",
            BridgeCommand::Screenshot { .. } => "screenshot",
            BridgeCommand::Close => "close",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Live Playwright session behind a Node bridge process
pub struct PlaywrightDriver {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    _workdir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Spawn the bridge and launch a browser with a fresh context
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.project_dir)?;

        let workdir = tempfile::tempdir()?;
        let script_path = workdir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Spawning Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .current_dir(&config.project_dir)
            .env("NODE_PATH", config.project_dir.join("node_modules"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::BridgeClosed("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::BridgeClosed("stdout not captured".to_string()))?;

        let driver = Self {
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            _workdir: workdir,
        };

        driver
            .call(
                BridgeCommand::Launch {
                    browser: config.browser.as_str(),
                    headless: config.headless,
                    viewport_width: config.viewport_width,
                    viewport_height: config.viewport_height,
                    slow_mo_ms: config.slow_mo_ms,
                },
                None,
            )
            .await?;

        info!(
            "Launched {} ({}x{}, headless: {})",
            config.browser.as_str(),
            config.viewport_width,
            config.viewport_height,
            config.headless
        );
        Ok(driver)
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn call(
        &self,
        command: BridgeCommand<'_>,
        timeout: Option<Duration>,
    ) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = command.name();
        let mut line = serde_json::to_string(&Request { id, command })?;
        line.push('\n');

        let budget = timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT) + BRIDGE_GRACE;
        let mut io = self.io.lock().await;

        io.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| E2eError::BridgeClosed(e.to_string()))?;
        io.stdin
            .flush()
            .await
            .map_err(|e| E2eError::BridgeClosed(e.to_string()))?;

        let reply = tokio::time::timeout(budget, read_reply(&mut io, id, name))
            .await
            .map_err(|_| E2eError::timeout(format!("bridge reply to {}", name), budget))??;

        if reply.ok {
            return Ok(reply.value);
        }

        let message = reply.error.unwrap_or_else(|| "unknown bridge error".to_string());
        if reply.timeout {
            Err(E2eError::timeout(
                message,
                timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            ))
        } else {
            Err(E2eError::Driver(format!("{}: {}", name, message)))
        }
    }

    async fn call_as<T: serde::de::DeserializeOwned>(
        &self,
        command: BridgeCommand<'_>,
    ) -> E2eResult<T> {
        let value = self.call(command, None).await?;
        Ok(serde_json::from_value(value)?)
    }
}

async fn read_reply(io: &mut BridgeIo, id: u64, name: &str) -> E2eResult<Reply> {
    loop {
        let Some(raw) = io.stdout.next_line().await? else {
            return Err(E2eError::BridgeClosed(format!("bridge exited during {}", name)));
        };
        match serde_json::from_str::<Reply>(&raw) {
            Ok(reply) if reply.id == id => return Ok(reply),
            Ok(reply) => warn!("Dropping stale bridge reply {}", reply.id),
            Err(_) => debug!("[bridge] {}", raw),
        }
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[async_trait]
impl Driver for PlaywrightDriver {
    async fn goto(&self, url: &str, wait_until: LoadState) -> E2eResult<()> {
        self.call(BridgeCommand::Goto { url, wait_until }, None)
            .await
            .map(|_| ())
    }

    async fn current_url(&self) -> E2eResult<String> {
        self.call_as(BridgeCommand::Url).await
    }

    async fn title(&self) -> E2eResult<String> {
        self.call_as(BridgeCommand::Title).await
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()> {
        self.call(
            BridgeCommand::WaitForLoadState {
                state,
                timeout_ms: millis(timeout),
            },
            Some(timeout),
        )
        .await
        .map(|_| ())
    }

    async fn count(&self, selector: &Selector) -> E2eResult<usize> {
        self.call_as(BridgeCommand::Count { selector }).await
    }

    async fn is_visible(&self, selector: &Selector) -> E2eResult<bool> {
        self.call_as(BridgeCommand::IsVisible { selector }).await
    }

    async fn is_checked(&self, selector: &Selector) -> E2eResult<bool> {
        self.call_as(BridgeCommand::IsChecked { selector }).await
    }

    async fn text_content(&self, selector: &Selector) -> E2eResult<Option<String>> {
        self.call_as(BridgeCommand::TextContent { selector }).await
    }

    async fn input_value(&self, selector: &Selector) -> E2eResult<String> {
        self.call_as(BridgeCommand::InputValue { selector }).await
    }

    async fn get_attribute(&self, selector: &Selector, name: &str) -> E2eResult<Option<String>> {
        self.call_as(BridgeCommand::GetAttribute { selector, name })
            .await
    }

    async fn perform(
        &self,
        selector: &Selector,
        action: &ElementAction,
        timeout: Duration,
    ) -> E2eResult<()> {
        self.call(
            BridgeCommand::Perform {
                selector,
                op: action,
                timeout_ms: millis(timeout),
            },
            Some(timeout),
        )
        .await
        .map(|_| ())
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.call(BridgeCommand::PressKey { key }, None)
            .await
            .map(|_| ())
    }

    async fn arm_response(&self, matcher: &ResponseMatcher) -> E2eResult<ResponseWaiter> {
        let waiter = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.call(BridgeCommand::ArmResponse { waiter, matcher }, None)
            .await?;
        Ok(ResponseWaiter(waiter))
    }

    async fn await_response(
        &self,
        waiter: ResponseWaiter,
        timeout: Duration,
    ) -> E2eResult<ResponseInfo> {
        let value = self
            .call(
                BridgeCommand::AwaitResponse {
                    waiter: waiter.0,
                    timeout_ms: millis(timeout),
                },
                Some(timeout),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn disarm_response(&self, waiter: ResponseWaiter) -> E2eResult<()> {
        self.call(BridgeCommand::DisarmResponse { waiter: waiter.0 }, None)
            .await
            .map(|_| ())
    }

    async fn handle_next_dialog(&self, action: DialogAction) -> E2eResult<()> {
        self.call(BridgeCommand::HandleNextDialog { action }, None)
            .await
            .map(|_| ())
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(BridgeCommand::Screenshot { path, full_page }, None)
            .await
            .map(|_| ())
    }

    async fn close(&self) -> E2eResult<()> {
        match self.call(BridgeCommand::Close, None).await {
            Ok(_) | Err(E2eError::BridgeClosed(_)) => {}
            Err(e) => warn!("Bridge close failed: {}", e),
        }
        let mut child = self.child.lock().await;
        let _ = child.wait().await;
        Ok(())
    }
}

/// Opens a new bridge, and so a new browser, for every session
pub struct PlaywrightSessions {
    config: PlaywrightConfig,
}

impl PlaywrightSessions {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for PlaywrightSessions {
    async fn open(&self) -> E2eResult<Arc<dyn Driver>> {
        let driver = PlaywrightDriver::launch(&self.config).await?;
        Ok(Arc::new(driver))
    }
}
