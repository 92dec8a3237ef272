//! Harness configuration
//!
//! Defaults, overlaid by `E2E_*` environment variables, overlaid by the
//! harness binary's command line flags.

use std::path::PathBuf;

use haunt_fixtures::{FeatureFlags, Timeouts, TIMEOUTS};

use crate::base_page::DEFAULT_SCREENSHOT_DIR;
use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};
use crate::screenshots::ScreenshotConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// App under test; ignored when the harness spawns the app itself
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub slow_mo_ms: u64,
    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,
    pub scenarios_dir: PathBuf,
    /// Where `test-results.json` is written
    pub output_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub baseline_dir: PathBuf,
    pub visual_threshold: f64,
    pub update_baselines: bool,
    pub flags: FeatureFlags,
    pub timeouts: Timeouts,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            browser: Browser::Chromium,
            headless: true,
            slow_mo_ms: 0,
            project_dir: PathBuf::from("."),
            scenarios_dir: PathBuf::from("crates/e2e/scenarios"),
            output_dir: PathBuf::from("test-results"),
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            baseline_dir: PathBuf::from("./e2e/baselines"),
            visual_threshold: 0.5,
            update_baselines: false,
            flags: FeatureFlags::default(),
            timeouts: TIMEOUTS,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> E2eResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` knows about
    pub fn from_lookup<F>(lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("E2E_BASE_URL").filter(|v| !v.trim().is_empty()) {
            reqwest::Url::parse(&url).map_err(|e| E2eError::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(browser) = lookup("E2E_BROWSER") {
            config.browser = browser
                .parse()
                .map_err(|_| E2eError::Config(format!("E2E_BROWSER: unknown browser {}", browser)))?;
        }
        if let Some(headless) = lookup("E2E_HEADLESS") {
            config.headless = parse_bool("E2E_HEADLESS", &headless)?;
        }
        if let Some(dir) = lookup("E2E_SCREENSHOT_DIR") {
            config.screenshot_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("E2E_SLOW_MO_MS") {
            config.slow_mo_ms = ms
                .trim()
                .parse()
                .map_err(|_| E2eError::Config(format!("E2E_SLOW_MO_MS: not a number: {}", ms)))?;
        }
        config.flags = FeatureFlags::from_lookup(&lookup);

        Ok(config)
    }

    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser,
            headless: self.headless,
            slow_mo_ms: self.slow_mo_ms,
            project_dir: self.project_dir.clone(),
            ..Default::default()
        }
    }

    pub fn screenshots(&self) -> ScreenshotConfig {
        ScreenshotConfig {
            screenshot_dir: self.screenshot_dir.clone(),
            baseline_dir: self.baseline_dir.clone(),
            diff_dir: self.output_dir.join("diffs"),
            threshold: self.visual_threshold,
            update_baselines: self.update_baselines,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> E2eResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(E2eError::Config(format!("{}: expected a boolean, got {}", key, other))),
    }
}
