//! Error types for E2E testing

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("App server failed to start: {0}")]
    ServerStartup(String),

    #[error("App server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Browser bridge closed: {0}")]
    BridgeClosed(String),

    #[error("Timeout after {after:?} waiting for: {what}")]
    Timeout { what: String, after: Duration },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid {flow} transition: {from} -> {to}")]
    InvalidTransition {
        flow: String,
        from: String,
        to: String,
    },

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Screenshot mismatch: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("Fixture error: {0}")]
    Fixture(#[from] haunt_fixtures::FixtureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl E2eError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        E2eError::Timeout {
            what: what.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout { .. })
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
