//! HauntOps E2E harness
//!
//! Page objects over a minimal browser [`Driver`], and a runner for
//! declarative YAML scenarios built from them:
//!
//! ```text
//! fixtures ──> BasePage ──> page objects ──> scenarios ──> TestRunner
//!                 │
//!              Driver ── PlaywrightDriver (node bridge, one browser per session)
//!                     └─ MockDriver      (scripted, for offline tests)
//! ```
//!
//! Every wait is bounded by one of the [`haunt_fixtures::Timeouts`] budgets.
//! Scenarios that need an integration the environment lacks, or that probe
//! a known permission gap, are reported as skipped rather than failed.

pub mod base_page;
pub mod config;
pub mod driver;
pub mod error;
pub mod expect;
pub mod flows;
pub mod locator;
pub mod mock;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod screenshots;
pub mod server;

pub use base_page::{BasePage, GotoOptions, UrlPattern};
pub use config::HarnessConfig;
pub use driver::{Driver, SessionFactory};
pub use error::{E2eError, E2eResult};
pub use flows::{DialogFlow, DialogState};
pub use locator::Locator;
pub use runner::{Outcome, ScenarioResult, SuiteResult, TestRunner};
pub use scenario::{Scenario, Step};
