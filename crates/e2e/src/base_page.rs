//! Shared navigation, query, wait and assertion primitives
//!
//! Every page object owns a [`BasePage`]. It knows the app's base URL, the
//! timeout tiers and where screenshots go, and wraps the [`Driver`] with
//! the handful of operations all pages need.

use regex::Regex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use haunt_fixtures::{Timeouts, TIMEOUTS};

use crate::driver::{
    AriaRole, DialogAction, Driver, LoadState, ResponseInfo, ResponseMatcher, Selector, TextMatch,
};
use crate::error::{E2eError, E2eResult};
use crate::expect::poll_for;
use crate::locator::{ElementState, Locator};

/// Where screenshots land unless configured otherwise
pub const DEFAULT_SCREENSHOT_DIR: &str = "./e2e/screenshots";

/// Any of the app's loading indicators
pub const LOADING_INDICATOR: &str = r#"[data-testid="loading"], [aria-busy="true"], .animate-spin"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GotoOptions {
    pub wait_for_network_idle: bool,
}

impl GotoOptions {
    pub fn network_idle() -> Self {
        Self {
            wait_for_network_idle: true,
        }
    }
}

/// URL condition for [`BasePage::wait_for_url`].
///
/// `Exact` and `Glob` patterns that start with `/` are compared against the
/// path and query only; anything else is compared against the full URL.
/// In globs `**` matches anything and `*` matches within one path segment.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Exact(String),
    Glob(String),
    Regex(Regex),
}

impl UrlPattern {
    pub fn glob(pattern: impl Into<String>) -> Self {
        UrlPattern::Glob(pattern.into())
    }

    pub fn regex(source: &str) -> E2eResult<Self> {
        Ok(UrlPattern::Regex(Regex::new(source)?))
    }

    pub fn matches(&self, url: &str) -> E2eResult<bool> {
        Ok(match self {
            UrlPattern::Exact(expected) => subject(expected, url)? == *expected,
            UrlPattern::Glob(glob) => glob_to_regex(glob)?.is_match(&subject(glob, url)?),
            UrlPattern::Regex(re) => re.is_match(url),
        })
    }
}

impl From<&str> for UrlPattern {
    fn from(pattern: &str) -> Self {
        if pattern.contains('*') {
            UrlPattern::Glob(pattern.to_string())
        } else {
            UrlPattern::Exact(pattern.to_string())
        }
    }
}

impl From<String> for UrlPattern {
    fn from(pattern: String) -> Self {
        UrlPattern::from(pattern.as_str())
    }
}

impl From<Regex> for UrlPattern {
    fn from(re: Regex) -> Self {
        UrlPattern::Regex(re)
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlPattern::Exact(s) | UrlPattern::Glob(s) => f.write_str(s),
            UrlPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

fn subject(pattern: &str, url: &str) -> E2eResult<String> {
    if pattern.starts_with('/') {
        path_and_query(url)
    } else {
        Ok(url.to_string())
    }
}

/// Path plus `?query` of an absolute URL
pub fn path_and_query(url: &str) -> E2eResult<String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| E2eError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match parsed.query() {
        Some(q) => format!("{}?{}", parsed.path(), q),
        None => parsed.path().to_string(),
    })
}

fn glob_to_regex(glob: &str) -> E2eResult<Regex> {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(&c.to_string()));
        }
    }
    out.push('$');
    Ok(Regex::new(&out)?)
}

#[derive(Clone)]
pub struct BasePage {
    driver: Arc<dyn Driver>,
    base_url: String,
    timeouts: Timeouts,
    screenshot_dir: PathBuf,
}

impl BasePage {
    pub fn new(driver: Arc<dyn Driver>, base_url: impl Into<String>) -> Self {
        Self {
            driver,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeouts: TIMEOUTS,
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Absolute URL for an app path; absolute URLs pass through
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // Navigation

    pub async fn goto(&self, path: &str, options: GotoOptions) -> E2eResult<()> {
        let url = self.url_for(path);
        debug!("Navigating to {}", url);
        self.driver.goto(&url, LoadState::Load).await?;
        if options.wait_for_network_idle {
            self.wait_for_network_idle().await?;
        }
        Ok(())
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    pub async fn current_path(&self) -> E2eResult<String> {
        path_and_query(&self.current_url().await?)
    }

    /// Wait until the current URL matches `pattern`; returns that URL
    pub async fn wait_for_url(
        &self,
        pattern: impl Into<UrlPattern>,
        timeout: Duration,
    ) -> E2eResult<String> {
        let pattern = pattern.into();
        let what = format!("URL to match {}", pattern);
        let driver = &self.driver;
        let pattern = &pattern;
        poll_for(&what, timeout, move || async move {
            let url = driver.current_url().await?;
            Ok(if pattern.matches(&url)? { Some(url) } else { None })
        })
        .await
    }

    pub async fn wait_for_load_state(&self, state: LoadState) -> E2eResult<()> {
        self.driver
            .wait_for_load_state(state, self.timeouts.standard)
            .await
    }

    pub async fn wait_for_network_idle(&self) -> E2eResult<()> {
        self.wait_for_load_state(LoadState::NetworkIdle).await
    }

    /// Wait for a visible loading indicator to go away; no-op without one
    pub async fn wait_for_loading_complete(&self) -> E2eResult<()> {
        let indicator = self.locator(LOADING_INDICATOR).first();
        if indicator.is_visible().await? {
            debug!("Waiting for loading indicator to clear");
            indicator
                .wait_for(ElementState::Hidden, self.timeouts.standard)
                .await?;
        }
        Ok(())
    }

    // Queries

    fn wrap(&self, selector: Selector) -> Locator {
        Locator::new(Arc::clone(&self.driver), selector, self.timeouts.standard)
    }

    pub fn by_test_id(&self, id: &str) -> Locator {
        self.wrap(Selector::test_id(id))
    }

    pub fn by_role(&self, role: AriaRole) -> Locator {
        self.wrap(Selector::role(role))
    }

    pub fn by_role_named(&self, role: AriaRole, name: impl Into<TextMatch>) -> Locator {
        self.wrap(Selector::role_named(role, name))
    }

    pub fn by_text(&self, text: impl Into<TextMatch>) -> Locator {
        self.wrap(Selector::text(text))
    }

    pub fn by_label(&self, text: impl Into<TextMatch>) -> Locator {
        self.wrap(Selector::label(text))
    }

    pub fn by_placeholder(&self, text: impl Into<TextMatch>) -> Locator {
        self.wrap(Selector::placeholder(text))
    }

    pub fn locator(&self, css: &str) -> Locator {
        self.wrap(Selector::css(css))
    }

    // Assertions

    pub async fn expect_heading(&self, name: impl Into<TextMatch>) -> E2eResult<()> {
        self.expect_visible(&self.by_role_named(AriaRole::Heading, name).first())
            .await
    }

    pub async fn expect_title(&self, expected: impl Into<TextMatch>) -> E2eResult<()> {
        let expected = expected.into();
        let what = format!("title {}", expected);
        let driver = &self.driver;
        let expected = &expected;
        poll_for(&what, self.timeouts.standard, move || async move {
            let title = driver.title().await?;
            Ok(expected.matches(&title)?.then_some(()))
        })
        .await
    }

    pub async fn expect_url(&self, pattern: impl Into<UrlPattern>) -> E2eResult<()> {
        let pattern = pattern.into();
        match self.wait_for_url(pattern.clone(), self.timeouts.standard).await {
            Ok(_) => Ok(()),
            Err(E2eError::Timeout { .. }) => Err(E2eError::AssertionFailed(format!(
                "expected URL matching {}, still at {}",
                pattern,
                self.current_url().await?
            ))),
            Err(e) => Err(e),
        }
    }

    pub async fn expect_visible(&self, locator: &Locator) -> E2eResult<()> {
        locator
            .wait_for(ElementState::Visible, self.timeouts.standard)
            .await
    }

    pub async fn expect_not_visible(&self, locator: &Locator) -> E2eResult<()> {
        locator
            .wait_for(ElementState::Hidden, self.timeouts.standard)
            .await
    }

    pub async fn expect_text(&self, locator: &Locator, expected: impl Into<TextMatch>) -> E2eResult<()> {
        locator
            .wait_for_text(&expected.into(), self.timeouts.standard)
            .await
            .map(|_| ())
    }

    // Actions

    pub async fn click(&self, locator: &Locator) -> E2eResult<()> {
        locator.click().await
    }

    pub async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        locator.fill(value).await
    }

    pub async fn clear_and_fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        locator.clear().await?;
        locator.fill(value).await
    }

    pub async fn select(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        locator.select_option(value).await
    }

    pub async fn check(&self, locator: &Locator) -> E2eResult<()> {
        locator.check().await
    }

    pub async fn uncheck(&self, locator: &Locator) -> E2eResult<()> {
        locator.uncheck().await
    }

    /// Save a full-page screenshot as `{screenshot_dir}/{name}.png`
    pub async fn screenshot(&self, name: &str) -> E2eResult<PathBuf> {
        let path = self.screenshot_dir.join(format!("{}.png", name));
        self.driver.screenshot(&path, true).await?;
        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }

    /// Fixed settle delay for menus, popovers and animations
    pub async fn pause(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Run `action` and wait for the response it triggers.
    ///
    /// The waiter is armed before `action` is first polled, so a response
    /// that arrives while the action is still running is not missed.
    pub async fn expect_response<F>(
        &self,
        matcher: ResponseMatcher,
        timeout: Duration,
        action: F,
    ) -> E2eResult<ResponseInfo>
    where
        F: Future<Output = E2eResult<()>>,
    {
        let waiter = self.driver.arm_response(&matcher).await?;
        if let Err(e) = action.await {
            if let Err(disarm) = self.driver.disarm_response(waiter).await {
                warn!("Failed to disarm response waiter: {}", disarm);
            }
            return Err(e);
        }
        let response = self.driver.await_response(waiter, timeout).await?;
        debug!("{} {} -> {}", response.method, response.url, response.status);
        Ok(response)
    }

    pub async fn accept_next_dialog(&self) -> E2eResult<()> {
        self.driver.handle_next_dialog(DialogAction::Accept).await
    }

    pub async fn dismiss_next_dialog(&self) -> E2eResult<()> {
        self.driver.handle_next_dialog(DialogAction::Dismiss).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;
    use test_case::test_case;
    use tokio::time::Instant;

    fn page(mock: &Arc<MockDriver>) -> BasePage {
        BasePage::new(mock.clone(), "http://localhost:3000/")
            .with_timeouts(Timeouts::uniform(Duration::from_secs(2)))
    }

    #[test_case("/login", "http://localhost:3000/login", true ; "exact path")]
    #[test_case("/login", "http://localhost:3000/login/extra", false ; "exact path is not a prefix")]
    #[test_case("**/nightmare-manor", "http://localhost:3000/nightmare-manor", true ; "double star")]
    #[test_case("**/nightmare-manor", "http://localhost:3000/nightmare-manor/staff", false ; "anchored at end")]
    #[test_case("/*/orders", "http://localhost:3000/acme/orders", true ; "single star one segment")]
    #[test_case("/*/orders", "http://localhost:3000/acme/ticketing/orders", false ; "single star stops at slash")]
    #[test_case("**/checkout/success?session_id=*", "http://h/s/acme/checkout/success?session_id=cs_1", true ; "query kept")]
    fn test_url_pattern(pattern: &str, url: &str, expected: bool) {
        assert_eq!(UrlPattern::from(pattern).matches(url).unwrap(), expected);
    }

    #[test]
    fn test_regex_pattern_matches_full_url() {
        let pattern = UrlPattern::regex(r"/admin(/|$)").unwrap();
        assert!(pattern.matches("http://localhost:3000/admin").unwrap());
        assert!(!pattern.matches("http://localhost:3000/administer").unwrap());
    }

    #[test]
    fn test_url_for() {
        let mock = Arc::new(MockDriver::new());
        let base = page(&mock);
        assert_eq!(base.url_for("/login"), "http://localhost:3000/login");
        assert_eq!(base.url_for("login"), "http://localhost:3000/login");
        assert_eq!(
            base.url_for("https://checkout.stripe.com/c/pay"),
            "https://checkout.stripe.com/c/pay"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_url_resolves_on_match() {
        let mock = Arc::new(MockDriver::new());
        mock.set_url("http://localhost:3000/login");
        mock.with_state(|s| {
            s.after(Duration::from_millis(700), |s| {
                s.set_url("http://localhost:3000/nightmare-manor")
            })
        });
        let base = page(&mock);
        let url = base
            .wait_for_url("**/nightmare-manor", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/nightmare-manor");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_url_rejects_after_timeout() {
        let mock = Arc::new(MockDriver::new());
        mock.set_url("http://localhost:3000/login");
        let base = page(&mock);
        let start = Instant::now();
        let err = base
            .wait_for_url("/admin", Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_complete_is_noop_without_indicator() {
        let mock = Arc::new(MockDriver::new());
        page(&mock).wait_for_loading_complete().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_complete_waits_for_spinner() {
        let mock = Arc::new(MockDriver::new());
        let spinner = Selector::css(LOADING_INDICATOR);
        mock.show(&spinner, "");
        mock.with_state(|s| {
            let spinner = spinner.clone();
            s.after(Duration::from_secs(1), move |s| s.hide(&spinner))
        });
        page(&mock).wait_for_loading_complete().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_complete_times_out_on_stuck_spinner() {
        let mock = Arc::new(MockDriver::new());
        mock.show(&Selector::css(LOADING_INDICATOR), "");
        let err = page(&mock).wait_for_loading_complete().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_url_reports_current_location() {
        let mock = Arc::new(MockDriver::new());
        mock.set_url("http://localhost:3000/login");
        let err = page(&mock).expect_url("/admin").await.unwrap_err();
        match err {
            E2eError::AssertionFailed(msg) => assert!(msg.contains("/login")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_screenshot_path() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockDriver::new());
        let path = page(&mock)
            .with_screenshot_dir(dir.path())
            .screenshot("after-login")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("after-login.png"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_expect_response_sees_response_triggered_by_action() {
        let mock = Arc::new(MockDriver::new());
        let save = Selector::role_named(AriaRole::Button, "Save");
        mock.show(&save, "Save");
        mock.on_click(&save, |s| s.push_response("http://api/rest/v1/promo_codes", "POST", 201));
        let base = page(&mock);
        let button = base.by_role_named(AriaRole::Button, "Save");
        let response = base
            .expect_response(
                ResponseMatcher::new("promo_codes").method("POST"),
                Duration::from_secs(1),
                button.click(),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(mock.armed_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_disarms_response_waiter() {
        let mock = Arc::new(MockDriver::new());
        let base = page(&mock);
        // never rendered, so the click times out
        let button = base.by_role_named(AriaRole::Button, "Save");
        let err = base
            .expect_response(
                ResponseMatcher::new("promo_codes").method("POST"),
                Duration::from_secs(1),
                button.click(),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(mock.armed_waiters(), 0);
    }
}
