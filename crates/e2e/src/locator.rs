//! Lazily-evaluated element references
//!
//! A [`Locator`] is just a driver handle plus a [`Selector`]. Nothing is
//! looked up until a method is called, and every call resolves the
//! selector again, so a locator stays valid while the DOM changes under it.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::driver::{Driver, ElementAction, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::expect::poll_until;

/// Element condition for [`Locator::wait_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

#[derive(Clone)]
pub struct Locator {
    driver: Arc<dyn Driver>,
    selector: Selector,
    action_timeout: Duration,
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("selector", &self.selector.to_string())
            .finish()
    }
}

impl Locator {
    pub fn new(driver: Arc<dyn Driver>, selector: Selector, action_timeout: Duration) -> Self {
        Self {
            driver,
            selector,
            action_timeout,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    fn derive(&self, selector: Selector) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            selector,
            action_timeout: self.action_timeout,
        }
    }

    /// Locator for `child` scoped inside this one
    pub fn locator(&self, child: &Selector) -> Self {
        self.derive(self.selector.then(child))
    }

    pub fn filter_text(&self, text: impl Into<TextMatch>) -> Self {
        self.derive(self.selector.has_text(text))
    }

    pub fn first(&self) -> Self {
        self.derive(self.selector.first())
    }

    pub fn last(&self) -> Self {
        self.derive(self.selector.last())
    }

    pub fn nth(&self, index: usize) -> Self {
        self.derive(self.selector.nth(index))
    }

    pub fn with_timeout(&self, action_timeout: Duration) -> Self {
        Self {
            action_timeout,
            ..self.clone()
        }
    }

    pub async fn count(&self) -> E2eResult<usize> {
        self.driver.count(&self.selector).await
    }

    /// Visible right now; never waits
    pub async fn is_visible(&self) -> E2eResult<bool> {
        self.driver.is_visible(&self.selector).await
    }

    pub async fn is_checked(&self) -> E2eResult<bool> {
        self.driver.is_checked(&self.selector).await
    }

    /// Text content, empty when the element has none
    pub async fn text(&self) -> E2eResult<String> {
        Ok(self
            .driver
            .text_content(&self.selector)
            .await?
            .unwrap_or_default())
    }

    pub async fn input_value(&self) -> E2eResult<String> {
        self.driver.input_value(&self.selector).await
    }

    pub async fn get_attribute(&self, name: &str) -> E2eResult<Option<String>> {
        self.driver.get_attribute(&self.selector, name).await
    }

    async fn perform(&self, action: ElementAction) -> E2eResult<()> {
        debug!("{} on {}", action, self.selector);
        self.driver
            .perform(&self.selector, &action, self.action_timeout)
            .await
    }

    pub async fn click(&self) -> E2eResult<()> {
        self.perform(ElementAction::Click).await
    }

    pub async fn fill(&self, value: &str) -> E2eResult<()> {
        self.perform(ElementAction::Fill {
            value: value.to_string(),
        })
        .await
    }

    pub async fn clear(&self) -> E2eResult<()> {
        self.perform(ElementAction::Clear).await
    }

    pub async fn select_option(&self, value: &str) -> E2eResult<()> {
        self.perform(ElementAction::SelectOption {
            value: value.to_string(),
        })
        .await
    }

    pub async fn check(&self) -> E2eResult<()> {
        self.perform(ElementAction::Check).await
    }

    pub async fn uncheck(&self) -> E2eResult<()> {
        self.perform(ElementAction::Uncheck).await
    }

    pub async fn press(&self, key: &str) -> E2eResult<()> {
        self.perform(ElementAction::Press {
            key: key.to_string(),
        })
        .await
    }

    pub async fn hover(&self) -> E2eResult<()> {
        self.perform(ElementAction::Hover).await
    }

    /// Wait until the element reaches `state`
    pub async fn wait_for(&self, state: ElementState, timeout: Duration) -> E2eResult<()> {
        let what = format!("{} to be {:?}", self.selector, state);
        let this = self;
        poll_until(&what, timeout, move || async move {
            Ok(match state {
                ElementState::Visible => this.is_visible().await?,
                ElementState::Hidden => !this.is_visible().await?,
                ElementState::Attached => this.count().await? > 0,
                ElementState::Detached => this.count().await? == 0,
            })
        })
        .await
    }

    /// Whether the element shows up within `timeout`.
    ///
    /// Absence is an answer here, not a failure: timeouts and driver errors
    /// both come back as `false`.
    pub async fn probe_visible(&self, timeout: Duration) -> bool {
        match self.wait_for(ElementState::Visible, timeout).await {
            Ok(()) => true,
            Err(e) => {
                if !e.is_timeout() {
                    debug!("Probe of {} failed: {}", self.selector, e);
                }
                false
            }
        }
    }

    /// Wait for the element's text to satisfy `expected`
    pub async fn wait_for_text(&self, expected: &TextMatch, timeout: Duration) -> E2eResult<String> {
        let what = format!("{} to have text {}", self.selector, expected);
        let last = &Mutex::new(String::new());
        let this = self;
        let result = poll_until(&what, timeout, move || async move {
            let text = this.text().await?;
            let matched = expected.matches(&text)?;
            *last.lock() = text;
            Ok(matched)
        })
        .await;
        let last = last.lock().clone();
        match result {
            Ok(()) => Ok(last),
            Err(E2eError::Timeout { .. }) => Err(E2eError::AssertionFailed(format!(
                "{} has text {:?}, expected {}",
                self.selector, last, expected
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Try `candidates` in order with a short probe each; the first visible
/// one wins.
///
/// Used where a third party owns the markup and the right selector varies.
pub async fn find_first_visible(candidates: &[Locator], probe: Duration) -> Option<Locator> {
    for candidate in candidates {
        if candidate.probe_visible(probe).await {
            debug!("Selected candidate {}", candidate.selector());
            return Some(candidate.clone());
        }
    }
    None
}
