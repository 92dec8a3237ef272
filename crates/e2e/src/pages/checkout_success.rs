use tracing::info;

use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::expect::poll_for;
use crate::locator::Locator;

/// Where the success page settles once it stops loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessState {
    Confirmed,
    Error,
}

/// `/s/{identifier}/checkout/success?session_id=...`
pub struct CheckoutSuccessPage {
    base: BasePage,
}

impl CheckoutSuccessPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn confirmation_heading(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Heading,
            TextMatch::regex_ci("thank you|order confirmed|purchase complete"),
        )
    }

    pub fn error_heading(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Heading,
            TextMatch::regex_ci("something went wrong|order not found|unable to"),
        )
    }

    pub fn order_number_label(&self) -> Locator {
        self.base.by_test_id("order-number")
    }

    pub async fn goto_session(&self, identifier: &str, session_id: &str) -> E2eResult<()> {
        let path = Routes::storefront(identifier).checkout_success(session_id);
        self.base.goto(&path, GotoOptions::default()).await
    }

    /// Wait for the page to show either the confirmation or the error
    /// state. A page still loading after `very_long` is a timeout, never
    /// an endless wait.
    pub async fn wait_for_resolution(&self) -> E2eResult<SuccessState> {
        let confirmed = &self.confirmation_heading();
        let failed = &self.error_heading();
        let state = poll_for(
            "checkout success page to resolve",
            self.base.timeouts().very_long,
            move || async move {
                if confirmed.is_visible().await? {
                    return Ok(Some(SuccessState::Confirmed));
                }
                if failed.is_visible().await? {
                    return Ok(Some(SuccessState::Error));
                }
                Ok(None)
            },
        )
        .await?;
        info!("Checkout success page resolved to {:?}", state);
        Ok(state)
    }

    pub async fn expect_confirmed(&self) -> E2eResult<()> {
        match self.wait_for_resolution().await? {
            SuccessState::Confirmed => Ok(()),
            SuccessState::Error => Err(E2eError::AssertionFailed(
                "checkout success page shows an error".to_string(),
            )),
        }
    }

    pub async fn expect_error_state(&self) -> E2eResult<()> {
        match self.wait_for_resolution().await? {
            SuccessState::Error => Ok(()),
            SuccessState::Confirmed => Err(E2eError::AssertionFailed(
                "checkout success page confirmed an invalid session".to_string(),
            )),
        }
    }

    /// Order number shown on the confirmation, if any
    pub async fn order_number(&self) -> E2eResult<Option<String>> {
        let label = self.order_number_label();
        if !label.probe_visible(self.base.timeouts().fast).await {
            return Ok(None);
        }
        let text = label.text().await?;
        Ok(Some(text.trim().trim_start_matches('#').to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;
    use haunt_fixtures::Timeouts;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn success_page(mock: &Arc<MockDriver>) -> CheckoutSuccessPage {
        CheckoutSuccessPage::new(
            BasePage::new(mock.clone(), "http://localhost:3000")
                .with_timeouts(Timeouts::uniform(Duration::from_secs(60))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_to_confirmed_after_loading() {
        let mock = Arc::new(MockDriver::new());
        let page = success_page(&mock);
        let heading = page.confirmation_heading().selector().clone();
        let number = page.order_number_label().selector().clone();
        mock.on_navigate("/s/nightmare-manor/checkout/success", move |s| {
            let heading = heading.clone();
            let number = number.clone();
            s.after(Duration::from_secs(4), move |s| {
                s.show(&heading, "Thank you for your order!");
                s.show(&number, "#HM-1042");
            });
        });

        page.goto_session("nightmare-manor", "cs_test_a1").await.unwrap();
        assert_eq!(page.wait_for_resolution().await.unwrap(), SuccessState::Confirmed);
        assert_eq!(page.order_number().await.unwrap().as_deref(), Some("HM-1042"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_session_resolves_to_error() {
        let mock = Arc::new(MockDriver::new());
        let page = success_page(&mock);
        mock.show(page.error_heading().selector(), "Order not found");
        page.goto_session("nightmare-manor", "garbage").await.unwrap();
        page.expect_error_state().await.unwrap();
        assert!(page.expect_confirmed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_endless_loading_times_out_at_very_long() {
        let mock = Arc::new(MockDriver::new());
        let page = success_page(&mock);
        let start = Instant::now();
        let err = page.wait_for_resolution().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() <= Duration::from_secs(61));
    }
}
