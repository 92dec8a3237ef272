use tracing::warn;

use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions, UrlPattern};
use crate::driver::{AriaRole, LoadState, Selector, TextMatch};
use crate::error::E2eResult;
use crate::locator::Locator;
use crate::pages::INPUT_SETTLE_MS;

/// Public storefront under `/s/{identifier}`
pub struct StorefrontPage {
    base: BasePage,
}

impl StorefrontPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn ticket_card(&self, ticket_name: &str) -> Locator {
        self.base
            .by_test_id("ticket-type-card")
            .filter_text(ticket_name)
            .first()
    }

    pub fn quantity_input(&self, ticket_name: &str) -> Locator {
        self.ticket_card(ticket_name)
            .locator(&Selector::label(TextMatch::regex_ci("quantity")))
    }

    pub fn promo_code_input(&self) -> Locator {
        self.base.by_placeholder(TextMatch::regex_ci("promo code"))
    }

    pub fn apply_promo_button(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Button, TextMatch::exact("Apply"))
    }

    pub fn discount_line(&self) -> Locator {
        self.base.by_test_id("discount-amount")
    }

    pub fn checkout_button(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Button, TextMatch::regex_ci("checkout"))
    }

    pub async fn goto(&self, identifier: &str) -> E2eResult<()> {
        self.base
            .goto(&Routes::storefront(identifier).home(), GotoOptions::default())
            .await
    }

    pub async fn goto_tickets(&self, identifier: &str) -> E2eResult<()> {
        self.base
            .goto(&Routes::storefront(identifier).tickets(), GotoOptions::default())
            .await?;
        self.base.wait_for_loading_complete().await
    }

    pub async fn select_tickets(&self, ticket_name: &str, quantity: u32) -> E2eResult<()> {
        self.base
            .clear_and_fill(&self.quantity_input(ticket_name), &quantity.to_string())
            .await
    }

    /// Apply a promo code. Returns false when the storefront has no promo
    /// field, which happens when promotions are turned off.
    pub async fn apply_promo_code(&self, code: &str) -> E2eResult<bool> {
        let input = self.promo_code_input();
        if !input.probe_visible(self.base.timeouts().fast).await {
            warn!("Storefront has no promo code field");
            return Ok(false);
        }
        self.base.fill(&input, code).await?;
        self.base.click(&self.apply_promo_button()).await?;
        self.base.pause(INPUT_SETTLE_MS).await;
        Ok(true)
    }

    pub async fn expect_discount(&self, display: &str) -> E2eResult<()> {
        self.base.expect_text(&self.discount_line(), display).await
    }

    pub async fn proceed_to_checkout(&self) -> E2eResult<()> {
        self.base.click(&self.checkout_button()).await?;
        self.base
            .wait_for_url(UrlPattern::glob("**/checkout"), self.base.timeouts().standard)
            .await
            .map(|_| ())
    }

    /// Follow a navigation link to a custom storefront page
    pub async fn open_page(&self, title: &str) -> E2eResult<()> {
        let link = self
            .base
            .by_role_named(AriaRole::Link, TextMatch::exact(title));
        self.base.click(&link).await?;
        self.base.wait_for_load_state(LoadState::Load).await
    }

    pub async fn expect_page_content(&self, text: &str) -> E2eResult<()> {
        self.base
            .expect_visible(&self.base.by_text(text).first())
            .await
    }
}
