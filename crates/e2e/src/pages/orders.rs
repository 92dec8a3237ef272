//! Dashboard order list and the refund flow
//!
//! A refund goes: search by buyer email, open the row's actions menu, arm a
//! one-shot accept for the native confirm dialog, click "Refund", then poll
//! the status badge until it reads `refunded`. Orders that are not
//! `completed` are refused before anything is clicked.

use std::str::FromStr;
use tracing::{debug, info};

use haunt_fixtures::{OrderStatus, Routes};

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::expect::poll_for;
use crate::locator::{ElementState, Locator};
use crate::pages::{row_menu_button, row_with, INPUT_SETTLE_MS, MENU_SETTLE_MS};

pub struct OrdersPage {
    base: BasePage,
}

impl OrdersPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn search_input(&self) -> Locator {
        self.base.by_placeholder(TextMatch::regex_ci("search"))
    }

    pub fn order_row(&self, email: &str) -> Locator {
        row_with(&self.base, email)
    }

    pub fn status_badge(&self, email: &str) -> Locator {
        self.order_row(email)
            .locator(&Selector::test_id("order-status"))
    }

    pub fn row_actions_button(&self, email: &str) -> Locator {
        row_menu_button(&self.order_row(email))
    }

    pub fn refund_menu_item(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Menuitem, TextMatch::regex_ci("^refund"))
    }

    pub async fn goto(&self, org_id: &str) -> E2eResult<()> {
        self.base
            .goto(&Routes::dashboard(org_id).orders(), GotoOptions::network_idle())
            .await?;
        self.base.wait_for_loading_complete().await
    }

    pub async fn search(&self, email: &str) -> E2eResult<()> {
        self.base.clear_and_fill(&self.search_input(), email).await?;
        self.base.pause(INPUT_SETTLE_MS).await;
        self.base.wait_for_loading_complete().await
    }

    pub async fn order_status(&self, email: &str) -> E2eResult<OrderStatus> {
        let badge = self.status_badge(email);
        badge
            .wait_for(ElementState::Visible, self.base.timeouts().standard)
            .await?;
        let text = badge.text().await?;
        Ok(OrderStatus::from_str(text.trim())?)
    }

    pub async fn open_row_actions(&self, email: &str) -> E2eResult<()> {
        self.base.click(&self.row_actions_button(email)).await?;
        self.base.pause(MENU_SETTLE_MS).await;
        Ok(())
    }

    /// Whether the row's actions menu offers "Refund". The menu is closed
    /// again before returning.
    pub async fn has_refund_action(&self, email: &str) -> E2eResult<bool> {
        self.open_row_actions(email).await?;
        let present = self
            .refund_menu_item()
            .probe_visible(self.base.timeouts().fast)
            .await;
        self.base.driver().press_key("Escape").await?;
        debug!("Order for {} offers refund: {}", email, present);
        Ok(present)
    }

    /// Refund the buyer's order and wait for the badge to read `refunded`
    pub async fn refund_order(&self, email: &str) -> E2eResult<()> {
        self.search(email).await?;
        let status = self.order_status(email).await?;
        if !status.can_refund() {
            return Err(E2eError::InvalidTransition {
                flow: "order refund".to_string(),
                from: status.to_string(),
                to: OrderStatus::Refunded.to_string(),
            });
        }

        self.open_row_actions(email).await?;
        self.base.accept_next_dialog().await?;
        self.base.click(&self.refund_menu_item()).await?;

        let badge = self.status_badge(email);
        badge
            .wait_for_text(
                &TextMatch::regex_ci(r"^\s*refunded\s*$"),
                self.base.timeouts().long,
            )
            .await?;
        info!("Refunded order for {}", email);
        Ok(())
    }

    pub async fn expect_status(&self, email: &str, expected: OrderStatus) -> E2eResult<()> {
        let what = format!("order for {} to be {}", email, expected);
        let this = self;
        let result = poll_for(&what, self.base.timeouts().standard, move || async move {
            let status = this.order_status(email).await?;
            Ok((status == expected).then_some(()))
        })
        .await;
        match result {
            Err(E2eError::Timeout { .. }) => Err(E2eError::AssertionFailed(format!(
                "order for {} is {}, expected {}",
                email,
                self.order_status(email).await?,
                expected
            ))),
            other => other,
        }
    }

    pub async fn expect_no_refund_action(&self, email: &str) -> E2eResult<()> {
        if self.has_refund_action(email).await? {
            return Err(E2eError::AssertionFailed(format!(
                "order for {} offers a refund",
                email
            )));
        }
        Ok(())
    }
}
