use tracing::info;

use haunt_fixtures::{format_discount, DiscountType, Routes};

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, ResponseMatcher, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::flows::DialogFlow;
use crate::locator::{ElementState, Locator};
use crate::pages::dialog::CrudDialog;
use crate::pages::{row_menu_button, row_with, MENU_SETTLE_MS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoCodeForm {
    pub code: String,
    pub discount_type: DiscountType,
    /// As typed into the form, e.g. `25` or `15.00`
    pub discount_value: String,
    pub max_uses: Option<u32>,
    pub valid_until: Option<String>,
    pub description: Option<String>,
}

impl PromoCodeForm {
    pub fn new(code: &str, discount_type: DiscountType, discount_value: &str) -> Self {
        Self {
            code: code.to_string(),
            discount_type,
            discount_value: discount_value.to_string(),
            max_uses: None,
            valid_until: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketTypeForm {
    pub name: String,
    /// Dollars, e.g. `25.00`
    pub price: String,
    pub capacity: Option<u32>,
    pub description: Option<String>,
}

impl TicketTypeForm {
    pub fn new(name: &str, price: &str) -> Self {
        Self {
            name: name.to_string(),
            price: price.to_string(),
            capacity: None,
            description: None,
        }
    }
}

/// Ticket types and promo codes under `/{org}/ticketing`
pub struct TicketingPage {
    base: BasePage,
}

impl TicketingPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BasePage {
        &self.base
    }

    pub(crate) fn promo_dialog(&self) -> CrudDialog<'_> {
        CrudDialog::new(&self.base, "promo code", "promo_codes")
    }

    pub(crate) fn ticket_type_dialog(&self) -> CrudDialog<'_> {
        CrudDialog::new(&self.base, "ticket type", "ticket_types")
    }

    pub fn promo_code_row(&self, code: &str) -> Locator {
        row_with(&self.base, code)
    }

    pub fn ticket_type_row(&self, name: &str) -> Locator {
        row_with(&self.base, name)
    }

    pub fn active_switch(&self, code: &str) -> Locator {
        self.promo_code_row(code)
            .locator(&Selector::role(AriaRole::Switch))
    }

    pub async fn goto_promo_codes(&self, org_id: &str) -> E2eResult<()> {
        self.base
            .goto(&Routes::dashboard(org_id).promo_codes(), GotoOptions::network_idle())
            .await?;
        self.base.wait_for_loading_complete().await
    }

    pub async fn goto_ticket_types(&self, org_id: &str) -> E2eResult<()> {
        self.base
            .goto(&Routes::dashboard(org_id).ticket_types(), GotoOptions::network_idle())
            .await?;
        self.base.wait_for_loading_complete().await
    }

    async fn fill_promo_form(&self, form: &PromoCodeForm) -> E2eResult<()> {
        let dialog = self.promo_dialog();
        self.base.fill(&dialog.field("Code"), &form.code).await?;
        self.base
            .select(&dialog.field("Discount Type"), form.discount_type.as_str())
            .await?;
        self.base
            .fill(&dialog.field("Discount Value"), &form.discount_value)
            .await?;
        if let Some(max_uses) = form.max_uses {
            self.base
                .fill(&dialog.field("Max Uses"), &max_uses.to_string())
                .await?;
        }
        if let Some(valid_until) = &form.valid_until {
            self.base.fill(&dialog.field("Valid Until"), valid_until).await?;
        }
        if let Some(description) = &form.description {
            self.base.fill(&dialog.field("Description"), description).await?;
        }
        Ok(())
    }

    /// Create a promo code through its dialog; returns the finished flow
    pub async fn create_promo_code(&self, form: &PromoCodeForm) -> E2eResult<DialogFlow> {
        let dialog = self.promo_dialog();
        let flow = dialog
            .run(dialog.open_create(), self.fill_promo_form(form), "POST")
            .await?;
        info!("Created promo code {}", form.code);
        Ok(flow)
    }

    /// The promo code's row renders the discount as the list formats it
    pub async fn expect_promo_code_discount(
        &self,
        code: &str,
        discount_type: DiscountType,
        value: &str,
    ) -> E2eResult<()> {
        let expected = format_discount(discount_type, value)?;
        let row = self.promo_code_row(code);
        self.base.expect_visible(&row).await?;
        self.base.expect_text(&row, expected.as_str()).await
    }

    pub async fn toggle_promo_code(&self, code: &str) -> E2eResult<bool> {
        let switch = self.active_switch(code);
        self.base
            .expect_response(
                ResponseMatcher::new("promo_codes").method("PATCH"),
                self.base.timeouts().standard,
                switch.click(),
            )
            .await?;
        switch.is_checked().await
    }

    pub async fn delete_promo_code(&self, code: &str) -> E2eResult<()> {
        let row = self.promo_code_row(code);
        self.base.click(&row_menu_button(&row)).await?;
        self.base.pause(MENU_SETTLE_MS).await;
        self.base.accept_next_dialog().await?;

        let delete = self
            .base
            .by_role_named(AriaRole::Menuitem, TextMatch::regex_ci("^delete"));
        let response = self
            .base
            .expect_response(
                ResponseMatcher::new("promo_codes").method("DELETE"),
                self.base.timeouts().standard,
                delete.click(),
            )
            .await?;
        if !response.is_success() {
            return Err(E2eError::AssertionFailed(format!(
                "deleting promo code {} returned HTTP {}",
                code, response.status
            )));
        }
        row.wait_for(ElementState::Detached, self.base.timeouts().standard)
            .await
    }

    async fn fill_ticket_type_form(&self, form: &TicketTypeForm) -> E2eResult<()> {
        let dialog = self.ticket_type_dialog();
        self.base.fill(&dialog.field("Name"), &form.name).await?;
        self.base.fill(&dialog.field("Price"), &form.price).await?;
        if let Some(capacity) = form.capacity {
            self.base
                .fill(&dialog.field("Capacity"), &capacity.to_string())
                .await?;
        }
        if let Some(description) = &form.description {
            self.base.fill(&dialog.field("Description"), description).await?;
        }
        Ok(())
    }

    pub async fn create_ticket_type(&self, form: &TicketTypeForm) -> E2eResult<DialogFlow> {
        let dialog = self.ticket_type_dialog();
        let flow = dialog
            .run(dialog.open_create(), self.fill_ticket_type_form(form), "POST")
            .await?;
        info!("Created ticket type {}", form.name);
        Ok(flow)
    }

    /// The ticket type is listed with its price as `$xx.xx`
    pub async fn expect_ticket_type(&self, name: &str, price: &str) -> E2eResult<()> {
        let row = self.ticket_type_row(name);
        self.base.expect_visible(&row).await?;
        // prices render like fixed discounts
        let display = format_discount(DiscountType::Fixed, price)?;
        self.base.expect_text(&row, display.as_str()).await
    }
}
