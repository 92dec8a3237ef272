use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, TextMatch};
use crate::error::E2eResult;
use crate::locator::Locator;

/// `/forgot-password` and `/reset-password`
pub struct PasswordResetPage {
    base: BasePage,
}

impl PasswordResetPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn email_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Email"))
    }

    pub fn send_button(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Button, TextMatch::regex_ci("send reset"))
    }

    pub fn new_password_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("New Password"))
    }

    pub fn confirm_password_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Confirm Password"))
    }

    pub fn update_button(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Button, TextMatch::regex_ci("update password"))
    }

    pub fn reset_sent_message(&self) -> Locator {
        self.base
            .by_text(TextMatch::regex_ci("check your email|reset link"))
            .first()
    }

    pub fn mismatch_error(&self) -> Locator {
        self.base
            .by_text(TextMatch::regex_ci("passwords do not match"))
            .first()
    }

    pub fn updated_message(&self) -> Locator {
        self.base
            .by_text(TextMatch::regex_ci("password (has been )?updated"))
            .first()
    }

    pub async fn goto_forgot(&self) -> E2eResult<()> {
        self.base
            .goto(Routes::forgot_password(), GotoOptions::default())
            .await
    }

    pub async fn goto_reset(&self) -> E2eResult<()> {
        self.base
            .goto(Routes::reset_password(), GotoOptions::default())
            .await
    }

    pub async fn request_reset(&self, email: &str) -> E2eResult<()> {
        self.base.fill(&self.email_input(), email).await?;
        self.base.click(&self.send_button()).await
    }

    pub async fn expect_reset_email_sent(&self) -> E2eResult<()> {
        self.base.expect_visible(&self.reset_sent_message()).await
    }

    pub async fn set_new_password(&self, password: &str, confirm: &str) -> E2eResult<()> {
        self.base.fill(&self.new_password_input(), password).await?;
        self.base
            .fill(&self.confirm_password_input(), confirm)
            .await?;
        self.base.click(&self.update_button()).await
    }

    pub async fn expect_password_mismatch(&self) -> E2eResult<()> {
        self.base.expect_visible(&self.mismatch_error()).await
    }

    pub async fn expect_password_updated(&self) -> E2eResult<()> {
        self.base.expect_visible(&self.updated_message()).await
    }
}
