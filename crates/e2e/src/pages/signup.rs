use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, TextMatch};
use crate::error::E2eResult;
use crate::locator::Locator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    /// Defaults to `password` when not set
    pub confirm_password: Option<String>,
}

impl SignupForm {
    pub fn new(full_name: &str, email: &str, password: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: None,
        }
    }
}

pub struct SignupPage {
    base: BasePage,
}

impl SignupPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn full_name_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Full Name"))
    }

    pub fn email_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Email"))
    }

    pub fn password_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Password"))
    }

    pub fn confirm_password_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Confirm Password"))
    }

    pub fn submit_button(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Button,
            TextMatch::regex_ci("^(create account|sign up)"),
        )
    }

    pub fn error_alert(&self) -> Locator {
        self.base.by_role(AriaRole::Alert).first()
    }

    pub async fn goto(&self) -> E2eResult<()> {
        self.base.goto(Routes::signup(), GotoOptions::default()).await
    }

    pub async fn signup(&self, form: &SignupForm) -> E2eResult<()> {
        self.base.fill(&self.full_name_input(), &form.full_name).await?;
        self.base.fill(&self.email_input(), &form.email).await?;
        self.base.fill(&self.password_input(), &form.password).await?;
        let confirm = form.confirm_password.as_deref().unwrap_or(&form.password);
        if self
            .confirm_password_input()
            .probe_visible(self.base.timeouts().fast)
            .await
        {
            self.base.fill(&self.confirm_password_input(), confirm).await?;
        }
        self.base.click(&self.submit_button()).await
    }

    pub async fn expect_duplicate_email_error(&self) -> E2eResult<()> {
        self.base
            .expect_text(
                &self.error_alert(),
                TextMatch::regex_ci("already (registered|exists|in use)"),
            )
            .await
    }

    /// Inline validation message under a field
    pub async fn expect_field_error(&self, message: impl Into<TextMatch>) -> E2eResult<()> {
        self.base
            .expect_visible(&self.base.by_text(message).first())
            .await
    }

    pub async fn expect_verification_prompt(&self) -> E2eResult<()> {
        self.base
            .expect_visible(
                &self
                    .base
                    .by_text(TextMatch::regex_ci("check your email|verify your email"))
                    .first(),
            )
            .await
    }
}
