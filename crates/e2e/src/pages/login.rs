use tracing::info;

use haunt_fixtures::{Role, Routes, TestUser};

use crate::base_page::{BasePage, GotoOptions, UrlPattern};
use crate::driver::{AriaRole, LoadState, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

pub struct LoginPage {
    base: BasePage,
}

impl LoginPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BasePage {
        &self.base
    }

    pub fn email_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Email"))
    }

    pub fn password_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Password"))
    }

    pub fn submit_button(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Button, TextMatch::regex_ci("^sign in"))
    }

    pub fn error_alert(&self) -> Locator {
        self.base.by_role(AriaRole::Alert).first()
    }

    pub fn forgot_password_link(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Link, TextMatch::regex_ci("forgot"))
    }

    pub async fn goto(&self) -> E2eResult<()> {
        self.base.goto(Routes::login(), GotoOptions::default()).await
    }

    /// Submit the form; does not wait for the outcome
    pub async fn login(&self, email: &str, password: &str) -> E2eResult<()> {
        self.base.fill(&self.email_input(), email).await?;
        self.base.fill(&self.password_input(), password).await?;
        self.base.click(&self.submit_button()).await
    }

    /// Log in as a seed user and wait for the role's landing page.
    ///
    /// Platform users land on `/admin`, everyone else on `/{org_slug}`.
    /// Returns the URL the browser ended on.
    pub async fn login_as(&self, user: &TestUser) -> E2eResult<String> {
        self.goto().await?;
        self.login(user.email, user.password).await?;

        let landing: UrlPattern = match (user.role, user.org_slug) {
            (Role::SuperAdmin, _) | (_, None) => UrlPattern::Exact(Routes::admin().to_string()),
            (_, Some(slug)) => UrlPattern::glob(format!("**/{}", slug)),
        };
        let url = self
            .base
            .wait_for_url(landing, self.base.timeouts().long)
            .await?;
        self.base.wait_for_load_state(LoadState::Load).await?;
        info!("Logged in as {} ({})", user.email, user.role);
        Ok(url)
    }

    /// The login was rejected: still on `/login` with an alert matching
    /// `message`
    pub async fn expect_login_error(&self, message: impl Into<TextMatch>) -> E2eResult<()> {
        self.base.expect_text(&self.error_alert(), message).await?;
        let path = self.base.current_path().await?;
        if !path.starts_with(Routes::login()) {
            return Err(E2eError::AssertionFailed(format!(
                "expected to stay on {}, now at {}",
                Routes::login(),
                path
            )));
        }
        Ok(())
    }

    pub async fn open_forgot_password(&self) -> E2eResult<()> {
        self.base.click(&self.forgot_password_link()).await?;
        self.base
            .wait_for_url(Routes::forgot_password(), self.base.timeouts().standard)
            .await
            .map(|_| ())
    }
}
