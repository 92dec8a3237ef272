use tracing::info;

use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, LoadState, ResponseMatcher, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::pages::MENU_SETTLE_MS;

/// Fields of the organization settings form; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgSettings {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

pub struct OrganizationsPage {
    base: BasePage,
}

impl OrganizationsPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn name_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Organization Name"))
    }

    pub fn slug_input(&self) -> Locator {
        self.base.by_label(TextMatch::regex_ci("slug"))
    }

    pub fn create_button(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Button,
            TextMatch::regex_ci("^create organization"),
        )
    }

    pub fn org_switcher(&self) -> Locator {
        self.base.by_test_id("org-switcher")
    }

    pub fn save_button(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Button, TextMatch::regex_ci("^save"))
    }

    pub fn slug_taken_error(&self) -> Locator {
        self.base
            .by_text(TextMatch::regex_ci("slug.*(taken|already)"))
            .first()
    }

    pub fn settings_saved_message(&self) -> Locator {
        self.base
            .by_text(TextMatch::regex_ci("settings (saved|updated)"))
            .first()
    }

    pub async fn goto_new(&self) -> E2eResult<()> {
        self.base
            .goto(Routes::new_organization(), GotoOptions::default())
            .await
    }

    /// Submit the new organization form and wait for its dashboard
    pub async fn create_organization(&self, name: &str, slug: &str) -> E2eResult<String> {
        self.base.fill(&self.name_input(), name).await?;
        // the slug auto-fills from the name, replace it
        self.base.clear_and_fill(&self.slug_input(), slug).await?;
        self.base.click(&self.create_button()).await?;
        let url = self
            .base
            .wait_for_url(
                Routes::dashboard(slug).home(),
                self.base.timeouts().long,
            )
            .await?;
        info!("Created organization {} at {}", name, url);
        Ok(url)
    }

    /// Submit the form expecting the slug to be rejected
    pub async fn submit_create(&self, name: &str, slug: &str) -> E2eResult<()> {
        self.base.fill(&self.name_input(), name).await?;
        self.base.clear_and_fill(&self.slug_input(), slug).await?;
        self.base.click(&self.create_button()).await
    }

    pub async fn expect_slug_taken_error(&self) -> E2eResult<()> {
        self.base.expect_visible(&self.slug_taken_error()).await
    }

    pub async fn switch_organization(&self, name: &str) -> E2eResult<()> {
        self.base.click(&self.org_switcher()).await?;
        self.base.pause(MENU_SETTLE_MS).await;
        let item = self
            .base
            .by_role_named(AriaRole::Menuitem, TextMatch::from(name));
        self.base.click(&item).await?;
        self.base.wait_for_load_state(LoadState::Load).await
    }

    pub async fn update_settings(&self, org_id: &str, settings: &OrgSettings) -> E2eResult<()> {
        self.base
            .goto(&Routes::dashboard(org_id).settings(), GotoOptions::network_idle())
            .await?;
        self.base.wait_for_loading_complete().await?;

        let fields = [
            ("Organization Name", &settings.name),
            ("Email", &settings.email),
            ("Phone", &settings.phone),
            ("Website", &settings.website),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                let input = self.base.by_label(TextMatch::exact(label));
                self.base.clear_and_fill(&input, value).await?;
            }
        }

        let save = self.save_button();
        let response = self
            .base
            .expect_response(
                ResponseMatcher::new("organizations").method("PATCH"),
                self.base.timeouts().standard,
                save.click(),
            )
            .await?;
        if !response.is_success() {
            return Err(E2eError::AssertionFailed(format!(
                "saving settings of {} returned HTTP {}",
                org_id, response.status
            )));
        }
        Ok(())
    }

    pub async fn expect_settings_saved(&self) -> E2eResult<()> {
        self.base.expect_visible(&self.settings_saved_message()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockState};
    use haunt_fixtures::Timeouts;
    use std::sync::Arc;
    use std::time::Duration;

    fn page(mock: &Arc<MockDriver>) -> OrganizationsPage {
        OrganizationsPage::new(
            BasePage::new(mock.clone(), "http://localhost:3000")
                .with_timeouts(Timeouts::uniform(Duration::from_secs(2))),
        )
    }

    fn render_new_org_form(mock: &MockDriver, page: &OrganizationsPage) {
        mock.show(page.name_input().selector(), "");
        mock.show(page.slug_input().selector(), "");
        mock.show(page.create_button().selector(), "Create Organization");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_organization_lands_on_dashboard() {
        let mock = Arc::new(MockDriver::new());
        let page = page(&mock);
        render_new_org_form(&mock, &page);
        let slug_input = page.slug_input().selector().clone();
        mock.on_click(page.create_button().selector(), move |s: &mut MockState| {
            let slug = s.value_of(&slug_input).unwrap_or_default();
            s.after(Duration::from_millis(800), move |s| {
                s.set_url(&format!("http://localhost:3000/{}", slug))
            });
        });

        page.goto_new().await.unwrap();
        let url = page
            .create_organization("Fright Farm", "fright-farm-e2e")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/fright-farm-e2e");
        assert!(mock.visits()[0].ends_with(Routes::new_organization()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_slug_is_reported() {
        let mock = Arc::new(MockDriver::new());
        let page = page(&mock);
        render_new_org_form(&mock, &page);
        let error = page.slug_taken_error().selector().clone();
        mock.on_click(page.create_button().selector(), move |s: &mut MockState| {
            s.show(&error, "This slug is already taken")
        });

        page.submit_create("Nightmare Manor", "nightmare-manor")
            .await
            .unwrap();
        page.expect_slug_taken_error().await.unwrap();
        // no redirect, so the full create flow times out
        assert!(page
            .create_organization("Nightmare Manor", "nightmare-manor")
            .await
            .unwrap_err()
            .is_timeout());
    }

    fn render_settings(mock: &MockDriver, page: &OrganizationsPage, status: u16) {
        for label in ["Phone", "Website"] {
            mock.show(page.base.by_label(TextMatch::exact(label)).selector(), "");
        }
        mock.show(page.save_button().selector(), "Save Changes");
        let saved = page.settings_saved_message().selector().clone();
        mock.on_click(page.save_button().selector(), move |s: &mut MockState| {
            s.push_response("http://api/rest/v1/organizations?id=eq.1", "PATCH", status);
            if status < 300 {
                s.show(&saved, "Settings saved");
            }
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_settings_fills_only_given_fields() {
        let mock = Arc::new(MockDriver::new());
        let page = page(&mock);
        render_settings(&mock, &page, 200);
        let settings = OrgSettings {
            website: Some("https://nightmare-manor.test".to_string()),
            ..Default::default()
        };

        page.update_settings("nightmare-manor", &settings).await.unwrap();
        page.expect_settings_saved().await.unwrap();

        let website = page.base.by_label(TextMatch::exact("Website"));
        let phone = page.base.by_label(TextMatch::exact("Phone"));
        assert_eq!(
            mock.with_state(|s| s.value_of(website.selector())).as_deref(),
            Some("https://nightmare-manor.test")
        );
        assert_eq!(mock.with_state(|s| s.value_of(phone.selector())).as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_settings_rejects_failed_save() {
        let mock = Arc::new(MockDriver::new());
        let page = page(&mock);
        render_settings(&mock, &page, 500);
        let settings = OrgSettings {
            phone: Some("555-0100".to_string()),
            ..Default::default()
        };

        match page.update_settings("nightmare-manor", &settings).await {
            Err(E2eError::AssertionFailed(msg)) => assert!(msg.contains("500")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
