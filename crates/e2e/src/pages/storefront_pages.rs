use tracing::info;

use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, ResponseMatcher, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::flows::DialogFlow;
use crate::locator::{ElementState, Locator};
use crate::pages::dialog::CrudDialog;
use crate::pages::{row_menu_button, row_with, MENU_SETTLE_MS};

/// Content of a custom storefront page; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageForm {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
}

impl PageForm {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }
}

/// Custom pages shown on the public storefront, `/{org}/storefront/pages`
pub struct StorefrontPagesPage {
    base: BasePage,
}

impl StorefrontPagesPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub(crate) fn page_dialog(&self) -> CrudDialog<'_> {
        CrudDialog::new(&self.base, "page", "storefront_pages")
    }

    pub fn page_row(&self, title: &str) -> Locator {
        row_with(&self.base, title)
    }

    pub fn published_switch(&self, title: &str) -> Locator {
        self.page_row(title)
            .locator(&Selector::role(AriaRole::Switch))
    }

    pub async fn goto(&self, org_id: &str) -> E2eResult<()> {
        self.base
            .goto(
                &Routes::dashboard(org_id).storefront_pages(),
                GotoOptions::network_idle(),
            )
            .await?;
        self.base.wait_for_loading_complete().await
    }

    async fn fill_page_form(&self, form: &PageForm) -> E2eResult<()> {
        let dialog = self.page_dialog();
        let text_fields = [
            ("Title", &form.title),
            ("Slug", &form.slug),
            ("Content", &form.content),
        ];
        for (label, value) in text_fields {
            if let Some(value) = value {
                self.base.clear_and_fill(&dialog.field(label), value).await?;
            }
        }
        if let Some(published) = form.published {
            let toggle = dialog.dialog().locator(&Selector::role_named(
                AriaRole::Switch,
                TextMatch::regex_ci("publish"),
            ));
            if toggle.is_checked().await? != published {
                self.base.click(&toggle).await?;
            }
        }
        Ok(())
    }

    pub async fn create_page(&self, form: &PageForm) -> E2eResult<DialogFlow> {
        if form.title.is_none() {
            return Err(E2eError::AssertionFailed("a new page needs a title".to_string()));
        }
        let dialog = self.page_dialog();
        let flow = dialog
            .run(dialog.open_create(), self.fill_page_form(form), "POST")
            .await?;
        info!("Created storefront page {:?}", form.title);
        Ok(flow)
    }

    async fn open_edit(&self, title: &str) -> E2eResult<()> {
        let edit = self.page_row(title).locator(&Selector::role_named(
            AriaRole::Button,
            TextMatch::regex_ci("^edit"),
        ));
        self.base.click(&edit).await?;
        self.page_dialog().wait_open().await
    }

    pub async fn edit_page(&self, title: &str, form: &PageForm) -> E2eResult<DialogFlow> {
        let dialog = self.page_dialog();
        dialog
            .run(self.open_edit(title), self.fill_page_form(form), "PATCH")
            .await
    }

    pub async fn set_published(&self, title: &str, published: bool) -> E2eResult<()> {
        let switch = self.published_switch(title);
        if switch.is_checked().await? == published {
            return Ok(());
        }
        self.base
            .expect_response(
                ResponseMatcher::new("storefront_pages").method("PATCH"),
                self.base.timeouts().standard,
                switch.click(),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_page(&self, title: &str) -> E2eResult<()> {
        let row = self.page_row(title);
        self.base.click(&row_menu_button(&row)).await?;
        self.base.pause(MENU_SETTLE_MS).await;
        self.base.accept_next_dialog().await?;
        let delete = self
            .base
            .by_role_named(AriaRole::Menuitem, TextMatch::regex_ci("^delete"));
        self.base
            .expect_response(
                ResponseMatcher::new("storefront_pages").method("DELETE"),
                self.base.timeouts().standard,
                delete.click(),
            )
            .await?;
        row.wait_for(ElementState::Detached, self.base.timeouts().standard)
            .await
    }

    pub async fn expect_page_listed(&self, title: &str, published: bool) -> E2eResult<()> {
        let row = self.page_row(title);
        self.base.expect_visible(&row).await?;
        let badge = if published { "Published" } else { "Draft" };
        self.base.expect_text(&row, badge).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockState};
    use haunt_fixtures::Timeouts;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_create_then_publish() {
        let mock = Arc::new(MockDriver::new());
        let page = StorefrontPagesPage::new(
            BasePage::new(mock.clone(), "http://localhost:3000")
                .with_timeouts(Timeouts::uniform(Duration::from_secs(2))),
        );
        let dialog = page.page_dialog();
        let dialog_sel = dialog.dialog().selector().clone();
        mock.show(dialog.add_button().selector(), "Add Page");
        mock.on_click(dialog.add_button().selector(), {
            let dialog_sel = dialog_sel.clone();
            move |s: &mut MockState| s.show(&dialog_sel, "")
        });
        mock.show(dialog.field("Title").selector(), "");
        mock.show(dialog.save_button().selector(), "Create");
        let row = page.page_row("FAQ").selector().clone();
        let switch = page.published_switch("FAQ").selector().clone();
        mock.on_click(dialog.save_button().selector(), {
            let row = row.clone();
            let switch = switch.clone();
            move |s: &mut MockState| {
                s.push_response("http://api/rest/v1/storefront_pages", "POST", 201);
                s.hide(&dialog_sel);
                s.show(&row, "FAQ /faq Draft");
                s.show(&switch, "");
            }
        });
        mock.on_click(&switch, move |s: &mut MockState| {
            s.push_response("http://api/rest/v1/storefront_pages?id=eq.1", "PATCH", 204);
            s.set_text(&row, "FAQ /faq Published");
        });

        page.create_page(&PageForm::new("FAQ")).await.unwrap();
        page.expect_page_listed("FAQ", false).await.unwrap();
        page.set_published("FAQ", true).await.unwrap();
        page.expect_page_listed("FAQ", true).await.unwrap();
    }
}
