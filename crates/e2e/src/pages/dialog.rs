use std::future::Future;
use tracing::{debug, info};

use crate::base_page::BasePage;
use crate::driver::{AriaRole, ResponseInfo, ResponseMatcher, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::flows::DialogFlow;
use crate::locator::{find_first_visible, ElementState, Locator};

/// Modal create/edit dialog backed by one REST resource
pub(crate) struct CrudDialog<'a> {
    base: &'a BasePage,
    /// Human name used on buttons, e.g. "promo code"
    noun: &'static str,
    /// URL fragment of the resource the dialog writes to
    resource: &'static str,
}

impl<'a> CrudDialog<'a> {
    pub fn new(base: &'a BasePage, noun: &'static str, resource: &'static str) -> Self {
        Self {
            base,
            noun,
            resource,
        }
    }

    pub fn dialog(&self) -> Locator {
        self.base.by_role(AriaRole::Dialog)
    }

    /// Form control inside the dialog with exactly this label
    pub fn field(&self, label: &str) -> Locator {
        self.dialog().locator(&Selector::label(TextMatch::exact(label)))
    }

    pub fn add_button(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Button,
            TextMatch::regex_ci(format!("^(add|new) {}", self.noun)),
        )
    }

    /// Empty-state button shown instead of "Add" when the list is empty
    pub fn create_first_button(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Button,
            TextMatch::regex_ci(format!("create (your )?first {}", self.noun)),
        )
    }

    pub fn save_button(&self) -> Locator {
        self.dialog().locator(&Selector::role_named(
            AriaRole::Button,
            TextMatch::regex_ci("^(save|create|update)"),
        ))
    }

    /// Open the create dialog through "Add ..." or the empty-state button
    pub async fn open_create(&self) -> E2eResult<()> {
        let candidates = [self.add_button(), self.create_first_button()];
        let button = find_first_visible(&candidates, self.base.timeouts().fast)
            .await
            .ok_or_else(|| {
                E2eError::ElementNotFound(format!("button to create a {}", self.noun))
            })?;
        button.click().await?;
        self.wait_open().await
    }

    pub async fn wait_open(&self) -> E2eResult<()> {
        self.dialog()
            .wait_for(ElementState::Visible, self.base.timeouts().fast)
            .await
    }

    /// Click save, then wait for the write, the dialog closing and the
    /// network settling
    pub async fn save(&self, method: &str) -> E2eResult<ResponseInfo> {
        let save = self.save_button();
        let response = self
            .base
            .expect_response(
                ResponseMatcher::new(self.resource).method(method),
                self.base.timeouts().long,
                save.click(),
            )
            .await?;
        if !response.is_success() {
            return Err(E2eError::AssertionFailed(format!(
                "saving {} returned HTTP {}",
                self.noun, response.status
            )));
        }
        self.dialog()
            .wait_for(ElementState::Hidden, self.base.timeouts().standard)
            .await?;
        self.base.wait_for_network_idle().await?;
        Ok(response)
    }

    /// Drive one dialog round trip through its state machine.
    ///
    /// `open` and `fill` are not polled until their turn comes.
    pub async fn run<O, F>(&self, open: O, fill: F, method: &str) -> E2eResult<DialogFlow>
    where
        O: Future<Output = E2eResult<()>>,
        F: Future<Output = E2eResult<()>>,
    {
        let mut flow = DialogFlow::new(self.noun);
        open.await?;
        flow.open()?;

        if let Err(e) = fill.await {
            return Err(flow.fail_with(e));
        }
        flow.submit()?;

        match self.save(method).await {
            Ok(response) => debug!("{} saved with HTTP {}", self.noun, response.status),
            Err(e) => return Err(flow.fail_with(e)),
        }
        flow.complete()?;
        info!("{} dialog: {}", self.noun, flow.trace());
        Ok(flow)
    }
}
