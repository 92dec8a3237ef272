use tracing::debug;

use haunt_fixtures::Routes;

use crate::base_page::{BasePage, GotoOptions};
use crate::driver::{AriaRole, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::expect::poll_for;
use crate::locator::Locator;
use crate::pages::{row_with, INPUT_SETTLE_MS, MENU_SETTLE_MS};

/// Outcome banner after scanning a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInResult {
    Success,
    AlreadyCheckedIn,
    Invalid,
}

impl CheckInResult {
    /// Classify banner text. "already checked in" is tested before the
    /// plain success wording it contains.
    pub fn classify(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("already checked in") {
            Some(CheckInResult::AlreadyCheckedIn)
        } else if text.contains("invalid") || text.contains("not found") {
            Some(CheckInResult::Invalid)
        } else if text.contains("checked in") || text.contains("welcome") {
            Some(CheckInResult::Success)
        } else {
            None
        }
    }
}

impl std::str::FromStr for CheckInResult {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "success" => Ok(CheckInResult::Success),
            "already_checked_in" => Ok(CheckInResult::AlreadyCheckedIn),
            "invalid" => Ok(CheckInResult::Invalid),
            other => Err(E2eError::ScenarioParse(format!("unknown check-in result: {}", other))),
        }
    }
}

pub struct CheckInPage {
    base: BasePage,
}

impl CheckInPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn attraction_select(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Combobox, TextMatch::regex_ci("attraction"))
    }

    pub fn scan_input(&self) -> Locator {
        self.base
            .by_placeholder(TextMatch::regex_ci("scan|ticket code"))
    }

    pub fn result_banner(&self) -> Locator {
        self.base.by_test_id("check-in-result")
    }

    pub fn guest_search_input(&self) -> Locator {
        self.base
            .by_placeholder(TextMatch::regex_ci("search guests"))
    }

    pub fn checked_in_counter(&self) -> Locator {
        self.base.by_test_id("checked-in-count")
    }

    pub async fn goto(&self, org_id: &str) -> E2eResult<()> {
        self.base
            .goto(&Routes::dashboard(org_id).check_in(), GotoOptions::network_idle())
            .await?;
        self.base.wait_for_loading_complete().await
    }

    pub async fn select_attraction(&self, name: &str) -> E2eResult<()> {
        self.base.click(&self.attraction_select()).await?;
        self.base.pause(MENU_SETTLE_MS).await;
        let option = self
            .base
            .by_role_named(AriaRole::Option, TextMatch::from(name));
        self.base.click(&option).await
    }

    /// Enter a ticket code the way a handheld scanner does: type, then Enter
    pub async fn scan(&self, code: &str) -> E2eResult<()> {
        let input = self.scan_input();
        self.base.clear_and_fill(&input, code).await?;
        input.press("Enter").await
    }

    pub async fn read_result(&self) -> E2eResult<CheckInResult> {
        let banner = &self.result_banner();
        poll_for(
            "check-in result",
            self.base.timeouts().standard,
            move || async move {
                if !banner.is_visible().await? {
                    return Ok(None);
                }
                let text = banner.text().await?;
                debug!("Check-in banner: {}", text.trim());
                Ok(CheckInResult::classify(&text))
            },
        )
        .await
    }

    pub async fn expect_result(&self, expected: CheckInResult) -> E2eResult<()> {
        let actual = self.read_result().await?;
        if actual != expected {
            return Err(E2eError::AssertionFailed(format!(
                "check-in result {:?}, expected {:?}",
                actual, expected
            )));
        }
        Ok(())
    }

    pub async fn search_guest(&self, query: &str) -> E2eResult<()> {
        self.base
            .clear_and_fill(&self.guest_search_input(), query)
            .await?;
        self.base.pause(INPUT_SETTLE_MS).await;
        Ok(())
    }

    pub async fn check_in_guest(&self, name: &str) -> E2eResult<()> {
        let button = row_with(&self.base, name).locator(&Selector::role_named(
            AriaRole::Button,
            TextMatch::regex_ci("^check in"),
        ));
        self.base.click(&button).await
    }

    pub async fn checked_in_count(&self) -> E2eResult<u32> {
        let text = self.checked_in_counter().text().await?;
        let digits: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().map_err(|_| {
            E2eError::AssertionFailed(format!("no count in {:?}", text.trim()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockState};
    use haunt_fixtures::Timeouts;
    use std::sync::Arc;
    use std::time::Duration;
    use test_case::test_case;

    #[test_case("Checked in successfully!", Some(CheckInResult::Success))]
    #[test_case("Ticket already checked in at 7:42 PM", Some(CheckInResult::AlreadyCheckedIn))]
    #[test_case("Invalid ticket code", Some(CheckInResult::Invalid))]
    #[test_case("Ticket not found", Some(CheckInResult::Invalid))]
    #[test_case("Scanning...", None)]
    fn test_classify(text: &str, expected: Option<CheckInResult>) {
        assert_eq!(CheckInResult::classify(text), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_scan_is_already_checked_in() {
        let mock = Arc::new(MockDriver::new());
        let page = CheckInPage::new(
            BasePage::new(mock.clone(), "http://localhost:3000")
                .with_timeouts(Timeouts::uniform(Duration::from_secs(2))),
        );
        let input = page.scan_input().selector().clone();
        let banner = page.result_banner().selector().clone();
        let counter = page.checked_in_counter().selector().clone();
        mock.show(&input, "");
        mock.show(&counter, "0 checked in");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        mock.on_press(&input, "Enter", {
            let input = input.clone();
            move |s: &mut MockState| {
                let code = s.value_of(&input).unwrap_or_default();
                let mut seen = seen.lock();
                let text = if !code.starts_with("TKT-") {
                    "Invalid ticket code".to_string()
                } else if seen.contains(&code) {
                    "Already checked in".to_string()
                } else {
                    seen.push(code);
                    s.set_text(&counter, &format!("{} checked in", seen.len()));
                    "Checked in successfully".to_string()
                };
                s.show(&banner, &text);
            }
        });

        page.scan("TKT-0001").await.unwrap();
        page.expect_result(CheckInResult::Success).await.unwrap();
        page.scan("TKT-0001").await.unwrap();
        page.expect_result(CheckInResult::AlreadyCheckedIn).await.unwrap();
        page.scan("BOGUS").await.unwrap();
        page.expect_result(CheckInResult::Invalid).await.unwrap();
        assert_eq!(page.checked_in_count().await.unwrap(), 1);
    }
}
