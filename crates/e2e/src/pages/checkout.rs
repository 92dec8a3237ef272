//! Storefront checkout form and the hosted Stripe payment page
//!
//! The payment page is third-party markup that changes between Stripe
//! releases, so every card field is found through an ordered list of
//! candidate selectors. The first visible candidate wins.

use std::time::Duration;
use tracing::{debug, info, warn};

use haunt_fixtures::{CardOutcome, TestCard};

use crate::base_page::{BasePage, UrlPattern};
use crate::driver::{AriaRole, TextMatch};
use crate::error::{E2eError, E2eResult};
use crate::locator::{find_first_visible, Locator};

/// How long each candidate selector gets before the next one is tried
const CANDIDATE_PROBE: Duration = Duration::from_millis(1500);

const CARD_NUMBER: &[&str] = &[
    "#cardNumber",
    r#"input[name="cardNumber"]"#,
    r#"input[autocomplete="cc-number"]"#,
    r#"input[placeholder*="1234"]"#,
];
const CARD_EXPIRY: &[&str] = &[
    "#cardExpiry",
    r#"input[name="cardExpiry"]"#,
    r#"input[autocomplete="cc-exp"]"#,
    r#"input[placeholder*="MM"]"#,
];
const CARD_CVC: &[&str] = &[
    "#cardCvc",
    r#"input[name="cardCvc"]"#,
    r#"input[autocomplete="cc-csc"]"#,
    r#"input[placeholder*="CVC"]"#,
];
const BILLING_NAME: &[&str] = &["#billingName", r#"input[name="billingName"]"#];
const POSTAL_CODE: &[&str] = &[
    "#billingPostalCode",
    r#"input[name="billingPostalCode"]"#,
    r#"input[autocomplete="postal-code"]"#,
];
const PAY_BUTTON: &[&str] = &[
    ".SubmitButton",
    r#"button[data-testid="hosted-payment-submit-button"]"#,
    r#"button[type="submit"]"#,
];
const PAYMENT_ERROR: &[&str] = &[".FieldError", r#"[role="alert"]"#, ".Notice--error"];
const AUTH_CHALLENGE: &[&str] = &[
    r#"iframe[name^="__privateStripeFrame"]"#,
    r#"iframe[src*="three-ds"]"#,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl Customer {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Redirected back to the success page
    Paid { session_id: String },
    /// Stripe kept us on the payment page with an error
    Declined { message: String },
    /// Stripe opened a 3-D Secure challenge
    RequiresAction,
}

pub struct CheckoutPage {
    base: BasePage,
}

impl CheckoutPage {
    pub fn new(base: BasePage) -> Self {
        Self { base }
    }

    pub fn name_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Full Name"))
    }

    pub fn email_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Email"))
    }

    pub fn phone_input(&self) -> Locator {
        self.base.by_label(TextMatch::exact("Phone"))
    }

    pub fn terms_checkbox(&self) -> Locator {
        self.base
            .by_role_named(AriaRole::Checkbox, TextMatch::regex_ci("terms"))
    }

    pub fn continue_button(&self) -> Locator {
        self.base.by_role_named(
            AriaRole::Button,
            TextMatch::regex_ci("continue to payment|proceed to payment"),
        )
    }

    fn candidates(&self, selectors: &[&str]) -> Vec<Locator> {
        selectors.iter().map(|css| self.base.locator(css)).collect()
    }

    pub fn card_number_candidates(&self) -> Vec<Locator> {
        self.candidates(CARD_NUMBER)
    }

    pub fn card_expiry_candidates(&self) -> Vec<Locator> {
        self.candidates(CARD_EXPIRY)
    }

    pub fn card_cvc_candidates(&self) -> Vec<Locator> {
        self.candidates(CARD_CVC)
    }

    pub fn billing_name_candidates(&self) -> Vec<Locator> {
        self.candidates(BILLING_NAME)
    }

    pub fn postal_code_candidates(&self) -> Vec<Locator> {
        self.candidates(POSTAL_CODE)
    }

    pub fn pay_button_candidates(&self) -> Vec<Locator> {
        self.candidates(PAY_BUTTON)
    }

    pub fn payment_error_candidates(&self) -> Vec<Locator> {
        self.candidates(PAYMENT_ERROR)
    }

    pub async fn fill_customer_info(&self, customer: &Customer) -> E2eResult<()> {
        self.base.fill(&self.name_input(), &customer.name).await?;
        self.base.fill(&self.email_input(), &customer.email).await?;
        if let Some(phone) = &customer.phone {
            self.base.fill(&self.phone_input(), phone).await?;
        }
        Ok(())
    }

    pub async fn accept_terms(&self) -> E2eResult<()> {
        self.base.check(&self.terms_checkbox()).await
    }

    pub async fn continue_to_payment(&self) -> E2eResult<()> {
        self.base.click(&self.continue_button()).await
    }

    pub async fn wait_for_payment_page(&self) -> E2eResult<String> {
        self.base
            .wait_for_url(
                UrlPattern::regex(r"^https://checkout\.stripe\.com/")?,
                self.base.timeouts().long,
            )
            .await
    }

    async fn required_field(&self, field: &str, candidates: Vec<Locator>) -> E2eResult<Locator> {
        find_first_visible(&candidates, CANDIDATE_PROBE)
            .await
            .ok_or_else(|| E2eError::ElementNotFound(format!("payment {} field", field)))
    }

    async fn fill_optional(&self, field: &str, candidates: Vec<Locator>, value: &str) -> E2eResult<()> {
        match find_first_visible(&candidates, CANDIDATE_PROBE).await {
            Some(input) => input.fill(value).await,
            None => {
                debug!("No payment {} field shown", field);
                Ok(())
            }
        }
    }

    /// Fill the card on the hosted payment page
    pub async fn fill_card(&self, card: &TestCard, cardholder: &str) -> E2eResult<()> {
        self.required_field("card number", self.card_number_candidates())
            .await?
            .fill(card.number)
            .await?;
        self.required_field("expiry", self.card_expiry_candidates())
            .await?
            .fill(card.expiry)
            .await?;
        self.required_field("CVC", self.card_cvc_candidates())
            .await?
            .fill(card.cvc)
            .await?;
        self.fill_optional("cardholder name", self.billing_name_candidates(), cardholder)
            .await?;
        self.fill_optional("postal code", self.postal_code_candidates(), card.postal_code)
            .await
    }

    pub async fn submit_payment(&self) -> E2eResult<()> {
        self.required_field("pay button", self.pay_button_candidates())
            .await?
            .click()
            .await
    }

    /// Wait for the redirect back to the success page; returns the session id
    pub async fn wait_for_success(&self) -> E2eResult<String> {
        let url = self
            .base
            .wait_for_url(
                UrlPattern::glob("**/checkout/success?session_id=*"),
                self.base.timeouts().very_long,
            )
            .await?;
        session_id_from(&url)
    }

    async fn wait_for_decline(&self) -> E2eResult<String> {
        let candidates = self.payment_error_candidates();
        let probe = self.base.timeouts().long / candidates.len().max(1) as u32;
        match find_first_visible(&candidates, probe).await {
            Some(error) => Ok(error.text().await?.trim().to_string()),
            None => Err(E2eError::AssertionFailed(
                "declined card showed no payment error".to_string(),
            )),
        }
    }

    /// Run the whole purchase from customer details to the payment result
    pub async fn complete_purchase(
        &self,
        customer: &Customer,
        card: &TestCard,
    ) -> E2eResult<CheckoutOutcome> {
        self.fill_customer_info(customer).await?;
        self.accept_terms().await?;
        self.continue_to_payment().await?;
        self.wait_for_payment_page().await?;
        self.fill_card(card, &customer.name).await?;
        self.submit_payment().await?;

        let outcome = match card.outcome {
            CardOutcome::Succeeds => CheckoutOutcome::Paid {
                session_id: self.wait_for_success().await?,
            },
            CardOutcome::Declined | CardOutcome::InsufficientFunds => CheckoutOutcome::Declined {
                message: self.wait_for_decline().await?,
            },
            CardOutcome::RequiresAuthentication => {
                let frames = self.candidates(AUTH_CHALLENGE);
                if find_first_visible(&frames, self.base.timeouts().fast).await.is_none() {
                    warn!("Card {} did not trigger an authentication challenge", card.number);
                }
                CheckoutOutcome::RequiresAction
            }
        };
        info!("Checkout finished: {:?}", outcome);
        Ok(outcome)
    }
}

fn session_id_from(url: &str) -> E2eResult<String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| E2eError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "session_id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| E2eError::InvalidUrl {
            url: url.to_string(),
            reason: "missing session_id".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Selector;
    use crate::mock::{MockDriver, MockState};
    use haunt_fixtures::Timeouts;
    use std::sync::Arc;

    #[test]
    fn test_session_id_from() {
        assert_eq!(
            session_id_from("http://h/s/nightmare-manor/checkout/success?session_id=cs_test_a1").unwrap(),
            "cs_test_a1"
        );
        assert!(session_id_from("http://h/s/x/checkout/success?session_id=").is_err());
        assert!(session_id_from("http://h/s/x/checkout/success").is_err());
    }

    fn checkout(mock: &Arc<MockDriver>) -> CheckoutPage {
        CheckoutPage::new(
            BasePage::new(mock.clone(), "http://localhost:3000")
                .with_timeouts(Timeouts::uniform(Duration::from_secs(10))),
        )
    }

    fn render_customer_form(mock: &Arc<MockDriver>, page: &CheckoutPage) {
        for input in [page.name_input(), page.email_input(), page.terms_checkbox()] {
            mock.show(input.selector(), "");
        }
        mock.show(page.continue_button().selector(), "Continue to payment");
        mock.on_click(page.continue_button().selector(), |s: &mut MockState| {
            s.set_url("https://checkout.stripe.com/c/pay/cs_test_a1");
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_card_uses_first_visible_candidate() {
        let mock = Arc::new(MockDriver::new());
        let page = checkout(&mock);
        // current Stripe markup only exposes the autocomplete attributes
        let number = Selector::css(CARD_NUMBER[2]);
        let expiry = Selector::css(CARD_EXPIRY[0]);
        let cvc = Selector::css(CARD_CVC[1]);
        for sel in [&number, &expiry, &cvc] {
            mock.show(sel, "");
        }

        page.fill_card(&TestCard::SUCCESS, "Test Buyer").await.unwrap();
        mock.with_state(|s| {
            assert_eq!(s.value_of(&number).as_deref(), Some("4242424242424242"));
            assert_eq!(s.value_of(&expiry).as_deref(), Some("12/34"));
            assert_eq!(s.value_of(&cvc).as_deref(), Some("123"));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_card_without_card_field_fails() {
        let mock = Arc::new(MockDriver::new());
        let err = checkout(&mock)
            .fill_card(&TestCard::SUCCESS, "Test Buyer")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::ElementNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_purchase_returns_session_id() {
        let mock = Arc::new(MockDriver::new());
        let page = checkout(&mock);
        render_customer_form(&mock, &page);
        for css in [CARD_NUMBER[0], CARD_EXPIRY[0], CARD_CVC[0], PAY_BUTTON[0]] {
            mock.show(&Selector::css(css), "");
        }
        mock.on_click(&Selector::css(PAY_BUTTON[0]), |s: &mut MockState| {
            s.after(Duration::from_secs(3), |s| {
                s.set_url("http://localhost:3000/s/nightmare-manor/checkout/success?session_id=cs_test_a1")
            });
        });

        let outcome = page
            .complete_purchase(
                &Customer::new("Test Buyer", "buyer@example.com"),
                &TestCard::SUCCESS,
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CheckoutOutcome::Paid {
                session_id: "cs_test_a1".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_card_reports_message() {
        let mock = Arc::new(MockDriver::new());
        let page = checkout(&mock);
        render_customer_form(&mock, &page);
        for css in [CARD_NUMBER[0], CARD_EXPIRY[0], CARD_CVC[0], PAY_BUTTON[0]] {
            mock.show(&Selector::css(css), "");
        }
        mock.on_click(&Selector::css(PAY_BUTTON[0]), |s: &mut MockState| {
            s.show(&Selector::css(PAYMENT_ERROR[0]), " Your card was declined. ");
        });

        let outcome = page
            .complete_purchase(
                &Customer::new("Test Buyer", "buyer@example.com"),
                &TestCard::DECLINED,
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CheckoutOutcome::Declined {
                message: "Your card was declined.".to_string()
            }
        );
    }
}
