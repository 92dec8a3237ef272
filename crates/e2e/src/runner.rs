//! Scenario runner: one browser session per scenario, steps run in order

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use haunt_fixtures::{
    generate_unique_code, user_for_role, Area, CreatedFixture, DiscountType, FixtureFactory,
    FixtureKind, OrderStatus, Role, TestCard,
};

use crate::base_page::{BasePage, GotoOptions, UrlPattern};
use crate::config::HarnessConfig;
use crate::driver::{Driver, SessionFactory};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::pages::{
    probe_access, Access, CheckInPage, CheckInResult, CheckoutOutcome, CheckoutPage,
    CheckoutSuccessPage, Customer, LoginPage, OrdersPage, OrgSettings, OrganizationsPage,
    PageForm, PasswordResetPage, PromoCodeForm, SignupForm, SignupPage, StorefrontPage,
    StorefrontPagesPage, TicketTypeForm, TicketingPage,
};
use crate::scenario::{Scenario, Step, Target};
use crate::screenshots::ScreenshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub action: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotResult {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_image_path: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    /// Failure message or skip reason
    pub reason: Option<String>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub screenshots: Vec<ScreenshotResult>,
    /// Fixtures the scenario created, newest first
    pub created: Vec<CreatedFixture>,
}

impl ScenarioResult {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Outcome::Passed,
            reason: None,
            duration_ms: 0,
            steps: Vec::new(),
            screenshots: Vec::new(),
            created: Vec::new(),
        }
    }

    fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.outcome = Outcome::Skipped;
        self.reason = Some(reason.into());
        self
    }

    fn failed(mut self, err: &E2eError) -> Self {
        self.outcome = Outcome::Failed;
        self.reason = Some(err.to_string());
        self
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

pub struct TestRunner {
    config: HarnessConfig,
    sessions: Arc<dyn SessionFactory>,
    screenshots: ScreenshotStore,
}

impl TestRunner {
    pub fn new(config: HarnessConfig, sessions: Arc<dyn SessionFactory>) -> E2eResult<Self> {
        let screenshots = ScreenshotStore::new(config.screenshots())?;
        Ok(Self {
            config,
            sessions,
            screenshots,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn load(&self) -> E2eResult<Vec<Scenario>> {
        Scenario::load_all(&self.config.scenarios_dir)
    }

    /// Run every scenario in the scenarios directory
    pub async fn run_all(&self) -> E2eResult<SuiteResult> {
        let scenarios = self.load()?;
        Ok(self.run_scenarios(scenarios.iter()).await)
    }

    pub async fn run_tagged(&self, tag: &str) -> E2eResult<SuiteResult> {
        let scenarios = self.load()?;
        Ok(self
            .run_scenarios(Scenario::filter_by_tag(&scenarios, tag).into_iter())
            .await)
    }

    /// Run scenarios whose name contains `needle`
    pub async fn run_matching(&self, needle: &str) -> E2eResult<SuiteResult> {
        let scenarios = self.load()?;
        let selected = Scenario::filter_by_name(&scenarios, needle);
        if selected.is_empty() {
            return Err(E2eError::ScenarioParse(format!("No scenario matches '{}'", needle)));
        }
        Ok(self.run_scenarios(selected.into_iter()).await)
    }

    pub async fn run_scenarios<'a>(
        &self,
        scenarios: impl Iterator<Item = &'a Scenario>,
    ) -> SuiteResult {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        for scenario in scenarios {
            let result = self.run_scenario(scenario).await;
            match result.outcome {
                Outcome::Passed => info!("PASS {} ({}ms)", result.name, result.duration_ms),
                Outcome::Skipped => info!(
                    "SKIP {}: {}",
                    result.name,
                    result.reason.as_deref().unwrap_or("")
                ),
                Outcome::Failed => error!(
                    "FAIL {}: {}",
                    result.name,
                    result.reason.as_deref().unwrap_or("")
                ),
            }
            results.push(result);
        }

        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let suite = SuiteResult {
            started_at,
            total: results.len(),
            passed: count(Outcome::Passed),
            failed: count(Outcome::Failed),
            skipped: count(Outcome::Skipped),
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        };

        info!(
            "{} scenarios: {} passed, {} failed, {} skipped in {}ms",
            suite.total, suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );
        suite
    }

    /// Run one scenario in a fresh session. Never retried: the first
    /// failing step ends it.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        let result = ScenarioResult::new(&scenario.name);
        info!("Running scenario: {}", scenario.name);

        let missing = scenario.missing_flags(&self.config.flags);
        if !missing.is_empty() {
            return result.skipped(format!("feature disabled: {}", missing.join(", ")));
        }

        if let Some(gap) = &scenario.known_gap {
            match gap.parse() {
                Ok((role, area)) if role.is_known_gap(area) => {
                    return result.skipped(format!(
                        "known RBAC gap: {} can reach {}",
                        role,
                        area.as_str()
                    ));
                }
                Ok(_) => debug!("{}: declared gap is no longer known, running", scenario.name),
                Err(e) => return result.failed(&e),
            }
        }

        let driver = match self.sessions.open().await {
            Ok(driver) => driver,
            Err(e) => return result.failed(&e),
        };

        let mut result = self.drive(scenario, driver.clone(), result).await;

        if let Err(e) = driver.close().await {
            warn!("Failed to close session for {}: {}", scenario.name, e);
        }
        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn drive(
        &self,
        scenario: &Scenario,
        driver: Arc<dyn Driver>,
        mut result: ScenarioResult,
    ) -> ScenarioResult {
        let base = BasePage::new(driver, self.config.base_url.as_str())
            .with_timeouts(self.config.timeouts)
            .with_screenshot_dir(self.config.screenshot_dir.clone());
        let visual = scenario.visual_regression.then_some(&self.screenshots);
        let mut ctx = ScenarioContext::new(base, &scenario.name, visual);

        let run = ctx.run(scenario, &mut result.steps).await;

        result.created = ctx.teardown().await;
        result.screenshots = std::mem::take(&mut ctx.screenshots);

        match run {
            Ok(()) => result,
            Err(E2eError::Skipped(reason)) => result.skipped(reason),
            Err(e) => result.failed(&e),
        }
    }

    /// Adopt every screenshot currently on disk as the new baseline
    pub fn update_baselines(&self) -> E2eResult<usize> {
        let mut updated = 0;
        for entry in std::fs::read_dir(self.screenshots.screenshot_dir())? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    self.screenshots.update_baseline(&name.to_string_lossy())?;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    /// Write results as `{output_dir}/test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;
        info!("Results written to {}", path.display());
        Ok(path)
    }
}

/// Mutable state of one scenario run
struct ScenarioContext<'a> {
    base: BasePage,
    factory: FixtureFactory,
    vars: HashMap<String, String>,
    role: Option<Role>,
    /// Organization each created fixture lives in, by key
    owners: HashMap<String, String>,
    visual: Option<&'a ScreenshotStore>,
    screenshots: Vec<ScreenshotResult>,
}

impl<'a> ScenarioContext<'a> {
    fn new(base: BasePage, name: &str, visual: Option<&'a ScreenshotStore>) -> Self {
        let factory = FixtureFactory::new(name);
        let vars = [
            ("base_url".to_string(), base.base_url().to_string()),
            ("scope".to_string(), factory.scope().to_string()),
        ]
        .into_iter()
        .collect();
        Self {
            base,
            factory,
            vars,
            role: None,
            owners: HashMap::new(),
            visual,
            screenshots: Vec::new(),
        }
    }

    async fn run(&mut self, scenario: &Scenario, steps: &mut Vec<StepResult>) -> E2eResult<()> {
        if let Some(role) = scenario.login_role()? {
            self.login(role).await?;
        }

        for (index, step) in scenario.steps.iter().enumerate() {
            let started = Instant::now();
            let outcome = match step.interpolate(&self.vars) {
                Ok(step) => self.execute(&step).await,
                Err(e) => Err(e),
            };
            steps.push(StepResult {
                index: index + 1,
                action: step.action().to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                error: outcome.as_ref().err().map(|e| e.to_string()),
            });

            match outcome {
                Ok(()) => {}
                Err(e @ E2eError::Skipped(_)) => return Err(e),
                Err(e) => {
                    return Err(E2eError::StepFailed {
                        step: format!("{} ({})", index + 1, step.action()),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn login(&mut self, role: Role) -> E2eResult<()> {
        let user = user_for_role(role)?;
        LoginPage::new(self.base.clone()).login_as(user).await?;
        self.role = Some(role);
        if let Some(slug) = user.org_slug {
            self.vars.insert("org".to_string(), slug.to_string());
        }
        Ok(())
    }

    fn locate(&self, target: &Target) -> E2eResult<Locator> {
        Ok(Locator::new(
            self.base.driver().clone(),
            target.selector()?,
            self.base.timeouts().standard,
        ))
    }

    async fn execute(&mut self, step: &Step) -> E2eResult<()> {
        debug!("Step: {}", step.action());
        match step {
            Step::Goto { path, network_idle } => {
                let options = if *network_idle {
                    GotoOptions::network_idle()
                } else {
                    GotoOptions::default()
                };
                self.base.goto(path, options).await
            }

            Step::Login { role } => self.login(role.parse()?).await,

            Step::ExpectUrl { pattern, timeout_ms } => {
                let pattern = match pattern.strip_prefix("re:") {
                    Some(source) => UrlPattern::regex(source)?,
                    None => UrlPattern::from(pattern.as_str()),
                };
                match timeout_ms {
                    Some(ms) => self
                        .base
                        .wait_for_url(pattern, Duration::from_millis(*ms))
                        .await
                        .map(|_| ()),
                    None => self.base.expect_url(pattern).await,
                }
            }

            Step::ExpectVisible { target } => self.base.expect_visible(&self.locate(target)?).await,

            Step::ExpectHidden { target } => {
                self.base.expect_not_visible(&self.locate(target)?).await
            }

            Step::ExpectText { target, text } => {
                self.base
                    .expect_text(&self.locate(target)?, text.as_str())
                    .await
            }

            Step::GenerateCode {
                var,
                prefix,
                max_length,
            } => {
                let code = match max_length {
                    Some(length) => generate_unique_code(prefix, *length),
                    None => self.factory.code(prefix),
                };
                debug!("${{{}}} = {}", var, code);
                self.vars.insert(var.clone(), code);
                Ok(())
            }

            Step::GenerateName { var, prefix } => {
                let name = self.factory.name(prefix);
                debug!("${{{}}} = {}", var, name);
                self.vars.insert(var.clone(), name);
                Ok(())
            }

            Step::CreatePromoCode {
                org,
                code,
                discount_type,
                discount_value,
                max_uses,
                description,
            } => {
                let page = TicketingPage::new(self.base.clone());
                page.goto_promo_codes(org).await?;
                let form = PromoCodeForm {
                    max_uses: *max_uses,
                    description: description.clone(),
                    ..PromoCodeForm::new(code, discount_type.parse()?, discount_value)
                };
                page.create_promo_code(&form).await?;
                self.record(FixtureKind::PromoCode, code, org);
                Ok(())
            }

            Step::ExpectPromoDiscount {
                org,
                code,
                discount_type,
                discount_value,
            } => {
                let page = TicketingPage::new(self.base.clone());
                page.goto_promo_codes(org).await?;
                let discount_type: DiscountType = discount_type.parse()?;
                page.expect_promo_code_discount(code, discount_type, discount_value)
                    .await
            }

            Step::CreateTicketType {
                org,
                name,
                price,
                capacity,
            } => {
                let page = TicketingPage::new(self.base.clone());
                page.goto_ticket_types(org).await?;
                let form = TicketTypeForm {
                    capacity: *capacity,
                    ..TicketTypeForm::new(name, price)
                };
                page.create_ticket_type(&form).await?;
                page.expect_ticket_type(name, price).await?;
                self.record(FixtureKind::TicketType, name, org);
                Ok(())
            }

            Step::RefundOrder { org, email } => {
                let page = OrdersPage::new(self.base.clone());
                page.goto(org).await?;
                page.refund_order(email).await
            }

            Step::ExpectOrderStatus { org, email, status } => {
                let page = OrdersPage::new(self.base.clone());
                page.goto(org).await?;
                page.search(email).await?;
                let status: OrderStatus = status.parse()?;
                page.expect_status(email, status).await
            }

            Step::ExpectNoRefund { org, email } => {
                let page = OrdersPage::new(self.base.clone());
                page.goto(org).await?;
                page.search(email).await?;
                page.expect_no_refund_action(email).await
            }

            Step::ApplyPromoCode {
                storefront,
                code,
                ticket,
                quantity,
                expect_discount,
            } => {
                let page = StorefrontPage::new(self.base.clone());
                page.goto_tickets(storefront).await?;
                if let Some(ticket) = ticket {
                    page.select_tickets(ticket, *quantity).await?;
                }
                if !page.apply_promo_code(code).await? {
                    return Err(E2eError::Skipped(format!(
                        "storefront {} has no promo code field",
                        storefront
                    )));
                }
                match expect_discount {
                    Some(display) => page.expect_discount(display).await,
                    None => Ok(()),
                }
            }

            Step::Checkout {
                storefront,
                ticket,
                quantity,
                customer_name,
                customer_email,
                card,
                expect,
            } => {
                let storefront_page = StorefrontPage::new(self.base.clone());
                storefront_page.goto_tickets(storefront).await?;
                storefront_page.select_tickets(ticket, *quantity).await?;
                storefront_page.proceed_to_checkout().await?;

                let card = TestCard::named(card)?;
                let customer = Customer::new(customer_name, customer_email);
                let outcome = CheckoutPage::new(self.base.clone())
                    .complete_purchase(&customer, &card)
                    .await?;

                match (expect.as_str(), outcome) {
                    ("paid", CheckoutOutcome::Paid { session_id }) => {
                        self.vars.insert("session_id".to_string(), session_id);
                        Ok(())
                    }
                    ("declined", CheckoutOutcome::Declined { message }) => {
                        debug!("Card declined as expected: {}", message);
                        Ok(())
                    }
                    ("requires_action", CheckoutOutcome::RequiresAction) => Ok(()),
                    (expected, actual) => Err(E2eError::AssertionFailed(format!(
                        "checkout ended {:?}, expected {}",
                        actual, expected
                    ))),
                }
            }

            Step::ExpectCheckoutResolved {
                storefront,
                session_id,
                state,
            } => {
                let page = CheckoutSuccessPage::new(self.base.clone());
                page.goto_session(storefront, session_id).await?;
                if state == "error" {
                    page.expect_error_state().await
                } else {
                    page.expect_confirmed().await
                }
            }

            Step::ScanTicket {
                org,
                code,
                expect,
                attraction,
            } => {
                let expected: CheckInResult = expect.parse()?;
                let page = CheckInPage::new(self.base.clone());
                page.goto(org).await?;
                if let Some(attraction) = attraction {
                    page.select_attraction(attraction).await?;
                }
                page.scan(code).await?;
                page.expect_result(expected).await
            }

            Step::Signup {
                full_name,
                email,
                password,
                confirm_password,
                expect,
                message,
            } => {
                let page = SignupPage::new(self.base.clone());
                page.goto().await?;
                let form = SignupForm {
                    confirm_password: confirm_password.clone(),
                    ..SignupForm::new(full_name, email, password)
                };
                page.signup(&form).await?;
                match (expect.as_str(), message) {
                    ("duplicate_email", _) => page.expect_duplicate_email_error().await,
                    ("field_error", Some(message)) => page.expect_field_error(message.as_str()).await,
                    ("field_error", None) => Err(E2eError::ScenarioParse(
                        "signup expect field_error needs a message".to_string(),
                    )),
                    _ => page.expect_verification_prompt().await,
                }
            }

            Step::RequestPasswordReset { email } => {
                let page = PasswordResetPage::new(self.base.clone());
                page.goto_forgot().await?;
                page.request_reset(email).await?;
                page.expect_reset_email_sent().await
            }

            Step::SetNewPassword {
                password,
                confirm,
                expect,
            } => {
                let page = PasswordResetPage::new(self.base.clone());
                page.goto_reset().await?;
                page.set_new_password(password, confirm).await?;
                if expect == "mismatch" {
                    page.expect_password_mismatch().await
                } else {
                    page.expect_password_updated().await
                }
            }

            Step::CreateOrganization { name, slug, expect } => {
                let page = OrganizationsPage::new(self.base.clone());
                page.goto_new().await?;
                if expect == "slug_taken" {
                    page.submit_create(name, slug).await?;
                    return page.expect_slug_taken_error().await;
                }
                page.create_organization(name, slug).await?;
                self.record(FixtureKind::Organization, slug, slug);
                Ok(())
            }

            Step::UpdateOrgSettings {
                org,
                name,
                email,
                phone,
                website,
            } => {
                let page = OrganizationsPage::new(self.base.clone());
                let settings = OrgSettings {
                    name: name.clone(),
                    email: email.clone(),
                    phone: phone.clone(),
                    website: website.clone(),
                };
                page.update_settings(org, &settings).await?;
                page.expect_settings_saved().await
            }

            Step::CreateStorefrontPage {
                org,
                title,
                slug,
                content,
                published,
            } => {
                let page = StorefrontPagesPage::new(self.base.clone());
                page.goto(org).await?;
                let form = PageForm {
                    slug: slug.clone(),
                    content: content.clone(),
                    // new pages start as drafts
                    published: published.then_some(true),
                    ..PageForm::new(title)
                };
                page.create_page(&form).await?;
                self.record(FixtureKind::StorefrontPage, title, org);
                page.expect_page_listed(title, *published).await
            }

            Step::ProbeAccess { org, area, role } => {
                let role: Role = match role {
                    Some(role) => role.parse()?,
                    None => self.role.ok_or_else(|| {
                        E2eError::ScenarioParse("probe_access without a logged in role".to_string())
                    })?,
                };
                let area: Area = area.parse()?;
                let intended = Access::from_allowed(role.can_access(area));
                let observed = probe_access(&self.base, org, area).await?;
                if observed == intended {
                    if role.is_known_gap(area) {
                        info!("Known gap {} / {} is no longer observed", role, area.as_str());
                    }
                    return Ok(());
                }
                if role.is_known_gap(area) {
                    return Err(E2eError::Skipped(format!(
                        "known RBAC gap: {} is {} on {}",
                        role,
                        observed,
                        area.as_str()
                    )));
                }
                Err(E2eError::AssertionFailed(format!(
                    "{} is {} on {}, expected {}",
                    role,
                    observed,
                    area.as_str(),
                    intended
                )))
            }

            Step::SkipUnlessVisible {
                target,
                reason,
                timeout_ms,
            } => {
                let probe = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.base.timeouts().fast);
                if self.locate(target)?.probe_visible(probe).await {
                    Ok(())
                } else {
                    Err(E2eError::Skipped(reason.clone()))
                }
            }

            Step::Screenshot { name } => {
                self.base.screenshot(name).await?;
                let Some(store) = self.visual else {
                    return Ok(());
                };
                let diff = store.compare(name)?;
                self.screenshots.push(ScreenshotResult {
                    name: diff.name.clone(),
                    matches: diff.matches,
                    diff_percent: diff.diff_percent,
                    diff_image_path: diff
                        .diff_image_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().to_string()),
                });
                if diff.matches {
                    Ok(())
                } else {
                    Err(E2eError::AssertionFailed(format!(
                        "screenshot {} differs from baseline by {:.2}%",
                        name, diff.diff_percent
                    )))
                }
            }

            Step::Sleep { ms } => {
                self.base.pause(*ms).await;
                Ok(())
            }

            Step::Log { message } => {
                info!("{}", message);
                Ok(())
            }
        }
    }

    fn record(&mut self, kind: FixtureKind, key: &str, org: &str) {
        self.factory.record(kind, key);
        self.owners.insert(key.to_string(), org.to_string());
    }

    /// Remove what the scenario created. Failures are logged, never fatal.
    async fn teardown(&mut self) -> Vec<CreatedFixture> {
        let created = self.factory.drain_for_teardown();
        for fixture in &created {
            let Some(org) = self.owners.get(&fixture.key) else {
                continue;
            };
            let removed = match fixture.kind {
                FixtureKind::PromoCode => {
                    let page = TicketingPage::new(self.base.clone());
                    match page.goto_promo_codes(org).await {
                        Ok(()) => page.delete_promo_code(&fixture.key).await,
                        Err(e) => Err(e),
                    }
                }
                FixtureKind::StorefrontPage => {
                    let page = StorefrontPagesPage::new(self.base.clone());
                    match page.goto(org).await {
                        Ok(()) => page.delete_page(&fixture.key).await,
                        Err(e) => Err(e),
                    }
                }
                _ => {
                    debug!("No teardown for {:?} {}", fixture.kind, fixture.key);
                    continue;
                }
            };
            match removed {
                Ok(()) => debug!("Tore down {:?} {}", fixture.kind, fixture.key),
                Err(e) => warn!("Teardown of {:?} {} failed: {}", fixture.kind, fixture.key, e),
            }
        }
        created
    }
}
