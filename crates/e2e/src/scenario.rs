//! Declarative YAML scenarios
//!
//! A scenario is a named list of steps, each of which maps onto one page
//! object operation. String fields may reference variables as `${name}`;
//! variables come from `generate_code`/`generate_name` steps, from a
//! successful `checkout` (`session_id`) and from the runner (`base_url`,
//! `scope`, `org`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use haunt_fixtures::{Area, DiscountType, FeatureFlags, OrderStatus, Role, TestCard};

use crate::driver::{AriaRole, Selector, TextMatch};
use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Feature flags that must be on, see [`FeatureFlags::NAMES`]
    #[serde(default)]
    pub requires: Vec<String>,

    /// Seed role to log in as before the first step
    #[serde(default)]
    pub login: Option<String>,

    /// This scenario exercises a permission gap the app is known to have
    #[serde(default)]
    pub known_gap: Option<KnownGap>,

    /// Compare `screenshot` steps against their baselines
    #[serde(default)]
    pub visual_regression: bool,

    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownGap {
    pub role: String,
    pub area: String,
}

impl KnownGap {
    pub fn parse(&self) -> E2eResult<(Role, Area)> {
        Ok((self.role.parse()?, self.area.parse()?))
    }
}

/// Element reference used by the generic assertion steps.
///
/// The first field set wins, in the order `test_id`, `role`, `label`,
/// `placeholder`, `text`, `css`. `name` only applies to `role`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub test_id: Option<String>,
    pub role: Option<AriaRole>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub text: Option<String>,
    pub css: Option<String>,
    /// Match `name`, `label`, `placeholder` and `text` exactly
    #[serde(default)]
    pub exact: bool,
}

impl Target {
    pub fn selector(&self) -> E2eResult<Selector> {
        let text = |value: &String| {
            if self.exact {
                TextMatch::exact(value.as_str())
            } else {
                TextMatch::from(value.as_str())
            }
        };
        if let Some(id) = &self.test_id {
            return Ok(Selector::test_id(id.as_str()));
        }
        if let Some(role) = self.role {
            return Ok(match &self.name {
                Some(name) => Selector::role_named(role, text(name)),
                None => Selector::role(role),
            });
        }
        if let Some(label) = &self.label {
            return Ok(Selector::label(text(label)));
        }
        if let Some(placeholder) = &self.placeholder {
            return Ok(Selector::placeholder(text(placeholder)));
        }
        if let Some(value) = &self.text {
            return Ok(Selector::text(text(value)));
        }
        if let Some(css) = &self.css {
            return Ok(Selector::css(css.as_str()));
        }
        Err(E2eError::ScenarioParse(
            "target needs one of test_id, role, label, placeholder, text or css".to_string(),
        ))
    }
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a path relative to the base URL
    Goto {
        path: String,
        #[serde(default)]
        network_idle: bool,
    },

    /// Log in as the seed user for `role`
    Login { role: String },

    /// Wait for the URL; `re:` prefixes a regex, `*` makes a glob
    ExpectUrl {
        pattern: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    ExpectVisible { target: Target },

    ExpectHidden { target: Target },

    ExpectText { target: Target, text: String },

    /// Mint a unique code into `${var}`
    GenerateCode {
        var: String,
        #[serde(default = "default_code_prefix")]
        prefix: String,
        #[serde(default)]
        max_length: Option<usize>,
    },

    /// Mint a unique display name into `${var}`
    GenerateName { var: String, prefix: String },

    CreatePromoCode {
        org: String,
        code: String,
        discount_type: String,
        discount_value: String,
        #[serde(default)]
        max_uses: Option<u32>,
        #[serde(default)]
        description: Option<String>,
    },

    ExpectPromoDiscount {
        org: String,
        code: String,
        discount_type: String,
        discount_value: String,
    },

    CreateTicketType {
        org: String,
        name: String,
        price: String,
        #[serde(default)]
        capacity: Option<u32>,
    },

    RefundOrder { org: String, email: String },

    ExpectOrderStatus {
        org: String,
        email: String,
        status: String,
    },

    ExpectNoRefund { org: String, email: String },

    /// Apply a promo code on the storefront; skips when promotions are off
    ApplyPromoCode {
        storefront: String,
        code: String,
        #[serde(default)]
        ticket: Option<String>,
        #[serde(default = "default_quantity")]
        quantity: u32,
        #[serde(default)]
        expect_discount: Option<String>,
    },

    /// Buy tickets end to end; a paid checkout sets `${session_id}`
    Checkout {
        storefront: String,
        ticket: String,
        #[serde(default = "default_quantity")]
        quantity: u32,
        customer_name: String,
        customer_email: String,
        #[serde(default = "default_card")]
        card: String,
        #[serde(default = "default_checkout_expectation")]
        expect: String,
    },

    /// The success page settles on `confirmed` or `error`
    ExpectCheckoutResolved {
        storefront: String,
        session_id: String,
        #[serde(default = "default_resolution")]
        state: String,
    },

    ScanTicket {
        org: String,
        code: String,
        expect: String,
        #[serde(default)]
        attraction: Option<String>,
    },

    /// Fill the signup form. `expect` is `verification`, `duplicate_email`
    /// or `field_error`, which needs `message`.
    Signup {
        full_name: String,
        email: String,
        password: String,
        #[serde(default)]
        confirm_password: Option<String>,
        #[serde(default = "default_signup_expectation")]
        expect: String,
        #[serde(default)]
        message: Option<String>,
    },

    RequestPasswordReset { email: String },

    /// Submit the reset form; `expect` is `updated` or `mismatch`
    SetNewPassword {
        password: String,
        confirm: String,
        #[serde(default = "default_password_expectation")]
        expect: String,
    },

    /// `expect` is `created` or `slug_taken`
    CreateOrganization {
        name: String,
        slug: String,
        #[serde(default = "default_org_expectation")]
        expect: String,
    },

    UpdateOrgSettings {
        org: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        website: Option<String>,
    },

    CreateStorefrontPage {
        org: String,
        title: String,
        #[serde(default)]
        slug: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        published: bool,
    },

    /// Compare observed access with the intended permission model. `role`
    /// defaults to whoever is logged in.
    ProbeAccess {
        org: String,
        area: String,
        #[serde(default)]
        role: Option<String>,
    },

    /// End the scenario as skipped unless `target` shows up
    SkipUnlessVisible {
        target: Target,
        reason: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    Screenshot { name: String },

    /// Fixed delay; prefer a wait step
    Sleep { ms: u64 },

    Log { message: String },
}

fn default_code_prefix() -> String {
    "E2E".to_string()
}

fn default_quantity() -> u32 {
    1
}

fn default_card() -> String {
    "success".to_string()
}

fn default_checkout_expectation() -> String {
    "paid".to_string()
}

fn default_resolution() -> String {
    "confirmed".to_string()
}

fn default_signup_expectation() -> String {
    "verification".to_string()
}

fn default_password_expectation() -> String {
    "updated".to_string()
}

fn default_org_expectation() -> String {
    "created".to_string()
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> E2eResult<()> {
    if has_vars(value) || allowed.contains(&value) {
        return Ok(());
    }
    Err(E2eError::ScenarioParse(format!(
        "{} must be one of {}, got {}",
        field,
        allowed.join(", "),
        value
    )))
}

impl Step {
    /// The `action` tag, for logs and results
    pub fn action(&self) -> &'static str {
        match self {
            Step::Goto { .. } => "goto",
            Step::Login { .. } => "login",
            Step::ExpectUrl { .. } => "expect_url",
            Step::ExpectVisible { .. } => "expect_visible",
            Step::ExpectHidden { .. } => "expect_hidden",
            Step::ExpectText { .. } => "expect_text",
            Step::GenerateCode { .. } => "generate_code",
            Step::GenerateName { .. } => "generate_name",
            Step::CreatePromoCode { .. } => "create_promo_code",
            Step::ExpectPromoDiscount { .. } => "expect_promo_discount",
            Step::CreateTicketType { .. } => "create_ticket_type",
            Step::RefundOrder { .. } => "refund_order",
            Step::ExpectOrderStatus { .. } => "expect_order_status",
            Step::ExpectNoRefund { .. } => "expect_no_refund",
            Step::ApplyPromoCode { .. } => "apply_promo_code",
            Step::Checkout { .. } => "checkout",
            Step::ExpectCheckoutResolved { .. } => "expect_checkout_resolved",
            Step::ScanTicket { .. } => "scan_ticket",
            Step::Signup { .. } => "signup",
            Step::RequestPasswordReset { .. } => "request_password_reset",
            Step::SetNewPassword { .. } => "set_new_password",
            Step::CreateOrganization { .. } => "create_organization",
            Step::UpdateOrgSettings { .. } => "update_org_settings",
            Step::CreateStorefrontPage { .. } => "create_storefront_page",
            Step::ProbeAccess { .. } => "probe_access",
            Step::SkipUnlessVisible { .. } => "skip_unless_visible",
            Step::Screenshot { .. } => "screenshot",
            Step::Sleep { .. } => "sleep",
            Step::Log { .. } => "log",
        }
    }

    /// Copy of this step with every `${var}` in its string fields expanded
    pub fn interpolate(&self, vars: &HashMap<String, String>) -> E2eResult<Step> {
        let mut value = serde_json::to_value(self)?;
        expand_value(&mut value, vars)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Static checks of enum-like fields that do not depend on variables
    fn validate(&self) -> E2eResult<()> {
        match self {
            Step::Login { role } => parse_static::<Role>(role),
            Step::CreatePromoCode { discount_type, .. }
            | Step::ExpectPromoDiscount { discount_type, .. } => {
                parse_static::<DiscountType>(discount_type)
            }
            Step::ExpectOrderStatus { status, .. } => parse_static::<OrderStatus>(status),
            Step::Checkout { card, expect, .. } => {
                if !has_vars(card) {
                    TestCard::named(card)?;
                }
                match expect.as_str() {
                    "paid" | "declined" | "requires_action" => Ok(()),
                    other => Err(E2eError::ScenarioParse(format!(
                        "checkout expect must be paid, declined or requires_action, got {}",
                        other
                    ))),
                }
            }
            Step::ExpectCheckoutResolved { state, .. } => match state.as_str() {
                "confirmed" | "error" => Ok(()),
                other => Err(E2eError::ScenarioParse(format!(
                    "checkout state must be confirmed or error, got {}",
                    other
                ))),
            },
            Step::ScanTicket { expect, .. } => {
                if !has_vars(expect) {
                    expect.parse::<crate::pages::CheckInResult>()?;
                }
                Ok(())
            }
            Step::Signup {
                expect, message, ..
            } => {
                one_of(
                    "signup expect",
                    expect,
                    &["verification", "duplicate_email", "field_error"],
                )?;
                if expect == "field_error" && message.is_none() {
                    return Err(E2eError::ScenarioParse(
                        "signup expect field_error needs a message".to_string(),
                    ));
                }
                Ok(())
            }
            Step::SetNewPassword { expect, .. } => {
                one_of("set_new_password expect", expect, &["updated", "mismatch"])
            }
            Step::CreateOrganization { expect, .. } => {
                one_of("create_organization expect", expect, &["created", "slug_taken"])
            }
            Step::ProbeAccess { area, role, .. } => {
                parse_static::<Area>(area)?;
                match role {
                    Some(role) => parse_static::<Role>(role),
                    None => Ok(()),
                }
            }
            Step::ExpectVisible { target }
            | Step::ExpectHidden { target }
            | Step::ExpectText { target, .. }
            | Step::SkipUnlessVisible { target, .. } => target.selector().map(|_| ()),
            Step::GenerateCode { var, .. } | Step::GenerateName { var, .. } => {
                if var.is_empty() || has_vars(var) {
                    return Err(E2eError::ScenarioParse(format!("invalid variable name '{}'", var)));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn parse_static<T>(value: &str) -> E2eResult<()>
where
    T: std::str::FromStr,
    E2eError: From<T::Err>,
{
    if !has_vars(value) {
        value.parse::<T>()?;
    }
    Ok(())
}

fn has_vars(value: &str) -> bool {
    value.contains("${")
}

fn var_pattern() -> E2eResult<Regex> {
    Ok(Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")?)
}

/// Expand `${name}` references; an undefined variable is an error
pub fn interpolate(text: &str, vars: &HashMap<String, String>) -> E2eResult<String> {
    if !has_vars(text) {
        return Ok(text.to_string());
    }
    let pattern = var_pattern()?;
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars.get(name.as_str()).ok_or_else(|| {
            E2eError::ScenarioParse(format!("undefined variable ${{{}}}", name.as_str()))
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn expand_value(value: &mut serde_json::Value, vars: &HashMap<String, String>) -> E2eResult<()> {
    match value {
        serde_json::Value::String(s) => *s = interpolate(s, vars)?,
        serde_json::Value::Array(items) => {
            for item in items {
                expand_value(item, vars)?;
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                expand_value(item, vars)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl Scenario {
    /// Parse and validate a scenario from YAML
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| {
            E2eError::ScenarioParse(format!("{}: {}", path.display(), e))
        })
    }

    /// Load all scenarios under a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = scenarios.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(E2eError::ScenarioParse(format!(
                "duplicate scenario name '{}'",
                pair[0].name
            )));
        }
        Ok(scenarios)
    }

    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn filter_by_name<'a>(scenarios: &'a [Self], needle: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.name.contains(needle))
            .collect()
    }

    pub fn login_role(&self) -> E2eResult<Option<Role>> {
        match self.login.as_deref() {
            Some(role) => Ok(Some(role.parse::<Role>()?)),
            None => Ok(None),
        }
    }

    /// Required flags that `flags` leaves off
    pub fn missing_flags(&self, flags: &FeatureFlags) -> Vec<&str> {
        self.requires
            .iter()
            .map(String::as_str)
            .filter(|name| !flags.is_enabled(name))
            .collect()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::ScenarioParse("scenario without a name".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::ScenarioParse(format!("scenario '{}' has no steps", self.name)));
        }
        for flag in &self.requires {
            if !FeatureFlags::NAMES.contains(&flag.as_str()) {
                return Err(E2eError::ScenarioParse(format!(
                    "scenario '{}' requires unknown feature '{}'",
                    self.name, flag
                )));
            }
        }
        self.login_role()?;
        if let Some(gap) = &self.known_gap {
            gap.parse()?;
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| {
                E2eError::ScenarioParse(format!(
                    "scenario '{}' step {} ({}): {}",
                    self.name,
                    index + 1,
                    step.action(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
