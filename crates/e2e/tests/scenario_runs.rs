//! Shipped scenarios, run against a scripted fake of the app

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use haunt_e2e::driver::{AriaRole, DialogAction, Selector, TextMatch};
use haunt_e2e::mock::{MockDriver, MockSessions, MockState};
use haunt_e2e::pages::{
    CheckoutSuccessPage, LoginPage, OrdersPage, OrganizationsPage, PasswordResetPage, SignupPage,
};
use haunt_e2e::{BasePage, HarnessConfig, Outcome, Scenario, Step, TestRunner};
use haunt_fixtures::{
    FeatureFlags, FixtureKind, Routes, Timeouts, KNOWN_RBAC_GAPS, TEST_USERS,
};
use tempfile::TempDir;

const BASE: &str = "http://localhost:3000";
const BUYER: &str = "completed-buyer@nightmare-manor.test";

fn scenarios_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

fn shipped(name: &str) -> Scenario {
    Scenario::load_all(&scenarios_dir())
        .unwrap()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no scenario named {}", name))
}

/// Page objects only to read their selectors off
fn selectors() -> BasePage {
    BasePage::new(Arc::new(MockDriver::new()), BASE)
}

fn render_login(mock: &MockDriver) {
    let login = LoginPage::new(selectors());
    mock.show(login.email_input().selector(), "");
    mock.show(login.password_input().selector(), "");
    mock.show(login.submit_button().selector(), "Sign in");
    let email = login.email_input().selector().clone();
    mock.on_click(login.submit_button().selector(), move |s: &mut MockState| {
        let typed = s.value_of(&email).unwrap_or_default();
        if let Some(user) = TEST_USERS.iter().find(|u| u.email == typed) {
            s.set_url(&format!("{}{}", BASE, user.landing_path()));
        }
    });
}

fn render_orders(mock: &MockDriver) {
    let orders = OrdersPage::new(selectors());
    let badge = orders.status_badge(BUYER).selector().clone();
    let item = orders.refund_menu_item().selector().clone();
    mock.show(orders.search_input().selector(), "");
    mock.show(orders.order_row(BUYER).selector(), BUYER);
    mock.show(&badge, "Completed");
    mock.show(orders.row_actions_button(BUYER).selector(), "");

    mock.on_click(orders.row_actions_button(BUYER).selector(), {
        let badge = badge.clone();
        let item = item.clone();
        move |s: &mut MockState| {
            let refundable = s
                .element(&badge)
                .map(|e| e.text.trim().eq_ignore_ascii_case("completed"))
                .unwrap_or(false);
            if refundable {
                s.show(&item, "Refund");
            } else {
                s.hide(&item);
            }
        }
    });
    let refund = item.clone();
    mock.on_click(&refund, move |s: &mut MockState| {
        s.hide(&item);
        if s.take_dialog() == DialogAction::Accept {
            let badge = badge.clone();
            s.after(Duration::from_secs(2), move |s| s.set_text(&badge, "Refunded"));
        }
    });
}

fn runner(dir: &TempDir, sessions: Arc<MockSessions>, update_baselines: bool) -> TestRunner {
    let config = HarnessConfig {
        base_url: BASE.to_string(),
        scenarios_dir: scenarios_dir(),
        output_dir: dir.path().join("results"),
        screenshot_dir: dir.path().join("shots"),
        baseline_dir: dir.path().join("baselines"),
        update_baselines,
        flags: FeatureFlags::default(),
        timeouts: Timeouts::uniform(Duration::from_secs(5)),
        ..Default::default()
    };
    TestRunner::new(config, sessions).unwrap()
}

#[test]
fn test_shipped_scenarios_parse() {
    let scenarios = Scenario::load_all(&scenarios_dir()).unwrap();
    assert!(scenarios.len() >= 10);
    for scenario in &scenarios {
        assert!(!scenario.tags.is_empty(), "{} has no tags", scenario.name);
        if let Some(gap) = &scenario.known_gap {
            let pair = gap.parse().unwrap();
            assert!(KNOWN_RBAC_GAPS.contains(&pair), "{} declares an unknown gap", scenario.name);
        }
    }
    assert!(!Scenario::filter_by_tag(&scenarios, "smoke").is_empty());
}

const REFUND_SEEDED: &str = r#"
name: refund-seeded-order
tags: [orders]
login: finance
steps:
  - action: expect_order_status
    org: ${org}
    email: completed-buyer@nightmare-manor.test
    status: completed
  - action: refund_order
    org: ${org}
    email: completed-buyer@nightmare-manor.test
  - action: expect_order_status
    org: ${org}
    email: completed-buyer@nightmare-manor.test
    status: refunded
  - action: expect_no_refund
    org: ${org}
    email: completed-buyer@nightmare-manor.test
"#;

#[tokio::test(start_paused = true)]
async fn test_refund_steps_against_fake_orders() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        render_login(mock);
        render_orders(mock);
    }));
    let runner = runner(&dir, sessions.clone(), false);

    let result = runner
        .run_scenario(&Scenario::from_yaml(REFUND_SEEDED).unwrap())
        .await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);
    assert_eq!(result.steps.len(), 4);

    let mock = &sessions.opened()[0];
    assert!(mock
        .visits()
        .iter()
        .any(|url| url.ends_with(&Routes::dashboard("nightmare-manor").orders())));
}

#[test]
fn test_refund_scenario_buys_its_own_order() {
    let scenario = shipped("refund-completed-order");
    assert_eq!(scenario.requires, vec!["stripe_connect"]);

    let buyer = match &scenario.steps[0] {
        Step::Checkout { customer_email, .. } => customer_email.clone(),
        other => panic!("first step should buy the order, got {}", other.action()),
    };
    assert!(buyer.contains("${scope}"));

    let mut order_steps = 0;
    for step in &scenario.steps[1..] {
        match step {
            Step::RefundOrder { email, .. }
            | Step::ExpectOrderStatus { email, .. }
            | Step::ExpectNoRefund { email, .. } => {
                assert_eq!(email, &buyer);
                order_steps += 1;
            }
            _ => {}
        }
    }
    assert_eq!(order_steps, 4);
}

fn render_new_org_form(mock: &MockDriver) -> OrganizationsPage {
    let page = OrganizationsPage::new(selectors());
    mock.show(page.name_input().selector(), "");
    mock.show(page.slug_input().selector(), "");
    mock.show(page.create_button().selector(), "Create Organization");
    page
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_slug_scenario() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        render_login(mock);
        let page = render_new_org_form(mock);
        let slug = page.slug_input().selector().clone();
        let error = page.slug_taken_error().selector().clone();
        mock.on_click(page.create_button().selector(), move |s: &mut MockState| {
            let taken = TEST_USERS
                .iter()
                .any(|u| u.org_slug == s.value_of(&slug).as_deref());
            if taken {
                s.show(&error, "That slug is already taken");
            }
        });
    }));
    let runner = runner(&dir, sessions, false);

    let result = runner
        .run_scenario(&shipped("organization-slug-must-be-unique"))
        .await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);
    assert!(result.created.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_organization_scenario_records_fixture() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        render_login(mock);
        let page = render_new_org_form(mock);
        let slug = page.slug_input().selector().clone();
        mock.on_click(page.create_button().selector(), move |s: &mut MockState| {
            let slug = s.value_of(&slug).unwrap_or_default();
            s.set_url(&format!("{}/{}", BASE, slug));
        });
    }));
    let runner = runner(&dir, sessions, false);

    let result = runner.run_scenario(&shipped("create-organization")).await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);
    assert_eq!(result.created.len(), 1);
    assert_eq!(result.created[0].kind, FixtureKind::Organization);
    assert!(result.created[0].key.starts_with("e2e-"));
}

#[tokio::test(start_paused = true)]
async fn test_signup_duplicate_email_scenario() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        let page = SignupPage::new(selectors());
        for input in [page.full_name_input(), page.email_input(), page.password_input()] {
            mock.show(input.selector(), "");
        }
        mock.show(page.submit_button().selector(), "Create account");
        let email = page.email_input().selector().clone();
        let alert = page.error_alert().selector().clone();
        mock.on_click(page.submit_button().selector(), move |s: &mut MockState| {
            let typed = s.value_of(&email).unwrap_or_default();
            if TEST_USERS.iter().any(|u| u.email == typed) {
                s.show(&alert, "User already registered");
            }
        });
    }));
    let runner = runner(&dir, sessions, false);

    let result = runner
        .run_scenario(&shipped("signup-rejects-registered-email"))
        .await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);
}

#[tokio::test(start_paused = true)]
async fn test_password_reset_scenario() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        let page = PasswordResetPage::new(selectors());
        mock.show(page.email_input().selector(), "");
        mock.show(page.send_button().selector(), "Send reset link");
        let sent = page.reset_sent_message().selector().clone();
        mock.on_click(page.send_button().selector(), move |s: &mut MockState| {
            s.show(&sent, "Check your email")
        });
    }));
    let runner = runner(&dir, sessions.clone(), false);

    let result = runner.run_scenario(&shipped("password-reset-request")).await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);
    assert!(sessions.opened()[0].visits()[0].ends_with(Routes::forgot_password()));
}

#[tokio::test(start_paused = true)]
async fn test_rbac_matrix_scenario() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        render_login(mock);
        mock.on_navigate("/nightmare-manor/staff", |s: &mut MockState| {
            s.set_url("http://localhost:3000/nightmare-manor")
        });
        let notice = selectors()
            .by_text(TextMatch::regex_ci(
                "permission|not authorized|access denied|don't have access",
            ))
            .first()
            .selector()
            .clone();
        mock.on_navigate("/nightmare-manor/settings", move |s: &mut MockState| {
            s.show(&notice, "You don't have permission to view settings")
        });
    }));
    let runner = runner(&dir, sessions, false);

    let result = runner.run_scenario(&shipped("finance-access-matrix")).await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);

    let gap = runner.run_scenario(&shipped("actor-cannot-open-orders")).await;
    assert_eq!(gap.outcome, Outcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn test_open_rbac_hole_fails() {
    let dir = TempDir::new().unwrap();
    // finance can reach staff, which the permission model forbids
    let sessions = Arc::new(MockSessions::new(render_login));
    let runner = runner(&dir, sessions, false);

    let result = runner.run_scenario(&shipped("finance-access-matrix")).await;
    assert_eq!(result.outcome, Outcome::Failed);
    assert!(result.reason.unwrap().contains("staff"));
}

#[tokio::test(start_paused = true)]
async fn test_bogus_session_scenario() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|mock| {
        let error = CheckoutSuccessPage::new(selectors())
            .error_heading()
            .selector()
            .clone();
        mock.on_navigate("/s/nightmare-manor/checkout/success", move |s: &mut MockState| {
            let error = error.clone();
            s.after(Duration::from_secs(3), move |s| s.show(&error, "Order not found"));
        });
    }));
    let runner = runner(&dir, sessions, false);

    let result = runner
        .run_scenario(&shipped("checkout-success-page-rejects-bogus-session"))
        .await;
    assert_eq!(result.outcome, Outcome::Passed, "{:?}", result.reason);
}

#[tokio::test(start_paused = true)]
async fn test_payment_scenarios_skip_without_stripe() {
    let dir = TempDir::new().unwrap();
    let sessions = Arc::new(MockSessions::new(|_| {}));
    let runner = runner(&dir, sessions.clone(), false);

    let scenarios = Scenario::load_all(&scenarios_dir()).unwrap();
    let payments = Scenario::filter_by_tag(&scenarios, "payments");
    assert!(!payments.is_empty());
    let suite = runner.run_scenarios(payments.into_iter()).await;
    assert_eq!(suite.skipped, suite.total);
    assert!(sessions.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_visual_scenario_adopts_then_matches_baseline() {
    let dir = TempDir::new().unwrap();
    let setup = |mock: &MockDriver| {
        mock.show(
            &Selector::role_named(AriaRole::Button, TextMatch::from("Sign in")),
            "Sign in",
        );
    };
    let scenario = shipped("login-page-visual");

    let adopting = runner(&dir, Arc::new(MockSessions::new(setup)), true);
    let first = adopting.run_scenario(&scenario).await;
    assert_eq!(first.outcome, Outcome::Passed, "{:?}", first.reason);
    assert!(dir.path().join("baselines/login-page.png").exists());

    let comparing = runner(&dir, Arc::new(MockSessions::new(setup)), false);
    let second = comparing.run_scenario(&scenario).await;
    assert_eq!(second.outcome, Outcome::Passed, "{:?}", second.reason);
    assert!(second.screenshots[0].matches);
}
