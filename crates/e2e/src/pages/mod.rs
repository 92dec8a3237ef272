//! Page objects, one per UI surface
//!
//! Locator getters build a fresh [`Locator`] on every call; nothing is
//! cached because the DOM changes between steps. Actions compose those
//! locators with short fixed settle delays, and assertions defer to
//! [`BasePage`].

mod access;
mod check_in;
mod checkout;
mod checkout_success;
mod dialog;
mod login;
mod orders;
mod organizations;
mod password_reset;
mod signup;
mod storefront;
mod storefront_pages;
mod ticketing;

pub use access::{probe_access, Access};
pub use check_in::{CheckInPage, CheckInResult};
pub use checkout::{CheckoutOutcome, CheckoutPage, Customer};
pub use checkout_success::{CheckoutSuccessPage, SuccessState};
pub use login::LoginPage;
pub use orders::OrdersPage;
pub use organizations::{OrgSettings, OrganizationsPage};
pub use password_reset::PasswordResetPage;
pub use signup::{SignupForm, SignupPage};
pub use storefront::StorefrontPage;
pub use storefront_pages::{PageForm, StorefrontPagesPage};
pub use ticketing::{PromoCodeForm, TicketTypeForm, TicketingPage};

use crate::base_page::BasePage;
use crate::driver::{AriaRole, Selector, TextMatch};
use crate::locator::Locator;

/// Settle delay after opening a menu or popover
pub(crate) const MENU_SETTLE_MS: u64 = 200;

/// Settle delay after typing into a debounced field
pub(crate) const INPUT_SETTLE_MS: u64 = 300;

/// First table row containing `text`
pub(crate) fn row_with(base: &BasePage, text: &str) -> Locator {
    base.by_role(AriaRole::Row).filter_text(text).first()
}

/// The row's actions menu trigger
pub(crate) fn row_menu_button(row: &Locator) -> Locator {
    row.locator(&Selector::role_named(
        AriaRole::Button,
        TextMatch::regex_ci("actions|open menu"),
    ))
}
