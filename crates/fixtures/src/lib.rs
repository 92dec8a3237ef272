//! HauntOps E2E fixtures
//!
//! Static seed data and small pure helpers shared by every page object and
//! scenario in the end-to-end harness. Nothing in this crate talks to a
//! browser or the network; it is the leaf of the harness dependency graph:
//!
//! ```text
//! fixtures  ->  BasePage  ->  page objects  ->  scenarios
//! ```
//!
//! All IDs are UUID-shaped strings that must exist in the seed dataset the
//! web application is started with. The harness assumes, but never checks,
//! that the seed is present.

pub mod commerce;
pub mod error;
pub mod factory;
pub mod flags;
pub mod routes;
pub mod seed;
pub mod timeouts;
pub mod unique;
pub mod users;

pub use commerce::{format_discount, DiscountType, OrderStatus, TestCard, CardOutcome};
pub use error::{FixtureError, FixtureResult};
pub use factory::{CreatedFixture, FixtureFactory, FixtureKind};
pub use flags::FeatureFlags;
pub use routes::{DashboardRoutes, Routes, StorefrontRoutes};
pub use seed::{
    org_by_slug, Attraction, Organization, Season, SeasonStatus, Tier, TEST_ATTRACTIONS,
    TEST_ORGS, TEST_SEASONS,
};
pub use timeouts::{Timeouts, TIMEOUTS};
pub use unique::{generate_unique_code, generate_unique_name, DEFAULT_CODE_LENGTH};
pub use users::{user_for_role, Area, Role, TestUser, KNOWN_RBAC_GAPS, TEST_USERS};
