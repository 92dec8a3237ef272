//! Seed users, roles and the intended access matrix

use serde::Serialize;
use std::str::FromStr;

use crate::error::{FixtureError, FixtureResult};
use crate::seed::{NIGHTMARE_MANOR, SPOOKY_HOLLOW};

/// Organization membership role, as stored by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    HrManager,
    Finance,
    BoxOffice,
    Scanner,
    Actor,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Owner,
        Role::Admin,
        Role::Manager,
        Role::HrManager,
        Role::Finance,
        Role::BoxOffice,
        Role::Scanner,
        Role::Actor,
        Role::SuperAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::HrManager => "hr_manager",
            Role::Finance => "finance",
            Role::BoxOffice => "box_office",
            Role::Scanner => "scanner",
            Role::Actor => "actor",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Platform staff, not an organization member
    pub fn is_platform(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// Whether the intended permission model lets this role open `area`.
    ///
    /// UI hiding is not a security boundary; this only describes what the
    /// dashboard is supposed to show.
    pub fn can_access(&self, area: Area) -> bool {
        use Area::*;
        match self {
            Role::SuperAdmin => true,
            Role::Owner | Role::Admin => area != Admin,
            Role::Manager => matches!(
                area,
                Attractions | Staff | Schedule | Ticketing | Orders | CheckIn | Storefront
            ),
            Role::HrManager => matches!(area, Staff | Schedule | Members),
            Role::Finance => matches!(area, Ticketing | Orders | Payments),
            Role::BoxOffice => matches!(area, Orders | CheckIn),
            Role::Scanner => matches!(area, CheckIn),
            Role::Actor => matches!(area, Schedule),
        }
    }

    /// Whether the deployed app is known to disagree with [`Role::can_access`]
    pub fn is_known_gap(&self, area: Area) -> bool {
        KNOWN_RBAC_GAPS.iter().any(|(r, a)| r == self && *a == area)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = FixtureError;

    fn from_str(s: &str) -> FixtureResult<Self> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s || r.as_str().replace('_', "") == s.to_lowercase())
            .ok_or_else(|| FixtureError::UnknownRole(s.to_string()))
    }
}

/// Dashboard area guarded by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Attractions,
    Staff,
    Schedule,
    Ticketing,
    Orders,
    CheckIn,
    Payments,
    Settings,
    Members,
    Storefront,
    Admin,
}

impl Area {
    pub const ALL: [Area; 11] = [
        Area::Attractions,
        Area::Staff,
        Area::Schedule,
        Area::Ticketing,
        Area::Orders,
        Area::CheckIn,
        Area::Payments,
        Area::Settings,
        Area::Members,
        Area::Storefront,
        Area::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Attractions => "attractions",
            Area::Staff => "staff",
            Area::Schedule => "schedule",
            Area::Ticketing => "ticketing",
            Area::Orders => "orders",
            Area::CheckIn => "check_in",
            Area::Payments => "payments",
            Area::Settings => "settings",
            Area::Members => "members",
            Area::Storefront => "storefront",
            Area::Admin => "admin",
        }
    }
}

impl FromStr for Area {
    type Err = FixtureError;

    fn from_str(s: &str) -> FixtureResult<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        Area::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| FixtureError::UnknownArea(s.to_string()))
    }
}

/// Role/area pairs where the app currently lets the role in although the
/// intended model denies it.
pub const KNOWN_RBAC_GAPS: &[(Role, Area)] = &[(Role::Actor, Area::Orders), (Role::Scanner, Area::Orders)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestUser {
    pub email: &'static str,
    pub password: &'static str,
    pub role: Role,
    /// `None` for platform users
    pub org_slug: Option<&'static str>,
}

impl TestUser {
    /// Path the app lands on right after a successful login
    pub fn landing_path(&self) -> String {
        match (self.role, self.org_slug) {
            (Role::SuperAdmin, _) | (_, None) => "/admin".to_string(),
            (_, Some(slug)) => format!("/{}", slug),
        }
    }
}

const SEED_PASSWORD: &str = "TestPassword123!";

const fn member(email: &'static str, role: Role, org_slug: &'static str) -> TestUser {
    TestUser {
        email,
        password: SEED_PASSWORD,
        role,
        org_slug: Some(org_slug),
    }
}

pub const TEST_USERS: &[TestUser] = &[
    member("owner@nightmare-manor.test", Role::Owner, NIGHTMARE_MANOR.slug),
    member("admin@nightmare-manor.test", Role::Admin, NIGHTMARE_MANOR.slug),
    member("manager@nightmare-manor.test", Role::Manager, NIGHTMARE_MANOR.slug),
    member("hr@nightmare-manor.test", Role::HrManager, NIGHTMARE_MANOR.slug),
    member("finance@nightmare-manor.test", Role::Finance, NIGHTMARE_MANOR.slug),
    member("boxoffice@nightmare-manor.test", Role::BoxOffice, NIGHTMARE_MANOR.slug),
    member("scanner@nightmare-manor.test", Role::Scanner, NIGHTMARE_MANOR.slug),
    member("actor@nightmare-manor.test", Role::Actor, NIGHTMARE_MANOR.slug),
    member("owner@spooky-hollow.test", Role::Owner, SPOOKY_HOLLOW.slug),
    TestUser {
        email: "admin@hauntops.test",
        password: SEED_PASSWORD,
        role: Role::SuperAdmin,
        org_slug: None,
    },
];

/// First seed user holding `role`
pub fn user_for_role(role: Role) -> FixtureResult<&'static TestUser> {
    TEST_USERS
        .iter()
        .find(|u| u.role == role)
        .ok_or_else(|| FixtureError::NoUserForRole(role.to_string()))
}
