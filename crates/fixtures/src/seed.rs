//! Seed organizations, attractions and seasons
//!
//! These mirror rows in the application's seed dataset. They are read-only;
//! tests that need to mutate state mint their own values through
//! [`crate::FixtureFactory`].

use serde::Serialize;

/// Billing tier of an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Pro => write!(f, "pro"),
            Tier::Enterprise => write!(f, "enterprise"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: &'static str,
    pub name: &'static str,
    pub slug: &'static str,
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attraction {
    pub id: &'static str,
    pub org_id: &'static str,
    pub name: &'static str,
    pub slug: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Season {
    pub id: &'static str,
    pub attraction_id: &'static str,
    pub name: &'static str,
    pub year: u16,
    pub status: SeasonStatus,
}

pub const NIGHTMARE_MANOR: Organization = Organization {
    id: "a0000000-0000-0000-0000-000000000001",
    name: "Nightmare Manor",
    slug: "nightmare-manor",
    tier: Tier::Pro,
};

pub const SPOOKY_HOLLOW: Organization = Organization {
    id: "a0000000-0000-0000-0000-000000000002",
    name: "Spooky Hollow",
    slug: "spooky-hollow",
    tier: Tier::Free,
};

pub const TERROR_COLLECTIVE: Organization = Organization {
    id: "a0000000-0000-0000-0000-000000000003",
    name: "Terror Collective",
    slug: "terror-collective",
    tier: Tier::Enterprise,
};

pub const TEST_ORGS: &[Organization] = &[NIGHTMARE_MANOR, SPOOKY_HOLLOW, TERROR_COLLECTIVE];

pub const HAUNTED_MANSION: Attraction = Attraction {
    id: "b0000000-0000-0000-0000-000000000001",
    org_id: NIGHTMARE_MANOR.id,
    name: "The Haunted Mansion",
    slug: "haunted-mansion",
};

pub const ZOMBIE_MAZE: Attraction = Attraction {
    id: "b0000000-0000-0000-0000-000000000002",
    org_id: NIGHTMARE_MANOR.id,
    name: "Zombie Maze",
    slug: "zombie-maze",
};

pub const HOLLOW_HAYRIDE: Attraction = Attraction {
    id: "b0000000-0000-0000-0000-000000000003",
    org_id: SPOOKY_HOLLOW.id,
    name: "Hollow Hayride",
    slug: "hollow-hayride",
};

pub const TEST_ATTRACTIONS: &[Attraction] = &[HAUNTED_MANSION, ZOMBIE_MAZE, HOLLOW_HAYRIDE];

pub const TEST_SEASONS: &[Season] = &[
    Season {
        id: "c0000000-0000-0000-0000-000000000001",
        attraction_id: HAUNTED_MANSION.id,
        name: "Halloween 2024",
        year: 2024,
        status: SeasonStatus::Completed,
    },
    Season {
        id: "c0000000-0000-0000-0000-000000000002",
        attraction_id: HAUNTED_MANSION.id,
        name: "Halloween 2025",
        year: 2025,
        status: SeasonStatus::Active,
    },
    Season {
        id: "c0000000-0000-0000-0000-000000000003",
        attraction_id: HOLLOW_HAYRIDE.id,
        name: "Fall Harvest 2025",
        year: 2025,
        status: SeasonStatus::Active,
    },
];

/// Look up a seed organization by slug
pub fn org_by_slug(slug: &str) -> Option<&'static Organization> {
    TEST_ORGS.iter().find(|o| o.slug == slug)
}

impl Organization {
    pub fn attractions(&self) -> impl Iterator<Item = &'static Attraction> + '_ {
        TEST_ATTRACTIONS.iter().filter(move |a| a.org_id == self.id)
    }
}

impl Attraction {
    pub fn seasons(&self) -> impl Iterator<Item = &'static Season> + '_ {
        TEST_SEASONS.iter().filter(move |s| s.attraction_id == self.id)
    }

    /// The season currently selling tickets, if any
    pub fn active_season(&self) -> Option<&'static Season> {
        self.seasons().find(|s| s.status == SeasonStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_attraction_has_a_seed_org() {
        for attraction in TEST_ATTRACTIONS {
            assert!(
                TEST_ORGS.iter().any(|o| o.id == attraction.org_id),
                "attraction {} points at a missing org",
                attraction.slug
            );
        }
    }

    #[test]
    fn test_org_lookup() {
        let org = org_by_slug("spooky-hollow").unwrap();
        assert_eq!(org.tier, Tier::Free);
        assert!(org_by_slug("nope").is_none());
    }

    #[test]
    fn test_active_season() {
        let season = HAUNTED_MANSION.active_season().unwrap();
        assert_eq!(season.year, 2025);
        assert_eq!(NIGHTMARE_MANOR.attractions().count(), 2);
        assert!(ZOMBIE_MAZE.active_season().is_none());
    }
}
