//! Per-scenario test data factory
//!
//! Scenarios mint their own codes, names and slugs instead of mutating the
//! shared seed, and record what they created so the runner can tear it
//! down afterwards. This removes ordering dependencies between scenarios.

use serde::{Deserialize, Serialize};

use crate::unique::{generate_unique_code, generate_unique_name, to_base36, DEFAULT_CODE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    PromoCode,
    TicketType,
    StorefrontPage,
    Organization,
}

/// An entity a scenario created in the environment under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedFixture {
    pub kind: FixtureKind,
    /// Natural key shown in the UI (code, name or title)
    pub key: String,
}

#[derive(Debug)]
pub struct FixtureFactory {
    scope: String,
    created: Vec<CreatedFixture>,
}

impl FixtureFactory {
    /// New factory; `label` is usually the scenario name
    pub fn new(label: &str) -> Self {
        let slug: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect::<String>()
            .to_lowercase();
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let tail = to_base36(millis);
        let tail = &tail[tail.len().saturating_sub(5)..];
        Self {
            scope: format!("{}{}", slug, tail),
            created: Vec::new(),
        }
    }

    /// Short tag unique to this factory
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn code(&self, prefix: &str) -> String {
        generate_unique_code(prefix, DEFAULT_CODE_LENGTH)
    }

    pub fn name(&self, prefix: &str) -> String {
        generate_unique_name(prefix)
    }

    pub fn email(&self, local: &str) -> String {
        format!("e2e+{}-{}@hauntops.test", local, self.scope)
    }

    pub fn slug(&self, prefix: &str) -> String {
        format!(
            "{}-{}",
            prefix.to_lowercase().replace(' ', "-"),
            generate_unique_code("", 8).to_lowercase()
        )
    }

    /// Note that `key` now exists server-side
    pub fn record(&mut self, kind: FixtureKind, key: impl Into<String>) {
        let key = key.into();
        tracing::debug!(scope = %self.scope, ?kind, %key, "Recorded fixture");
        self.created.push(CreatedFixture { kind, key });
    }

    pub fn created(&self) -> &[CreatedFixture] {
        &self.created
    }

    /// Everything recorded, newest first, leaving the ledger empty
    pub fn drain_for_teardown(&mut self) -> Vec<CreatedFixture> {
        let mut drained: Vec<_> = self.created.drain(..).collect();
        drained.reverse();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_is_short_and_lowercase() {
        let factory = FixtureFactory::new("Promo Code: Percentage!");
        assert!(factory.scope().starts_with("promocod"));
        assert!(factory.scope().chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_teardown_order() {
        let mut factory = FixtureFactory::new("t");
        factory.record(FixtureKind::TicketType, "General");
        factory.record(FixtureKind::PromoCode, "SAVE10");

        let drained = factory.drain_for_teardown();
        assert_eq!(drained[0].key, "SAVE10");
        assert_eq!(drained[1].kind, FixtureKind::TicketType);
        assert!(factory.created().is_empty());
    }

    #[test]
    fn test_minted_values() {
        let factory = FixtureFactory::new("refunds");
        assert!(factory.email("buyer").ends_with("@hauntops.test"));
        assert!(factory.email("buyer").contains(factory.scope()));
        assert!(factory.slug("About Us").starts_with("about-us-"));
        assert!(factory.code("RF").starts_with("RF"));
    }
}
