//! Environment-dependent features that scenarios may require

use serde::Serialize;

/// Optional integrations of the environment under test.
///
/// A scenario that needs a disabled feature is skipped, not failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FeatureFlags {
    /// Stripe Connect onboarding finished for the seed org
    pub stripe_connect: bool,
    /// Check-in scanner enabled
    pub check_in: bool,
    /// Custom storefront pages enabled
    pub storefront_pages: bool,
}

impl FeatureFlags {
    pub const NAMES: [&'static str; 3] = ["stripe_connect", "check_in", "storefront_pages"];

    pub fn all_enabled() -> Self {
        Self {
            stripe_connect: true,
            check_in: true,
            storefront_pages: true,
        }
    }

    /// Build flags from a key lookup, e.g. `|k| std::env::var(k).ok()`.
    ///
    /// Keys are `E2E_FEATURE_STRIPE_CONNECT` and friends; `1`, `true`,
    /// `yes` and `on` enable a flag.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = |name: &str| {
            lookup(&format!("E2E_FEATURE_{}", name.to_uppercase()))
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false)
        };
        Self {
            stripe_connect: enabled("stripe_connect"),
            check_in: enabled("check_in"),
            storefront_pages: enabled("storefront_pages"),
        }
    }

    /// Whether the named flag is on; unknown names are off
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "stripe_connect" => self.stripe_connect,
            "check_in" => self.check_in,
            "storefront_pages" => self.storefront_pages,
            other => {
                tracing::warn!("Unknown feature flag '{}'", other);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("E2E_FEATURE_STRIPE_CONNECT", "true"),
            ("E2E_FEATURE_CHECK_IN", "0"),
        ]
        .into_iter()
        .collect();
        let flags = FeatureFlags::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(flags.stripe_connect);
        assert!(!flags.check_in);
        assert!(!flags.storefront_pages);
    }

    #[test]
    fn test_is_enabled() {
        let flags = FeatureFlags::all_enabled();
        for name in FeatureFlags::NAMES {
            assert!(flags.is_enabled(name));
        }
        assert!(!flags.is_enabled("teleporter"));
    }
}
