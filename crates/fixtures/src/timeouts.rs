//! Timeout budgets for waits and assertions

use std::time::Duration;

/// Every wait in the harness uses exactly one of these budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fast: Duration,
    pub standard: Duration,
    pub long: Duration,
    pub very_long: Duration,
}

pub const TIMEOUTS: Timeouts = Timeouts {
    fast: Duration::from_secs(5),
    standard: Duration::from_secs(15),
    long: Duration::from_secs(30),
    very_long: Duration::from_secs(60),
};

impl Timeouts {
    /// Same budget for every category; for offline tests
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            fast: timeout,
            standard: timeout,
            long: timeout,
            very_long: timeout,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        TIMEOUTS
    }
}
