//! # Emporium Testing
//!
//! Deterministic test utilities shared across the workspace. Production code
//! must not depend on this crate.

use chrono::{DateTime, Utc};
use emporium_core::environment::Clock;

/// A clock frozen at a fixed instant.
///
/// Makes `created` timestamps reproducible: every event committed under this
/// clock carries the same instant, so envelope assertions can compare against
/// a literal.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Freeze the clock at the given instant.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// The frozen instant.
    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// The canonical test clock: frozen at `2025-01-01T00:00:00Z`.
#[must_use]
pub fn test_clock() -> FixedClock {
    // 2025-01-01T00:00:00Z as a unix timestamp.
    FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_frozen_at_the_canonical_instant() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(clock.now(), clock.now());
    }
}
