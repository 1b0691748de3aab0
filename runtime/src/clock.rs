//! Production clock implementation.

use chrono::{DateTime, Utc};
use emporium_core::environment::Clock;

/// System clock — reads the real wall clock.
///
/// The deterministic counterpart for tests is `emporium_testing::FixedClock`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
