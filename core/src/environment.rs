//! Dependency-injection traits for the runtime environment.
//!
//! External dependencies are abstracted behind traits and injected at
//! construction time, so tests can substitute deterministic implementations
//! (`emporium-testing` provides `FixedClock`).

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
///
/// The engine reads the clock exactly once per commit, when the event log
/// stamps `created` on a batch. Folds and handlers never read it, which is
/// what keeps state reconstruction deterministic.
///
/// # Examples
///
/// ```ignore
/// // Production - uses the system clock
/// struct SystemClock;
/// impl Clock for SystemClock {
///     fn now(&self) -> DateTime<Utc> {
///         Utc::now()
///     }
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}
