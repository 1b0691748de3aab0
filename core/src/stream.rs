//! Event stream identification and versioning types.
//!
//! A [`StreamId`] names one aggregate instance's partition of the event log.
//! A [`Version`] counts the events committed to a stream and drives the
//! optimistic-concurrency check at append time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `StreamId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream ID: {0}")]
pub struct ParseStreamIdError(String);

/// Unique identifier for an event stream (aggregate instance).
///
/// Examples: `"order-12345"`, a cart UUID, a product id like `"prod-espresso"`,
/// or a user's email address.
///
/// # Validation
///
/// - `FromStr::from_str()`: validates input (rejects empty strings)
/// - `From::from()` and `new()`: no validation, for application-controlled ids
///
/// # Examples
///
/// ```
/// use emporium_core::stream::StreamId;
///
/// let stream = StreamId::new("prod-espresso");
/// assert_eq!(stream.as_str(), "prod-espresso");
///
/// let parsed: StreamId = "cart-42".parse().unwrap();
/// assert_eq!(parsed, StreamId::new("cart-42"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new `StreamId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the stream ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `StreamId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamIdError("Stream ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stream version for optimistic concurrency control.
///
/// A stream's version is the number of events committed to it: an empty
/// stream is at [`Version::INITIAL`] (0), and the event at 1-based position
/// `n` within its stream carries version `n`.
///
/// A command executes against the version observed when the aggregate state
/// was folded; if another writer advanced the stream in the interim, the
/// append fails with a concurrency conflict instead of losing an update.
///
/// # Examples
///
/// ```
/// use emporium_core::stream::Version;
///
/// let v0 = Version::INITIAL;
/// let v1 = v0.next();
/// assert_eq!(v1, Version::new(1));
/// assert_eq!(v1.value(), 1);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of an empty stream (0 events).
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    ///
    /// Reaching `u64::MAX` events in one stream is not a realistic concern.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Check if this is the initial version (empty stream).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod stream_id_tests {
        use super::*;

        #[test]
        fn new_creates_stream_id() {
            let id = StreamId::new("cart-123");
            assert_eq!(id.as_str(), "cart-123");
        }

        #[test]
        fn from_string() {
            let id = StreamId::from("prod-1");
            assert_eq!(id.as_str(), "prod-1");

            let id2 = StreamId::from("prod-2".to_string());
            assert_eq!(id2.as_str(), "prod-2");
        }

        #[test]
        #[allow(clippy::expect_used)] // Panics: Test will fail if parse fails
        fn parse_from_str() {
            let id: StreamId = "cart-123".parse().expect("parse should succeed");
            assert_eq!(id, StreamId::new("cart-123"));
        }

        #[test]
        fn parse_empty_string_fails() {
            let result = "".parse::<StreamId>();
            assert!(result.is_err());
        }

        #[test]
        fn display_and_equality() {
            let id1 = StreamId::new("cart-123");
            let id2 = StreamId::new("cart-123");
            assert_eq!(format!("{id1}"), "cart-123");
            assert_eq!(id1, id2);
            assert_ne!(id1, StreamId::new("cart-456"));
        }
    }

    mod version_tests {
        use super::*;

        #[test]
        fn initial_version_is_empty_stream() {
            assert_eq!(Version::INITIAL, Version::new(0));
            assert!(Version::INITIAL.is_initial());
            assert!(!Version::new(1).is_initial());
        }

        #[test]
        fn next_version() {
            let v1 = Version::INITIAL.next();
            let v2 = v1.next();
            assert_eq!(v1, Version::new(1));
            assert_eq!(v2, Version::new(2));
        }

        #[test]
        fn version_ordering() {
            assert!(Version::new(1) < Version::new(2));
            assert!(Version::new(3) > Version::new(1));
        }

        #[test]
        fn version_from_u64_roundtrip() {
            let version = Version::from(42_u64);
            assert_eq!(version.value(), 42);
            let num: u64 = version.into();
            assert_eq!(num, 42);
        }
    }
}
