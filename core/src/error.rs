//! The command error taxonomy.
//!
//! Validation, invariant, and concurrency failures propagate synchronously to
//! the command caller (fail-fast, no silent recovery). Reaction and
//! projection failures have their own error types next to their engines in
//! `emporium-runtime`; they are caught at the engine boundary and logged, not
//! surfaced here.

use crate::stream::{StreamId, Version};
use thiserror::Error;

/// Errors returned when executing a command against a stream.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command payload (or an emitted event payload) did not match its
    /// declared schema. Nothing was applied.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A business-rule invariant rejected the command. No event was emitted
    /// and aggregate state is unchanged.
    #[error("Invariant violated: {description}")]
    InvariantViolation {
        /// Human-readable description of the violated invariant.
        description: String,
    },

    /// Optimistic concurrency conflict: the stream advanced between state
    /// load and append. The caller must reload and retry, or abandon; the
    /// engine never retries automatically.
    #[error("Concurrency conflict on {stream}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The stream where the conflict occurred.
        stream: StreamId,
        /// The version the command executed against.
        expected: Version,
        /// The stream's actual version at append time.
        actual: Version,
    },

    /// No aggregate registered for this command name (misconfiguration).
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The target stream's history belongs to a different aggregate
    /// (misconfiguration — e.g. a cart command aimed at a product stream).
    #[error("Stream {0} does not belong to this aggregate")]
    UnknownStream(StreamId),

    /// Payload encode/decode failed at the engine boundary.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl CommandError {
    /// Shorthand for an [`CommandError::InvariantViolation`].
    #[must_use]
    pub fn invariant(description: impl Into<String>) -> Self {
        Self::InvariantViolation {
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_display() {
        let error = CommandError::ConcurrencyConflict {
            stream: StreamId::new("cart-1"),
            expected: Version::new(1),
            actual: Version::new(2),
        };
        let display = format!("{error}");
        assert!(display.contains("cart-1"));
        assert!(display.contains("expected version 1"));
        assert!(display.contains("found 2"));
    }

    #[test]
    fn invariant_violation_display() {
        let error = CommandError::invariant("Cart must be open");
        assert_eq!(format!("{error}"), "Invariant violated: Cart must be open");
    }

    #[test]
    fn unknown_command_display() {
        let error = CommandError::UnknownCommand("TeleportOrder".to_string());
        assert!(format!("{error}").contains("TeleportOrder"));
    }
}
