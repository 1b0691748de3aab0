//! The committed-event envelope and its metadata.
//!
//! Events are immutable facts. Once the log assigns an id and a stream
//! version, an event is never mutated or deleted; every other component holds
//! read-only references into the log.
//!
//! # Wire shape
//!
//! [`CommittedEvent`] serializes to the exact envelope external consumers
//! (e.g. a live feed) receive:
//!
//! ```json
//! {
//!   "id": 7,
//!   "name": "CartPublished",
//!   "data": { "orderedProducts": [], "totalPrice": 25.5 },
//!   "stream": "cart-42",
//!   "version": 2,
//!   "created": "2025-01-01T00:00:00Z",
//!   "meta": {
//!     "correlation": "c0ffee...",
//!     "causation": {
//!       "action": { "stream": "cart-42", "actor": { "id": "system", "name": "CartPublisher" }, "name": "PublishCart" },
//!       "event": { "id": 6, "name": "CartSubmitted", "stream": "cart-42" }
//!     }
//!   }
//! }
//! ```
//!
//! # Correlation and causation
//!
//! Every event caused by a reaction carries `meta.causation.event` pointing
//! back to the triggering event and shares the same top-level `correlation`
//! id across the whole causal chain. This is required for tracing and must be
//! preserved exactly by anything that re-emits the envelope.

use crate::stream::{StreamId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Global position of a committed event in the log.
///
/// Ids are strictly increasing and gap-free within a commit batch. Query
/// APIs take `Option<EventId>` as the lower bound, where `None` means
/// "from the beginning" (the `-1` sentinel of the wire protocol).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Create an event id with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The role an actor holds, as carried in event metadata.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrative actor (inventory management, role assignment).
    Admin,
    /// Regular end user.
    User,
}

/// Opaque caller identity passed through to event causation metadata.
///
/// The engine does not authenticate actors; that is the caller's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable actor id (e.g. an email address, or `"system"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional role, omitted from the wire when absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<Role>,
}

impl Actor {
    /// Create an actor without a role.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: None,
        }
    }

    /// Attach a role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// The command invocation that directly caused an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCause {
    /// Target stream of the command.
    pub stream: StreamId,
    /// The actor who issued the command.
    pub actor: Actor,
    /// Command name, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

/// The committed event that triggered the reaction which caused this event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCause {
    /// Global id of the triggering event.
    pub id: EventId,
    /// Name of the triggering event.
    pub name: String,
    /// Stream of the triggering event.
    pub stream: StreamId,
}

/// Pointer from an event back to what directly caused it.
///
/// Direct commands set only `action`; reaction-issued commands set `action`
/// (the reaction's own command) and `event` (the triggering event).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Causation {
    /// The causing command invocation, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub action: Option<ActionCause>,
    /// The triggering event, for reaction-caused commits.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub event: Option<EventCause>,
}

/// Event metadata: the correlation id shared by a causal chain, plus the
/// causation pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Identifier shared by all events in one causal chain.
    pub correlation: String,
    /// What directly caused this event.
    pub causation: Causation,
}

/// An immutable event as committed to the log.
///
/// Exclusively owned by the event log; consumers receive clones or
/// references and never mutate one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommittedEvent {
    /// Global, strictly increasing id.
    pub id: EventId,
    /// Event name (e.g. `"CartSubmitted"`).
    pub name: String,
    /// Schema-validated JSON payload.
    pub data: serde_json::Value,
    /// The stream this event belongs to.
    pub stream: StreamId,
    /// 1-based position of this event within its stream.
    pub version: Version,
    /// Commit timestamp (ISO-8601 on the wire).
    pub created: DateTime<Utc>,
    /// Correlation/causation metadata.
    pub meta: EventMeta,
}

impl fmt::Display for CommittedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} [{}] v{}",
            self.name, self.stream, self.id, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> CommittedEvent {
        CommittedEvent {
            id: EventId::new(6),
            name: "CartSubmitted".to_string(),
            data: json!({ "orderedProducts": [], "totalPrice": 25.5 }),
            stream: StreamId::new("cart-42"),
            version: Version::new(1),
            created: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_default(),
            meta: EventMeta {
                correlation: "corr-1".to_string(),
                causation: Causation {
                    action: Some(ActionCause {
                        stream: StreamId::new("cart-42"),
                        actor: Actor::new("user-1", "Test User"),
                        name: Some("PlaceOrder".to_string()),
                    }),
                    event: None,
                },
            },
        }
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn envelope_wire_shape() {
        let event = sample_event();
        let wire = serde_json::to_value(&event).expect("serialization should succeed");

        assert_eq!(wire["id"], 6);
        assert_eq!(wire["name"], "CartSubmitted");
        assert_eq!(wire["stream"], "cart-42");
        assert_eq!(wire["version"], 1);
        assert_eq!(wire["created"], "2025-01-01T00:00:00Z");
        assert_eq!(wire["meta"]["correlation"], "corr-1");
        assert_eq!(wire["meta"]["causation"]["action"]["actor"]["id"], "user-1");
        // Absent causes and roles are omitted, not null
        assert!(wire["meta"]["causation"].get("event").is_none());
        assert!(wire["meta"]["causation"]["action"]["actor"].get("role").is_none());
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if serialization fails
    fn envelope_roundtrip() {
        let event = sample_event();
        let wire = serde_json::to_string(&event).expect("serialization should succeed");
        let back: CommittedEvent =
            serde_json::from_str(&wire).expect("deserialization should succeed");
        assert_eq!(event, back);
    }

    #[test]
    fn actor_role_serializes_lowercase() {
        let actor = Actor::new("admin@test.com", "Admin").with_role(Role::Admin);
        let wire = serde_json::to_value(&actor).unwrap_or_default();
        assert_eq!(wire["role"], "admin");
    }

    #[test]
    fn event_display() {
        let event = sample_event();
        let display = format!("{event}");
        assert!(display.contains("CartSubmitted"));
        assert!(display.contains("cart-42"));
    }
}
