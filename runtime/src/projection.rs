//! Projections: synchronous read-model maintenance driven by committed events.
//!
//! A projection subscribes to event names and applies each matching event to
//! a keyed read model. The drain loop delivers events to each projection in
//! strict commit order and advances its cursor only on success, so handlers
//! see every matching event at least once, in order. Handlers must be
//! idempotent upserts keyed by stream or entity id — redelivery after a
//! partial drain must converge to the same read model.
//!
//! Relative order across different projections is unspecified.

use emporium_core::event::CommittedEvent;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a projection handler.
///
/// Logged at the engine boundary; the projection's cursor stays before the
/// failing event so it is retried on a later drain.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The backing store rejected the write.
    #[error("storage error: {0}")]
    Storage(String),

    /// The event payload did not match the expected schema.
    #[error("codec error: {0}")]
    Codec(String),

    /// Domain-level processing failure.
    #[error("event processing error: {0}")]
    EventProcessing(String),
}

type ProjectionHandler = Arc<dyn Fn(&CommittedEvent) -> Result<(), ProjectionError> + Send + Sync>;

/// A named projection registration: the event names it consumes plus its
/// synchronous handler.
#[derive(Clone)]
pub struct Projection {
    name: &'static str,
    events: &'static [&'static str],
    handler: ProjectionHandler,
}

impl Projection {
    /// Create a projection from a synchronous handler.
    pub fn new<F>(name: &'static str, events: &'static [&'static str], handler: F) -> Self
    where
        F: Fn(&CommittedEvent) -> Result<(), ProjectionError> + Send + Sync + 'static,
    {
        Self {
            name,
            events,
            handler: Arc::new(handler),
        }
    }

    /// The registration name (cursor key and log field).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Event names this projection consumes.
    #[must_use]
    pub const fn events(&self) -> &'static [&'static str] {
        self.events
    }

    pub(crate) fn handles(&self, event_name: &str) -> bool {
        self.events.contains(&event_name)
    }

    pub(crate) fn apply(&self, event: &CommittedEvent) -> Result<(), ProjectionError> {
        (self.handler)(event)
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("name", &self.name)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::event::{Causation, EventId, EventMeta};
    use emporium_core::stream::{StreamId, Version};
    use chrono::Utc;
    use std::sync::Mutex;

    fn committed(name: &str) -> CommittedEvent {
        CommittedEvent {
            id: EventId::new(0),
            name: name.to_string(),
            data: serde_json::json!({}),
            stream: StreamId::new("s"),
            version: Version::new(1),
            created: Utc::now(),
            meta: EventMeta {
                correlation: "corr".to_string(),
                causation: Causation::default(),
            },
        }
    }

    #[test]
    fn apply_invokes_handler_for_registered_names() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let projection = Projection::new("Orders", &["CartSubmitted"], move |event| {
            sink.lock()
                .map_err(|e| ProjectionError::Storage(e.to_string()))?
                .push(event.name.clone());
            Ok(())
        });

        assert!(projection.handles("CartSubmitted"));
        assert!(!projection.handles("UserRegistered"));
        assert!(projection.apply(&committed("CartSubmitted")).is_ok());
        assert_eq!(
            seen.lock().map(|s| s.clone()).unwrap_or_default(),
            vec!["CartSubmitted".to_string()]
        );
    }
}
