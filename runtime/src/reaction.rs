//! Reactions: async follow-up work driven by committed events.
//!
//! A reaction subscribes to event names and, when driven by the drain loop,
//! runs an async handler that typically issues further commands through
//! [`App::execute_caused`](crate::App::execute_caused) — chaining causally
//! with the triggering event and preserving its correlation id.
//!
//! Delivery is at-least-once: the engine advances a per-reaction cursor only
//! after the handler returns `Ok`, so a failing handler sees the same event
//! again on a later drain. Handlers must therefore tolerate redelivery.

use crate::app::App;
use emporium_core::error::CommandError;
use emporium_core::event::CommittedEvent;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a reaction handler.
///
/// Never propagated to the command caller: the drain loop logs the error and
/// leaves the reaction's cursor before the failing event.
#[derive(Debug, Error)]
pub enum ReactionError {
    /// A follow-up command issued by the handler was rejected.
    #[error("follow-up command failed: {0}")]
    Command(#[from] CommandError),

    /// The handler itself failed.
    #[error("reaction handler failed: {0}")]
    Handler(String),
}

type ReactionHandler =
    Arc<dyn Fn(CommittedEvent, App) -> BoxFuture<'static, Result<(), ReactionError>> + Send + Sync>;

/// A named reaction registration: the event names it listens to plus its
/// async handler.
///
/// # Examples
///
/// ```ignore
/// let publish = Reaction::new("PublishCartSlice", &["CartSubmitted"], |event, app| async move {
///     let target = Target::new(event.stream.clone(), Actor::new("system", "CartPublisher"));
///     app.execute_caused("PublishCart", target, json!({}), &event).await?;
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct Reaction {
    name: &'static str,
    events: &'static [&'static str],
    handler: ReactionHandler,
}

impl Reaction {
    /// Create a reaction from an async handler.
    pub fn new<F, Fut>(name: &'static str, events: &'static [&'static str], handler: F) -> Self
    where
        F: Fn(CommittedEvent, App) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ReactionError>> + Send + 'static,
    {
        Self {
            name,
            events,
            handler: Arc::new(move |event, app| Box::pin(handler(event, app))),
        }
    }

    /// The registration name (cursor key and log field).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Event names this reaction listens to.
    #[must_use]
    pub const fn events(&self) -> &'static [&'static str] {
        self.events
    }

    pub(crate) fn handles(&self, event_name: &str) -> bool {
        self.events.contains(&event_name)
    }

    pub(crate) async fn run(&self, event: CommittedEvent, app: App) -> Result<(), ReactionError> {
        (self.handler)(event, app).await
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("name", &self.name)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
