//! The append-only, globally-ordered event log.
//!
//! The log is the only mutable shared resource on the write path. It is
//! append-only: readers never observe partial writes, and a committed event
//! is never mutated or deleted. Appends are atomic per batch — ids, stream
//! versions, and the timestamp are assigned under a single write lock, so a
//! batch commits entirely or not at all.
//!
//! Every successful non-empty append sends a committed notification carrying
//! the id of the last event in the batch. The subscription feed uses it as a
//! wakeup and re-queries the log, so a lagged receiver loses nothing.

use emporium_core::environment::Clock;
use emporium_core::error::CommandError;
use emporium_core::event::{CommittedEvent, EventId, EventMeta};
use emporium_core::stream::{StreamId, Version};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};

/// Capacity of the committed-notification channel. Receivers that fall
/// behind get a `Lagged` error and recover by re-querying the log.
const COMMITTED_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct LogState {
    events: Vec<CommittedEvent>,
    versions: HashMap<StreamId, Version>,
}

/// In-memory append-only event log with optimistic concurrency control.
///
/// Events are numbered globally (strictly increasing, gap-free) and
/// per-stream (1-based versions). The optimistic version check at append is
/// the sole concurrency-safety mechanism — there is no lock manager; stale
/// writers lose, they do not merge.
pub struct EventLog {
    state: RwLock<LogState>,
    committed_tx: broadcast::Sender<EventId>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        let (committed_tx, _) = broadcast::channel(COMMITTED_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(LogState::default()),
            committed_tx,
        }
    }

    /// Append a batch of events to a stream with optimistic concurrency.
    ///
    /// `expected` is the stream version observed when the caller folded its
    /// state. If the stream advanced in the interim the append fails and
    /// nothing is committed. An empty batch is accepted with no log effect.
    ///
    /// All events in the batch share one commit timestamp and the given
    /// metadata; ids and versions are assigned contiguously.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::ConcurrencyConflict`] if the stream's current
    /// version does not match `expected`.
    pub async fn append(
        &self,
        stream: &StreamId,
        expected: Version,
        batch: Vec<(&'static str, Value)>,
        meta: EventMeta,
        clock: &dyn Clock,
    ) -> Result<Vec<CommittedEvent>, CommandError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.write().await;

        let actual = state
            .versions
            .get(stream)
            .copied()
            .unwrap_or(Version::INITIAL);
        if actual != expected {
            return Err(CommandError::ConcurrencyConflict {
                stream: stream.clone(),
                expected,
                actual,
            });
        }

        let created = clock.now();
        let mut version = expected;
        let mut committed = Vec::with_capacity(batch.len());
        for (name, data) in batch {
            version = version.next();
            let event = CommittedEvent {
                id: EventId::new(state.events.len() as u64),
                name: name.to_string(),
                data,
                stream: stream.clone(),
                version,
                created,
                meta: meta.clone(),
            };
            state.events.push(event.clone());
            committed.push(event);
        }
        state.versions.insert(stream.clone(), version);
        drop(state);

        if let Some(last) = committed.last() {
            tracing::debug!(
                stream = %stream,
                first = %committed[0].id,
                last = %last.id,
                count = committed.len(),
                "Events committed"
            );
            // No receivers is fine — nobody is subscribed yet.
            let _ = self.committed_tx.send(last.id);
        }

        Ok(committed)
    }

    /// Query committed events in total id order.
    ///
    /// `after = None` reads from the beginning (the wire protocol's `-1`);
    /// `after = Some(id)` reads strictly after that id. `limit = None` reads
    /// to the end of the log.
    pub async fn query(&self, after: Option<EventId>, limit: Option<usize>) -> Vec<CommittedEvent> {
        let state = self.state.read().await;
        // Ids are dense in the in-memory log, so the lower bound is an index.
        let start = after.map_or(0, |id| (id.value() + 1) as usize);
        let events = state.events.get(start..).unwrap_or(&[]);
        match limit {
            Some(limit) => events.iter().take(limit).cloned().collect(),
            None => events.to_vec(),
        }
    }

    /// All events of one stream, in version order.
    pub async fn stream_events(&self, stream: &StreamId) -> Vec<CommittedEvent> {
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|event| &event.stream == stream)
            .cloned()
            .collect()
    }

    /// Current version of a stream (0 for a stream with no events).
    pub async fn version_of(&self, stream: &StreamId) -> Version {
        let state = self.state.read().await;
        state
            .versions
            .get(stream)
            .copied()
            .unwrap_or(Version::INITIAL)
    }

    /// Number of committed events.
    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }

    /// Subscribe to committed notifications.
    ///
    /// The payload is the id of the last event of each commit batch. This is
    /// a wakeup signal, not a delivery channel — consumers re-query the log.
    #[must_use]
    pub fn subscribe_committed(&self) -> broadcast::Receiver<EventId> {
        self.committed_tx.subscribe()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
