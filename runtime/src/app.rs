//! The runtime handle: command execution and the correlate/drain loop.
//!
//! [`App`] owns the event log, the aggregate registry, and the
//! reaction/projection registrations with their cursors. Commands flow
//! through a fixed pipeline:
//!
//! 1. route by command name to the registered aggregate,
//! 2. decode and validate the payload,
//! 3. fold the target stream's history into state,
//! 4. evaluate the command's invariants in order,
//! 5. run the handler,
//! 6. append the emitted events atomically at the observed version.
//!
//! Nothing is committed if any step fails. Reactions and projections are
//! never run inline with a commit — they are driven explicitly by
//! [`App::drain`] (or [`App::settle`]), which makes event processing
//! deterministic and testable: callers decide when propagation happens and
//! can observe the intermediate log states.

use crate::log::EventLog;
use crate::projection::Projection;
use crate::reaction::Reaction;
use emporium_core::aggregate::{Aggregate, Snapshot, fold};
use emporium_core::environment::Clock;
use emporium_core::error::CommandError;
use emporium_core::event::{
    ActionCause, Actor, Causation, CommittedEvent, EventCause, EventId, EventMeta,
};
use emporium_core::stream::{StreamId, Version};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The addressee of a command: the target stream plus the acting identity.
#[derive(Clone, Debug)]
pub struct Target {
    /// Stream the command is executed against.
    pub stream: StreamId,
    /// Who is issuing the command; recorded in causation metadata.
    pub actor: Actor,
}

impl Target {
    /// Create a target.
    pub fn new(stream: impl Into<StreamId>, actor: Actor) -> Self {
        Self {
            stream: stream.into(),
            actor,
        }
    }
}

/// Errors detected while assembling an [`App`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// Two aggregates claim the same command name.
    #[error("command '{command}' registered by both '{existing}' and '{aggregate}'")]
    DuplicateCommand {
        /// The contested command name.
        command: &'static str,
        /// Aggregate that registered it first.
        existing: &'static str,
        /// Aggregate attempting to register it again.
        aggregate: &'static str,
    },

    /// Two reactions or two projections share a name (cursor keys collide).
    #[error("duplicate {kind:?} registration '{name}'")]
    DuplicateRegistration {
        /// Whether the collision is among reactions or projections.
        kind: WorkKind,
        /// The contested registration name.
        name: &'static str,
    },
}

/// The kind of registration a piece of pending work belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// Async follow-up handler.
    Reaction,
    /// Synchronous read-model handler.
    Projection,
}

/// One pending work item: a registration that has not yet processed an event.
#[derive(Clone, Debug)]
pub struct Lease {
    /// Name of the reaction or projection.
    pub registration: &'static str,
    /// Registration kind.
    pub kind: WorkKind,
    /// Global id of the pending event.
    pub event_id: EventId,
    /// Name of the pending event.
    pub event_name: String,
    /// Stream of the pending event.
    pub stream: StreamId,
}

/// Result of [`App::correlate`]: the pending work items, unexecuted.
#[derive(Clone, Debug, Default)]
pub struct Correlation {
    /// Pending (registration, event) pairs in cursor-scan order.
    pub leased: Vec<Lease>,
}

impl Correlation {
    /// True when no registration has pending work.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.leased.is_empty()
    }
}

/// Bounds for a [`App::correlate`] scan.
#[derive(Clone, Copy, Debug)]
pub struct CorrelateOptions {
    /// Extra lower bound on event ids; `None` scans from each cursor.
    pub after: Option<EventId>,
    /// Maximum leases reported per registration.
    pub limit: usize,
}

impl Default for CorrelateOptions {
    fn default() -> Self {
        Self {
            after: None,
            limit: 100,
        }
    }
}

/// Bounds for one [`App::drain`] pass.
#[derive(Clone, Copy, Debug)]
pub struct DrainOptions {
    /// Maximum distinct streams each registration touches per pass.
    pub stream_limit: usize,
    /// Maximum events each registration processes per pass.
    pub event_limit: usize,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            stream_limit: 10,
            event_limit: 100,
        }
    }
}

/// What one [`App::drain`] pass accomplished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Events successfully handled by reactions.
    pub reacted: usize,
    /// Events successfully applied by projections.
    pub projected: usize,
    /// Handler failures (cursors left before the failing events).
    pub failed: usize,
}

/// Bounds for [`App::settle`].
#[derive(Clone, Copy, Debug)]
pub struct SettleOptions {
    /// Termination backstop: maximum correlate+drain rounds.
    pub rounds: usize,
    /// Per-round drain bounds.
    pub drain: DrainOptions,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            rounds: 10,
            drain: DrainOptions::default(),
        }
    }
}

/// Result of [`App::settle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettleReport {
    /// Rounds actually run.
    pub rounds_run: usize,
    /// True when the final correlate found no pending work.
    pub quiescent: bool,
}

/// Object-safe view of an aggregate, for the command registry.
///
/// Erases the associated types behind the full decode → fold → invariants →
/// handle → encode pipeline, so the registry can hold heterogeneous
/// aggregates.
trait DynAggregate: Send + Sync {
    fn name(&self) -> &'static str;
    fn command_names(&self) -> &'static [&'static str];
    fn execute(
        &self,
        history: &[CommittedEvent],
        command: &str,
        payload: &Value,
        actor: &Actor,
    ) -> Result<Vec<(&'static str, Value)>, CommandError>;
}

impl<A: Aggregate> DynAggregate for A {
    fn name(&self) -> &'static str {
        Aggregate::name(self)
    }

    fn command_names(&self) -> &'static [&'static str] {
        Aggregate::command_names(self)
    }

    fn execute(
        &self,
        history: &[CommittedEvent],
        command: &str,
        payload: &Value,
        actor: &Actor,
    ) -> Result<Vec<(&'static str, Value)>, CommandError> {
        let decoded = self.decode_command(command, payload)?;
        let snapshot = fold(self, history)?;
        for invariant in self.invariants(&decoded) {
            if !invariant.holds(&snapshot.state) {
                return Err(CommandError::invariant(invariant.description));
            }
        }
        let events = self.handle(&snapshot.state, decoded, actor)?;
        events
            .iter()
            .map(|event| self.encode_event(event))
            .collect()
    }
}

type CursorKey = (WorkKind, &'static str);

struct AppInner {
    log: EventLog,
    routes: HashMap<&'static str, usize>,
    aggregates: Vec<Arc<dyn DynAggregate>>,
    reactions: Vec<Reaction>,
    projections: Vec<Projection>,
    cursors: Mutex<HashMap<CursorKey, EventId>>,
    clock: Arc<dyn Clock>,
}

/// The runtime handle. Cheap to clone; all clones share one log and one set
/// of cursors.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

/// Assembles an [`App`] from aggregates, reactions, and projections.
///
/// Construction is the configuration surface: there are no runtime config
/// files. Registration order is processing order for the drain loop.
pub struct AppBuilder {
    aggregates: Vec<Arc<dyn DynAggregate>>,
    reactions: Vec<Reaction>,
    projections: Vec<Projection>,
    clock: Arc<dyn Clock>,
}

impl AppBuilder {
    /// Start an empty builder with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            aggregates: Vec::new(),
            reactions: Vec::new(),
            projections: Vec::new(),
            clock: Arc::new(crate::clock::SystemClock),
        }
    }

    /// Substitute the clock (deterministic clocks in tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register an aggregate; its command names become routes.
    #[must_use]
    pub fn aggregate<A: Aggregate>(mut self, aggregate: A) -> Self {
        self.aggregates.push(Arc::new(aggregate));
        self
    }

    /// Register a reaction.
    #[must_use]
    pub fn reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    /// Register a projection.
    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projections.push(projection);
        self
    }

    /// Build the app, checking the registries for collisions.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if two aggregates claim the same command name
    /// or two registrations of the same kind share a name.
    pub fn build(self) -> Result<App, BuildError> {
        let mut routes: HashMap<&'static str, usize> = HashMap::new();
        for (index, aggregate) in self.aggregates.iter().enumerate() {
            for &command in aggregate.command_names() {
                if let Some(&existing) = routes.get(command) {
                    return Err(BuildError::DuplicateCommand {
                        command,
                        existing: self.aggregates[existing].name(),
                        aggregate: aggregate.name(),
                    });
                }
                routes.insert(command, index);
            }
        }

        let mut seen: HashSet<CursorKey> = HashSet::new();
        for reaction in &self.reactions {
            if !seen.insert((WorkKind::Reaction, reaction.name())) {
                return Err(BuildError::DuplicateRegistration {
                    kind: WorkKind::Reaction,
                    name: reaction.name(),
                });
            }
        }
        for projection in &self.projections {
            if !seen.insert((WorkKind::Projection, projection.name())) {
                return Err(BuildError::DuplicateRegistration {
                    kind: WorkKind::Projection,
                    name: projection.name(),
                });
            }
        }

        tracing::info!(
            aggregates = self.aggregates.len(),
            reactions = self.reactions.len(),
            projections = self.projections.len(),
            "App built"
        );

        Ok(App {
            inner: Arc::new(AppInner {
                log: EventLog::new(),
                routes,
                aggregates: self.aggregates,
                reactions: self.reactions,
                projections: self.projections,
                cursors: Mutex::new(HashMap::new()),
                clock: self.clock,
            }),
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Execute a command issued directly by a caller.
    ///
    /// Opens a fresh correlation chain: the committed events carry a new
    /// correlation id and an `action` causation naming the command, the
    /// target stream, and the actor.
    ///
    /// # Errors
    ///
    /// Any [`CommandError`] from the pipeline; nothing is committed on error.
    /// A handler that emits no events succeeds with an empty vec.
    pub async fn execute(
        &self,
        command: &str,
        target: Target,
        payload: Value,
    ) -> Result<Vec<CommittedEvent>, CommandError> {
        self.commit(command, &target, &payload, None).await
    }

    /// Execute a command on behalf of a reaction, caused by `cause`.
    ///
    /// Inherits the triggering event's correlation id and records it as
    /// `meta.causation.event`, so the whole causal chain shares one
    /// correlation.
    ///
    /// # Errors
    ///
    /// Same as [`App::execute`].
    pub async fn execute_caused(
        &self,
        command: &str,
        target: Target,
        payload: Value,
        cause: &CommittedEvent,
    ) -> Result<Vec<CommittedEvent>, CommandError> {
        self.commit(command, &target, &payload, Some(cause)).await
    }

    async fn commit(
        &self,
        command: &str,
        target: &Target,
        payload: &Value,
        cause: Option<&CommittedEvent>,
    ) -> Result<Vec<CommittedEvent>, CommandError> {
        let aggregate = self
            .inner
            .routes
            .get(command)
            .and_then(|&index| self.inner.aggregates.get(index))
            .ok_or_else(|| CommandError::UnknownCommand(command.to_string()))?;

        let history = self.inner.log.stream_events(&target.stream).await;
        let expected = Version::new(history.len() as u64);

        let batch = aggregate.execute(&history, command, payload, &target.actor)?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let correlation = cause.map_or_else(
            || Uuid::new_v4().to_string(),
            |event| event.meta.correlation.clone(),
        );
        let meta = EventMeta {
            correlation,
            causation: Causation {
                action: Some(ActionCause {
                    stream: target.stream.clone(),
                    actor: target.actor.clone(),
                    name: Some(command.to_string()),
                }),
                event: cause.map(|event| EventCause {
                    id: event.id,
                    name: event.name.clone(),
                    stream: event.stream.clone(),
                }),
            },
        };

        let committed = self
            .inner
            .log
            .append(
                &target.stream,
                expected,
                batch,
                meta,
                self.inner.clock.as_ref(),
            )
            .await?;

        tracing::info!(
            command,
            aggregate = aggregate.name(),
            stream = %target.stream,
            actor = %target.actor.id,
            events = committed.len(),
            caused_by = cause.map(|e| e.id.value()),
            "Command committed"
        );

        Ok(committed)
    }

    /// Fold a stream's history through an aggregate.
    ///
    /// An empty stream yields the aggregate's init state at version 0.
    ///
    /// # Errors
    ///
    /// [`CommandError::UnknownStream`] if the stream holds events the
    /// aggregate does not emit; [`CommandError::Codec`] on a stored payload
    /// that no longer decodes.
    pub async fn load<A: Aggregate>(
        &self,
        aggregate: &A,
        stream: &StreamId,
    ) -> Result<Snapshot<A::State>, CommandError> {
        let history = self.inner.log.stream_events(stream).await;
        fold(aggregate, &history)
    }

    /// Read committed events in total order; see [`EventLog::query`].
    pub async fn query(&self, after: Option<EventId>, limit: Option<usize>) -> Vec<CommittedEvent> {
        self.inner.log.query(after, limit).await
    }

    pub(crate) fn log(&self) -> &EventLog {
        &self.inner.log
    }

    async fn cursor(&self, key: CursorKey) -> Option<EventId> {
        self.inner.cursors.lock().await.get(&key).copied()
    }

    /// Record progress for a registration. Monotonic: a cursor never moves
    /// backwards, so overlapping drains can only redeliver, never rewind.
    async fn advance_cursor(&self, key: CursorKey, to: EventId) {
        let mut cursors = self.inner.cursors.lock().await;
        let entry = cursors.entry(key).or_insert(to);
        if *entry < to {
            *entry = to;
        }
    }

    /// List pending work without executing it.
    ///
    /// Scans each registration's cursor (reactions first, then projections,
    /// in registration order) for committed events it has not yet processed,
    /// reporting up to `limit` leases per registration. The scan floor is
    /// the registration's cursor, raised to `after` when given.
    pub async fn correlate(&self, options: CorrelateOptions) -> Correlation {
        let mut leased = Vec::new();

        for reaction in &self.inner.reactions {
            let cursor = self.cursor((WorkKind::Reaction, reaction.name())).await;
            self.lease_pending(
                WorkKind::Reaction,
                reaction.name(),
                |name| reaction.handles(name),
                cursor,
                &options,
                &mut leased,
            )
            .await;
        }
        for projection in &self.inner.projections {
            let cursor = self
                .cursor((WorkKind::Projection, projection.name()))
                .await;
            self.lease_pending(
                WorkKind::Projection,
                projection.name(),
                |name| projection.handles(name),
                cursor,
                &options,
                &mut leased,
            )
            .await;
        }

        Correlation { leased }
    }

    async fn lease_pending(
        &self,
        kind: WorkKind,
        registration: &'static str,
        handles: impl Fn(&str) -> bool,
        cursor: Option<EventId>,
        options: &CorrelateOptions,
        leased: &mut Vec<Lease>,
    ) {
        let floor = match (cursor, options.after) {
            (Some(c), Some(a)) => Some(c.max(a)),
            (c, a) => c.or(a),
        };
        let mut taken = 0;
        for event in self.inner.log.query(floor, None).await {
            if taken >= options.limit {
                break;
            }
            if handles(&event.name) {
                leased.push(Lease {
                    registration,
                    kind,
                    event_id: event.id,
                    event_name: event.name,
                    stream: event.stream,
                });
                taken += 1;
            }
        }
    }

    /// Execute pending work, bounded per registration by `options`.
    ///
    /// Each registration processes its pending events in strict commit
    /// order. The cursor advances only when a handler succeeds; on failure
    /// the error is logged, the cursor stays before the failing event, and
    /// that registration's pass ends — the event is retried on a later
    /// drain. Handler failures never propagate to the caller.
    ///
    /// The cursor lock is never held while a handler runs, so handlers are
    /// free to call back into this `App` (commands, queries, even another
    /// correlate or drain). Overlapping drains redeliver at-least-once;
    /// cursors only ever advance.
    pub async fn drain(&self, options: DrainOptions) -> DrainReport {
        let mut report = DrainReport::default();

        for reaction in &self.inner.reactions {
            let key = (WorkKind::Reaction, reaction.name());
            let mut cursor = self.cursor(key).await;
            let mut streams: HashSet<StreamId> = HashSet::new();
            let mut handled = 0;

            for event in self.inner.log.query(cursor, None).await {
                if !reaction.handles(&event.name) {
                    cursor = Some(event.id);
                    continue;
                }
                if handled >= options.event_limit {
                    break;
                }
                if !streams.contains(&event.stream) {
                    if streams.len() >= options.stream_limit {
                        break;
                    }
                    streams.insert(event.stream.clone());
                }

                let event_id = event.id;
                match reaction.run(event, self.clone()).await {
                    Ok(()) => {
                        cursor = Some(event_id);
                        handled += 1;
                        report.reacted += 1;
                    }
                    Err(error) => {
                        tracing::error!(
                            reaction = reaction.name(),
                            event = %event_id,
                            %error,
                            "Reaction failed; will retry on a later drain"
                        );
                        report.failed += 1;
                        break;
                    }
                }
            }

            if let Some(cursor) = cursor {
                self.advance_cursor(key, cursor).await;
            }
        }

        for projection in &self.inner.projections {
            let key = (WorkKind::Projection, projection.name());
            let mut cursor = self.cursor(key).await;
            let mut streams: HashSet<StreamId> = HashSet::new();
            let mut handled = 0;

            for event in self.inner.log.query(cursor, None).await {
                if !projection.handles(&event.name) {
                    cursor = Some(event.id);
                    continue;
                }
                if handled >= options.event_limit {
                    break;
                }
                if !streams.contains(&event.stream) {
                    if streams.len() >= options.stream_limit {
                        break;
                    }
                    streams.insert(event.stream.clone());
                }

                match projection.apply(&event) {
                    Ok(()) => {
                        cursor = Some(event.id);
                        handled += 1;
                        report.projected += 1;
                    }
                    Err(error) => {
                        tracing::error!(
                            projection = projection.name(),
                            event = %event.id,
                            %error,
                            "Projection failed; will retry on a later drain"
                        );
                        report.failed += 1;
                        break;
                    }
                }
            }

            if let Some(cursor) = cursor {
                self.advance_cursor(key, cursor).await;
            }
        }

        report
    }

    /// Run correlate + drain rounds until quiescence or the round bound.
    ///
    /// Quiescence means a correlate pass found no pending work — every
    /// registration has processed every matching committed event, including
    /// events emitted by reactions during earlier rounds. The round bound is
    /// a termination backstop (a reaction whose handler keeps failing, or
    /// pathological mutual triggering); reaching it is reported, not fatal.
    pub async fn settle(&self, options: SettleOptions) -> SettleReport {
        for round in 0..options.rounds {
            let correlation = self.correlate(CorrelateOptions::default()).await;
            if correlation.is_quiescent() {
                tracing::debug!(rounds = round, "Settled to quiescence");
                return SettleReport {
                    rounds_run: round,
                    quiescent: true,
                };
            }
            self.drain(options.drain).await;
        }

        let quiescent = self
            .correlate(CorrelateOptions::default())
            .await
            .is_quiescent();
        if !quiescent {
            tracing::warn!(
                rounds = options.rounds,
                "Round bound reached before quiescence"
            );
        }
        SettleReport {
            rounds_run: options.rounds,
            quiescent,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)] // Panics fail the test

    use super::*;
    use emporium_core::aggregate::{decode_payload, decode_stored, encode_payload};
    use emporium_core::invariant::Invariant;
    use emporium_testing::test_clock;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Clone, Debug, Default)]
    struct CounterState {
        count: i64,
        closed: bool,
    }

    #[derive(Debug, Deserialize)]
    struct Bump {
        by: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Bumped {
        by: i64,
    }

    enum CounterCommand {
        Bump(Bump),
        Close,
    }

    enum CounterEvent {
        Bumped(Bumped),
        Closed,
    }

    struct Counter;

    impl Aggregate for Counter {
        type State = CounterState;
        type Command = CounterCommand;
        type Event = CounterEvent;

        fn name(&self) -> &'static str {
            "Counter"
        }

        fn init(&self) -> CounterState {
            CounterState::default()
        }

        fn command_names(&self) -> &'static [&'static str] {
            &["Bump", "Close"]
        }

        fn event_names(&self) -> &'static [&'static str] {
            &["Bumped", "Closed"]
        }

        fn decode_command(
            &self,
            name: &str,
            payload: &Value,
        ) -> Result<CounterCommand, CommandError> {
            match name {
                "Bump" => decode_payload(name, payload).map(CounterCommand::Bump),
                "Close" => Ok(CounterCommand::Close),
                other => Err(CommandError::UnknownCommand(other.to_string())),
            }
        }

        fn decode_event(&self, name: &str, data: &Value) -> Result<CounterEvent, CommandError> {
            match name {
                "Bumped" => decode_stored(name, data).map(CounterEvent::Bumped),
                "Closed" => Ok(CounterEvent::Closed),
                other => Err(CommandError::Codec(format!("unexpected event {other}"))),
            }
        }

        fn encode_event(&self, event: &CounterEvent) -> Result<(&'static str, Value), CommandError> {
            match event {
                CounterEvent::Bumped(bumped) => encode_payload("Bumped", bumped),
                CounterEvent::Closed => Ok(("Closed", json!({}))),
            }
        }

        fn patch(&self, state: &mut CounterState, event: &CounterEvent) {
            match event {
                CounterEvent::Bumped(bumped) => state.count += bumped.by,
                CounterEvent::Closed => state.closed = true,
            }
        }

        fn invariants(&self, command: &CounterCommand) -> &'static [Invariant<CounterState>] {
            match command {
                CounterCommand::Bump(_) => &[Invariant {
                    description: "Counter must be open",
                    valid: |state| !state.closed,
                }],
                CounterCommand::Close => &[],
            }
        }

        fn handle(
            &self,
            _state: &CounterState,
            command: CounterCommand,
            _actor: &Actor,
        ) -> Result<Vec<CounterEvent>, CommandError> {
            match command {
                CounterCommand::Bump(bump) => {
                    Ok(vec![CounterEvent::Bumped(Bumped { by: bump.by })])
                }
                CounterCommand::Close => Ok(vec![CounterEvent::Closed]),
            }
        }
    }

    fn app() -> App {
        AppBuilder::new()
            .with_clock(Arc::new(test_clock()))
            .aggregate(Counter)
            .build()
            .unwrap_or_else(|e| panic!("build failed: {e}"))
    }

    fn target(stream: &str) -> Target {
        Target::new(StreamId::new(stream), Actor::new("tester", "Tester"))
    }

    #[tokio::test]
    async fn execute_commits_and_load_refolds() {
        let app = app();
        let committed = app
            .execute("Bump", target("counter-1"), json!({ "by": 5 }))
            .await
            .unwrap_or_default();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].version, Version::new(1));

        let snapshot = app
            .load(&Counter, &StreamId::new("counter-1"))
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(snapshot.state.count, 5);
        assert_eq!(snapshot.version, Version::new(1));
    }

    #[tokio::test]
    async fn unknown_command_is_rejected_before_any_log_access() {
        let app = app();
        let result = app.execute("Nope", target("counter-1"), json!({})).await;
        assert!(matches!(result, Err(CommandError::UnknownCommand(_))));
        assert!(app.query(None, None).await.is_empty());
    }

    #[tokio::test]
    async fn invariant_violation_commits_nothing() {
        let app = app();
        app.execute("Close", target("counter-1"), json!({}))
            .await
            .unwrap_or_default();

        let result = app
            .execute("Bump", target("counter-1"), json!({ "by": 1 }))
            .await;
        assert!(matches!(
            result,
            Err(CommandError::InvariantViolation { ref description }) if description == "Counter must be open"
        ));
        assert_eq!(app.query(None, None).await.len(), 1);
    }

    #[tokio::test]
    async fn direct_commands_open_fresh_correlations() {
        let app = app();
        let first = app
            .execute("Bump", target("counter-1"), json!({ "by": 1 }))
            .await
            .unwrap_or_default();
        let second = app
            .execute("Bump", target("counter-2"), json!({ "by": 1 }))
            .await
            .unwrap_or_default();

        assert_ne!(first[0].meta.correlation, second[0].meta.correlation);
        let action = first[0]
            .meta
            .causation
            .action
            .as_ref()
            .unwrap_or_else(|| panic!("action cause missing"));
        assert_eq!(action.name.as_deref(), Some("Bump"));
        assert_eq!(action.actor.id, "tester");
    }

    #[tokio::test]
    async fn caused_commands_inherit_correlation_and_record_the_event() {
        let app = app();
        let cause = app
            .execute("Bump", target("counter-1"), json!({ "by": 1 }))
            .await
            .unwrap_or_default();
        let caused = app
            .execute_caused(
                "Bump",
                target("counter-2"),
                json!({ "by": 2 }),
                &cause[0],
            )
            .await
            .unwrap_or_default();

        assert_eq!(caused[0].meta.correlation, cause[0].meta.correlation);
        let event_cause = caused[0]
            .meta
            .causation
            .event
            .as_ref()
            .unwrap_or_else(|| panic!("event cause missing"));
        assert_eq!(event_cause.id, cause[0].id);
        assert_eq!(event_cause.name, "Bumped");
    }

    #[tokio::test]
    async fn duplicate_command_names_fail_the_build() {
        let result = AppBuilder::new()
            .aggregate(Counter)
            .aggregate(Counter)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::DuplicateCommand { command: "Bump", .. })
        ));
    }

    #[tokio::test]
    async fn correlate_lists_without_executing() {
        let hits = Arc::new(std::sync::Mutex::new(0));
        let sink = Arc::clone(&hits);
        let app = AppBuilder::new()
            .with_clock(Arc::new(test_clock()))
            .aggregate(Counter)
            .projection(Projection::new("Count", &["Bumped"], move |_| {
                if let Ok(mut guard) = sink.lock() {
                    *guard += 1;
                }
                Ok(())
            }))
            .build()
            .unwrap_or_else(|e| panic!("build failed: {e}"));

        app.execute("Bump", target("counter-1"), json!({ "by": 1 }))
            .await
            .unwrap_or_default();

        let correlation = app.correlate(CorrelateOptions::default()).await;
        assert_eq!(correlation.leased.len(), 1);
        assert_eq!(correlation.leased[0].registration, "Count");
        assert_eq!(correlation.leased[0].kind, WorkKind::Projection);
        assert_eq!(*hits.lock().unwrap_or_else(|e| e.into_inner()), 0);

        app.drain(DrainOptions::default()).await;
        assert_eq!(*hits.lock().unwrap_or_else(|e| e.into_inner()), 1);
        assert!(app.correlate(CorrelateOptions::default()).await.is_quiescent());
    }
}
