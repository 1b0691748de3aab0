//! Aggregate definitions: initial state, event fold, command handlers.
//!
//! An aggregate is a pure specification. It names the commands it accepts and
//! the events it may emit (closed enums, dispatched by stable string names),
//! folds events into state, and guards commands with declarative invariants.
//! It performs no I/O: the runtime's command executor owns loading, invariant
//! evaluation, and the atomic append.
//!
//! # Determinism
//!
//! For the same event sequence, [`fold`] must always yield identical state.
//! `patch` and `handle` must not read the wall clock or randomness — any
//! value that varies (prices, timestamps) is snapshotted into the event data
//! at emission time and replayed from there.
//!
//! # Example
//!
//! ```ignore
//! impl Aggregate for Cart {
//!     type State = CartState;
//!     type Command = CartCommand;
//!     type Event = CartEvent;
//!
//!     fn name(&self) -> &'static str { "Cart" }
//!     fn init(&self) -> CartState { CartState::default() }
//!     fn patch(&self, state: &mut CartState, event: &CartEvent) { /* merge */ }
//!     fn handle(&self, state: &CartState, command: CartCommand, actor: &Actor)
//!         -> Result<Vec<CartEvent>, CommandError> { /* emit */ }
//!     // codecs + invariants...
//! }
//! ```

use crate::error::CommandError;
use crate::event::{Actor, CommittedEvent};
use crate::invariant::Invariant;
use crate::stream::Version;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// A pure aggregate definition.
///
/// `State` is the materialized fold result for one stream; `Command` and
/// `Event` are closed enums with name-keyed codecs. The runtime registers
/// aggregates by the command names they declare and routes incoming commands
/// accordingly — no runtime reflection.
pub trait Aggregate: Send + Sync + 'static {
    /// The folded state type.
    type State: Clone + fmt::Debug + Send + Sync;
    /// The closed set of commands this aggregate accepts.
    type Command: Send;
    /// The closed set of events this aggregate emits.
    type Event: Send;

    /// Stable aggregate name, for logging and registry diagnostics.
    fn name(&self) -> &'static str;

    /// The initial state of an empty stream.
    fn init(&self) -> Self::State;

    /// Command names this aggregate accepts, in declaration order.
    fn command_names(&self) -> &'static [&'static str];

    /// Event names this aggregate emits.
    fn event_names(&self) -> &'static [&'static str];

    /// Decode and validate a command payload.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownCommand`] if `name` is not one of
    ///   [`Aggregate::command_names`]
    /// - [`CommandError::Validation`] if the payload does not match the
    ///   command's schema
    fn decode_command(&self, name: &str, payload: &Value) -> Result<Self::Command, CommandError>;

    /// Decode a stored event payload for folding.
    ///
    /// Only called for names in [`Aggregate::event_names`]; a stored payload
    /// that no longer decodes is a [`CommandError::Codec`] defect.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Codec`] on payload mismatch.
    fn decode_event(&self, name: &str, data: &Value) -> Result<Self::Event, CommandError>;

    /// Encode an emitted event to its `(name, payload)` wire pair.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Codec`] if the payload cannot be serialized.
    fn encode_event(&self, event: &Self::Event) -> Result<(&'static str, Value), CommandError>;

    /// Apply one event to the state (partial merge: only the fields the
    /// event speaks to change).
    fn patch(&self, state: &mut Self::State, event: &Self::Event);

    /// Invariants guarding a command, evaluated in order before the handler.
    fn invariants(&self, command: &Self::Command) -> &'static [Invariant<Self::State>] {
        let _ = command;
        &[]
    }

    /// Handle a command against the current state, emitting zero or more
    /// events.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] to reject the command; nothing is committed.
    fn handle(
        &self,
        state: &Self::State,
        command: Self::Command,
        actor: &Actor,
    ) -> Result<Vec<Self::Event>, CommandError>;
}

/// The result of folding a stream: current state plus the version it was
/// observed at (the optimistic-concurrency token).
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<S> {
    /// The folded state.
    pub state: S,
    /// Number of events folded (stream version at load time).
    pub version: Version,
}

/// Fold a stream's committed events into aggregate state.
///
/// Starts from [`Aggregate::init`] and applies each event's patch in order.
/// Transient and recomputed on every load — state is never persisted.
///
/// # Errors
///
/// - [`CommandError::UnknownStream`] if the stream contains an event this
///   aggregate does not emit (the stream belongs to a different aggregate)
/// - [`CommandError::Codec`] if a stored payload fails to decode
pub fn fold<A: Aggregate>(
    aggregate: &A,
    events: &[CommittedEvent],
) -> Result<Snapshot<A::State>, CommandError> {
    let mut state = aggregate.init();
    let mut version = Version::INITIAL;
    for event in events {
        if !aggregate.event_names().contains(&event.name.as_str()) {
            return Err(CommandError::UnknownStream(event.stream.clone()));
        }
        let decoded = aggregate.decode_event(&event.name, &event.data)?;
        aggregate.patch(&mut state, &decoded);
        version = event.version;
    }
    Ok(Snapshot { state, version })
}

/// Decode a command payload into its typed form, reporting schema mismatches
/// as [`CommandError::Validation`].
///
/// # Errors
///
/// Returns [`CommandError::Validation`] if the payload does not deserialize.
pub fn decode_payload<T: DeserializeOwned>(name: &str, payload: &Value) -> Result<T, CommandError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| CommandError::Validation(format!("{name}: {e}")))
}

/// Decode a stored event payload, reporting mismatches as
/// [`CommandError::Codec`].
///
/// # Errors
///
/// Returns [`CommandError::Codec`] if the stored payload does not deserialize.
pub fn decode_stored<T: DeserializeOwned>(name: &str, data: &Value) -> Result<T, CommandError> {
    serde_json::from_value(data.clone()).map_err(|e| CommandError::Codec(format!("{name}: {e}")))
}

/// Encode an event payload to its `(name, json)` wire pair.
///
/// # Errors
///
/// Returns [`CommandError::Codec`] if serialization fails.
pub fn encode_payload<T: Serialize>(
    name: &'static str,
    payload: &T,
) -> Result<(&'static str, Value), CommandError> {
    serde_json::to_value(payload)
        .map(|value| (name, value))
        .map_err(|e| CommandError::Codec(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Causation, EventId, EventMeta};
    use crate::stream::StreamId;
    use chrono::Utc;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TallyState {
        total: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Add {
        amount: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Added {
        amount: i64,
    }

    enum TallyCommand {
        Add(Add),
    }

    enum TallyEvent {
        Added(Added),
    }

    struct Tally;

    impl Aggregate for Tally {
        type State = TallyState;
        type Command = TallyCommand;
        type Event = TallyEvent;

        fn name(&self) -> &'static str {
            "Tally"
        }

        fn init(&self) -> TallyState {
            TallyState::default()
        }

        fn command_names(&self) -> &'static [&'static str] {
            &["Add"]
        }

        fn event_names(&self) -> &'static [&'static str] {
            &["Added"]
        }

        fn decode_command(&self, name: &str, payload: &Value) -> Result<TallyCommand, CommandError> {
            match name {
                "Add" => decode_payload(name, payload).map(TallyCommand::Add),
                other => Err(CommandError::UnknownCommand(other.to_string())),
            }
        }

        fn decode_event(&self, name: &str, data: &Value) -> Result<TallyEvent, CommandError> {
            match name {
                "Added" => decode_stored(name, data).map(TallyEvent::Added),
                other => Err(CommandError::Codec(format!("unexpected event {other}"))),
            }
        }

        fn encode_event(&self, event: &TallyEvent) -> Result<(&'static str, Value), CommandError> {
            match event {
                TallyEvent::Added(added) => encode_payload("Added", added),
            }
        }

        fn patch(&self, state: &mut TallyState, event: &TallyEvent) {
            match event {
                TallyEvent::Added(added) => state.total += added.amount,
            }
        }

        fn handle(
            &self,
            _state: &TallyState,
            command: TallyCommand,
            _actor: &Actor,
        ) -> Result<Vec<TallyEvent>, CommandError> {
            match command {
                TallyCommand::Add(add) => Ok(vec![TallyEvent::Added(Added { amount: add.amount })]),
            }
        }
    }

    fn committed(id: u64, version: u64, name: &str, data: Value) -> CommittedEvent {
        CommittedEvent {
            id: EventId::new(id),
            name: name.to_string(),
            data,
            stream: StreamId::new("tally-1"),
            version: Version::new(version),
            created: Utc::now(),
            meta: EventMeta {
                correlation: "corr".to_string(),
                causation: Causation::default(),
            },
        }
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if fold fails
    fn fold_applies_patches_in_order() {
        let events = vec![
            committed(0, 1, "Added", serde_json::json!({ "amount": 2 })),
            committed(1, 2, "Added", serde_json::json!({ "amount": 40 })),
        ];
        let snapshot = fold(&Tally, &events).expect("fold should succeed");
        assert_eq!(snapshot.state.total, 42);
        assert_eq!(snapshot.version, Version::new(2));
    }

    #[test]
    fn fold_of_empty_stream_is_init_at_version_zero() {
        let snapshot = fold(&Tally, &[]).unwrap_or_else(|_| unreachable!());
        assert_eq!(snapshot.state, TallyState::default());
        assert!(snapshot.version.is_initial());
    }

    #[test]
    fn fold_rejects_foreign_events() {
        let events = vec![committed(0, 1, "CartSubmitted", serde_json::json!({}))];
        let result = fold(&Tally, &events);
        assert!(matches!(result, Err(CommandError::UnknownStream(_))));
    }

    #[test]
    fn decode_command_rejects_bad_payload() {
        let result = Tally.decode_command("Add", &serde_json::json!({ "amount": "nope" }));
        assert!(matches!(result, Err(CommandError::Validation(_))));
    }

    proptest! {
        // Fold determinism: folding the same sequence twice yields identical state.
        #[test]
        fn fold_is_deterministic(amounts in proptest::collection::vec(-1000i64..1000, 0..32)) {
            let events: Vec<CommittedEvent> = amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| {
                    committed(i as u64, i as u64 + 1, "Added", serde_json::json!({ "amount": amount }))
                })
                .collect();

            let first = fold(&Tally, &events).unwrap_or_else(|_| unreachable!());
            let second = fold(&Tally, &events).unwrap_or_else(|_| unreachable!());
            prop_assert_eq!(first.state.clone(), second.state);
            prop_assert_eq!(first.state.total, amounts.iter().sum::<i64>());
        }
    }
}
