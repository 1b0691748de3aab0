//! # Emporium Core
//!
//! Core traits and types for the Emporium event-sourcing runtime.
//!
//! This crate defines the vocabulary shared by the engine (`emporium-runtime`)
//! and the reference domain (`emporium-domain`):
//!
//! - **Stream identity**: [`stream::StreamId`] and [`stream::Version`]
//! - **Events**: the committed-event envelope ([`event::CommittedEvent`]) with
//!   correlation/causation metadata
//! - **Aggregates**: the [`aggregate::Aggregate`] definition trait — initial
//!   state, event fold, command handlers, invariants
//! - **Invariants**: [`invariant::Invariant`] business-rule guards
//! - **Errors**: the [`error::CommandError`] taxonomy returned to command
//!   callers
//! - **Environment**: the [`environment::Clock`] dependency-injection trait
//!
//! ## Design principles
//!
//! - State is derived, never stored: an aggregate's state is the fold of its
//!   stream's events, starting from `init()`.
//! - Folds are pure and deterministic — no clock or randomness inside
//!   `patch`; time enters the system only when the event log stamps a commit.
//! - Commands and events are closed enums per aggregate, dispatched by a
//!   stable string name. No runtime reflection.
//!
//! ## Example
//!
//! ```ignore
//! use emporium_core::aggregate::Aggregate;
//!
//! struct Counter;
//!
//! impl Aggregate for Counter {
//!     type State = CounterState;
//!     type Command = CounterCommand;
//!     type Event = CounterEvent;
//!     // init, patch, handle, codecs...
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod environment;
pub mod error;
pub mod event;
pub mod invariant;
pub mod stream;
