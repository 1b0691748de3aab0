//! # Emporium Runtime
//!
//! The engine beneath the Emporium reference domain: an in-memory
//! append-only event log, a command executor with optimistic concurrency and
//! invariant gating, and the reactive machinery (reactions, projections,
//! correlate/drain) that carries committed events out to read models and
//! follow-up commands.
//!
//! ## Core components
//!
//! - [`EventLog`]: globally-ordered, append-only committed events, queryable
//!   by lower bound and limit, with a committed-notification channel
//! - [`App`] / [`AppBuilder`]: the runtime handle — routes commands to
//!   registered aggregates, folds state, guards invariants, appends
//!   atomically, and owns the reaction/projection cursors
//! - [`Reaction`] / [`Projection`]: registrations driven at-least-once, in
//!   commit order, by the correlate/drain loop
//! - [`EventFeed`]: the replay-then-live subscription stream
//!
//! ## Example
//!
//! ```ignore
//! use emporium_runtime::{AppBuilder, Target};
//!
//! let app = AppBuilder::new()
//!     .aggregate(Cart)
//!     .reaction(publish_cart_reaction())
//!     .projection(orders.projection())
//!     .build()?;
//!
//! app.execute("PlaceOrder", target, payload).await?;
//! app.settle(SettleOptions::default()).await;
//! ```

pub mod app;
pub mod clock;
pub mod feed;
pub mod log;
pub mod projection;
pub mod reaction;

pub use app::{
    App, AppBuilder, BuildError, CorrelateOptions, Correlation, DrainOptions, DrainReport, Lease,
    SettleOptions, SettleReport, Target, WorkKind,
};
pub use clock::SystemClock;
pub use feed::EventFeed;
pub use log::EventLog;
pub use projection::{Projection, ProjectionError};
pub use reaction::{Reaction, ReactionError};
