//! The `Shop` context: all aggregates, reactions, projections, and read
//! models wired into one runtime.
//!
//! This is the domain's composition root — the only place that knows the
//! full registry. Everything is configured here at construction time; there
//! are no runtime configuration files.

use crate::cart::{Cart, publish_cart_reaction};
use crate::inventory::{Inventory, InventoryItems};
use crate::orders::Orders;
use crate::price::Price;
use crate::tracking::{ActivityFeed, CartTracking};
use crate::user::{User, UserDirectory};
use emporium_core::environment::Clock;
use emporium_runtime::{App, AppBuilder, BuildError, SettleOptions, SettleReport, SystemClock};
use std::sync::Arc;

/// The assembled e-commerce runtime.
///
/// Cheap to clone; clones share the same log, cursors, and read models.
#[derive(Clone)]
pub struct Shop {
    app: App,
    orders: Orders,
    inventory: InventoryItems,
    users: UserDirectory,
    activities: ActivityFeed,
}

impl Shop {
    /// Assemble the shop with the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the registry is inconsistent; with the
    /// fixed set of aggregates registered here that indicates a programming
    /// error in this module.
    pub fn new() -> Result<Self, BuildError> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Assemble the shop with an injected clock (deterministic in tests).
    ///
    /// # Errors
    ///
    /// See [`Shop::new`].
    pub fn with_clock(clock: Arc<dyn Clock>) -> Result<Self, BuildError> {
        let orders = Orders::new();
        let inventory = InventoryItems::new();
        let users = UserDirectory::new();
        let activities = ActivityFeed::new();

        let app = AppBuilder::new()
            .with_clock(clock)
            .aggregate(Cart)
            .aggregate(Inventory)
            .aggregate(User)
            .aggregate(CartTracking)
            .aggregate(Price)
            .reaction(publish_cart_reaction())
            .projection(orders.projection())
            .projection(inventory.projection())
            .projection(users.projection())
            .projection(activities.projection())
            .build()?;

        tracing::info!("Shop assembled");

        Ok(Self {
            app,
            orders,
            inventory,
            users,
            activities,
        })
    }

    /// The underlying runtime handle (command execution, drain, feed).
    #[must_use]
    pub const fn app(&self) -> &App {
        &self.app
    }

    /// The orders read model.
    #[must_use]
    pub const fn orders(&self) -> &Orders {
        &self.orders
    }

    /// The inventory read model.
    #[must_use]
    pub const fn inventory(&self) -> &InventoryItems {
        &self.inventory
    }

    /// The user directory read model.
    #[must_use]
    pub const fn users(&self) -> &UserDirectory {
        &self.users
    }

    /// The cart-activity feed read model.
    #[must_use]
    pub const fn activities(&self) -> &ActivityFeed {
        &self.activities
    }

    /// Drive reactions and projections until nothing is pending.
    pub async fn settle(&self) -> SettleReport {
        self.app.settle(SettleOptions::default()).await
    }

    /// Clear every read model. The log and cursors are untouched — this is
    /// for tests that re-project or assert from a clean slate.
    pub fn reset_read_models(&self) {
        self.orders.clear();
        self.inventory.clear();
        self.users.clear();
        self.activities.clear();
    }
}
