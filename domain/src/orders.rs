//! Orders read model, maintained from cart events.
//!
//! Keyed by cart stream. `CartSubmitted` creates the summary; a later
//! `CartPublished` flips the status and stamps `published_at`, leaving the
//! rest untouched. Both handlers are idempotent upserts, so redelivery after
//! a partial drain converges.

use crate::cart::{CartItem, CartSubmitted};
use chrono::{DateTime, Utc};
use emporium_runtime::{Projection, ProjectionError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Publication status of an order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    /// Placed, not yet published.
    Submitted,
    /// Published downstream.
    Published,
}

/// One materialized order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// Current status.
    pub status: OrderStatus,
    /// The ordered lines.
    pub items: Vec<CartItem>,
    /// Snapshotted order total.
    pub total_price: f64,
    /// Id of the actor who placed the order (`"anonymous"` when unknown).
    pub actor_id: String,
    /// When the order was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the order was published, if it has been.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// The orders read model. Cheap to clone; clones share the store.
#[derive(Clone, Default)]
pub struct Orders {
    store: Arc<RwLock<HashMap<String, OrderSummary>>>,
}

impl Orders {
    /// Create an empty read model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The projection registration maintaining this read model.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let store = Arc::clone(&self.store);
        Projection::new(
            "orders",
            &["CartSubmitted", "CartPublished"],
            move |event| {
                let mut orders = store.write().unwrap_or_else(PoisonError::into_inner);
                match event.name.as_str() {
                    "CartSubmitted" => {
                        let data: CartSubmitted = serde_json::from_value(event.data.clone())
                            .map_err(|e| ProjectionError::Codec(format!("CartSubmitted: {e}")))?;
                        let actor_id = event
                            .meta
                            .causation
                            .action
                            .as_ref()
                            .map_or_else(|| "anonymous".to_string(), |a| a.actor.id.clone());
                        orders.insert(
                            event.stream.to_string(),
                            OrderSummary {
                                status: OrderStatus::Submitted,
                                items: data.ordered_products,
                                total_price: data.total_price,
                                actor_id,
                                submitted_at: event.created,
                                published_at: None,
                            },
                        );
                    }
                    "CartPublished" => {
                        if let Some(order) = orders.get_mut(event.stream.as_str()) {
                            order.status = OrderStatus::Published;
                            order.published_at = Some(event.created);
                        }
                    }
                    _ => {}
                }
                Ok(())
            },
        )
    }

    /// Look up one order by cart stream.
    #[must_use]
    pub fn get_order(&self, id: &str) -> Option<OrderSummary> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// All orders as `(cart stream, summary)` pairs.
    #[must_use]
    pub fn get_orders(&self) -> Vec<(String, OrderSummary)> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, order)| (id.clone(), order.clone()))
            .collect()
    }

    /// Orders placed by one actor.
    #[must_use]
    pub fn get_orders_by_actor(&self, actor_id: &str) -> Vec<(String, OrderSummary)> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, order)| order.actor_id == actor_id)
            .map(|(id, order)| (id.clone(), order.clone()))
            .collect()
    }

    /// Drop all materialized orders.
    pub fn clear(&self) {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
