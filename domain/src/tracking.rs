//! Cart activity tracking: an append-only aggregate plus the activity feed.
//!
//! Tracking streams are keyed by browsing session and accept every activity
//! unconditionally — analytics must never reject or interfere with the
//! shopping flow.

use chrono::{DateTime, Utc};
use emporium_core::aggregate::{Aggregate, decode_payload, decode_stored, encode_payload};
use emporium_core::error::CommandError;
use emporium_core::event::Actor;
use emporium_runtime::{Projection, ProjectionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// What the shopper did to their cart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    /// Added a product.
    Add,
    /// Removed a product.
    Remove,
    /// Cleared the cart.
    Clear,
}

/// Record one cart interaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackCartActivity {
    /// The interaction kind.
    pub action: CartAction,
    /// The product involved.
    pub product_id: String,
    /// How many units the interaction concerned.
    pub quantity: u32,
}

/// Folded tracking state: just a tally.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartTrackingState {
    /// Number of activities recorded on this session.
    pub event_count: u64,
}

/// The cart-tracking aggregate definition. No invariants; every activity is
/// accepted.
pub struct CartTracking;

impl Aggregate for CartTracking {
    type State = CartTrackingState;
    type Command = TrackCartActivity;
    type Event = TrackCartActivity;

    fn name(&self) -> &'static str {
        "CartTracking"
    }

    fn init(&self) -> CartTrackingState {
        CartTrackingState::default()
    }

    fn command_names(&self) -> &'static [&'static str] {
        &["TrackCartActivity"]
    }

    fn event_names(&self) -> &'static [&'static str] {
        &["CartActivityTracked"]
    }

    fn decode_command(
        &self,
        name: &str,
        payload: &Value,
    ) -> Result<TrackCartActivity, CommandError> {
        match name {
            "TrackCartActivity" => decode_payload(name, payload),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    fn decode_event(&self, name: &str, data: &Value) -> Result<TrackCartActivity, CommandError> {
        match name {
            "CartActivityTracked" => decode_stored(name, data),
            other => Err(CommandError::Codec(format!("unexpected event {other}"))),
        }
    }

    fn encode_event(
        &self,
        event: &TrackCartActivity,
    ) -> Result<(&'static str, Value), CommandError> {
        encode_payload("CartActivityTracked", event)
    }

    fn patch(&self, state: &mut CartTrackingState, _event: &TrackCartActivity) {
        state.event_count += 1;
    }

    fn handle(
        &self,
        _state: &CartTrackingState,
        command: TrackCartActivity,
        _actor: &Actor,
    ) -> Result<Vec<TrackCartActivity>, CommandError> {
        Ok(vec![command])
    }
}

/// One materialized activity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartActivity {
    /// The tracking session (stream id).
    pub session_id: String,
    /// The interaction kind.
    pub action: CartAction,
    /// The product involved.
    pub product_id: String,
    /// How many units.
    pub quantity: u32,
    /// Commit time of the activity.
    pub timestamp: DateTime<Utc>,
}

/// The activity feed read model: all activities in commit order.
#[derive(Clone, Default)]
pub struct ActivityFeed {
    store: Arc<RwLock<Vec<CartActivity>>>,
}

impl ActivityFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The projection registration maintaining this read model.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let store = Arc::clone(&self.store);
        Projection::new("cart-tracking", &["CartActivityTracked"], move |event| {
            let data: TrackCartActivity = serde_json::from_value(event.data.clone())
                .map_err(|e| ProjectionError::Codec(format!("CartActivityTracked: {e}")))?;
            store
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(CartActivity {
                    session_id: event.stream.to_string(),
                    action: data.action,
                    product_id: data.product_id,
                    quantity: data.quantity,
                    timestamp: event.created,
                });
            Ok(())
        })
    }

    /// All recorded activities, oldest first.
    #[must_use]
    pub fn activities(&self) -> Vec<CartActivity> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop all recorded activities.
    pub fn clear(&self) {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_activity_bumps_the_tally() {
        let mut state = CartTrackingState::default();
        let activity = TrackCartActivity {
            action: CartAction::Add,
            product_id: "p1".to_string(),
            quantity: 2,
        };
        CartTracking.patch(&mut state, &activity);
        CartTracking.patch(&mut state, &activity);
        assert_eq!(state.event_count, 2);
    }

    #[test]
    fn actions_serialize_lowercase() {
        let (name, wire) = CartTracking
            .encode_event(&TrackCartActivity {
                action: CartAction::Clear,
                product_id: "p1".to_string(),
                quantity: 1,
            })
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(name, "CartActivityTracked");
        assert_eq!(wire["action"], "clear");
        assert_eq!(wire["productId"], "p1");
    }

    #[test]
    fn unknown_actions_fail_validation() {
        let result =
            CartTracking.decode_command("TrackCartActivity", &json!({ "action": "buy", "productId": "p1", "quantity": 1 }));
        assert!(matches!(result, Err(CommandError::Validation(_))));
    }
}
