//! Per-product inventory: aggregate and read model.
//!
//! Each product has its own stream. All three commands are always legal —
//! inventory management is administrative and append-only; corrections are
//! further adjustments, not rejections.
//!
//! The read model additionally listens to `CartPublished` and decrements the
//! published products' quantities (floored at zero), which is how sales
//! deplete stock without the cart and inventory aggregates ever talking to
//! each other directly.

use crate::cart::CartPublished;
use emporium_core::aggregate::{Aggregate, decode_payload, decode_stored, encode_payload};
use emporium_core::error::CommandError;
use emporium_core::event::Actor;
use emporium_runtime::{Projection, ProjectionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Put a product into stock with its initial details.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportInventory {
    /// The product being stocked.
    pub product_id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
    /// Units on hand.
    pub quantity: u32,
}

/// Correct a product's quantity and price.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustInventory {
    /// The product being adjusted.
    pub product_id: String,
    /// New quantity on hand.
    pub quantity: u32,
    /// New unit price.
    pub price: f64,
}

/// Retire a product from the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecommissionInventory {
    /// The product being retired.
    pub product_id: String,
}

/// Folded per-product inventory state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InventoryState {
    /// The product this stream tracks.
    pub product_id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
    /// Units on hand (zero after decommission).
    pub quantity: u32,
}

/// Commands accepted by [`Inventory`].
pub enum InventoryCommand {
    /// See [`ImportInventory`].
    Import(ImportInventory),
    /// See [`AdjustInventory`].
    Adjust(AdjustInventory),
    /// See [`DecommissionInventory`].
    Decommission(DecommissionInventory),
}

/// Events emitted by [`Inventory`]. Payloads mirror their commands.
pub enum InventoryEvent {
    /// `InventoryImported`.
    Imported(ImportInventory),
    /// `InventoryAdjusted`.
    Adjusted(AdjustInventory),
    /// `InventoryDecommissioned`.
    Decommissioned(DecommissionInventory),
}

/// The per-product inventory aggregate definition.
pub struct Inventory;

impl Aggregate for Inventory {
    type State = InventoryState;
    type Command = InventoryCommand;
    type Event = InventoryEvent;

    fn name(&self) -> &'static str {
        "Inventory"
    }

    fn init(&self) -> InventoryState {
        InventoryState::default()
    }

    fn command_names(&self) -> &'static [&'static str] {
        &["ImportInventory", "AdjustInventory", "DecommissionInventory"]
    }

    fn event_names(&self) -> &'static [&'static str] {
        &[
            "InventoryImported",
            "InventoryAdjusted",
            "InventoryDecommissioned",
        ]
    }

    fn decode_command(&self, name: &str, payload: &Value) -> Result<InventoryCommand, CommandError> {
        match name {
            "ImportInventory" => decode_payload(name, payload).map(InventoryCommand::Import),
            "AdjustInventory" => decode_payload(name, payload).map(InventoryCommand::Adjust),
            "DecommissionInventory" => {
                decode_payload(name, payload).map(InventoryCommand::Decommission)
            }
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    fn decode_event(&self, name: &str, data: &Value) -> Result<InventoryEvent, CommandError> {
        match name {
            "InventoryImported" => decode_stored(name, data).map(InventoryEvent::Imported),
            "InventoryAdjusted" => decode_stored(name, data).map(InventoryEvent::Adjusted),
            "InventoryDecommissioned" => {
                decode_stored(name, data).map(InventoryEvent::Decommissioned)
            }
            other => Err(CommandError::Codec(format!("unexpected event {other}"))),
        }
    }

    fn encode_event(&self, event: &InventoryEvent) -> Result<(&'static str, Value), CommandError> {
        match event {
            InventoryEvent::Imported(imported) => encode_payload("InventoryImported", imported),
            InventoryEvent::Adjusted(adjusted) => encode_payload("InventoryAdjusted", adjusted),
            InventoryEvent::Decommissioned(decommissioned) => {
                encode_payload("InventoryDecommissioned", decommissioned)
            }
        }
    }

    fn patch(&self, state: &mut InventoryState, event: &InventoryEvent) {
        match event {
            InventoryEvent::Imported(imported) => {
                state.product_id.clone_from(&imported.product_id);
                state.name.clone_from(&imported.name);
                state.price = imported.price;
                state.quantity = imported.quantity;
            }
            InventoryEvent::Adjusted(adjusted) => {
                state.product_id.clone_from(&adjusted.product_id);
                state.price = adjusted.price;
                state.quantity = adjusted.quantity;
            }
            InventoryEvent::Decommissioned(_) => {
                state.quantity = 0;
            }
        }
    }

    fn handle(
        &self,
        _state: &InventoryState,
        command: InventoryCommand,
        _actor: &Actor,
    ) -> Result<Vec<InventoryEvent>, CommandError> {
        Ok(vec![match command {
            InventoryCommand::Import(import) => InventoryEvent::Imported(import),
            InventoryCommand::Adjust(adjust) => InventoryEvent::Adjusted(adjust),
            InventoryCommand::Decommission(decommission) => {
                InventoryEvent::Decommissioned(decommission)
            }
        }])
    }
}

/// One product's stock as seen by readers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
    /// Units on hand.
    pub quantity: u32,
}

/// The inventory read model, keyed by product id.
#[derive(Clone, Default)]
pub struct InventoryItems {
    store: Arc<RwLock<HashMap<String, InventoryItem>>>,
}

impl InventoryItems {
    /// Create an empty read model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The projection registration maintaining this read model.
    ///
    /// Adjustments and decrements only touch products that exist; a
    /// decommission removes the entry entirely, so a later re-import starts
    /// a fresh one.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let store = Arc::clone(&self.store);
        Projection::new(
            "inventory",
            &[
                "InventoryImported",
                "InventoryAdjusted",
                "InventoryDecommissioned",
                "CartPublished",
            ],
            move |event| {
                let mut items = store.write().unwrap_or_else(PoisonError::into_inner);
                match event.name.as_str() {
                    "InventoryImported" => {
                        let data: ImportInventory = serde_json::from_value(event.data.clone())
                            .map_err(|e| {
                                ProjectionError::Codec(format!("InventoryImported: {e}"))
                            })?;
                        items.insert(
                            data.product_id,
                            InventoryItem {
                                name: data.name,
                                price: data.price,
                                quantity: data.quantity,
                            },
                        );
                    }
                    "InventoryAdjusted" => {
                        let data: AdjustInventory = serde_json::from_value(event.data.clone())
                            .map_err(|e| {
                                ProjectionError::Codec(format!("InventoryAdjusted: {e}"))
                            })?;
                        if let Some(item) = items.get_mut(&data.product_id) {
                            item.quantity = data.quantity;
                            item.price = data.price;
                        }
                    }
                    "InventoryDecommissioned" => {
                        let data: DecommissionInventory =
                            serde_json::from_value(event.data.clone()).map_err(|e| {
                                ProjectionError::Codec(format!("InventoryDecommissioned: {e}"))
                            })?;
                        items.remove(&data.product_id);
                    }
                    "CartPublished" => {
                        let data: CartPublished = serde_json::from_value(event.data.clone())
                            .map_err(|e| ProjectionError::Codec(format!("CartPublished: {e}")))?;
                        // One decrement per product, combining its line items.
                        let mut counts: HashMap<&str, u32> = HashMap::new();
                        for product in &data.ordered_products {
                            *counts.entry(product.product_id.as_str()).or_default() += 1;
                        }
                        for (product_id, count) in counts {
                            if let Some(item) = items.get_mut(product_id) {
                                item.quantity = item.quantity.saturating_sub(count);
                            }
                        }
                    }
                    _ => {}
                }
                Ok(())
            },
        )
    }

    /// Look up one product's stock.
    #[must_use]
    pub fn get_item(&self, product_id: &str) -> Option<InventoryItem> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .cloned()
    }

    /// All stocked products.
    #[must_use]
    pub fn get_items(&self) -> HashMap<String, InventoryItem> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop all stock entries.
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
    fn decommission_patches_quantity_to_zero_but_keeps_identity() {
        let mut state = InventoryState::default();
        Inventory.patch(
            &mut state,
            &InventoryEvent::Imported(ImportInventory {
                product_id: "p1".to_string(),
                name: "Widget".to_string(),
                price: 4.0,
                quantity: 7,
            }),
        );
        Inventory.patch(
            &mut state,
            &InventoryEvent::Decommissioned(DecommissionInventory {
                product_id: "p1".to_string(),
            }),
        );
        assert_eq!(state.quantity, 0);
        assert_eq!(state.name, "Widget");
        assert_eq!(state.product_id, "p1");
    }

    #[test]
    fn adjust_overwrites_quantity_and_price() {
        let mut state = InventoryState {
            product_id: "p1".to_string(),
            name: "Widget".to_string(),
            price: 4.0,
            quantity: 7,
        };
        Inventory.patch(
            &mut state,
            &InventoryEvent::Adjusted(AdjustInventory {
                product_id: "p1".to_string(),
                quantity: 3,
                price: 5.5,
            }),
        );
        assert_eq!(state.quantity, 3);
        assert!((state.price - 5.5).abs() < f64::EPSILON);
        assert_eq!(state.name, "Widget");
    }

    #[test]
    fn import_command_round_trips_camel_case() {
        let decoded = Inventory.decode_command(
            "ImportInventory",
            &json!({ "productId": "p1", "name": "Widget", "price": 2.0, "quantity": 10 }),
        );
        assert!(matches!(decoded, Ok(InventoryCommand::Import(ref i)) if i.product_id == "p1"));
    }
}
