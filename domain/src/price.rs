//! Product price changes as their own stream.

use emporium_core::aggregate::{Aggregate, decode_payload, decode_stored, encode_payload};
use emporium_core::error::CommandError;
use emporium_core::event::Actor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Set a product's price.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePrice {
    /// The new price.
    pub price: f64,
    /// The product whose price changes.
    pub product_id: String,
}

/// Folded price state: the latest change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceState {
    /// Current price.
    pub price: f64,
    /// The product this stream prices.
    pub product_id: String,
}

/// The price aggregate definition.
pub struct Price;

impl Aggregate for Price {
    type State = PriceState;
    type Command = ChangePrice;
    type Event = ChangePrice;

    fn name(&self) -> &'static str {
        "Price"
    }

    fn init(&self) -> PriceState {
        PriceState::default()
    }

    fn command_names(&self) -> &'static [&'static str] {
        &["ChangePrice"]
    }

    fn event_names(&self) -> &'static [&'static str] {
        &["PriceChanged"]
    }

    fn decode_command(&self, name: &str, payload: &Value) -> Result<ChangePrice, CommandError> {
        match name {
            "ChangePrice" => decode_payload(name, payload),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    fn decode_event(&self, name: &str, data: &Value) -> Result<ChangePrice, CommandError> {
        match name {
            "PriceChanged" => decode_stored(name, data),
            other => Err(CommandError::Codec(format!("unexpected event {other}"))),
        }
    }

    fn encode_event(&self, event: &ChangePrice) -> Result<(&'static str, Value), CommandError> {
        encode_payload("PriceChanged", event)
    }

    fn patch(&self, state: &mut PriceState, event: &ChangePrice) {
        state.price = event.price;
        state.product_id.clone_from(&event.product_id);
    }

    fn handle(
        &self,
        _state: &PriceState,
        command: ChangePrice,
        _actor: &Actor,
    ) -> Result<Vec<ChangePrice>, CommandError> {
        Ok(vec![command])
    }
}
