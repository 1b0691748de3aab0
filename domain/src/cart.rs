//! The Cart aggregate: submit an order, then publish it.
//!
//! A cart stream goes `Open → Submitted → Published`. `PlaceOrder` is the
//! only caller-facing command; `PublishCart` is issued by the
//! [`publish_cart_reaction`] after a submission, carrying the submitted
//! products forward so the published event is self-contained.
//!
//! The order total is snapshotted into `CartSubmitted` at submission time
//! (prices are strings on the wire; unparseable ones count as zero, matching
//! the web clients this feed serves). Replays never recompute it.

use emporium_core::aggregate::{Aggregate, decode_payload, decode_stored, encode_payload};
use emporium_core::error::CommandError;
use emporium_core::event::Actor;
use emporium_core::invariant::Invariant;
use emporium_runtime::{Reaction, ReactionError, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One product line in a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Cart-local line id.
    pub item_id: String,
    /// Product display name.
    pub name: String,
    /// Product description.
    pub description: String,
    /// Unit price as entered by the client (string on the wire).
    pub price: String,
    /// The product this line refers to.
    pub product_id: String,
}

/// Lifecycle of a cart stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartStatus {
    /// Accepting a `PlaceOrder`.
    #[default]
    Open,
    /// Order placed, awaiting publication.
    Submitted,
    /// Published to downstream consumers.
    Published,
}

/// Folded cart state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartState {
    /// Current lifecycle position.
    pub status: CartStatus,
    /// Total of the submitted order, zero while open.
    pub total_price: f64,
}

/// Submit the cart's items as an order.
#[derive(Debug, Deserialize)]
pub struct PlaceOrder {
    /// The order lines; must be non-empty.
    pub items: Vec<CartItem>,
}

/// Publish a submitted cart. Issued by the reaction engine, never directly
/// by callers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishCart {
    /// The products of the submission being published.
    pub ordered_products: Vec<CartItem>,
    /// The snapshotted order total.
    pub total_price: f64,
}

/// An order was placed on this cart.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSubmitted {
    /// The ordered lines, as submitted.
    pub ordered_products: Vec<CartItem>,
    /// Sum of the line prices at submission time.
    pub total_price: f64,
}

/// A submitted cart was published.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPublished {
    /// The published products (copied from the submission).
    pub ordered_products: Vec<CartItem>,
    /// The published total.
    pub total_price: f64,
}

/// Commands accepted by [`Cart`].
pub enum CartCommand {
    /// Submit the cart.
    PlaceOrder(PlaceOrder),
    /// Publish a submitted cart.
    PublishCart(PublishCart),
}

/// Events emitted by [`Cart`].
pub enum CartEvent {
    /// See [`CartSubmitted`].
    Submitted(CartSubmitted),
    /// See [`CartPublished`].
    Published(CartPublished),
}

const MUST_BE_OPEN: &[Invariant<CartState>] = &[Invariant {
    description: "Cart must be open",
    valid: |state| state.status == CartStatus::Open,
}];

/// The cart aggregate definition.
pub struct Cart;

impl Aggregate for Cart {
    type State = CartState;
    type Command = CartCommand;
    type Event = CartEvent;

    fn name(&self) -> &'static str {
        "Cart"
    }

    fn init(&self) -> CartState {
        CartState::default()
    }

    fn command_names(&self) -> &'static [&'static str] {
        &["PlaceOrder", "PublishCart"]
    }

    fn event_names(&self) -> &'static [&'static str] {
        &["CartSubmitted", "CartPublished"]
    }

    fn decode_command(&self, name: &str, payload: &Value) -> Result<CartCommand, CommandError> {
        match name {
            "PlaceOrder" => {
                let command: PlaceOrder = decode_payload(name, payload)?;
                if command.items.is_empty() {
                    return Err(CommandError::Validation(
                        "PlaceOrder: items must not be empty".to_string(),
                    ));
                }
                Ok(CartCommand::PlaceOrder(command))
            }
            "PublishCart" => decode_payload(name, payload).map(CartCommand::PublishCart),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    fn decode_event(&self, name: &str, data: &Value) -> Result<CartEvent, CommandError> {
        match name {
            "CartSubmitted" => decode_stored(name, data).map(CartEvent::Submitted),
            "CartPublished" => decode_stored(name, data).map(CartEvent::Published),
            other => Err(CommandError::Codec(format!("unexpected event {other}"))),
        }
    }

    fn encode_event(&self, event: &CartEvent) -> Result<(&'static str, Value), CommandError> {
        match event {
            CartEvent::Submitted(submitted) => encode_payload("CartSubmitted", submitted),
            CartEvent::Published(published) => encode_payload("CartPublished", published),
        }
    }

    fn patch(&self, state: &mut CartState, event: &CartEvent) {
        match event {
            CartEvent::Submitted(submitted) => {
                state.status = CartStatus::Submitted;
                state.total_price = submitted.total_price;
            }
            CartEvent::Published(published) => {
                state.status = CartStatus::Published;
                state.total_price = published.total_price;
            }
        }
    }

    fn invariants(&self, command: &CartCommand) -> &'static [Invariant<CartState>] {
        match command {
            CartCommand::PlaceOrder(_) => MUST_BE_OPEN,
            CartCommand::PublishCart(_) => &[],
        }
    }

    fn handle(
        &self,
        _state: &CartState,
        command: CartCommand,
        _actor: &Actor,
    ) -> Result<Vec<CartEvent>, CommandError> {
        match command {
            CartCommand::PlaceOrder(order) => {
                let total_price = order
                    .items
                    .iter()
                    .map(|item| item.price.parse::<f64>().unwrap_or(0.0))
                    .sum();
                Ok(vec![CartEvent::Submitted(CartSubmitted {
                    ordered_products: order.items,
                    total_price,
                })])
            }
            CartCommand::PublishCart(publish) => Ok(vec![CartEvent::Published(CartPublished {
                ordered_products: publish.ordered_products,
                total_price: publish.total_price,
            })]),
        }
    }
}

/// When a cart is submitted, publish it on the same stream as the system
/// actor, carrying the submitted products forward.
#[must_use]
pub fn publish_cart_reaction() -> Reaction {
    Reaction::new("publish-cart", &["CartSubmitted"], |event, app| async move {
        let submitted: CartSubmitted = serde_json::from_value(event.data.clone())
            .map_err(|e| ReactionError::Handler(format!("CartSubmitted: {e}")))?;
        let payload = serde_json::to_value(PublishCart {
            ordered_products: submitted.ordered_products,
            total_price: submitted.total_price,
        })
        .map_err(|e| ReactionError::Handler(format!("PublishCart: {e}")))?;

        let target = Target::new(
            event.stream.clone(),
            Actor::new("system", "CartPublisher"),
        );
        app.execute_caused("PublishCart", target, payload, &event)
            .await?;
        Ok(())
    })
}
