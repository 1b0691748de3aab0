//! # Emporium Domain
//!
//! The reference e-commerce domain on top of `emporium-runtime`: carts that
//! submit and publish orders, per-product inventory, a user directory,
//! cart-activity tracking, and product prices — each an aggregate with its
//! read models, assembled by [`Shop`].
//!
//! Payload field names follow the external JSON convention (`camelCase`), so
//! serialized events match what web clients and feed consumers expect.

pub mod cart;
pub mod inventory;
pub mod orders;
pub mod price;
pub mod shop;
pub mod tracking;
pub mod user;

pub use shop::Shop;
