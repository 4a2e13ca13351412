//! Local Market Core - Domain types and business engines.
//!
//! This crate provides the rules shared by every Local Market component:
//! - `server` - Storefront and admin HTTP API
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains types and pure decision logic only - no I/O, no
//! database access, no HTTP. Callers load the relevant rows, hand them to an
//! engine here, and persist whatever the engine decides. This keeps every
//! business rule testable with a pinned clock and in-memory values.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, phone numbers, and status enums
//! - [`error`] - Stable domain error codes
//! - [`clock`] - Injectable time source and store-local time helpers
//! - [`geo`] - Great-circle distance
//! - [`catalog`] - Products, effective price, and price validation
//! - [`cart`] - Cart lines and add-to-cart checks
//! - [`policy`] - Store-wide operating policy and holidays
//! - [`zone`] - Delivery zones and the zone matcher
//! - [`checkout`] - Checkout validation producing a [`checkout::Quote`]
//! - [`order`] - Order model, status state machine, and cancellation rules
//! - [`fulfillment`] - Shortage actions and refund accounting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod error;
pub mod fulfillment;
pub mod geo;
pub mod order;
pub mod policy;
pub mod types;
pub mod zone;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, ErrorCode, ErrorKind};
pub use types::*;
