//! Business services.
//!
//! Each service borrows the [`AppState`](crate::state::AppState), loads rows
//! through the repositories in [`crate::db`], hands them to the rules in
//! `local_market_core`, and persists the outcome in one transaction.
//!
//! # Services
//!
//! - `carts` - Session carts and line edits
//! - `checkout` - Checkout validation and quotes
//! - `orders` - Order creation, lookup, cancellation and the admin console
//! - `fulfillment` - Shortage actions and refunds
//! - `catalog` - Public catalog and catalog administration
//! - `store_config` - Store policy, delivery zones and holidays

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod fulfillment;
pub mod orders;
pub mod store_config;

pub use carts::{CartService, CartView};
pub use catalog::{CatalogService, ProductQuery, ProductView};
pub use checkout::{CheckoutRequest, CheckoutService, ValidationSummary};
pub use fulfillment::{FulfillmentService, ShortageOutcome};
pub use orders::{
    CancelOutcome, CreateOrderRequest, OrderDetail, OrderService, PickingList, StatusUpdateRequest,
};
pub use store_config::StoreConfigService;
