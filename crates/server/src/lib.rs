//! Local Market server library.
//!
//! HTTP API for a neighborhood grocery delivery store: public catalog,
//! session carts, checkout validation, order placement and the admin
//! fulfillment console. The business rules live in `local_market_core`;
//! this crate loads and persists state around them.
//!
//! # Identity
//!
//! The server trusts an upstream gateway to authenticate callers and pass
//! their identity in headers (`x-user-id`, `x-admin-id`, `x-admin-role`).
//! Never expose it to the internet without that gateway in front.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
