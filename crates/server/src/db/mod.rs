//! Database operations for the store `PostgreSQL`.
//!
//! ## Tables
//!
//! - `categories`, `products` - Catalog
//! - `carts`, `cart_items` - Session carts with price snapshots
//! - `store_policy`, `delivery_zones`, `holidays` - Store configuration
//! - `orders`, `order_items` - Orders and their lines
//! - `order_status_logs` - Append-only status history
//! - `refunds`, `cancellation_requests` - Post-order adjustments
//! - `audit_logs` - Append-only admin audit trail
//!
//! Each module has a `*Repository` for pool-level reads and free functions
//! taking `&mut PgConnection` for the steps of a transactional mutation.
//! Rows that a mutation re-checks are read with `SELECT ... FOR UPDATE`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p local-market-cli -- migrate
//! ```

pub mod audit;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod refunds;
pub mod store;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use catalog::{CategoryRepository, ProductRepository};
pub use orders::OrderRepository;
pub use refunds::RefundRepository;
pub use store::{HolidayRepository, PolicyRepository, ZoneRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn unique_or_database(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_string());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
