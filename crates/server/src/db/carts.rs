//! Cart repository.

use chrono::{DateTime, Utc};
use local_market_core::cart::{Cart, CartLine};
use local_market_core::{CartId, CartItemId, Money, ProductId, UserId};
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    session_key: String,
    user_id: Option<UserId>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            session_key: row.session_key,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    qty: i32,
    unit_snapshot_price: Money,
    created_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            qty: row.qty,
            unit_snapshot_price: row.unit_snapshot_price,
            created_at: row.created_at,
        }
    }
}

const LINE_COLUMNS: &str = "id, cart_id, product_id, qty, unit_snapshot_price, created_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for pool-level cart maintenance.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Delete carts whose expiry has passed, with their lines.
    ///
    /// Returns the number of carts removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM carts WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Transactional Operations
// =============================================================================

/// Lock the cart for `session_key`, if it exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_session_key(
    conn: &mut PgConnection,
    session_key: &str,
) -> Result<Option<Cart>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        "SELECT id, session_key, user_id, expires_at, created_at
         FROM carts WHERE session_key = $1 FOR UPDATE",
    )
    .bind(session_key)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Insert a new cart.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the session key is taken.
pub async fn insert(
    conn: &mut PgConnection,
    session_key: &str,
    user_id: Option<UserId>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Cart, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        "INSERT INTO carts (session_key, user_id, expires_at, created_at)
         VALUES ($1, $2, $3, $4)
         RETURNING id, session_key, user_id, expires_at, created_at",
    )
    .bind(session_key)
    .bind(user_id)
    .bind(expires_at)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::unique_or_database(e, "session key already in use"))?;

    Ok(row.into())
}

/// Bind an anonymous cart to a user.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn bind_user(
    conn: &mut PgConnection,
    cart_id: CartId,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE carts SET user_id = $2 WHERE id = $1")
        .bind(cart_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Empty an expired cart and push its expiry out again.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn renew(
    conn: &mut PgConnection,
    cart_id: CartId,
    expires_at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    clear_lines(&mut *conn, cart_id).await?;
    sqlx::query("UPDATE carts SET expires_at = $2 WHERE id = $1")
        .bind(cart_id)
        .bind(expires_at)
        .execute(conn)
        .await?;
    Ok(())
}

/// Lines of a cart in insertion order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines(conn: &mut PgConnection, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
    let sql = format!("SELECT {LINE_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, CartLineRow>(&sql)
        .bind(cart_id)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// The line holding `product_id`, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn line_for_product(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<Option<CartLine>, RepositoryError> {
    let sql = format!(
        "SELECT {LINE_COLUMNS} FROM cart_items WHERE cart_id = $1 AND product_id = $2"
    );
    let row = sqlx::query_as::<_, CartLineRow>(&sql)
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// A line by ID, scoped to its cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_line(
    conn: &mut PgConnection,
    cart_id: CartId,
    line_id: CartItemId,
) -> Result<Option<CartLine>, RepositoryError> {
    let sql = format!("SELECT {LINE_COLUMNS} FROM cart_items WHERE cart_id = $1 AND id = $2");
    let row = sqlx::query_as::<_, CartLineRow>(&sql)
        .bind(cart_id)
        .bind(line_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Insert a line.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the product is already in the cart.
pub async fn insert_line(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
    qty: i32,
    unit_snapshot_price: Money,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO cart_items (cart_id, product_id, qty, unit_snapshot_price, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(qty)
    .bind(unit_snapshot_price)
    .bind(now)
    .execute(conn)
    .await
    .map_err(|e| RepositoryError::unique_or_database(e, "product already in cart"))?;
    Ok(())
}

/// Set a line's quantity, and its price snapshot when given.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn update_line(
    conn: &mut PgConnection,
    line_id: CartItemId,
    qty: i32,
    unit_snapshot_price: Option<Money>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE cart_items
         SET qty = $2, unit_snapshot_price = COALESCE($3, unit_snapshot_price)
         WHERE id = $1",
    )
    .bind(line_id)
    .bind(qty)
    .bind(unit_snapshot_price)
    .execute(conn)
    .await?;
    Ok(())
}

/// Delete one line. Returns `false` if it did not exist.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_line(
    conn: &mut PgConnection,
    cart_id: CartId,
    line_id: CartItemId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2")
        .bind(cart_id)
        .bind(line_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every line of a cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_lines(conn: &mut PgConnection, cart_id: CartId) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
