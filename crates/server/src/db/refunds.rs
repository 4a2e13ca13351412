//! Refund repository.

use chrono::{DateTime, Utc};
use local_market_core::fulfillment::{NewRefund, Refund};
use local_market_core::{Money, OrderId, RefundId, RefundStatus};
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;

const REFUND_COLUMNS: &str =
    "id, order_id, amount, reason, method, status, processed_by, processed_at";

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: RefundId,
    order_id: OrderId,
    amount: Money,
    reason: String,
    method: String,
    status: RefundStatus,
    processed_by: Option<String>,
    processed_at: DateTime<Utc>,
}

impl From<RefundRow> for Refund {
    fn from(row: RefundRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            amount: row.amount,
            reason: row.reason,
            method: row.method,
            status: row.status,
            processed_by: row.processed_by,
            processed_at: row.processed_at,
        }
    }
}

/// Repository for refund reads.
pub struct RefundRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RefundRepository<'a> {
    /// Create a new refund repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Refunds of an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(&self, order_id: OrderId) -> Result<Vec<Refund>, RepositoryError> {
        let sql = format!(
            "SELECT {REFUND_COLUMNS} FROM refunds
             WHERE order_id = $1
             ORDER BY processed_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(order_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Refunds of an order inside a transaction. The order row should be locked.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<Refund>, RepositoryError> {
    let sql = format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE order_id = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, RefundRow>(&sql)
        .bind(order_id)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Insert a refund.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert(
    conn: &mut PgConnection,
    order_id: OrderId,
    refund: &NewRefund,
    processed_by: &str,
    at: DateTime<Utc>,
) -> Result<Refund, RepositoryError> {
    let sql = format!(
        "INSERT INTO refunds (order_id, amount, reason, method, status, processed_by, processed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {REFUND_COLUMNS}"
    );
    let row = sqlx::query_as::<_, RefundRow>(&sql)
        .bind(order_id)
        .bind(refund.amount)
        .bind(&refund.reason)
        .bind(&refund.method)
        .bind(refund.status)
        .bind(processed_by)
        .bind(at)
        .fetch_one(conn)
        .await?;

    Ok(row.into())
}
