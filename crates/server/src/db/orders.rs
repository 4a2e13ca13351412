//! Order repository: orders, order items, status history and cancellations.

use chrono::{DateTime, Utc};
use local_market_core::fulfillment::ItemAdjustment;
use local_market_core::order::{
    Actor, CancellationRequest, NewOrderItem, Order, OrderItem, StatusChange, StatusLogEntry,
};
use local_market_core::{
    ActorType, CancellationRequestId, DeliveryZoneId, ItemStatus, Money, OrderId, OrderItemId,
    OrderSource, OrderStatus, OrderStatusLogId, ProductId, UserId,
};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;

/// Maximum rows returned by the admin order listing.
pub const ADMIN_LIST_LIMIT: i64 = 200;

/// Statuses whose items still need picking; the picking list default.
pub const PICKING_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Received,
    OrderStatus::Picking,
    OrderStatus::SubstitutionPending,
];

const ORDER_COLUMNS: &str = "id, order_no, user_id, order_source, customer_name, customer_phone, \
     phone_verified, address_line1, address_line2, building, unit_no, delivery_zone_id, \
     requested_slot_start, requested_slot_end, allow_substitution, delivery_request_note, \
     payment_method, payment_status, subtotal_estimated, delivery_fee, total_estimated, \
     total_final, status, cancelable_until, ordered_at, picked_at, delivered_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name_snapshot, unit_snapshot, \
     qty_ordered, qty_fulfilled, unit_price_estimated, unit_price_final, is_weight_item, \
     est_weight_g, final_weight_g, line_estimated, line_final, item_status, \
     substitution_product_id, note";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_no: String,
    user_id: Option<UserId>,
    order_source: OrderSource,
    customer_name: String,
    customer_phone: String,
    phone_verified: bool,
    address_line1: String,
    address_line2: Option<String>,
    building: Option<String>,
    unit_no: Option<String>,
    delivery_zone_id: Option<DeliveryZoneId>,
    requested_slot_start: Option<DateTime<Utc>>,
    requested_slot_end: Option<DateTime<Utc>>,
    allow_substitution: bool,
    delivery_request_note: Option<String>,
    payment_method: String,
    payment_status: String,
    subtotal_estimated: Money,
    delivery_fee: Money,
    total_estimated: Money,
    total_final: Option<Money>,
    status: OrderStatus,
    cancelable_until: Option<DateTime<Utc>>,
    ordered_at: DateTime<Utc>,
    picked_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_no: row.order_no,
            user_id: row.user_id,
            order_source: row.order_source,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            phone_verified: row.phone_verified,
            address_line1: row.address_line1,
            address_line2: row.address_line2,
            building: row.building,
            unit_no: row.unit_no,
            delivery_zone_id: row.delivery_zone_id,
            requested_slot_start: row.requested_slot_start,
            requested_slot_end: row.requested_slot_end,
            allow_substitution: row.allow_substitution,
            delivery_request_note: row.delivery_request_note,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            subtotal_estimated: row.subtotal_estimated,
            delivery_fee: row.delivery_fee,
            total_estimated: row.total_estimated,
            total_final: row.total_final,
            status: row.status,
            cancelable_until: row.cancelable_until,
            ordered_at: row.ordered_at,
            picked_at: row.picked_at,
            delivered_at: row.delivered_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name_snapshot: String,
    unit_snapshot: String,
    qty_ordered: i32,
    qty_fulfilled: i32,
    unit_price_estimated: Money,
    unit_price_final: Option<Money>,
    is_weight_item: bool,
    est_weight_g: Option<i32>,
    final_weight_g: Option<i32>,
    line_estimated: Money,
    line_final: Option<Money>,
    item_status: ItemStatus,
    substitution_product_id: Option<ProductId>,
    note: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name_snapshot: row.product_name_snapshot,
            unit_snapshot: row.unit_snapshot,
            qty_ordered: row.qty_ordered,
            qty_fulfilled: row.qty_fulfilled,
            unit_price_estimated: row.unit_price_estimated,
            unit_price_final: row.unit_price_final,
            is_weight_item: row.is_weight_item,
            est_weight_g: row.est_weight_g,
            final_weight_g: row.final_weight_g,
            line_estimated: row.line_estimated,
            line_final: row.line_final,
            item_status: row.item_status,
            substitution_product_id: row.substitution_product_id,
            note: row.note,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusLogRow {
    id: OrderStatusLogId,
    order_id: OrderId,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    changed_by_type: ActorType,
    changed_by_id: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<StatusLogRow> for StatusLogEntry {
    fn from(row: StatusLogRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            from_status: row.from_status,
            to_status: row.to_status,
            changed_by_type: row.changed_by_type,
            changed_by_id: row.changed_by_id,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CancellationRow {
    id: CancellationRequestId,
    order_id: OrderId,
    reason: String,
    status: String,
    requested_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    processed_by: Option<String>,
}

impl From<CancellationRow> for CancellationRequest {
    fn from(row: CancellationRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            reason: row.reason,
            status: row.status,
            requested_at: row.requested_at,
            processed_at: row.processed_at,
            processed_by: row.processed_by,
        }
    }
}

/// One line of the picking list, joined with its order and product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PickingRow {
    pub order_id: OrderId,
    pub order_no: String,
    pub order_status: OrderStatus,
    pub ordered_at: DateTime<Utc>,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub order_item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_label: String,
    pub qty_ordered: i32,
    pub qty_fulfilled: i32,
    pub pick_location: Option<String>,
}

/// Values for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: Option<UserId>,
    pub order_source: OrderSource,
    pub customer_name: String,
    pub customer_phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub building: Option<String>,
    pub unit_no: Option<String>,
    pub delivery_zone_id: Option<DeliveryZoneId>,
    pub requested_slot_start: Option<DateTime<Utc>>,
    pub requested_slot_end: Option<DateTime<Utc>>,
    pub allow_substitution: bool,
    pub delivery_request_note: Option<String>,
    pub payment_method: String,
    pub payment_status: String,
    pub subtotal_estimated: Money,
    pub delivery_fee: Money,
    pub total_estimated: Money,
    pub cancelable_until: DateTime<Utc>,
    pub ordered_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE ($1::order_status IS NULL OR status = $1)
             ORDER BY ordered_at DESC, id DESC
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(status)
            .bind(ADMIN_LIST_LIMIT)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Get an order by its public order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_order_no(&self, order_no: &str) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_no)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Items of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, OrderItemRow>(&sql)
            .bind(order_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Status history of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_logs(&self, order_id: OrderId) -> Result<Vec<StatusLogEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusLogRow>(
            "SELECT id, order_id, from_status, to_status, changed_by_type, changed_by_id,
                    reason, created_at
             FROM order_status_logs
             WHERE order_id = $1
             ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Cancellation requests of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancellations(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<CancellationRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, CancellationRow>(
            "SELECT id, order_id, reason, status, requested_at, processed_at, processed_by
             FROM cancellation_requests
             WHERE order_id = $1
             ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Items of every order in one of `statuses`, oldest order first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn picking_rows(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<PickingRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, PickingRow>(
            "SELECT o.id AS order_id, o.order_no, o.status AS order_status, o.ordered_at,
                    o.requested_slot_start, i.id AS order_item_id, i.product_id,
                    i.product_name_snapshot AS product_name, i.unit_snapshot AS unit_label,
                    i.qty_ordered, i.qty_fulfilled, p.pick_location
             FROM order_items i
             JOIN orders o ON o.id = i.order_id
             LEFT JOIN products p ON p.id = i.product_id
             WHERE o.status = ANY($1)
             ORDER BY o.ordered_at, o.id, i.id",
        )
        .bind(statuses.to_vec())
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Transactional Operations
// =============================================================================

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Lock an order row by order number.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_order_no(
    conn: &mut PgConnection,
    order_no: &str,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_no)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Insert an order in RECEIVED.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number is taken.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder) -> Result<Order, RepositoryError> {
    let sql = format!(
        "INSERT INTO orders (order_no, user_id, order_source, customer_name, customer_phone,
             address_line1, address_line2, building, unit_no, delivery_zone_id,
             requested_slot_start, requested_slot_end, allow_substitution,
             delivery_request_note, payment_method, payment_status, subtotal_estimated,
             delivery_fee, total_estimated, status, cancelable_until, ordered_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
             $18, $19, $20, $21, $22)
         RETURNING {ORDER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(&order.order_no)
        .bind(order.user_id)
        .bind(order.order_source)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.address_line1)
        .bind(&order.address_line2)
        .bind(&order.building)
        .bind(&order.unit_no)
        .bind(order.delivery_zone_id)
        .bind(order.requested_slot_start)
        .bind(order.requested_slot_end)
        .bind(order.allow_substitution)
        .bind(&order.delivery_request_note)
        .bind(&order.payment_method)
        .bind(&order.payment_status)
        .bind(order.subtotal_estimated)
        .bind(order.delivery_fee)
        .bind(order.total_estimated)
        .bind(OrderStatus::Received)
        .bind(order.cancelable_until)
        .bind(order.ordered_at)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::unique_or_database(e, "order number already exists"))?;

    Ok(row.into())
}

/// Insert one order item. Fulfilled quantity starts equal to the ordered quantity.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &NewOrderItem,
) -> Result<OrderItem, RepositoryError> {
    let sql = format!(
        "INSERT INTO order_items (order_id, product_id, product_name_snapshot, unit_snapshot,
             qty_ordered, qty_fulfilled, unit_price_estimated, is_weight_item, line_estimated,
             item_status)
         VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9)
         RETURNING {ITEM_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.product_name_snapshot)
        .bind(&item.unit_snapshot)
        .bind(item.qty)
        .bind(item.unit_price_estimated)
        .bind(item.is_weight_item)
        .bind(item.line_estimated)
        .bind(ItemStatus::Confirmed)
        .fetch_one(conn)
        .await?;

    Ok(row.into())
}

/// Persist a planned status change.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn apply_status(
    conn: &mut PgConnection,
    id: OrderId,
    change: &StatusChange,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE orders SET status = $2,
             picked_at = COALESCE($3, picked_at),
             delivered_at = COALESCE($4, delivered_at),
             total_final = COALESCE($5, total_final)
         WHERE id = $1",
    )
    .bind(id)
    .bind(change.to)
    .bind(change.picked_at)
    .bind(change.delivered_at)
    .bind(change.total_final)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Append one status-log row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn append_status_log(
    conn: &mut PgConnection,
    order_id: OrderId,
    from: Option<OrderStatus>,
    to: OrderStatus,
    actor: &Actor,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO order_status_logs
             (order_id, from_status, to_status, changed_by_type, changed_by_id, reason, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(actor.kind)
    .bind(&actor.id)
    .bind(reason)
    .bind(at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Set the order's final total.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_total_final(
    conn: &mut PgConnection,
    id: OrderId,
    total_final: Money,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET total_final = $2 WHERE id = $1")
        .bind(id)
        .bind(total_final)
        .execute(conn)
        .await?;
    Ok(())
}

/// Lock an order item row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_item(
    conn: &mut PgConnection,
    id: OrderItemId,
) -> Result<Option<OrderItem>, RepositoryError> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Write a shortage adjustment onto an item.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the item does not exist.
pub async fn update_item(
    conn: &mut PgConnection,
    id: OrderItemId,
    adjustment: &ItemAdjustment,
) -> Result<OrderItem, RepositoryError> {
    let sql = format!(
        "UPDATE order_items SET qty_fulfilled = $2, unit_price_final = $3, line_final = $4,
             item_status = $5, substitution_product_id = $6, note = COALESCE($7, note)
         WHERE id = $1
         RETURNING {ITEM_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(id)
        .bind(adjustment.qty_fulfilled)
        .bind(adjustment.unit_price_final)
        .bind(adjustment.line_final)
        .bind(adjustment.item_status)
        .bind(adjustment.substitution_product_id)
        .bind(&adjustment.note)
        .fetch_optional(conn)
        .await?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

/// Record an already-processed cancellation request.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_cancellation(
    conn: &mut PgConnection,
    order_id: OrderId,
    reason: &str,
    status: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> Result<CancellationRequest, RepositoryError> {
    let row = sqlx::query_as::<_, CancellationRow>(
        "INSERT INTO cancellation_requests
             (order_id, reason, status, requested_at, processed_at, processed_by)
         VALUES ($1, $2, $3, $4, $4, $5)
         RETURNING id, order_id, reason, status, requested_at, processed_at, processed_by",
    )
    .bind(order_id)
    .bind(reason)
    .bind(status)
    .bind(at)
    .bind(&actor.id)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}
