//! Orders, the order status state machine, and cancellation rules.
//!
//! The legal status graph lives in one table, [`allowed_transitions`]. Every
//! status change goes through [`Order::plan_transition`], which either
//! reports a no-op, rejects the move, or returns a [`StatusChange`] carrying
//! the side effects (timestamps, final total) the caller must persist together
//! with a status-log row.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::types::{
    ActorType, CancellationRequestId, DeliveryZoneId, ItemStatus, Money, OrderId, OrderItemId,
    OrderSource, OrderStatus, OrderStatusLogId, ProductId, UserId,
};

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "LM";

/// Bounds on the random order number suffix.
pub const ORDER_NUMBER_SUFFIX_RANGE: core::ops::RangeInclusive<u16> = 100..=999;

/// Accepted length of a free-text reason, in characters.
pub const REASON_LEN_RANGE: core::ops::RangeInclusive<usize> = 2..=300;

/// Reason recorded on the initial status-log row.
pub const ORDER_CREATED_REASON: &str = "ORDER_CREATED";

/// Payment method for every order; the store is cash on delivery only.
pub const PAYMENT_METHOD_COD: &str = "COD";

/// Destinations reachable from `from`, sorted by wire name.
#[must_use]
pub const fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::{Canceled, Delivered, OutForDelivery, Picking, Received, SubstitutionPending};
    match from {
        Received => &[Canceled, Picking],
        Picking => &[Canceled, OutForDelivery, SubstitutionPending],
        SubstitutionPending => &[Canceled, Picking],
        OutForDelivery => &[Delivered],
        Delivered | Canceled => &[],
    }
}

/// Who is acting on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorType,
    pub id: String,
}

impl Actor {
    /// The system itself, e.g. at order creation.
    #[must_use]
    pub fn system() -> Self {
        Self {
            kind: ActorType::System,
            id: "system".to_owned(),
        }
    }

    /// An admin identified by `id`.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            kind: ActorType::Admin,
            id: id.into(),
        }
    }

    /// A customer: `USER_{id}` for members, `CUSTOMER_SELF` for guests.
    #[must_use]
    pub fn customer(user: Option<UserId>) -> Self {
        let id = user.map_or_else(|| "CUSTOMER_SELF".to_owned(), |u| format!("USER_{u}"));
        Self {
            kind: ActorType::Customer,
            id,
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_no: String,
    pub user_id: Option<UserId>,
    pub order_source: OrderSource,
    pub customer_name: String,
    pub customer_phone: String,
    pub phone_verified: bool,
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
    pub total_final: Option<Money>,
    pub status: OrderStatus,
    pub cancelable_until: Option<DateTime<Utc>>,
    pub ordered_at: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A validated status change and its side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    /// Set when moving into PICKING.
    pub picked_at: Option<DateTime<Utc>>,
    /// Set when moving into DELIVERED.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Full-price settlement on delivery when nothing was adjusted.
    pub total_final: Option<Money>,
}

impl Order {
    /// Plan a move to `to` at `now`.
    ///
    /// Returns `Ok(None)` when the order is already in `to`; no log row
    /// should be written in that case.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_STATUS_TRANSITION`, naming the allowed destinations,
    /// for any move not in the transition table.
    pub fn plan_transition(
        &self,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<StatusChange>> {
        let from = self.status;
        if from == to {
            return Ok(None);
        }

        let allowed = allowed_transitions(from);
        if !allowed.contains(&to) {
            let names: Vec<&str> = allowed.iter().map(OrderStatus::as_str).collect();
            return Err(DomainError::new(
                ErrorCode::InvalidStatusTransition,
                format!("cannot move order from {from} to {to} (allowed: [{}])", names.join(", ")),
            ));
        }

        let delivered = to == OrderStatus::Delivered;
        Ok(Some(StatusChange {
            from,
            to,
            at: now,
            picked_at: (to == OrderStatus::Picking).then_some(now),
            delivered_at: delivered.then_some(now),
            total_final: if delivered && self.total_final.is_none() {
                Some(self.total_estimated)
            } else {
                None
            },
        }))
    }

    /// Apply a planned change in memory.
    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.to;
        if let Some(at) = change.picked_at {
            self.picked_at = Some(at);
        }
        if let Some(at) = change.delivered_at {
            self.delivered_at = Some(at);
        }
        if let Some(total) = change.total_final {
            self.total_final = Some(total);
        }
    }

    /// Check that a customer may still cancel this order at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ORDER_NOT_CANCELABLE` once picking has started or the
    /// cancelable-until deadline has passed.
    pub fn check_cancelable(&self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != OrderStatus::Received {
            return Err(DomainError::new(
                ErrorCode::OrderNotCancelable,
                "the order can no longer be canceled once picking has started",
            ));
        }
        if self.cancelable_until.is_some_and(|deadline| now > deadline) {
            return Err(DomainError::new(
                ErrorCode::OrderNotCancelable,
                "the cancellation window has passed",
            ));
        }
        Ok(())
    }

    /// Returns `true` if `phone` matches the phone on the order.
    #[must_use]
    pub fn phone_matches(&self, phone: &str) -> bool {
        self.customer_phone == phone.trim()
    }
}

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name_snapshot: String,
    pub unit_snapshot: String,
    pub qty_ordered: i32,
    pub qty_fulfilled: i32,
    pub unit_price_estimated: Money,
    pub unit_price_final: Option<Money>,
    pub is_weight_item: bool,
    pub est_weight_g: Option<i32>,
    pub final_weight_g: Option<i32>,
    pub line_estimated: Money,
    pub line_final: Option<Money>,
    pub item_status: ItemStatus,
    pub substitution_product_id: Option<ProductId>,
    pub note: Option<String>,
}

/// An append-only record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub id: OrderStatusLogId,
    pub order_id: OrderId,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by_type: ActorType,
    pub changed_by_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A customer's request to cancel, recorded alongside the status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub id: CancellationRequestId,
    pub order_id: OrderId,
    pub reason: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
}

/// Status of a cancellation processed on the spot.
pub const CANCELLATION_APPROVED: &str = "APPROVED";

/// Format an order number from a UTC instant and a numeric suffix.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use local_market_core::order::format_order_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 2, 1, 2, 3).unwrap();
/// assert_eq!(format_order_number(at, 427), "LM20260302010203427");
/// ```
#[must_use]
pub fn format_order_number(at: DateTime<Utc>, suffix: u16) -> String {
    format!("{ORDER_NUMBER_PREFIX}{}{suffix}", at.format("%Y%m%d%H%M%S"))
}

/// Windows applied when an order is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerms {
    /// How long after creation a customer may still cancel.
    pub cancel_window: Duration,
    /// Length of a delivery slot.
    pub slot_length: Duration,
}

impl Default for OrderTerms {
    fn default() -> Self {
        Self {
            cancel_window: Duration::minutes(30),
            slot_length: Duration::hours(1),
        }
    }
}

impl OrderTerms {
    /// Slot end for a requested slot start.
    #[must_use]
    pub fn slot_end(&self, start: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        start.map(|s| s + self.slot_length)
    }

    /// Cancellation deadline for an order created at `now`.
    #[must_use]
    pub fn cancelable_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.cancel_window
    }
}

/// An order line ready to be inserted, with the stock to take for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name_snapshot: String,
    pub unit_snapshot: String,
    pub qty: i32,
    pub unit_price_estimated: Money,
    pub line_estimated: Money,
    pub is_weight_item: bool,
}

/// Re-check stock for one cart line at the moment of order creation.
///
/// `product` must be the row as locked inside the creating transaction.
///
/// # Errors
///
/// Returns `OUT_OF_STOCK` if the product no longer exists and
/// `INSUFFICIENT_STOCK` if fewer than `qty` units remain available.
pub fn reserve_line(
    product: Option<&Product>,
    qty: i32,
    unit_snapshot_price: Money,
) -> DomainResult<NewOrderItem> {
    let product = product
        .ok_or_else(|| DomainError::new(ErrorCode::OutOfStock, "product no longer exists"))?;
    if product.available() < qty {
        return Err(DomainError::new(
            ErrorCode::InsufficientStock,
            format!("not enough stock for {}", product.name),
        ));
    }
    Ok(NewOrderItem {
        product_id: product.id,
        product_name_snapshot: product.name.clone(),
        unit_snapshot: product.unit_label.clone(),
        qty,
        unit_price_estimated: unit_snapshot_price,
        line_estimated: unit_snapshot_price.times(qty),
        is_weight_item: product.is_weight_item,
    })
}

/// Trim and length-check a free-text reason.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` unless the trimmed reason has 2 to 300 characters.
pub fn validate_reason(reason: &str) -> DomainResult<String> {
    let reason = reason.trim();
    if REASON_LEN_RANGE.contains(&reason.chars().count()) {
        Ok(reason.to_owned())
    } else {
        Err(DomainError::invalid_request(
            "reason must be between 2 and 300 characters",
        ))
    }
}
