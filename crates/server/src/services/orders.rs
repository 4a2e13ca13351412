//! Order service: creation, customer lookup and cancellation, and the admin
//! order console.
//!
//! Every mutation runs in one transaction. Order and product rows are locked
//! with `SELECT ... FOR UPDATE` before they are re-checked, so two checkouts
//! racing for the last units of a product serialize on the product row and
//! the loser sees the reduced stock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use local_market_core::catalog::Product;
use local_market_core::clock::SlotStart;
use local_market_core::fulfillment::Refund;
use local_market_core::order::{
    self, Actor, CANCELLATION_APPROVED, CancellationRequest, ORDER_CREATED_REASON, ORDER_NUMBER_SUFFIX_RANGE,
    Order, OrderItem, PAYMENT_METHOD_COD, StatusLogEntry,
};
use local_market_core::zone::LocationQuery;
use local_market_core::{
    DomainError, ErrorCode, OrderId, OrderSource, OrderStatus, PhoneNumber, ProductId, UserId,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgConnection};
use tracing::{debug, info, instrument, warn};

use crate::db::audit::{self, AuditEntry};
use crate::db::orders::{self as order_db, NewOrder, PICKING_STATUSES, PickingRow};
use crate::db::{OrderRepository, RefundRepository, RepositoryError, carts, catalog};
use crate::error::AppError;
use crate::services::carts::open_cart;
use crate::services::checkout::QuoteContext;
use crate::state::AppState;

/// Attempts at drawing an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Payment status of a new cash-on-delivery order.
const PAYMENT_STATUS_PENDING: &str = "PENDING";

/// Audit entity type for orders.
pub const AUDIT_ENTITY_ORDER: &str = "ORDER";

/// Order form as submitted by the storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub session_key: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub unit_no: Option<String>,
    #[serde(flatten)]
    pub location: LocationQuery,
    #[serde(default)]
    pub requested_slot_start: Option<SlotStart>,
    #[serde(default)]
    pub allow_substitution: bool,
    #[serde(default)]
    pub delivery_request_note: Option<String>,
}

/// Checked customer contact fields.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Contact {
    name: String,
    phone: PhoneNumber,
    address_line1: String,
}

impl CreateOrderRequest {
    fn contact(&self) -> Result<Contact, DomainError> {
        let name = self.customer_name.trim();
        if name.is_empty() {
            return Err(DomainError::invalid_request("customer_name is required"));
        }
        let phone = PhoneNumber::parse(&self.customer_phone)
            .map_err(|e| DomainError::invalid_request(format!("customer_phone: {e}")))?;
        let address_line1 = self.address_line1.trim();
        if address_line1.is_empty() {
            return Err(DomainError::invalid_request("address_line1 is required"));
        }
        Ok(Contact {
            name: name.to_owned(),
            phone,
            address_line1: address_line1.to_owned(),
        })
    }
}

/// An order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Admin view of an order: items, history and refunds.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub status_logs: Vec<StatusLogEntry>,
    pub refunds: Vec<Refund>,
    pub cancellations: Vec<CancellationRequest>,
}

/// Who is asking about an order on the storefront.
#[derive(Debug, Clone, Copy)]
pub enum OrderAccess<'a> {
    /// The signed-in owner.
    Member(UserId),
    /// A guest proving ownership with the order's phone number.
    Phone(&'a str),
}

impl<'a> OrderAccess<'a> {
    /// Resolve access from the signed-in user or a phone number.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` when neither is supplied.
    pub fn resolve(user: Option<UserId>, phone: Option<&'a str>) -> Result<Self, DomainError> {
        match (user, phone.map(str::trim).filter(|p| !p.is_empty())) {
            (Some(user), _) => Ok(Self::Member(user)),
            (None, Some(phone)) => Ok(Self::Phone(phone)),
            (None, None) => Err(DomainError::invalid_request(
                "a phone number or a signed-in user is required",
            )),
        }
    }

    /// Returns `true` if this caller may see `order`.
    #[must_use]
    pub fn permits(&self, order: &Order) -> bool {
        match self {
            Self::Member(user) => order.user_id == Some(*user),
            Self::Phone(phone) => order.phone_matches(phone),
        }
    }

    /// Status-log identity of this caller.
    #[must_use]
    pub fn actor(&self) -> Actor {
        match self {
            Self::Member(user) => Actor::customer(Some(*user)),
            Self::Phone(_) => Actor::customer(None),
        }
    }
}

/// Result of a customer cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub ok: bool,
    pub order_no: String,
    pub status: OrderStatus,
}

/// Admin status change request.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Per-product totals on the picking list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickingSummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_label: String,
    pub pick_location: Option<String>,
    pub total_qty_ordered: i32,
    pub order_count: usize,
}

/// Picking list for the warehouse floor.
#[derive(Debug, Clone, Serialize)]
pub struct PickingList {
    pub generated_at: DateTime<Utc>,
    pub order_count: usize,
    pub line_count: usize,
    pub items: Vec<PickingRow>,
    pub summary: Vec<PickingSummary>,
}

impl PickingList {
    /// Build the list from raw rows, keeping rows matching `keyword`.
    ///
    /// The keyword is matched case-insensitively against the order number,
    /// product name and pick location.
    #[must_use]
    pub fn build(rows: Vec<PickingRow>, keyword: Option<&str>, generated_at: DateTime<Utc>) -> Self {
        let keyword = keyword
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);
        let items: Vec<PickingRow> = rows
            .into_iter()
            .filter(|row| keyword.as_deref().is_none_or(|k| row_matches(row, k)))
            .collect();

        let mut summary: HashMap<ProductId, (PickingSummary, Vec<OrderId>)> = HashMap::new();
        for row in &items {
            let (entry, orders) = summary.entry(row.product_id).or_insert_with(|| {
                (
                    PickingSummary {
                        product_id: row.product_id,
                        product_name: row.product_name.clone(),
                        unit_label: row.unit_label.clone(),
                        pick_location: row.pick_location.clone(),
                        total_qty_ordered: 0,
                        order_count: 0,
                    },
                    Vec::new(),
                )
            });
            entry.total_qty_ordered += row.qty_ordered;
            if !orders.contains(&row.order_id) {
                orders.push(row.order_id);
                entry.order_count += 1;
            }
        }

        let mut order_ids: Vec<OrderId> = items.iter().map(|r| r.order_id).collect();
        order_ids.sort_by_key(OrderId::as_i32);
        order_ids.dedup();

        let mut summary: Vec<PickingSummary> = summary.into_values().map(|(s, _)| s).collect();
        summary.sort_by(|a, b| {
            a.pick_location
                .is_none()
                .cmp(&b.pick_location.is_none())
                .then_with(|| a.pick_location.cmp(&b.pick_location))
                .then_with(|| a.product_name.cmp(&b.product_name))
        });

        Self {
            generated_at,
            order_count: order_ids.len(),
            line_count: items.len(),
            items,
            summary,
        }
    }
}

fn row_matches(row: &PickingRow, keyword: &str) -> bool {
    row.order_no.to_lowercase().contains(keyword)
        || row.product_name.to_lowercase().contains(keyword)
        || row
            .pick_location
            .as_deref()
            .is_some_and(|l| l.to_lowercase().contains(keyword))
}

/// Order operations.
pub struct OrderService<'a> {
    state: &'a AppState,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Turn the cart into an order.
    ///
    /// The checkout is re-validated against the product rows as locked in
    /// this transaction. On success the stock is taken, the order and its
    /// items are written with an initial status-log row, and the cart is
    /// emptied. Any failure rolls everything back.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` for bad contact fields, `CHECKOUT_INVALID` with the
    /// quote's errors, `OUT_OF_STOCK` or `INSUFFICIENT_STOCK` if a product
    /// changed since the quote, or a database error.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: &CreateOrderRequest,
        user: Option<UserId>,
    ) -> Result<OrderDetail, AppError> {
        let contact = request.contact()?;
        let context = QuoteContext::load(self.state, request.requested_slot_start).await?;
        let now = self.state.now();
        let terms = self.state.config().order_terms;

        let mut tx = self.state.pool().begin().await?;
        let cart = open_cart(&mut *tx, request.session_key.as_deref(), user, self.state).await?;
        let lines = carts::lines(&mut *tx, cart.id).await?;

        // Lock in id order so concurrent checkouts cannot deadlock.
        let mut product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        product_ids.sort_by_key(ProductId::as_i32);
        product_ids.dedup();
        let mut products: Vec<Product> = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            if let Some(product) = catalog::lock(&mut *tx, id).await? {
                products.push(product);
            }
        }

        // Stock that ran out since the quote is a hard failure, not a quote error.
        let mut new_items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = products.iter().find(|p| p.id == line.product_id);
            new_items.push(order::reserve_line(product, line.qty, line.unit_snapshot_price)?);
        }

        let quote = context.quote(&request.location, &lines, &products);
        if !quote.valid {
            debug!(errors = ?quote.errors, "Checkout rejected at order creation");
            return Err(AppError::CheckoutInvalid {
                errors: quote.errors,
            });
        }

        for item in &new_items {
            catalog::take_stock(&mut *tx, item.product_id, item.qty, now).await?;
        }

        let requested_slot_start = context.slot.map(|s| s.with_timezone(&Utc));
        let new_order = NewOrder {
            order_no: String::new(),
            user_id: user,
            order_source: if user.is_some() {
                OrderSource::Member
            } else {
                OrderSource::Guest
            },
            customer_name: contact.name,
            customer_phone: contact.phone.into_inner(),
            address_line1: contact.address_line1,
            address_line2: trimmed(request.address_line2.as_deref()),
            building: trimmed(request.building.as_deref()),
            unit_no: trimmed(request.unit_no.as_deref()),
            delivery_zone_id: quote.zone_id(),
            requested_slot_start,
            requested_slot_end: terms.slot_end(requested_slot_start),
            allow_substitution: request.allow_substitution,
            delivery_request_note: trimmed(request.delivery_request_note.as_deref()),
            payment_method: PAYMENT_METHOD_COD.to_string(),
            payment_status: PAYMENT_STATUS_PENDING.to_string(),
            subtotal_estimated: quote.subtotal,
            delivery_fee: quote.delivery_fee,
            total_estimated: quote.total_estimated,
            cancelable_until: terms.cancelable_until(now),
            ordered_at: now,
        };
        let created = insert_with_fresh_number(&mut *tx, new_order, now).await?;

        let mut items = Vec::with_capacity(new_items.len());
        for item in &new_items {
            items.push(order_db::insert_item(&mut *tx, created.id, item).await?);
        }

        order_db::append_status_log(
            &mut *tx,
            created.id,
            None,
            OrderStatus::Received,
            &Actor::system(),
            Some(ORDER_CREATED_REASON),
            now,
        )
        .await?;
        carts::clear_lines(&mut *tx, cart.id).await?;

        tx.commit().await?;

        info!(
            order_id = %created.id,
            order_no = %created.order_no,
            total = %created.total_estimated,
            lines = items.len(),
            "Order created"
        );

        Ok(OrderDetail {
            order: created,
            items,
        })
    }

    /// Look up an order for its customer.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` without a user or phone, `ORDER_NOT_FOUND` if no
    /// order matches.
    #[instrument(skip(self, phone))]
    pub async fn lookup(
        &self,
        order_no: &str,
        user: Option<UserId>,
        phone: Option<&str>,
    ) -> Result<OrderDetail, AppError> {
        let access = OrderAccess::resolve(user, phone)?;
        let repo = OrderRepository::new(self.state.pool());
        let order = repo
            .get_by_order_no(order_no)
            .await?
            .filter(|o| access.permits(o))
            .ok_or_else(order_not_found)?;
        let items = repo.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Cancel an order on the customer's behalf.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` for a bad reason or missing identity,
    /// `ORDER_NOT_FOUND`, or `ORDER_NOT_CANCELABLE` once picking has started
    /// or the window has passed.
    #[instrument(skip(self, phone, reason))]
    pub async fn cancel(
        &self,
        order_no: &str,
        user: Option<UserId>,
        phone: Option<&str>,
        reason: &str,
    ) -> Result<CancelOutcome, AppError> {
        let access = OrderAccess::resolve(user, phone)?;
        let reason = order::validate_reason(reason)?;
        let now = self.state.now();
        let actor = access.actor();

        let mut tx = self.state.pool().begin().await?;
        let mut order = order_db::lock_by_order_no(&mut *tx, order_no)
            .await?
            .filter(|o| access.permits(o))
            .ok_or_else(order_not_found)?;

        order.check_cancelable(now)?;
        if let Some(change) = order.plan_transition(OrderStatus::Canceled, now)? {
            order_db::apply_status(&mut *tx, order.id, &change).await?;
            order_db::append_status_log(
                &mut *tx,
                order.id,
                Some(change.from),
                change.to,
                &actor,
                Some(reason.as_str()),
                now,
            )
            .await?;
            order.apply(&change);
        }
        order_db::insert_cancellation(&mut *tx, order.id, &reason, CANCELLATION_APPROVED, &actor, now)
            .await?;

        tx.commit().await?;

        info!(order_id = %order.id, actor = %actor.id, "Order canceled by customer");
        Ok(CancelOutcome {
            ok: true,
            order_no: order.order_no,
            status: order.status,
        })
    }

    /// Orders newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, AppError> {
        Ok(OrderRepository::new(self.state.pool()).list(status).await?)
    }

    /// Full admin view of one order.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND` or a database error.
    pub async fn admin_detail(&self, id: OrderId) -> Result<AdminOrderDetail, AppError> {
        let repo = OrderRepository::new(self.state.pool());
        let order = repo.get_by_id(id).await?.ok_or_else(order_not_found)?;
        let items = repo.items(id).await?;
        let status_logs = repo.status_logs(id).await?;
        let cancellations = repo.cancellations(id).await?;
        let refunds = RefundRepository::new(self.state.pool())
            .list_for_order(id)
            .await?;
        Ok(AdminOrderDetail {
            order,
            items,
            status_logs,
            refunds,
            cancellations,
        })
    }

    /// Status history of one order, oldest first.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND` or a database error.
    pub async fn status_logs(&self, id: OrderId) -> Result<Vec<StatusLogEntry>, AppError> {
        let repo = OrderRepository::new(self.state.pool());
        if repo.get_by_id(id).await?.is_none() {
            return Err(order_not_found().into());
        }
        Ok(repo.status_logs(id).await?)
    }

    /// Move an order to `request.status` on behalf of an admin.
    ///
    /// Moving to the current status changes nothing and writes no log row.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND`, `INVALID_STATUS_TRANSITION` naming the allowed
    /// destinations, or a database error.
    #[instrument(skip(self, request, actor), fields(to = %request.status, admin = %actor.id))]
    pub async fn update_status(
        &self,
        id: OrderId,
        request: &StatusUpdateRequest,
        actor: &Actor,
    ) -> Result<Order, AppError> {
        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned);
        let now = self.state.now();

        let mut tx = self.state.pool().begin().await?;
        let mut order = order_db::lock(&mut *tx, id)
            .await?
            .ok_or_else(order_not_found)?;

        let Some(change) = order.plan_transition(request.status, now)? else {
            debug!(order_id = %id, status = %order.status, "Status unchanged");
            return Ok(order);
        };

        order_db::apply_status(&mut *tx, id, &change).await?;
        order_db::append_status_log(
            &mut *tx,
            id,
            Some(change.from),
            change.to,
            actor,
            reason.as_deref(),
            now,
        )
        .await?;
        audit::record(
            &mut *tx,
            &AuditEntry {
                actor,
                entity_type: AUDIT_ENTITY_ORDER,
                entity_id: id.to_string(),
                action: "ORDER_STATUS_UPDATED".to_string(),
                payload: serde_json::json!({
                    "from": change.from,
                    "to": change.to,
                    "reason": reason,
                }),
            },
            now,
        )
        .await?;
        order.apply(&change);

        tx.commit().await?;

        info!(order_id = %id, from = %change.from, to = %change.to, "Order status changed");
        Ok(order)
    }

    /// Items to pick across open orders.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn picking_list(
        &self,
        statuses: Option<&[OrderStatus]>,
        keyword: Option<&str>,
    ) -> Result<PickingList, AppError> {
        let statuses = statuses.filter(|s| !s.is_empty()).unwrap_or(&PICKING_STATUSES);
        let rows = OrderRepository::new(self.state.pool())
            .picking_rows(statuses)
            .await?;
        Ok(PickingList::build(rows, keyword, self.state.now()))
    }
}

fn order_not_found() -> DomainError {
    DomainError::new(ErrorCode::OrderNotFound, "order not found")
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Insert `order` under a freshly drawn order number.
///
/// Each attempt runs in a savepoint so a number collision does not abort the
/// surrounding transaction.
async fn insert_with_fresh_number(
    conn: &mut PgConnection,
    mut new_order: NewOrder,
    now: DateTime<Utc>,
) -> Result<Order, AppError> {
    for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
        let suffix = rand::rng().random_range(ORDER_NUMBER_SUFFIX_RANGE);
        new_order.order_no = order::format_order_number(now, suffix);

        let mut savepoint = conn.begin().await?;
        match order_db::insert(&mut *savepoint, &new_order).await {
            Ok(created) => {
                savepoint.commit().await?;
                return Ok(created);
            }
            Err(RepositoryError::Conflict(_)) => {
                savepoint.rollback().await?;
                warn!(attempt, order_no = %new_order.order_no, "Order number collision");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Internal(
        "could not allocate a unique order number".to_string(),
    ))
}
