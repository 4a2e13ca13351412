//! Admin order console handlers.

use axum::{Json, extract::State, http::StatusCode};
use local_market_core::fulfillment::{Refund, RefundRequest, ShortageRequest};
use local_market_core::order::{Order, StatusLogEntry};
use local_market_core::{OrderId, OrderStatus};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::orders::AdminOrderDetail;
use crate::services::{
    FulfillmentService, OrderService, PickingList, ShortageOutcome, StatusUpdateRequest,
};
use crate::state::AppState;

/// Order list filter.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Picking list filters.
#[derive(Debug, Default, Deserialize)]
pub struct PickingQuery {
    /// Comma-separated order statuses.
    #[serde(default)]
    pub statuses: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
}

impl PickingQuery {
    /// Parse the status list. Blank entries are skipped.
    fn statuses(&self) -> Result<Vec<OrderStatus>, AppError> {
        self.statuses
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.to_ascii_uppercase()
                    .parse::<OrderStatus>()
                    .map_err(AppError::BadRequest)
            })
            .collect()
    }
}

/// Newest orders first.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state, admin, query), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(OrderService::new(&state).list(query.status).await?))
}

/// Order detail with items, status history and refunds.
///
/// # Errors
///
/// Returns `ORDER_NOT_FOUND` for unknown orders.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, order_id = %id))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<AdminOrderDetail>, AppError> {
    Ok(Json(OrderService::new(&state).admin_detail(id).await?))
}

/// Status history, oldest first.
///
/// # Errors
///
/// Returns `ORDER_NOT_FOUND` for unknown orders.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, order_id = %id))]
pub async fn status_logs(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Vec<StatusLogEntry>>, AppError> {
    Ok(Json(OrderService::new(&state).status_logs(id).await?))
}

/// Move an order through the status machine.
///
/// # Errors
///
/// Returns `INVALID_STATUS_TRANSITION` for disallowed moves.
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id, order_id = %id, to = %request.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(request): ApiJson<StatusUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(&state)
        .update_status(id, &request, &admin.actor())
        .await?;
    Ok(Json(order))
}

/// Record a picking shortage on one order line.
///
/// # Errors
///
/// Returns the fulfillment rule that rejected the action.
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id, order_id = %id, action = %request.action))]
pub async fn shortage(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(request): ApiJson<ShortageRequest>,
) -> Result<Json<ShortageOutcome>, AppError> {
    let outcome = FulfillmentService::new(&state)
        .apply_shortage(id, &request, &admin.actor())
        .await?;
    Ok(Json(outcome))
}

/// Refunds of an order, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, order_id = %id))]
pub async fn refunds(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Vec<Refund>>, AppError> {
    Ok(Json(FulfillmentService::new(&state).list_refunds(id).await?))
}

/// Issue a direct refund.
///
/// # Errors
///
/// Returns `REFUND_LIMIT_EXCEEDED` when the amount exceeds the balance.
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id, order_id = %id))]
pub async fn create_refund(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(request): ApiJson<RefundRequest>,
) -> Result<(StatusCode, Json<Refund>), AppError> {
    let refund = FulfillmentService::new(&state)
        .create_refund(id, &request, &admin.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

/// Picking list across open orders.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` for an unknown status.
#[instrument(skip(state, admin, query), fields(admin_id = %admin.id))]
pub async fn picking_list(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PickingQuery>,
) -> Result<Json<PickingList>, AppError> {
    let statuses = query.statuses()?;
    let list = OrderService::new(&state)
        .picking_list(Some(&statuses), query.keyword.as_deref())
        .await?;
    Ok(Json(list))
}
