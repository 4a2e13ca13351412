//! Storefront order handlers: placement, lookup and cancellation.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::{CancelOutcome, CreateOrderRequest, OrderDetail, OrderService};
use crate::state::AppState;

/// Query for looking an order up by number.
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub order_no: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Guest proof of ownership.
#[derive(Debug, Default, Deserialize)]
pub struct PhoneQuery {
    #[serde(default)]
    pub phone: Option<String>,
}

/// Body of a cancellation request.
#[derive(Debug, Deserialize)]
pub struct CancelInput {
    pub reason: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Place an order from the cart.
///
/// # Errors
///
/// Returns `CHECKOUT_INVALID` with the failing checks, or a stock error when
/// another order took the last units first.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    let detail = OrderService::new(&state).create(&request, user).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Look an order up by number (query form).
///
/// # Errors
///
/// Returns `INVALID_REQUEST` without a phone or signed-in user, and
/// `ORDER_NOT_FOUND` when nothing matches.
#[instrument(skip(state, query), fields(order_no = %query.order_no))]
pub async fn lookup(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<LookupQuery>,
) -> Result<Json<OrderDetail>, AppError> {
    let detail = OrderService::new(&state)
        .lookup(&query.order_no, user, query.phone.as_deref())
        .await?;
    Ok(Json(detail))
}

/// Look an order up by number (path form).
///
/// # Errors
///
/// Same as [`lookup`].
#[instrument(skip(state, query))]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(order_no): ApiPath<String>,
    ApiQuery(query): ApiQuery<PhoneQuery>,
) -> Result<Json<OrderDetail>, AppError> {
    let detail = OrderService::new(&state)
        .lookup(&order_no, user, query.phone.as_deref())
        .await?;
    Ok(Json(detail))
}

/// Cancel an order on the customer's behalf.
///
/// The phone may come in the body or the query string.
///
/// # Errors
///
/// Returns `ORDER_NOT_CANCELABLE` once the window has passed or the order
/// has moved past RECEIVED.
#[instrument(skip(state, query, input))]
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(order_no): ApiPath<String>,
    ApiQuery(query): ApiQuery<PhoneQuery>,
    ApiJson(input): ApiJson<CancelInput>,
) -> Result<Json<CancelOutcome>, AppError> {
    let phone = input.phone.as_deref().or(query.phone.as_deref());
    let outcome = OrderService::new(&state)
        .cancel(&order_no, user, phone, &input.reason)
        .await?;
    Ok(Json(outcome))
}
