//! Cart route handlers.
//!
//! Carts are keyed by an opaque session key the client keeps. Every response
//! carries the key, so a client that sent none learns the one that was issued.

use axum::{Json, extract::State};
use local_market_core::{CartItemId, ProductId};
use serde::Deserialize;
use tracing::instrument;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::{CartService, CartView};
use crate::state::AppState;

/// Cart session key passed in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct CartKeyQuery {
    #[serde(default)]
    pub session_key: Option<String>,
}

/// Body for opening a cart.
#[derive(Debug, Default, Deserialize)]
pub struct OpenCartInput {
    #[serde(default)]
    pub session_key: Option<String>,
}

/// Body for adding a product.
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    #[serde(default)]
    pub session_key: Option<String>,
    pub product_id: ProductId,
    pub qty: i32,
}

/// Body for changing a line's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    #[serde(default)]
    pub session_key: Option<String>,
    pub qty: i32,
}

/// Show the cart for a session key, creating one if needed.
///
/// # Errors
///
/// Returns `CART_OWNERSHIP_MISMATCH` when the cart belongs to another user.
#[instrument(skip(state, query))]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<CartKeyQuery>,
) -> Result<Json<CartView>, AppError> {
    let cart = CartService::new(&state)
        .get_or_create(query.session_key.as_deref(), user)
        .await?;
    Ok(Json(cart))
}

/// Open (or resume) a cart.
///
/// # Errors
///
/// Returns `CART_OWNERSHIP_MISMATCH` when the cart belongs to another user.
#[instrument(skip(state, input))]
pub async fn open(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<OpenCartInput>,
) -> Result<Json<CartView>, AppError> {
    let cart = CartService::new(&state)
        .get_or_create(input.session_key.as_deref(), user)
        .await?;
    Ok(Json(cart))
}

/// Add a product to the cart.
///
/// # Errors
///
/// Returns the cart rule that rejected the quantity.
#[instrument(skip(state, input), fields(product_id = %input.product_id, qty = input.qty))]
pub async fn add_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<AddItemInput>,
) -> Result<Json<CartView>, AppError> {
    let cart = CartService::new(&state)
        .add_item(input.session_key.as_deref(), user, input.product_id, input.qty)
        .await?;
    Ok(Json(cart))
}

/// Change a line's quantity.
///
/// # Errors
///
/// Returns `CART_ITEM_NOT_FOUND` or the cart rule that rejected the quantity.
#[instrument(skip(state, input), fields(item_id = %item_id, qty = input.qty))]
pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(item_id): ApiPath<CartItemId>,
    ApiJson(input): ApiJson<UpdateItemInput>,
) -> Result<Json<CartView>, AppError> {
    let cart = CartService::new(&state)
        .update_item(input.session_key.as_deref(), user, item_id, input.qty)
        .await?;
    Ok(Json(cart))
}

/// Remove a line.
///
/// # Errors
///
/// Returns `CART_ITEM_NOT_FOUND` when the line is not in the cart.
#[instrument(skip(state, query), fields(item_id = %item_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(item_id): ApiPath<CartItemId>,
    ApiQuery(query): ApiQuery<CartKeyQuery>,
) -> Result<Json<CartView>, AppError> {
    let cart = CartService::new(&state)
        .remove_item(query.session_key.as_deref(), user, item_id)
        .await?;
    Ok(Json(cart))
}
