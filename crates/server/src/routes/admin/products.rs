//! Catalog administration handlers.
//!
//! Reads are open to any admin; writes need the MANAGER role.

use axum::{Json, extract::State, http::StatusCode};
use local_market_core::ProductId;
use local_market_core::catalog::{InventoryUpdate, Product, ProductDraft, ProductPatch};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::CatalogService;
use crate::state::AppState;

/// Every product, including hidden and paused ones.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(CatalogService::new(&state).list_admin().await?))
}

/// Create a product.
///
/// # Errors
///
/// Returns `DUPLICATE_SKU` or `INVALID_PRICE`.
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id, sku = %draft.sku))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    admin.require_manager()?;
    let product = CatalogService::new(&state)
        .create(draft, &admin.actor())
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Patch a product.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND`, `DUPLICATE_SKU` or `INVALID_PRICE`.
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    admin.require_manager()?;
    let product = CatalogService::new(&state)
        .update(id, patch, &admin.actor())
        .await?;
    Ok(Json(product))
}

/// Soft-delete a product.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND`.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode, AppError> {
    admin.require_manager()?;
    CatalogService::new(&state)
        .delete(id, &admin.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set stock and the per-order limit.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` or `INVALID_QTY`.
#[instrument(skip(state, admin, update), fields(admin_id = %admin.id, product_id = %id))]
pub async fn set_inventory(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<InventoryUpdate>,
) -> Result<Json<Product>, AppError> {
    admin.require_manager()?;
    let product = CatalogService::new(&state)
        .set_inventory(id, update, &admin.actor())
        .await?;
    Ok(Json(product))
}
