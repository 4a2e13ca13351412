//! Public catalog route handlers.

use axum::{Json, extract::State};
use local_market_core::ProductId;
use local_market_core::catalog::Category;
use tracing::instrument;

use super::extract::{ApiPath, ApiQuery};
use crate::error::AppError;
use crate::services::{CatalogService, ProductQuery, ProductView};
use crate::state::AppState;

/// List categories in display order.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CatalogService::new(&state).categories().await?))
}

/// List visible products, optionally filtered by category and name.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    Ok(Json(CatalogService::new(&state).list_public(&query).await?))
}

/// Product detail.
///
/// # Errors
///
/// Returns `PRODUCT_NOT_FOUND` for unknown or hidden products.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductView>, AppError> {
    Ok(Json(CatalogService::new(&state).get_public(id).await?))
}
