//! Checkout route handlers.

use axum::{Json, extract::State};
use local_market_core::checkout::Quote;
use tracing::instrument;

use super::extract::ApiJson;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::{CheckoutRequest, CheckoutService, ValidationSummary};
use crate::state::AppState;

/// Validate the cart against the delivery rules.
///
/// A failing checkout still answers 200; the problems are listed in `errors`.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
#[instrument(skip(state, request))]
pub async fn validate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<Json<ValidationSummary>, AppError> {
    let quote = CheckoutService::new(&state).quote(&request, user).await?;
    Ok(Json(ValidationSummary::from(&quote)))
}

/// Full checkout quote: totals, matched zone, fees and slot checks.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
#[instrument(skip(state, request))]
pub async fn quote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(
        CheckoutService::new(&state).quote(&request, user).await?,
    ))
}
