//! Store configuration handlers: policy, delivery zones and holidays.
//!
//! Reads are open to any admin; writes need the MANAGER role.

use axum::{Json, extract::State, http::StatusCode};
use local_market_core::policy::{Holiday, HolidayDraft, HolidayPatch, PolicyPatch, StorePolicy};
use local_market_core::zone::{DeliveryZone, ZoneDraft, ZonePatch};
use local_market_core::{DeliveryZoneId, HolidayId};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::StoreConfigService;
use crate::state::AppState;

// =============================================================================
// Policy
// =============================================================================

/// Current store policy, created from defaults if absent.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn policy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<StorePolicy>, AppError> {
    Ok(Json(StoreConfigService::new(&state).policy().await?))
}

/// Patch the store policy.
///
/// # Errors
///
/// Returns `INVALID_POLICY` when the merged policy is inconsistent.
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id))]
pub async fn update_policy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(patch): ApiJson<PolicyPatch>,
) -> Result<Json<StorePolicy>, AppError> {
    admin.require_manager()?;
    Ok(Json(
        StoreConfigService::new(&state).update_policy(&patch).await?,
    ))
}

// =============================================================================
// Delivery zones
// =============================================================================

/// All delivery zones in priority order.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn zones(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<DeliveryZone>>, AppError> {
    Ok(Json(StoreConfigService::new(&state).list_zones().await?))
}

/// Create a delivery zone.
///
/// # Errors
///
/// Returns `INVALID_ZONE` when the zone lacks what its type needs.
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn create_zone(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<ZoneDraft>,
) -> Result<(StatusCode, Json<DeliveryZone>), AppError> {
    admin.require_manager()?;
    let zone = StoreConfigService::new(&state).create_zone(&draft).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// Patch a delivery zone.
///
/// # Errors
///
/// Returns `ZONE_NOT_FOUND` or `INVALID_ZONE`.
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id, zone_id = %id))]
pub async fn update_zone(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeliveryZoneId>,
    ApiJson(patch): ApiJson<ZonePatch>,
) -> Result<Json<DeliveryZone>, AppError> {
    admin.require_manager()?;
    Ok(Json(
        StoreConfigService::new(&state).update_zone(id, patch).await?,
    ))
}

// =============================================================================
// Holidays
// =============================================================================

/// All holidays by date.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn holidays(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Holiday>>, AppError> {
    Ok(Json(StoreConfigService::new(&state).list_holidays().await?))
}

/// Add a holiday.
///
/// # Errors
///
/// Returns `DUPLICATE_HOLIDAY` when the date is taken.
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id, date = %draft.holiday_date))]
pub async fn create_holiday(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<HolidayDraft>,
) -> Result<(StatusCode, Json<Holiday>), AppError> {
    admin.require_manager()?;
    let holiday = StoreConfigService::new(&state).create_holiday(draft).await?;
    Ok((StatusCode::CREATED, Json(holiday)))
}

/// Patch a holiday.
///
/// # Errors
///
/// Returns `HOLIDAY_NOT_FOUND` or `DUPLICATE_HOLIDAY`.
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id, holiday_id = %id))]
pub async fn update_holiday(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<HolidayId>,
    ApiJson(patch): ApiJson<HolidayPatch>,
) -> Result<Json<Holiday>, AppError> {
    admin.require_manager()?;
    Ok(Json(
        StoreConfigService::new(&state)
            .update_holiday(id, patch)
            .await?,
    ))
}

/// Remove a holiday.
///
/// # Errors
///
/// Returns `HOLIDAY_NOT_FOUND`.
#[instrument(skip(state, admin), fields(admin_id = %admin.id, holiday_id = %id))]
pub async fn delete_holiday(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<HolidayId>,
) -> Result<StatusCode, AppError> {
    admin.require_manager()?;
    StoreConfigService::new(&state).delete_holiday(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
