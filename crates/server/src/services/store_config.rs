//! Store configuration: policy, delivery zones and holidays.

use local_market_core::policy::{Holiday, HolidayDraft, HolidayPatch, PolicyPatch, StorePolicy};
use local_market_core::zone::{DeliveryZone, ZoneDraft, ZonePatch};
use local_market_core::{DeliveryZoneId, DomainError, ErrorCode, HolidayId};
use tracing::{info, instrument};

use crate::db::{HolidayRepository, PolicyRepository, RepositoryError, ZoneRepository};
use crate::error::AppError;
use crate::state::AppState;

fn zone_not_found() -> DomainError {
    DomainError::new(ErrorCode::ZoneNotFound, "delivery zone not found")
}

fn holiday_not_found() -> DomainError {
    DomainError::new(ErrorCode::HolidayNotFound, "holiday not found")
}

fn holiday_write_error(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => holiday_not_found().into(),
        RepositoryError::Conflict(_) => DomainError::new(
            ErrorCode::DuplicateHoliday,
            "a holiday already exists on this date",
        )
        .into(),
        other => other.into(),
    }
}

/// Store policy, zone and holiday administration.
pub struct StoreConfigService<'a> {
    state: &'a AppState,
}

impl<'a> StoreConfigService<'a> {
    /// Create a new store configuration service.
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn policies(&self) -> PolicyRepository<'a> {
        PolicyRepository::new(self.state.pool())
    }

    fn zones(&self) -> ZoneRepository<'a> {
        ZoneRepository::new(self.state.pool())
    }

    fn holidays(&self) -> HolidayRepository<'a> {
        HolidayRepository::new(self.state.pool())
    }

    // =========================================================================
    // Policy
    // =========================================================================

    /// The store policy, written from the configured defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn policy(&self) -> Result<StorePolicy, AppError> {
        Ok(self
            .policies()
            .get_or_init(&self.state.config().policy_defaults)
            .await?)
    }

    /// Apply a partial policy update.
    ///
    /// # Errors
    ///
    /// `INVALID_POLICY` if the merged policy is inconsistent.
    #[instrument(skip(self, patch))]
    pub async fn update_policy(&self, patch: &PolicyPatch) -> Result<StorePolicy, AppError> {
        let current = self.policy().await?;
        let next = current.patched(patch)?;
        let saved = self.policies().update(&next, self.state.now()).await?;
        info!(?saved, "Store policy updated");
        Ok(saved)
    }

    // =========================================================================
    // Delivery zones
    // =========================================================================

    /// Every zone, active or not.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list_zones(&self) -> Result<Vec<DeliveryZone>, AppError> {
        Ok(self.zones().list_all().await?)
    }

    /// Create a zone.
    ///
    /// # Errors
    ///
    /// `INVALID_ZONE` if the fields do not fit the zone type.
    #[instrument(skip(self, draft), fields(zone_type = %draft.zone_type))]
    pub async fn create_zone(&self, draft: &ZoneDraft) -> Result<DeliveryZone, AppError> {
        draft.validate()?;
        let zone = self.zones().create(draft, self.state.now()).await?;
        info!(zone_id = %zone.id, "Delivery zone created");
        Ok(zone)
    }

    /// Apply a partial zone update.
    ///
    /// # Errors
    ///
    /// `ZONE_NOT_FOUND` or `INVALID_ZONE`.
    #[instrument(skip(self, patch))]
    pub async fn update_zone(
        &self,
        id: DeliveryZoneId,
        patch: ZonePatch,
    ) -> Result<DeliveryZone, AppError> {
        let current = self
            .zones()
            .get_by_id(id)
            .await?
            .ok_or_else(zone_not_found)?;
        let draft = patch.merge(&current)?;
        let zone = self.zones().update(id, &draft).await.map_err(|e| match e {
            RepositoryError::NotFound => zone_not_found().into(),
            other => AppError::from(other),
        })?;
        info!(zone_id = %id, "Delivery zone updated");
        Ok(zone)
    }

    // =========================================================================
    // Holidays
    // =========================================================================

    /// Every holiday by date.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list_holidays(&self) -> Result<Vec<Holiday>, AppError> {
        Ok(self.holidays().list_all().await?)
    }

    /// Create a holiday.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` for a long reason, `DUPLICATE_HOLIDAY` for a taken date.
    #[instrument(skip(self, draft), fields(date = %draft.holiday_date))]
    pub async fn create_holiday(&self, draft: HolidayDraft) -> Result<Holiday, AppError> {
        let draft = draft.normalized()?;
        let holiday = self
            .holidays()
            .create(&draft)
            .await
            .map_err(holiday_write_error)?;
        info!(holiday_id = %holiday.id, "Holiday created");
        Ok(holiday)
    }

    /// Apply a partial holiday update.
    ///
    /// # Errors
    ///
    /// `HOLIDAY_NOT_FOUND`, `INVALID_REQUEST` or `DUPLICATE_HOLIDAY`.
    #[instrument(skip(self, patch))]
    pub async fn update_holiday(
        &self,
        id: HolidayId,
        patch: HolidayPatch,
    ) -> Result<Holiday, AppError> {
        let current = self
            .holidays()
            .get_by_id(id)
            .await?
            .ok_or_else(holiday_not_found)?;
        let draft = patch.merge(&current)?;
        let holiday = self
            .holidays()
            .update(id, &draft)
            .await
            .map_err(holiday_write_error)?;
        info!(holiday_id = %id, "Holiday updated");
        Ok(holiday)
    }

    /// Delete a holiday.
    ///
    /// # Errors
    ///
    /// `HOLIDAY_NOT_FOUND`.
    #[instrument(skip(self))]
    pub async fn delete_holiday(&self, id: HolidayId) -> Result<(), AppError> {
        if !self.holidays().delete(id).await? {
            return Err(holiday_not_found().into());
        }
        info!(holiday_id = %id, "Holiday deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holiday_conflict_maps_to_duplicate() {
        let err = holiday_write_error(RepositoryError::Conflict("date".to_string()));
        assert!(matches!(err, AppError::Domain(ref e) if e.code == ErrorCode::DuplicateHoliday));
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn test_missing_holiday_maps_to_not_found() {
        let err = holiday_write_error(RepositoryError::NotFound);
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
