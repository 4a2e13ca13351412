//! Store configuration repositories: policy, delivery zones and holidays.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use local_market_core::policy::{Holiday, HolidayDraft, StorePolicy};
use local_market_core::zone::{DeliveryZone, ZoneDraft};
use local_market_core::{DeliveryZoneId, HolidayId, Money, ZoneType};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    open_time: NaiveTime,
    close_time: NaiveTime,
    same_day_cutoff_time: NaiveTime,
    min_order_amount_default: Money,
    base_delivery_fee_default: Money,
    free_delivery_threshold_default: Money,
    allow_reservation_days: i32,
}

impl From<PolicyRow> for StorePolicy {
    fn from(row: PolicyRow) -> Self {
        Self {
            open_time: row.open_time,
            close_time: row.close_time,
            same_day_cutoff_time: row.same_day_cutoff_time,
            min_order_amount_default: row.min_order_amount_default,
            base_delivery_fee_default: row.base_delivery_fee_default,
            free_delivery_threshold_default: row.free_delivery_threshold_default,
            allow_reservation_days: row.allow_reservation_days,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ZoneRow {
    id: DeliveryZoneId,
    zone_type: ZoneType,
    dong_code: Option<String>,
    apartment_name: Option<String>,
    center_lat: Option<Decimal>,
    center_lng: Option<Decimal>,
    radius_m: Option<i32>,
    min_order_amount: Option<Money>,
    base_fee: Option<Money>,
    free_delivery_threshold: Option<Money>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ZoneRow> for DeliveryZone {
    fn from(row: ZoneRow) -> Self {
        Self {
            id: row.id,
            zone_type: row.zone_type,
            dong_code: row.dong_code,
            apartment_name: row.apartment_name,
            center_lat: row.center_lat,
            center_lng: row.center_lng,
            radius_m: row.radius_m,
            min_order_amount: row.min_order_amount,
            base_fee: row.base_fee,
            free_delivery_threshold: row.free_delivery_threshold,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HolidayRow {
    id: HolidayId,
    holiday_date: NaiveDate,
    reason: Option<String>,
    is_closed: bool,
}

impl From<HolidayRow> for Holiday {
    fn from(row: HolidayRow) -> Self {
        Self {
            id: row.id,
            holiday_date: row.holiday_date,
            reason: row.reason,
            is_closed: row.is_closed,
        }
    }
}

const POLICY_COLUMNS: &str = "open_time, close_time, same_day_cutoff_time, \
     min_order_amount_default, base_delivery_fee_default, free_delivery_threshold_default, \
     allow_reservation_days";

const ZONE_COLUMNS: &str = "id, zone_type, dong_code, apartment_name, center_lat, center_lng, \
     radius_m, min_order_amount, base_fee, free_delivery_threshold, is_active, created_at";

// =============================================================================
// Policy Repository
// =============================================================================

/// Repository for the singleton store policy.
pub struct PolicyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PolicyRepository<'a> {
    /// Create a new policy repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the stored policy, if one has been written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<Option<StorePolicy>, RepositoryError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM store_policy WHERE id = 1");
        let row = sqlx::query_as::<_, PolicyRow>(&sql)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Get the stored policy, writing `defaults` first if none exists.
    ///
    /// Concurrent first reads race on the singleton key; the loser's insert
    /// is dropped and both see the same row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_init(&self, defaults: &StorePolicy) -> Result<StorePolicy, RepositoryError> {
        if let Some(policy) = self.get().await? {
            return Ok(policy);
        }

        sqlx::query(
            "INSERT INTO store_policy (id, open_time, close_time, same_day_cutoff_time,
                 min_order_amount_default, base_delivery_fee_default,
                 free_delivery_threshold_default, allow_reservation_days)
             VALUES (1, $1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(defaults.open_time)
        .bind(defaults.close_time)
        .bind(defaults.same_day_cutoff_time)
        .bind(defaults.min_order_amount_default)
        .bind(defaults.base_delivery_fee_default)
        .bind(defaults.free_delivery_threshold_default)
        .bind(defaults.allow_reservation_days)
        .execute(self.pool)
        .await?;

        tracing::info!("Store policy initialized with defaults");
        self.get().await?.ok_or(RepositoryError::NotFound)
    }

    /// Overwrite the stored policy.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the policy row does not exist.
    pub async fn update(
        &self,
        policy: &StorePolicy,
        now: DateTime<Utc>,
    ) -> Result<StorePolicy, RepositoryError> {
        let sql = format!(
            "UPDATE store_policy SET open_time = $1, close_time = $2, same_day_cutoff_time = $3,
                 min_order_amount_default = $4, base_delivery_fee_default = $5,
                 free_delivery_threshold_default = $6, allow_reservation_days = $7,
                 updated_at = $8
             WHERE id = 1
             RETURNING {POLICY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(policy.open_time)
            .bind(policy.close_time)
            .bind(policy.same_day_cutoff_time)
            .bind(policy.min_order_amount_default)
            .bind(policy.base_delivery_fee_default)
            .bind(policy.free_delivery_threshold_default)
            .bind(policy.allow_reservation_days)
            .bind(now)
            .fetch_optional(self.pool)
            .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Zone Repository
// =============================================================================

/// Repository for delivery zones.
pub struct ZoneRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ZoneRepository<'a> {
    /// Create a new zone repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every zone, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<DeliveryZone>, RepositoryError> {
        let sql = format!("SELECT {ZONE_COLUMNS} FROM delivery_zones ORDER BY id");
        let rows = sqlx::query_as::<_, ZoneRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List active zones, the candidates for matching.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<DeliveryZone>, RepositoryError> {
        let sql = format!("SELECT {ZONE_COLUMNS} FROM delivery_zones WHERE is_active ORDER BY id");
        let rows = sqlx::query_as::<_, ZoneRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a zone by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: DeliveryZoneId,
    ) -> Result<Option<DeliveryZone>, RepositoryError> {
        let sql = format!("SELECT {ZONE_COLUMNS} FROM delivery_zones WHERE id = $1");
        let row = sqlx::query_as::<_, ZoneRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        draft: &ZoneDraft,
        now: DateTime<Utc>,
    ) -> Result<DeliveryZone, RepositoryError> {
        let sql = format!(
            "INSERT INTO delivery_zones (zone_type, dong_code, apartment_name, center_lat,
                 center_lng, radius_m, min_order_amount, base_fee, free_delivery_threshold,
                 is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {ZONE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ZoneRow>(&sql)
            .bind(draft.zone_type)
            .bind(&draft.dong_code)
            .bind(&draft.apartment_name)
            .bind(draft.center_lat)
            .bind(draft.center_lng)
            .bind(draft.radius_m)
            .bind(draft.min_order_amount)
            .bind(draft.base_fee)
            .bind(draft.free_delivery_threshold)
            .bind(draft.is_active)
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Ok(row.into())
    }

    /// Overwrite a zone with a merged draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone does not exist.
    pub async fn update(
        &self,
        id: DeliveryZoneId,
        draft: &ZoneDraft,
    ) -> Result<DeliveryZone, RepositoryError> {
        let sql = format!(
            "UPDATE delivery_zones SET zone_type = $2, dong_code = $3, apartment_name = $4,
                 center_lat = $5, center_lng = $6, radius_m = $7, min_order_amount = $8,
                 base_fee = $9, free_delivery_threshold = $10, is_active = $11
             WHERE id = $1
             RETURNING {ZONE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ZoneRow>(&sql)
            .bind(id)
            .bind(draft.zone_type)
            .bind(&draft.dong_code)
            .bind(&draft.apartment_name)
            .bind(draft.center_lat)
            .bind(draft.center_lng)
            .bind(draft.radius_m)
            .bind(draft.min_order_amount)
            .bind(draft.base_fee)
            .bind(draft.free_delivery_threshold)
            .bind(draft.is_active)
            .fetch_optional(self.pool)
            .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Holiday Repository
// =============================================================================

/// Repository for holidays.
pub struct HolidayRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> HolidayRepository<'a> {
    /// Create a new holiday repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every holiday in date order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Holiday>, RepositoryError> {
        let rows = sqlx::query_as::<_, HolidayRow>(
            "SELECT id, holiday_date, reason, is_closed FROM holidays ORDER BY holiday_date",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Holidays falling within `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Holiday>, RepositoryError> {
        let rows = sqlx::query_as::<_, HolidayRow>(
            "SELECT id, holiday_date, reason, is_closed FROM holidays
             WHERE holiday_date BETWEEN $1 AND $2
             ORDER BY holiday_date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a holiday by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: HolidayId) -> Result<Option<Holiday>, RepositoryError> {
        let row = sqlx::query_as::<_, HolidayRow>(
            "SELECT id, holiday_date, reason, is_closed FROM holidays WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a holiday.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the date already has a holiday.
    pub async fn create(&self, draft: &HolidayDraft) -> Result<Holiday, RepositoryError> {
        let row = sqlx::query_as::<_, HolidayRow>(
            "INSERT INTO holidays (holiday_date, reason, is_closed) VALUES ($1, $2, $3)
             RETURNING id, holiday_date, reason, is_closed",
        )
        .bind(draft.holiday_date)
        .bind(&draft.reason)
        .bind(draft.is_closed)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_database(e, "holiday date already exists"))?;

        Ok(row.into())
    }

    /// Overwrite a holiday.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the holiday does not exist and
    /// `RepositoryError::Conflict` if the new date is taken.
    pub async fn update(
        &self,
        id: HolidayId,
        draft: &HolidayDraft,
    ) -> Result<Holiday, RepositoryError> {
        let row = sqlx::query_as::<_, HolidayRow>(
            "UPDATE holidays SET holiday_date = $2, reason = $3, is_closed = $4
             WHERE id = $1
             RETURNING id, holiday_date, reason, is_closed",
        )
        .bind(id)
        .bind(draft.holiday_date)
        .bind(&draft.reason)
        .bind(draft.is_closed)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_database(e, "holiday date already exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a holiday. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: HolidayId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM holidays WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
