//! Store-wide operating policy.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::types::{HolidayId, Money};

/// Longest reservation horizon an admin may configure, in days.
pub const MAX_RESERVATION_DAYS: i32 = 14;

/// The singleton store policy.
///
/// Opening hours and the same-day cutoff are store-local wall-clock times.
/// Money values are fallbacks used when a delivery zone has no override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePolicy {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub same_day_cutoff_time: NaiveTime,
    pub min_order_amount_default: Money,
    pub base_delivery_fee_default: Money,
    pub free_delivery_threshold_default: Money,
    /// How many days past today a slot may be booked.
    pub allow_reservation_days: i32,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
            same_day_cutoff_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            min_order_amount_default: Money::ZERO,
            base_delivery_fee_default: Money::ZERO,
            free_delivery_threshold_default: Money::ZERO,
            allow_reservation_days: 2,
        }
    }
}

impl StorePolicy {
    /// Returns `true` if `t` lies within opening hours, both ends inclusive.
    #[must_use]
    pub fn is_open_at(&self, t: NaiveTime) -> bool {
        self.open_time <= t && t <= self.close_time
    }

    /// Returns `true` if `t` is past the same-day cutoff.
    #[must_use]
    pub fn is_past_cutoff(&self, t: NaiveTime) -> bool {
        t > self.same_day_cutoff_time
    }

    /// Check that the policy is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_POLICY` for negative amounts, a reservation horizon
    /// outside `0..=14`, opening hours that do not open before they close, or
    /// a cutoff outside opening hours.
    pub fn validate(&self) -> DomainResult<()> {
        let amounts = [
            ("min_order_amount_default", self.min_order_amount_default),
            ("base_delivery_fee_default", self.base_delivery_fee_default),
            ("free_delivery_threshold_default", self.free_delivery_threshold_default),
        ];
        for (field, amount) in amounts {
            if amount.is_negative() {
                return Err(invalid(format!("{field} must not be negative")));
            }
        }

        if !(0..=MAX_RESERVATION_DAYS).contains(&self.allow_reservation_days) {
            return Err(invalid(format!(
                "allow_reservation_days must be between 0 and {MAX_RESERVATION_DAYS}"
            )));
        }

        if self.open_time >= self.close_time {
            return Err(invalid("open_time must be before close_time"));
        }

        if !self.is_open_at(self.same_day_cutoff_time) {
            return Err(invalid("same_day_cutoff_time must be within opening hours"));
        }

        Ok(())
    }

    /// Apply a partial update, returning the validated result.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_POLICY` if the merged policy fails [`Self::validate`].
    pub fn patched(&self, patch: &PolicyPatch) -> DomainResult<Self> {
        let merged = Self {
            open_time: patch.open_time.unwrap_or(self.open_time),
            close_time: patch.close_time.unwrap_or(self.close_time),
            same_day_cutoff_time: patch.same_day_cutoff_time.unwrap_or(self.same_day_cutoff_time),
            min_order_amount_default: patch
                .min_order_amount_default
                .unwrap_or(self.min_order_amount_default),
            base_delivery_fee_default: patch
                .base_delivery_fee_default
                .unwrap_or(self.base_delivery_fee_default),
            free_delivery_threshold_default: patch
                .free_delivery_threshold_default
                .unwrap_or(self.free_delivery_threshold_default),
            allow_reservation_days: patch
                .allow_reservation_days
                .unwrap_or(self.allow_reservation_days),
        };
        merged.validate()?;
        Ok(merged)
    }
}

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::InvalidPolicy, message)
}

/// Partial update to the store policy. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyPatch {
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    pub same_day_cutoff_time: Option<NaiveTime>,
    pub min_order_amount_default: Option<Money>,
    pub base_delivery_fee_default: Option<Money>,
    pub free_delivery_threshold_default: Option<Money>,
    pub allow_reservation_days: Option<i32>,
}

/// Longest holiday reason accepted.
pub const MAX_HOLIDAY_REASON_LEN: usize = 200;

/// A calendar date the store treats specially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: HolidayId,
    pub holiday_date: NaiveDate,
    pub reason: Option<String>,
    /// Closed dates block both same-day orders and slots on that date.
    pub is_closed: bool,
}

/// Dates on which the store is closed.
pub fn closed_dates<'a>(holidays: impl IntoIterator<Item = &'a Holiday>) -> Vec<NaiveDate> {
    holidays
        .into_iter()
        .filter(|h| h.is_closed)
        .map(|h| h.holiday_date)
        .collect()
}

/// Input for creating a holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayDraft {
    pub holiday_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default = "default_closed")]
    pub is_closed: bool,
}

const fn default_closed() -> bool {
    true
}

impl HolidayDraft {
    /// Trim the reason and check its length.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` for a reason over 200 characters.
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.reason = self
            .reason
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());
        if self
            .reason
            .as_ref()
            .is_some_and(|r| r.chars().count() > MAX_HOLIDAY_REASON_LEN)
        {
            return Err(DomainError::invalid_request(format!(
                "reason must be at most {MAX_HOLIDAY_REASON_LEN} characters"
            )));
        }
        Ok(self)
    }
}

/// Partial update to a holiday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayPatch {
    #[serde(default)]
    pub holiday_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::catalog::present")]
    pub reason: Option<Option<String>>,
    #[serde(default)]
    pub is_closed: Option<bool>,
}

impl HolidayPatch {
    /// Merge this patch over `current`.
    ///
    /// # Errors
    ///
    /// Same as [`HolidayDraft::normalized`].
    pub fn merge(self, current: &Holiday) -> DomainResult<HolidayDraft> {
        HolidayDraft {
            holiday_date: self.holiday_date.unwrap_or(current.holiday_date),
            reason: self.reason.unwrap_or_else(|| current.reason.clone()),
            is_closed: self.is_closed.unwrap_or(current.is_closed),
        }
        .normalized()
    }
}
