//! Time source abstraction and store-local time helpers.
//!
//! Business rules never call `Utc::now()` directly. They take a [`Clock`] so
//! that tests can pin "now", and project the instant into the store's time
//! zone with [`local_now`] when comparing against opening hours and cutoffs.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a clock pinned at `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// Create a clock pinned at a wall-clock reading in `tz`.
    ///
    /// Returns `None` if the reading does not exist in `tz` (a DST gap).
    #[must_use]
    pub fn at_local(tz: Tz, local: NaiveDateTime) -> Option<Self> {
        tz.from_local_datetime(&local)
            .earliest()
            .map(|dt| Self::new(dt.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// The clock's current instant projected into the store's time zone.
pub fn local_now(clock: &dyn Clock, tz: Tz) -> DateTime<Tz> {
    clock.now().with_timezone(&tz)
}

/// A requested delivery slot start as supplied by a client.
///
/// Clients may send either an offset-qualified timestamp
/// (`2026-03-02T10:00:00+09:00`) or a bare local one (`2026-03-02T10:00:00`).
/// Bare timestamps are read as store-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotStart {
    /// Carries its own UTC offset.
    Aware(DateTime<FixedOffset>),
    /// Store-local wall-clock time.
    Naive(NaiveDateTime),
}

impl SlotStart {
    /// Resolve into store-local time.
    ///
    /// Returns `None` for a naive reading that does not exist in `tz`.
    #[must_use]
    pub fn to_local(&self, tz: Tz) -> Option<DateTime<Tz>> {
        match self {
            Self::Aware(dt) => Some(dt.with_timezone(&tz)),
            Self::Naive(naive) => tz.from_local_datetime(naive).earliest(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, Timelike};
    use chrono_tz::Asia::Seoul;

    use super::*;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap());
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_local_now_projects_into_zone() {
        // 01:00 UTC is 10:00 in Seoul.
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap());
        let local = local_now(&clock, Seoul);
        assert_eq!(local.hour(), 10);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_local_now_crosses_date_line() {
        // 20:00 UTC on the 1st is already 05:00 on the 2nd in Seoul.
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap());
        let local = local_now(&clock, Seoul);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_at_local() {
        let clock = FixedClock::at_local(Seoul, naive("2026-03-02T18:30:00")).unwrap();
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_slot_naive_is_local() {
        let slot: SlotStart = serde_json::from_str("\"2026-03-02T10:00:00\"").unwrap();
        assert!(matches!(slot, SlotStart::Naive(_)));
        let local = slot.to_local(Seoul).unwrap();
        assert_eq!(local.hour(), 10);
    }

    #[test]
    fn test_slot_aware_is_converted() {
        let slot: SlotStart = serde_json::from_str("\"2026-03-02T01:00:00Z\"").unwrap();
        assert!(matches!(slot, SlotStart::Aware(_)));
        let local = slot.to_local(Seoul).unwrap();
        assert_eq!(local.hour(), 10);
    }
}
