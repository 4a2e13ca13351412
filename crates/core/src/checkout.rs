//! Checkout validation.
//!
//! [`validate`] runs every eligibility check against a cart and collects all
//! failures instead of stopping at the first, so a client can show the
//! customer everything that needs fixing at once. The result is a priced
//! [`Quote`].

use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::ErrorCode;
use crate::policy::StorePolicy;
use crate::types::{DeliveryZoneId, Money, ZoneType};
use crate::zone::{DeliveryZone, FeeTerms, LocationQuery, match_zone};

/// One cart line as seen by the validator.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutLine<'a> {
    pub qty: i32,
    pub unit_snapshot_price: Money,
    /// The product as it is now, or `None` if it no longer exists.
    pub product: Option<&'a Product>,
}

/// Everything the validator looks at.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutInput<'a> {
    pub policy: &'a StorePolicy,
    /// Current store-local time.
    pub now: DateTime<Tz>,
    /// Requested slot start in store-local time; `None` for an immediate order.
    pub slot: Option<DateTime<Tz>>,
    /// Dates flagged as closed holidays.
    pub closed_dates: &'a [NaiveDate],
    /// Candidate zones; inactive ones are ignored.
    pub zones: &'a [DeliveryZone],
    pub location: &'a LocationQuery,
    pub lines: &'a [CheckoutLine<'a>],
}

/// The zone a quote was priced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedZone {
    pub id: DeliveryZoneId,
    pub zone_type: ZoneType,
}

/// Outcome of checkout validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub valid: bool,
    /// Distinct error codes, sorted by wire name.
    pub errors: Vec<ErrorCode>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_estimated: Money,
    pub min_order_amount: Money,
    pub free_delivery_threshold: Money,
    pub zone: Option<QuotedZone>,
}

impl Quote {
    #[must_use]
    pub fn zone_id(&self) -> Option<DeliveryZoneId> {
        self.zone.map(|z| z.id)
    }
}

/// Store-hours, holiday, reservation-window and cutoff checks.
#[must_use]
pub fn timing_errors(
    policy: &StorePolicy,
    now: DateTime<Tz>,
    slot: Option<DateTime<Tz>>,
    closed_dates: &[NaiveDate],
) -> Vec<ErrorCode> {
    let mut errors = Vec::new();
    let today = now.date_naive();
    let now_time = now.time();
    let is_closed = |date: NaiveDate| closed_dates.contains(&date);

    match slot {
        None => {
            if is_closed(today) {
                errors.push(ErrorCode::HolidayClosed);
            }
            if !policy.is_open_at(now_time) {
                errors.push(ErrorCode::StoreClosed);
            }
            if policy.is_past_cutoff(now_time) {
                errors.push(ErrorCode::CutoffPassed);
            }
        }
        Some(slot) => {
            let slot_date = slot.date_naive();
            if slot <= now {
                errors.push(ErrorCode::SlotUnavailable);
            }
            let horizon = u64::try_from(policy.allow_reservation_days).unwrap_or(0);
            let last_bookable = today.checked_add_days(Days::new(horizon)).unwrap_or(today);
            if slot_date > last_bookable {
                errors.push(ErrorCode::SlotUnavailable);
            }
            if !policy.is_open_at(slot.time()) {
                errors.push(ErrorCode::SlotUnavailable);
            }
            if is_closed(slot_date) {
                errors.push(ErrorCode::HolidayClosed);
            }
            if slot_date == today && policy.is_past_cutoff(now_time) {
                errors.push(ErrorCode::CutoffPassed);
            }
        }
    }

    errors
}

/// Price the sellable lines, reporting each line that cannot be sold.
///
/// Returns the subtotal of lines that passed together with the errors.
#[must_use]
pub fn price_lines(lines: &[CheckoutLine<'_>]) -> (Money, Vec<ErrorCode>) {
    let mut errors = Vec::new();
    let mut subtotal = Money::ZERO;

    if lines.is_empty() {
        errors.push(ErrorCode::InvalidRequest);
    }

    for line in lines {
        let Some(product) = line.product.filter(|p| p.is_sellable()) else {
            errors.push(ErrorCode::OutOfStock);
            continue;
        };
        if line.qty > product.max_per_order {
            errors.push(ErrorCode::MaxQtyExceeded);
            continue;
        }
        if line.qty > product.available() {
            errors.push(ErrorCode::InsufficientStock);
            continue;
        }
        subtotal += line.unit_snapshot_price.times(line.qty);
    }

    (subtotal, errors)
}

/// Run every checkout check and price the result.
#[must_use]
pub fn validate(input: &CheckoutInput<'_>) -> Quote {
    let mut errors = timing_errors(input.policy, input.now, input.slot, input.closed_dates);

    let zone = match_zone(input.zones, input.location);
    if zone.is_none() {
        errors.push(ErrorCode::OutOfDeliveryZone);
    }

    let (subtotal, line_errors) = price_lines(input.lines);
    errors.extend(line_errors);

    let terms = FeeTerms::resolve(zone, input.policy);
    if subtotal < terms.min_order_amount {
        errors.push(ErrorCode::MinOrderNotMet);
    }
    let delivery_fee = terms.delivery_fee(subtotal);

    errors.sort_by_key(ErrorCode::as_str);
    errors.dedup();

    Quote {
        valid: errors.is_empty(),
        errors,
        subtotal,
        delivery_fee,
        total_estimated: subtotal + delivery_fee,
        min_order_amount: terms.min_order_amount,
        free_delivery_threshold: terms.free_delivery_threshold,
        zone: zone.map(|z| QuotedZone {
            id: z.id,
            zone_type: z.zone_type,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::Asia::Seoul;

    use super::*;
    use crate::catalog::tests::product;
    use crate::zone::tests::dong_zone;

    fn local(s: &str) -> DateTime<Tz> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap();
        Seoul.from_local_datetime(&naive).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn legacy_policy() -> StorePolicy {
        StorePolicy {
            min_order_amount_default: Money::from_units(15000),
            base_delivery_fee_default: Money::from_units(3000),
            free_delivery_threshold_default: Money::from_units(40000),
            ..StorePolicy::default()
        }
    }

    fn dong(code: &str) -> LocationQuery {
        LocationQuery {
            dong_code: Some(code.to_owned()),
            ..LocationQuery::default()
        }
    }

    #[test]
    fn test_immediate_order_timing() {
        let policy = StorePolicy::default();
        assert!(timing_errors(&policy, local("2026-03-02 10:00"), None, &[]).is_empty());
        assert_eq!(
            timing_errors(&policy, local("2026-03-02 08:00"), None, &[]),
            [ErrorCode::StoreClosed]
        );
        assert_eq!(
            timing_errors(&policy, local("2026-03-02 20:00"), None, &[]),
            [ErrorCode::CutoffPassed]
        );
        assert_eq!(
            timing_errors(&policy, local("2026-03-02 22:00"), None, &[]),
            [ErrorCode::StoreClosed, ErrorCode::CutoffPassed]
        );
        assert_eq!(
            timing_errors(&policy, local("2026-03-02 10:00"), None, &[date("2026-03-02")]),
            [ErrorCode::HolidayClosed]
        );
    }

    #[test]
    fn test_slot_in_past() {
        let policy = StorePolicy::default();
        let errors = timing_errors(
            &policy,
            local("2026-03-02 12:00"),
            Some(local("2026-03-02 11:00")),
            &[],
        );
        assert_eq!(errors, [ErrorCode::SlotUnavailable]);
    }

    #[test]
    fn test_slot_beyond_reservation_horizon() {
        let policy = StorePolicy::default();
        let now = local("2026-03-02 10:00");
        assert!(timing_errors(&policy, now, Some(local("2026-03-04 10:00")), &[]).is_empty());
        assert_eq!(
            timing_errors(&policy, now, Some(local("2026-03-05 10:00")), &[]),
            [ErrorCode::SlotUnavailable]
        );
    }

    #[test]
    fn test_slot_outside_hours() {
        let policy = StorePolicy::default();
        let errors = timing_errors(
            &policy,
            local("2026-03-02 10:00"),
            Some(local("2026-03-03 22:00")),
            &[],
        );
        assert_eq!(errors, [ErrorCode::SlotUnavailable]);
    }

    #[test]
    fn test_slot_on_holiday() {
        let policy = StorePolicy::default();
        let errors = timing_errors(
            &policy,
            local("2026-03-02 10:00"),
            Some(local("2026-03-03 10:00")),
            &[date("2026-03-03")],
        );
        assert_eq!(errors, [ErrorCode::HolidayClosed]);
    }

    #[test]
    fn test_same_day_slot_after_cutoff() {
        let policy = StorePolicy::default();
        let errors = timing_errors(
            &policy,
            local("2026-03-02 19:30"),
            Some(local("2026-03-02 20:30")),
            &[],
        );
        assert_eq!(errors, [ErrorCode::CutoffPassed]);

        // A next-day slot booked after the cutoff is fine.
        let errors = timing_errors(
            &policy,
            local("2026-03-02 19:30"),
            Some(local("2026-03-03 10:00")),
            &[],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_free_delivery_threshold_scenarios() {
        let policy = legacy_policy();
        let zones = [dong_zone(1, "1535011000")];
        let location = dong("1535011000");

        for (price, fee, total) in [(20000, 3000, 23000), (45000, 0, 45000)] {
            let p = product(1, price, 10);
            let lines = [CheckoutLine {
                qty: 1,
                unit_snapshot_price: Money::from_units(price),
                product: Some(&p),
            }];
            let quote = validate(&CheckoutInput {
                policy: &policy,
                now: local("2026-03-02 10:00"),
                slot: None,
                closed_dates: &[],
                zones: &zones,
                location: &location,
                lines: &lines,
            });
            assert!(quote.valid, "{:?}", quote.errors);
            assert_eq!(quote.subtotal, Money::from_units(price));
            assert_eq!(quote.delivery_fee, Money::from_units(fee));
            assert_eq!(quote.total_estimated, Money::from_units(total));
            assert_eq!(quote.zone_id(), Some(zones[0].id));
        }
    }

    #[test]
    fn test_collects_all_errors_sorted() {
        let policy = legacy_policy();
        let p = product(1, 1000, 1);
        let lines = [CheckoutLine {
            qty: 2,
            unit_snapshot_price: Money::from_units(1000),
            product: Some(&p),
        }];
        let quote = validate(&CheckoutInput {
            policy: &policy,
            now: local("2026-03-02 22:00"),
            slot: None,
            closed_dates: &[],
            zones: &[],
            location: &LocationQuery::default(),
            lines: &lines,
        });
        assert!(!quote.valid);
        assert_eq!(
            quote.errors,
            [
                ErrorCode::CutoffPassed,
                ErrorCode::InsufficientStock,
                ErrorCode::MinOrderNotMet,
                ErrorCode::OutOfDeliveryZone,
                ErrorCode::StoreClosed,
            ]
        );
        assert_eq!(quote.subtotal, Money::ZERO);
    }

    #[test]
    fn test_line_errors_are_deduplicated() {
        let hidden = {
            let mut p = product(1, 1000, 10);
            p.is_visible = false;
            p
        };
        let lines = [
            CheckoutLine {
                qty: 1,
                unit_snapshot_price: Money::from_units(1000),
                product: Some(&hidden),
            },
            CheckoutLine {
                qty: 1,
                unit_snapshot_price: Money::from_units(1000),
                product: None,
            },
        ];
        let (subtotal, errors) = price_lines(&lines);
        assert_eq!(subtotal, Money::ZERO);
        assert_eq!(errors, [ErrorCode::OutOfStock, ErrorCode::OutOfStock]);

        let policy = StorePolicy::default();
        let zones = [dong_zone(1, "A")];
        let quote = validate(&CheckoutInput {
            policy: &policy,
            now: local("2026-03-02 10:00"),
            slot: None,
            closed_dates: &[],
            zones: &zones,
            location: &dong("A"),
            lines: &lines,
        });
        assert_eq!(quote.errors, [ErrorCode::OutOfStock]);
    }

    #[test]
    fn test_empty_cart_is_invalid_request() {
        let (_, errors) = price_lines(&[]);
        assert_eq!(errors, [ErrorCode::InvalidRequest]);
    }

    #[test]
    fn test_max_qty_checked_before_stock() {
        let mut p = product(1, 1000, 1);
        p.max_per_order = 2;
        let lines = [CheckoutLine {
            qty: 3,
            unit_snapshot_price: Money::from_units(1000),
            product: Some(&p),
        }];
        assert_eq!(price_lines(&lines).1, [ErrorCode::MaxQtyExceeded]);
    }

    #[test]
    fn test_snapshot_price_is_used_not_current_price() {
        let p = product(1, 9999, 10);
        let lines = [CheckoutLine {
            qty: 3,
            unit_snapshot_price: Money::from_units(1000),
            product: Some(&p),
        }];
        assert_eq!(price_lines(&lines).0, Money::from_units(3000));
    }

    #[test]
    fn test_reservation_beyond_horizon_ignores_everything_else() {
        let policy = StorePolicy::default();
        let zones = [dong_zone(1, "A")];
        let p = product(1, 1000, 10);
        let lines = [CheckoutLine {
            qty: 1,
            unit_snapshot_price: Money::from_units(1000),
            product: Some(&p),
        }];
        let now = Seoul.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let quote = validate(&CheckoutInput {
            policy: &policy,
            now,
            slot: Some(local("2026-03-10 10:00")),
            closed_dates: &[],
            zones: &zones,
            location: &dong("A"),
            lines: &lines,
        });
        assert_eq!(quote.errors, [ErrorCode::SlotUnavailable]);
    }
}
