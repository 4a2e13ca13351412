//! Delivery zones and the zone matcher.
//!
//! A zone matches a customer location in exactly one way, chosen by its
//! [`ZoneType`]: exact apartment complex name, exact administrative-area
//! (dong) code, or a geofence circle. Zones may override the store-wide
//! minimum order, delivery fee and free-delivery threshold.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::geo::GeoPoint;
use crate::policy::StorePolicy;
use crate::types::{DeliveryZoneId, Money, ZoneType};

/// Allowed geofence radius, in meters.
pub const RADIUS_RANGE_M: core::ops::RangeInclusive<i32> = 50..=20_000;

/// A delivery zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryZone {
    pub id: DeliveryZoneId,
    pub zone_type: ZoneType,
    pub dong_code: Option<String>,
    pub apartment_name: Option<String>,
    pub center_lat: Option<Decimal>,
    pub center_lng: Option<Decimal>,
    pub radius_m: Option<i32>,
    pub min_order_amount: Option<Money>,
    pub base_fee: Option<Money>,
    pub free_delivery_threshold: Option<Money>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DeliveryZone {
    /// Geofence center, if both coordinates are set.
    #[must_use]
    pub fn center(&self) -> Option<GeoPoint> {
        let lat = self.center_lat?.to_f64()?;
        let lng = self.center_lng?.to_f64()?;
        Some(GeoPoint::new(lat, lng))
    }

    /// Returns `true` if `point` lies inside this zone's geofence.
    ///
    /// Zones missing a center or radius never contain anything.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        match (self.center(), self.radius_m) {
            (Some(center), Some(radius)) => center.distance_m(&point) <= f64::from(radius),
            _ => false,
        }
    }
}

/// A customer location as far as the checkout form describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationQuery {
    pub dong_code: Option<String>,
    pub apartment_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationQuery {
    fn apartment(&self) -> Option<&str> {
        self.apartment_name.as_deref().filter(|s| !s.is_empty())
    }

    fn dong(&self) -> Option<&str> {
        self.dong_code.as_deref().filter(|s| !s.is_empty())
    }

    fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude?, self.longitude?))
    }
}

/// Resolve a location to at most one active zone.
///
/// Tries apartment name, then dong code, then coordinates; each step falls
/// through when it finds nothing. Among several apartment or dong matches the
/// most recently created zone (highest id) wins. Geofences are tried smallest
/// radius first.
#[must_use]
pub fn match_zone<'a>(zones: &'a [DeliveryZone], query: &LocationQuery) -> Option<&'a DeliveryZone> {
    let active = || zones.iter().filter(|z| z.is_active);

    if let Some(name) = query.apartment() {
        let found = active()
            .filter(|z| z.zone_type == ZoneType::Apartment && z.apartment_name.as_deref() == Some(name))
            .max_by_key(|z| z.id.as_i32());
        if found.is_some() {
            return found;
        }
    }

    if let Some(code) = query.dong() {
        let found = active()
            .filter(|z| z.zone_type == ZoneType::Dong && z.dong_code.as_deref() == Some(code))
            .max_by_key(|z| z.id.as_i32());
        if found.is_some() {
            return found;
        }
    }

    let point = query.point()?;
    let mut fences: Vec<_> = active()
        .filter(|z| z.zone_type == ZoneType::Radius)
        .collect();
    fences.sort_by_key(|z| (z.radius_m.unwrap_or(i32::MAX), core::cmp::Reverse(z.id.as_i32())));
    fences.into_iter().find(|z| z.contains(point))
}

/// Minimum order, fee and free-delivery threshold that apply to a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTerms {
    pub min_order_amount: Money,
    pub base_fee: Money,
    pub free_delivery_threshold: Money,
}

impl FeeTerms {
    /// Zone overrides where set, store policy defaults otherwise.
    #[must_use]
    pub fn resolve(zone: Option<&DeliveryZone>, policy: &StorePolicy) -> Self {
        Self {
            min_order_amount: zone
                .and_then(|z| z.min_order_amount)
                .unwrap_or(policy.min_order_amount_default),
            base_fee: zone
                .and_then(|z| z.base_fee)
                .unwrap_or(policy.base_delivery_fee_default),
            free_delivery_threshold: zone
                .and_then(|z| z.free_delivery_threshold)
                .unwrap_or(policy.free_delivery_threshold_default),
        }
    }

    /// Delivery fee for an order with this subtotal.
    #[must_use]
    pub fn delivery_fee(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_delivery_threshold {
            Money::ZERO
        } else {
            self.base_fee
        }
    }
}

/// Input for creating or replacing a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDraft {
    pub zone_type: ZoneType,
    #[serde(default)]
    pub dong_code: Option<String>,
    #[serde(default)]
    pub apartment_name: Option<String>,
    #[serde(default)]
    pub center_lat: Option<Decimal>,
    #[serde(default)]
    pub center_lng: Option<Decimal>,
    #[serde(default)]
    pub radius_m: Option<i32>,
    #[serde(default)]
    pub min_order_amount: Option<Money>,
    #[serde(default)]
    pub base_fee: Option<Money>,
    #[serde(default)]
    pub free_delivery_threshold: Option<Money>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::InvalidZone, message)
}

fn is_blank(s: Option<&String>) -> bool {
    s.is_none_or(|s| s.trim().is_empty())
}

impl ZoneDraft {
    /// Check that the draft carries what its matching strategy needs.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_ZONE` when the strategy's key is missing, the radius
    /// or coordinates are out of range, or an override is negative.
    pub fn validate(&self) -> DomainResult<()> {
        match self.zone_type {
            ZoneType::Apartment if is_blank(self.apartment_name.as_ref()) => {
                return Err(invalid("apartment zones need an apartment_name"));
            }
            ZoneType::Dong if is_blank(self.dong_code.as_ref()) => {
                return Err(invalid("dong zones need a dong_code"));
            }
            ZoneType::Radius => {
                let (Some(lat), Some(lng), Some(radius)) =
                    (self.center_lat, self.center_lng, self.radius_m)
                else {
                    return Err(invalid("radius zones need center_lat, center_lng and radius_m"));
                };
                if lat.abs() > Decimal::from(90) || lng.abs() > Decimal::from(180) {
                    return Err(invalid("center coordinates are out of range"));
                }
                if !RADIUS_RANGE_M.contains(&radius) {
                    return Err(invalid("radius_m must be between 50 and 20000"));
                }
            }
            _ => {}
        }

        if let Some(radius) = self.radius_m
            && !RADIUS_RANGE_M.contains(&radius)
        {
            return Err(invalid("radius_m must be between 50 and 20000"));
        }

        let overrides = [self.min_order_amount, self.base_fee, self.free_delivery_threshold];
        if overrides.iter().flatten().any(Money::is_negative) {
            return Err(invalid("zone overrides must not be negative"));
        }
        Ok(())
    }
}

impl From<&DeliveryZone> for ZoneDraft {
    fn from(z: &DeliveryZone) -> Self {
        Self {
            zone_type: z.zone_type,
            dong_code: z.dong_code.clone(),
            apartment_name: z.apartment_name.clone(),
            center_lat: z.center_lat,
            center_lng: z.center_lng,
            radius_m: z.radius_m,
            min_order_amount: z.min_order_amount,
            base_fee: z.base_fee,
            free_delivery_threshold: z.free_delivery_threshold,
            is_active: z.is_active,
        }
    }
}

/// Partial zone update. Only fields present in the request change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonePatch {
    pub zone_type: Option<ZoneType>,
    pub dong_code: Option<String>,
    pub apartment_name: Option<String>,
    pub center_lat: Option<Decimal>,
    pub center_lng: Option<Decimal>,
    pub radius_m: Option<i32>,
    pub min_order_amount: Option<Money>,
    pub base_fee: Option<Money>,
    pub free_delivery_threshold: Option<Money>,
    pub is_active: Option<bool>,
}

impl ZonePatch {
    /// Merge over `current` and validate the result.
    ///
    /// # Errors
    ///
    /// Same as [`ZoneDraft::validate`].
    pub fn merge(self, current: &DeliveryZone) -> DomainResult<ZoneDraft> {
        let base = ZoneDraft::from(current);
        let draft = ZoneDraft {
            zone_type: self.zone_type.unwrap_or(base.zone_type),
            dong_code: self.dong_code.or(base.dong_code),
            apartment_name: self.apartment_name.or(base.apartment_name),
            center_lat: self.center_lat.or(base.center_lat),
            center_lng: self.center_lng.or(base.center_lng),
            radius_m: self.radius_m.or(base.radius_m),
            min_order_amount: self.min_order_amount.or(base.min_order_amount),
            base_fee: self.base_fee.or(base.base_fee),
            free_delivery_threshold: self.free_delivery_threshold.or(base.free_delivery_threshold),
            is_active: self.is_active.unwrap_or(base.is_active),
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;

    use super::*;

    fn base(id: i32, zone_type: ZoneType) -> DeliveryZone {
        DeliveryZone {
            id: DeliveryZoneId::new(id),
            zone_type,
            dong_code: None,
            apartment_name: None,
            center_lat: None,
            center_lng: None,
            radius_m: None,
            min_order_amount: None,
            base_fee: None,
            free_delivery_threshold: None,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    pub(crate) fn dong_zone(id: i32, code: &str) -> DeliveryZone {
        DeliveryZone {
            dong_code: Some(code.to_owned()),
            ..base(id, ZoneType::Dong)
        }
    }

    fn apartment_zone(id: i32, name: &str) -> DeliveryZone {
        DeliveryZone {
            apartment_name: Some(name.to_owned()),
            ..base(id, ZoneType::Apartment)
        }
    }

    fn radius_zone(id: i32, lat: &str, lng: &str, radius: i32) -> DeliveryZone {
        DeliveryZone {
            center_lat: Some(Decimal::from_str(lat).unwrap()),
            center_lng: Some(Decimal::from_str(lng).unwrap()),
            radius_m: Some(radius),
            ..base(id, ZoneType::Radius)
        }
    }

    fn query(dong: Option<&str>, apt: Option<&str>, point: Option<(f64, f64)>) -> LocationQuery {
        LocationQuery {
            dong_code: dong.map(str::to_owned),
            apartment_name: apt.map(str::to_owned),
            latitude: point.map(|p| p.0),
            longitude: point.map(|p| p.1),
        }
    }

    #[test]
    fn test_apartment_beats_dong() {
        let zones = [dong_zone(1, "1535011000"), apartment_zone(2, "Hillside")];
        let q = query(Some("1535011000"), Some("Hillside"), None);
        assert_eq!(match_zone(&zones, &q).unwrap().id, DeliveryZoneId::new(2));
    }

    #[test]
    fn test_unknown_apartment_falls_through_to_dong() {
        let zones = [dong_zone(1, "1535011000"), apartment_zone(2, "Hillside")];
        let q = query(Some("1535011000"), Some("Lakeside"), None);
        assert_eq!(match_zone(&zones, &q).unwrap().id, DeliveryZoneId::new(1));
    }

    #[test]
    fn test_newest_zone_wins_tie() {
        let zones = [dong_zone(3, "A"), dong_zone(7, "A"), dong_zone(5, "A")];
        let q = query(Some("A"), None, None);
        assert_eq!(match_zone(&zones, &q).unwrap().id, DeliveryZoneId::new(7));
    }

    #[test]
    fn test_inactive_zones_ignored() {
        let mut zone = dong_zone(1, "A");
        zone.is_active = false;
        assert!(match_zone(&[zone], &query(Some("A"), None, None)).is_none());
    }

    #[test]
    fn test_blank_keys_are_absent() {
        let zones = [apartment_zone(1, "")];
        assert!(match_zone(&zones, &query(None, Some(""), None)).is_none());
    }

    #[test]
    fn test_smallest_radius_first() {
        let zones = [
            radius_zone(1, "37.5326000", "127.0246000", 5000),
            radius_zone(2, "37.5326000", "127.0246000", 1000),
        ];
        // About 2 km out: only the wide fence covers it.
        let q = query(None, None, Some((37.5500, 127.0300)));
        assert_eq!(match_zone(&zones, &q).unwrap().id, DeliveryZoneId::new(1));

        let q = query(None, None, Some((37.5330, 127.0250)));
        assert_eq!(match_zone(&zones, &q).unwrap().id, DeliveryZoneId::new(2));
    }

    #[test]
    fn test_radius_needs_both_coordinates() {
        let zones = [radius_zone(1, "37.5326000", "127.0246000", 5000)];
        let q = LocationQuery {
            latitude: Some(37.5326),
            ..LocationQuery::default()
        };
        assert!(match_zone(&zones, &q).is_none());
    }

    #[test]
    fn test_incomplete_fence_skipped() {
        let mut broken = radius_zone(1, "37.5326000", "127.0246000", 100);
        broken.center_lng = None;
        let zones = [broken, radius_zone(2, "37.5326000", "127.0246000", 5000)];
        let q = query(None, None, Some((37.5326, 127.0246)));
        assert_eq!(match_zone(&zones, &q).unwrap().id, DeliveryZoneId::new(2));
    }

    #[test]
    fn test_outside_every_fence() {
        let zones = [radius_zone(1, "37.5326000", "127.0246000", 500)];
        let q = query(None, None, Some((37.6000, 127.1000)));
        assert!(match_zone(&zones, &q).is_none());
    }

    #[test]
    fn test_fee_terms_fall_back_to_policy() {
        let policy = StorePolicy {
            min_order_amount_default: Money::from_units(15000),
            base_delivery_fee_default: Money::from_units(3000),
            free_delivery_threshold_default: Money::from_units(40000),
            ..StorePolicy::default()
        };
        let mut zone = dong_zone(1, "A");
        zone.base_fee = Some(Money::from_units(2000));

        let terms = FeeTerms::resolve(Some(&zone), &policy);
        assert_eq!(terms.min_order_amount, Money::from_units(15000));
        assert_eq!(terms.base_fee, Money::from_units(2000));

        let terms = FeeTerms::resolve(None, &policy);
        assert_eq!(terms.base_fee, Money::from_units(3000));
        assert_eq!(terms.delivery_fee(Money::from_units(39999)), Money::from_units(3000));
        assert_eq!(terms.delivery_fee(Money::from_units(40000)), Money::ZERO);
    }

    #[test]
    fn test_zone_draft_validation() {
        let draft: ZoneDraft = serde_json::from_str(r#"{"zone_type":"DONG","dong_code":"1535011000"}"#).unwrap();
        assert!(draft.is_active);
        draft.validate().unwrap();

        let draft: ZoneDraft = serde_json::from_str(r#"{"zone_type":"APARTMENT"}"#).unwrap();
        assert_eq!(draft.validate().unwrap_err().code, ErrorCode::InvalidZone);

        let draft: ZoneDraft = serde_json::from_str(
            r#"{"zone_type":"RADIUS","center_lat":"37.5","center_lng":"127.0","radius_m":10}"#,
        )
        .unwrap();
        assert_eq!(draft.validate().unwrap_err().code, ErrorCode::InvalidZone);

        let draft: ZoneDraft =
            serde_json::from_str(r#"{"zone_type":"DONG","dong_code":"A","base_fee":"-1"}"#).unwrap();
        assert_eq!(draft.validate().unwrap_err().code, ErrorCode::InvalidZone);
    }

    #[test]
    fn test_zone_patch_revalidates() {
        let zone = dong_zone(1, "A");
        let patch = ZonePatch {
            zone_type: Some(ZoneType::Radius),
            ..ZonePatch::default()
        };
        assert_eq!(patch.merge(&zone).unwrap_err().code, ErrorCode::InvalidZone);

        let patch = ZonePatch {
            is_active: Some(false),
            ..ZonePatch::default()
        };
        assert!(!patch.merge(&zone).unwrap().is_active);
    }
}
