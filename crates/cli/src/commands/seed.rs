//! Seed the store from a YAML file.
//!
//! Loads categories, products, delivery zones and holidays. Re-running the
//! same file is safe: categories are upserted by name, products with an
//! existing SKU and holidays on a taken date are skipped, and zones equal to
//! an existing one are left alone.
//!
//! See `crates/cli/seed.example.yaml` for the format.

use std::path::Path;

use local_market_core::catalog::ProductDraft;
use local_market_core::order::Actor;
use local_market_core::policy::HolidayDraft;
use local_market_core::zone::{DeliveryZone, ZoneDraft};
use local_market_core::{DomainError, ErrorCode};
use local_market_server::db::CategoryRepository;
use local_market_server::error::AppError;
use local_market_server::services::{CatalogService, StoreConfigService};
use serde::Deserialize;
use tracing::{info, warn};

use super::{CliError, connect};

/// Top-level seed document.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub zones: Vec<ZoneDraft>,
    #[serde(default)]
    pub holidays: Vec<HolidayDraft>,
}

/// A category with the products filed under it.
#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub products: Vec<ProductDraft>,
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub products_inserted: usize,
    pub products_skipped: usize,
    pub zones_inserted: usize,
    pub zones_skipped: usize,
    pub holidays_inserted: usize,
    pub holidays_skipped: usize,
}

impl SeedFile {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Yaml` if the text does not match the format.
    pub fn parse(content: &str) -> Result<Self, CliError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

fn is_code(err: &AppError, code: ErrorCode) -> bool {
    matches!(err, AppError::Domain(DomainError { code: c, .. }) if *c == code)
}

/// Returns `true` if `existing` already covers what `draft` describes.
fn zone_exists(existing: &[DeliveryZone], draft: &ZoneDraft) -> bool {
    existing.iter().any(|z| {
        z.zone_type == draft.zone_type
            && z.dong_code == draft.dong_code
            && z.apartment_name == draft.apartment_name
            && z.center_lat == draft.center_lat
            && z.center_lng == draft.center_lng
            && z.radius_m == draft.radius_m
    })
}

/// Load the file at `file_path` into the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a write fails
/// for a reason other than the duplicates skipped above.
pub async fn run(file_path: &str) -> Result<(), CliError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading seed data from file");

    // Parse before connecting so a typo fails fast
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let seed = SeedFile::parse(&content)?;

    let state = connect().await?;
    let actor = Actor::system();
    let catalog = CatalogService::new(&state);
    let store = StoreConfigService::new(&state);
    let categories = CategoryRepository::new(state.pool());
    let mut report = SeedReport::default();

    for category in seed.categories {
        let row = categories
            .upsert_by_name(category.name.trim(), category.display_order)
            .await?;
        report.categories += 1;

        for draft in category.products {
            let sku = draft.sku.clone();
            let draft = ProductDraft {
                category_id: Some(row.id),
                ..draft
            };
            match catalog.create(draft, &actor).await {
                Ok(_) => report.products_inserted += 1,
                Err(e) if is_code(&e, ErrorCode::DuplicateSku) => {
                    info!(sku = %sku, "Product exists, skipping");
                    report.products_skipped += 1;
                }
                Err(e) => {
                    warn!(sku = %sku, error = %e, "Product rejected");
                    return Err(e.into());
                }
            }
        }
    }

    let mut zones = store.list_zones().await?;
    for draft in seed.zones {
        if zone_exists(&zones, &draft) {
            report.zones_skipped += 1;
            continue;
        }
        let zone = store.create_zone(&draft).await?;
        zones.push(zone);
        report.zones_inserted += 1;
    }

    for draft in seed.holidays {
        let date = draft.holiday_date;
        match store.create_holiday(draft).await {
            Ok(_) => report.holidays_inserted += 1,
            Err(e) if is_code(&e, ErrorCode::DuplicateHoliday) => {
                info!(%date, "Holiday exists, skipping");
                report.holidays_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Categories: {}", report.categories);
    info!(
        "  Products inserted: {} (skipped: {})",
        report.products_inserted, report.products_skipped
    );
    info!(
        "  Zones inserted: {} (skipped: {})",
        report.zones_inserted, report.zones_skipped
    );
    info!(
        "  Holidays inserted: {} (skipped: {})",
        report.holidays_inserted, report.holidays_skipped
    );

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use local_market_core::{DeliveryZoneId, ZoneType};

    use super::*;

    const EXAMPLE: &str = include_str!("../../seed.example.yaml");

    #[test]
    fn test_example_file_parses() {
        let seed = SeedFile::parse(EXAMPLE).unwrap();
        assert!(!seed.categories.is_empty());
        assert!(seed.categories.iter().any(|c| !c.products.is_empty()));
        assert!(!seed.zones.is_empty());
        for category in &seed.categories {
            for product in &category.products {
                product.validate().unwrap();
            }
        }
        for zone in &seed.zones {
            zone.validate().unwrap();
        }
    }

    #[test]
    fn test_empty_document_is_empty_seed() {
        let seed = SeedFile::parse("{}").unwrap();
        assert!(seed.categories.is_empty());
        assert!(seed.zones.is_empty());
        assert!(seed.holidays.is_empty());
    }

    #[test]
    fn test_unknown_zone_type_is_rejected() {
        let err = SeedFile::parse("zones:\n  - zone_type: PLANET\n").unwrap_err();
        assert!(matches!(err, CliError::Yaml(_)));
    }

    #[test]
    fn test_zone_exists_matches_on_key_fields() {
        let draft = ZoneDraft {
            zone_type: ZoneType::Dong,
            dong_code: Some("1168010100".to_string()),
            apartment_name: None,
            center_lat: None,
            center_lng: None,
            radius_m: None,
            min_order_amount: None,
            base_fee: None,
            free_delivery_threshold: None,
            is_active: true,
        };
        let existing = DeliveryZone {
            id: DeliveryZoneId::new(1),
            zone_type: ZoneType::Dong,
            dong_code: Some("1168010100".to_string()),
            apartment_name: None,
            center_lat: None,
            center_lng: None,
            radius_m: None,
            min_order_amount: None,
            base_fee: None,
            free_delivery_threshold: None,
            is_active: false,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        assert!(zone_exists(std::slice::from_ref(&existing), &draft));

        let other = ZoneDraft {
            dong_code: Some("1168010200".to_string()),
            ..draft
        };
        assert!(!zone_exists(&[existing], &other));
    }
}
