//! Catalog, cart and store configuration rules against a real database.
//!
//! These tests require a `PostgreSQL` database reachable through
//! `TEST_DATABASE_URL`.
//!
//! Run with: cargo test -p local-market-integration-tests --test store_admin -- --ignored

use std::sync::Arc;

use local_market_core::catalog::{InventoryUpdate, ProductDraft, ProductPatch};
use local_market_core::order::Actor;
use local_market_core::policy::{HolidayDraft, HolidayPatch, PolicyPatch};
use local_market_core::zone::ZoneDraft;
use local_market_core::{
    DomainError, ErrorCode, FixedClock, Money, ProductStatus, UserId, ZoneType,
};
use local_market_integration_tests::{
    create_product, far_future_date, guest_cart, store_morning, test_state,
};
use local_market_server::error::AppError;
use local_market_server::services::{
    CartService, CatalogService, CheckoutRequest, CheckoutService, ProductQuery,
    StoreConfigService,
};
use local_market_server::state::AppState;

fn code_of(err: &AppError) -> Option<ErrorCode> {
    match err {
        AppError::Domain(DomainError { code, .. }) => Some(*code),
        _ => None,
    }
}

async fn state() -> AppState {
    test_state(Arc::new(FixedClock::new(store_morning()))).await
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_duplicate_sku_is_conflict() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let catalog = CatalogService::new(&state);

    let mut draft = ProductDraft::from(&product);
    draft.name = "Another name".to_string();
    let err = catalog.create(draft, &Actor::system()).await.unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::DuplicateSku));
    assert_eq!(err.status().as_u16(), 409);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_patch_validates_merged_prices() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let catalog = CatalogService::new(&state);

    let patch = ProductPatch {
        sale_price: Some(Some(Money::from_units(5_000))),
        ..ProductPatch::default()
    };
    let err = catalog
        .update(product.id, patch, &Actor::admin("mgr"))
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::InvalidPrice));

    let patch = ProductPatch {
        sale_price: Some(Some(Money::from_units(4_500))),
        ..ProductPatch::default()
    };
    let updated = catalog
        .update(product.id, patch, &Actor::admin("mgr"))
        .await
        .unwrap();
    assert_eq!(updated.effective_price(), Money::from_units(4_500));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_soft_delete_hides_product() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let catalog = CatalogService::new(&state);

    catalog
        .delete(product.id, &Actor::admin("mgr"))
        .await
        .unwrap();

    let err = catalog.get_public(product.id).await.unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::ProductNotFound));

    let visible = catalog
        .list_public(&ProductQuery {
            category_id: None,
            search: Some(product.name.clone()),
        })
        .await
        .unwrap();
    assert!(visible.is_empty());

    let all = catalog.list_admin().await.unwrap();
    let row = all.iter().find(|p| p.id == product.id).unwrap();
    assert!(!row.is_visible);
    assert_eq!(row.status, ProductStatus::Paused);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_inventory_update_bounds() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let catalog = CatalogService::new(&state);

    let err = catalog
        .set_inventory(
            product.id,
            InventoryUpdate {
                stock_qty: 5,
                max_per_order: 100,
            },
            &Actor::admin("mgr"),
        )
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::InvalidRequest));

    let updated = catalog
        .set_inventory(
            product.id,
            InventoryUpdate {
                stock_qty: 0,
                max_per_order: 3,
            },
            &Actor::admin("mgr"),
        )
        .await
        .unwrap();
    assert_eq!(updated.stock_qty, 0);
    assert_eq!(updated.max_per_order, 3);
}

// ============================================================================
// Carts
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_adding_twice_merges_into_one_line() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;

    let cart = CartService::new(&state)
        .add_item(Some(&cart.session_key), None, product.id, 3)
        .await
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].qty, 5);
    assert_eq!(cart.subtotal, Money::from_units(25_000));

    let err = CartService::new(&state)
        .add_item(Some(&cart.session_key), None, product.id, 6)
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::MaxQtyExceeded));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_cart_bound_to_member_rejects_other_member() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let cart = guest_cart(&state, &product, 1).await;
    let carts = CartService::new(&state);

    let bound = carts
        .get_or_create(Some(&cart.session_key), Some(UserId::new(41)))
        .await
        .unwrap();
    assert_eq!(bound.user_id, Some(UserId::new(41)));

    let err = carts
        .get_or_create(Some(&cart.session_key), Some(UserId::new(42)))
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::CartOwnershipMismatch));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_quote_outside_zone_lists_every_problem() {
    let state = state().await;
    let product = create_product(&state, 5_000, 10).await;
    let cart = guest_cart(&state, &product, 1).await;

    let request = CheckoutRequest {
        session_key: Some(cart.session_key.clone()),
        ..CheckoutRequest::default()
    };
    let quote = CheckoutService::new(&state)
        .quote(&request, None)
        .await
        .unwrap();
    assert!(!quote.valid);
    assert!(quote.errors.contains(&ErrorCode::OutOfDeliveryZone));
    assert!(quote.errors.contains(&ErrorCode::MinOrderNotMet));
    assert_eq!(quote.subtotal, Money::from_units(5_000));
}

// ============================================================================
// Store configuration
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_policy_patch_rejects_inverted_hours() {
    let state = state().await;
    let store = StoreConfigService::new(&state);
    let policy = store.policy().await.unwrap();

    let err = store
        .update_policy(&PolicyPatch {
            open_time: Some(policy.close_time),
            close_time: Some(policy.open_time),
            ..PolicyPatch::default()
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::InvalidPolicy));
    assert_eq!(store.policy().await.unwrap(), policy);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_radius_zone_needs_center() {
    let state = state().await;
    let draft = ZoneDraft {
        zone_type: ZoneType::Radius,
        dong_code: None,
        apartment_name: None,
        center_lat: None,
        center_lng: None,
        radius_m: Some(1_000),
        min_order_amount: None,
        base_fee: None,
        free_delivery_threshold: None,
        is_active: false,
    };
    let err = StoreConfigService::new(&state)
        .create_zone(&draft)
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::InvalidZone));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_holiday_lifecycle() {
    let state = state().await;
    let store = StoreConfigService::new(&state);
    let date = far_future_date();

    // Clean up a leftover from an aborted run
    if let Some(old) = store
        .list_holidays()
        .await
        .unwrap()
        .into_iter()
        .find(|h| h.holiday_date == date)
    {
        store.delete_holiday(old.id).await.unwrap();
    }

    let draft = HolidayDraft {
        holiday_date: date,
        reason: Some("  Year end  ".to_string()),
        is_closed: true,
    };
    let holiday = store.create_holiday(draft.clone()).await.unwrap();
    assert_eq!(holiday.reason.as_deref(), Some("Year end"));

    let err = store.create_holiday(draft).await.unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::DuplicateHoliday));

    let patched = store
        .update_holiday(
            holiday.id,
            HolidayPatch {
                is_closed: Some(false),
                ..HolidayPatch::default()
            },
        )
        .await
        .unwrap();
    assert!(!patched.is_closed);

    store.delete_holiday(holiday.id).await.unwrap();
    let err = store.delete_holiday(holiday.id).await.unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::HolidayNotFound));
}
