//! Integration test support for Local Market.
//!
//! # Running Tests
//!
//! ```bash
//! # Database-backed service tests
//! TEST_DATABASE_URL=postgres://localhost/local_market_test \
//!     cargo test -p local-market-integration-tests -- --ignored
//!
//! # HTTP tests against a running server
//! MARKET_BASE_URL=http://localhost:8000 \
//!     cargo test -p local-market-integration-tests --test api -- --ignored
//! ```
//!
//! Tests never truncate tables. Every fixture gets a unique SKU or session
//! key, so tests can run in parallel against one database.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use local_market_core::catalog::{Product, ProductDraft};
use local_market_core::order::{Actor, OrderTerms};
use local_market_core::policy::{PolicyPatch, StorePolicy};
use local_market_core::zone::{LocationQuery, ZoneDraft};
use local_market_core::{Clock, Money, ProductStatus, ZoneType};
use local_market_server::config::MarketConfig;
use local_market_server::db;
use local_market_server::services::{
    CartService, CartView, CatalogService, CreateOrderRequest, StoreConfigService,
};
use local_market_server::state::AppState;
use secrecy::SecretString;

/// Dong code served by the test delivery zone.
pub const TEST_DONG_CODE: &str = "1100000000";

/// Phone number used on test orders.
pub const TEST_PHONE: &str = "010-1234-5678";

/// Base URL for HTTP tests (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("MARKET_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Database URL for service tests.
///
/// # Panics
///
/// Panics if `TEST_DATABASE_URL` is not set.
#[must_use]
pub fn database_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set for database tests")
}

/// A clock tests can move forward.
#[derive(Debug)]
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A weekday morning in the store's time zone, inside opening hours.
///
/// # Panics
///
/// Never; the reading is a valid Seoul wall-clock time.
#[must_use]
pub fn store_morning() -> DateTime<Utc> {
    Seoul
        .with_ymd_and_hms(2026, 3, 10, 10, 0, 0)
        .single()
        .expect("valid local time")
        .with_timezone(&Utc)
}

/// Opening hours 09:00 to 21:00, cutoff 19:00, two reservation days.
///
/// # Panics
///
/// Never; the times are constants.
#[must_use]
pub fn test_policy() -> StorePolicy {
    let time = |h| NaiveTime::from_hms_opt(h, 0, 0).expect("valid time");
    StorePolicy {
        open_time: time(9),
        close_time: time(21),
        same_day_cutoff_time: time(19),
        min_order_amount_default: Money::from_units(15_000),
        base_delivery_fee_default: Money::from_units(3_000),
        free_delivery_threshold_default: Money::from_units(40_000),
        allow_reservation_days: 2,
    }
}

/// Server configuration for tests.
#[must_use]
pub fn test_config(database_url: &str) -> MarketConfig {
    MarketConfig {
        database_url: SecretString::from(database_url.to_owned()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        time_zone: Seoul,
        cart_ttl: Duration::days(7),
        order_terms: OrderTerms::default(),
        policy_defaults: test_policy(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Connect, migrate, and pin the store policy and test zone.
///
/// # Panics
///
/// Panics if the database is unreachable or setup fails.
pub async fn test_state(clock: Arc<dyn Clock>) -> AppState {
    let url = database_url();
    let config = test_config(&url);
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../server/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState::with_clock(config, pool, clock);
    let store = StoreConfigService::new(&state);
    let policy = test_policy();
    store
        .update_policy(&PolicyPatch {
            open_time: Some(policy.open_time),
            close_time: Some(policy.close_time),
            same_day_cutoff_time: Some(policy.same_day_cutoff_time),
            min_order_amount_default: Some(policy.min_order_amount_default),
            base_delivery_fee_default: Some(policy.base_delivery_fee_default),
            free_delivery_threshold_default: Some(policy.free_delivery_threshold_default),
            allow_reservation_days: Some(policy.allow_reservation_days),
        })
        .await
        .expect("Failed to set store policy");

    let zones = store.list_zones().await.expect("Failed to list zones");
    if !zones
        .iter()
        .any(|z| z.is_active && z.dong_code.as_deref() == Some(TEST_DONG_CODE))
    {
        store
            .create_zone(&test_zone())
            .await
            .expect("Failed to create test zone");
    }

    state
}

/// DONG zone: minimum 15000, fee 3000, free from 40000.
#[must_use]
pub fn test_zone() -> ZoneDraft {
    ZoneDraft {
        zone_type: ZoneType::Dong,
        dong_code: Some(TEST_DONG_CODE.to_string()),
        apartment_name: None,
        center_lat: None,
        center_lng: None,
        radius_m: None,
        min_order_amount: Some(Money::from_units(15_000)),
        base_fee: Some(Money::from_units(3_000)),
        free_delivery_threshold: Some(Money::from_units(40_000)),
        is_active: true,
    }
}

/// A location inside the test zone.
#[must_use]
pub fn test_location() -> LocationQuery {
    LocationQuery {
        dong_code: Some(TEST_DONG_CODE.to_string()),
        ..LocationQuery::default()
    }
}

/// Create an active product with a unique SKU.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn create_product(state: &AppState, price: i64, stock: i32) -> Product {
    let sku = format!("TEST-{}", uuid::Uuid::new_v4().simple());
    let draft = ProductDraft {
        category_id: None,
        name: format!("Test product {sku}"),
        sku,
        description: None,
        unit_label: "ea".to_string(),
        origin_country: None,
        storage_method: None,
        is_weight_item: false,
        base_price: Money::from_units(price),
        sale_price: None,
        status: ProductStatus::Active,
        is_visible: true,
        stock_qty: stock,
        max_per_order: 10,
        pick_location: Some("T-01".to_string()),
    };
    CatalogService::new(state)
        .create(draft, &Actor::system())
        .await
        .expect("Failed to create product")
}

/// Open a fresh guest cart holding `qty` of `product`.
///
/// # Panics
///
/// Panics if the cart cannot be filled.
pub async fn guest_cart(state: &AppState, product: &Product, qty: i32) -> CartView {
    let carts = CartService::new(state);
    let cart = carts
        .get_or_create(None, None)
        .await
        .expect("Failed to open cart");
    carts
        .add_item(Some(&cart.session_key), None, product.id, qty)
        .await
        .expect("Failed to add item")
}

/// An immediate-delivery order form for `session_key`.
#[must_use]
pub fn order_request(session_key: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        session_key: Some(session_key.to_owned()),
        customer_name: "Kim Test".to_string(),
        customer_phone: TEST_PHONE.to_string(),
        address_line1: "1 Test-ro".to_string(),
        address_line2: None,
        building: Some("101".to_string()),
        unit_no: Some("1203".to_string()),
        location: test_location(),
        requested_slot_start: None,
        allow_substitution: false,
        delivery_request_note: None,
    }
}

/// Date used by holiday tests, far from any real fixture.
///
/// # Panics
///
/// Never; the date is a constant.
#[must_use]
pub fn far_future_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 12, 31).expect("valid date")
}
