//! Checkout service: loads everything the validator needs and runs it.

use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use local_market_core::cart::{Cart, CartLine};
use local_market_core::catalog::Product;
use local_market_core::checkout::{self, CheckoutInput, CheckoutLine, Quote};
use local_market_core::clock::SlotStart;
use local_market_core::policy::{StorePolicy, closed_dates};
use local_market_core::zone::{DeliveryZone, LocationQuery};
use local_market_core::{DomainError, ErrorCode, UserId};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{debug, instrument};

use crate::db::{HolidayRepository, PolicyRepository, ZoneRepository, carts, catalog};
use crate::error::AppError;
use crate::services::carts::open_cart;
use crate::state::AppState;

/// Checkout form as submitted by the storefront.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(flatten)]
    pub location: LocationQuery,
    #[serde(default)]
    pub requested_slot_start: Option<SlotStart>,
}

/// Short form of a quote.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub valid: bool,
    pub errors: Vec<ErrorCode>,
}

impl From<&Quote> for ValidationSummary {
    fn from(quote: &Quote) -> Self {
        Self {
            valid: quote.valid,
            errors: quote.errors.clone(),
        }
    }
}

/// Store configuration a quote is evaluated against.
#[derive(Debug, Clone)]
pub struct QuoteContext {
    pub policy: StorePolicy,
    pub closed_dates: Vec<NaiveDate>,
    pub zones: Vec<DeliveryZone>,
    pub now: DateTime<Tz>,
    pub slot: Option<DateTime<Tz>>,
}

impl QuoteContext {
    /// Load the policy, zones and relevant holidays.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` for a slot time that does not exist in the
    /// store's time zone, or a database error.
    pub async fn load(state: &AppState, slot: Option<SlotStart>) -> Result<Self, AppError> {
        let tz = state.time_zone();
        let now = state.local_now();
        let slot = slot
            .map(|s| {
                s.to_local(tz).ok_or_else(|| {
                    DomainError::invalid_request("requested slot does not exist in store time")
                })
            })
            .transpose()?;

        let policy = PolicyRepository::new(state.pool())
            .get_or_init(&state.config().policy_defaults)
            .await?;

        let today = now.date_naive();
        let horizon = u64::try_from(policy.allow_reservation_days).unwrap_or(0);
        let last = today.checked_add_days(Days::new(horizon)).unwrap_or(today);
        let (from, to) = match slot.map(|s| s.date_naive()) {
            Some(d) => (d.min(today), d.max(last)),
            None => (today, last),
        };
        let holidays = HolidayRepository::new(state.pool())
            .list_between(from, to)
            .await?;
        let zones = ZoneRepository::new(state.pool()).list_active().await?;

        Ok(Self {
            policy,
            closed_dates: closed_dates(&holidays),
            zones,
            now,
            slot,
        })
    }

    /// Run the validator over cart lines and the products they refer to.
    #[must_use]
    pub fn quote(&self, location: &LocationQuery, lines: &[CartLine], products: &[Product]) -> Quote {
        let checkout_lines: Vec<CheckoutLine<'_>> = lines
            .iter()
            .map(|line| CheckoutLine {
                qty: line.qty,
                unit_snapshot_price: line.unit_snapshot_price,
                product: products.iter().find(|p| p.id == line.product_id),
            })
            .collect();

        checkout::validate(&CheckoutInput {
            policy: &self.policy,
            now: self.now,
            slot: self.slot,
            closed_dates: &self.closed_dates,
            zones: &self.zones,
            location,
            lines: &checkout_lines,
        })
    }
}

/// Checkout validation for the storefront.
pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Price the cart and report every reason it cannot be ordered yet.
    ///
    /// # Errors
    ///
    /// `CART_OWNERSHIP_MISMATCH`, `INVALID_REQUEST` for a bad slot, or a
    /// database error. Eligibility problems are reported in the quote.
    #[instrument(skip(self, request))]
    pub async fn quote(&self, request: &CheckoutRequest, user: Option<UserId>) -> Result<Quote, AppError> {
        let context = QuoteContext::load(self.state, request.requested_slot_start).await?;

        let mut tx = self.state.pool().begin().await?;
        let cart = open_cart(&mut *tx, request.session_key.as_deref(), user, self.state).await?;
        let (lines, products) = cart_contents(&mut *tx, &cart).await?;
        tx.commit().await?;

        let quote = context.quote(&request.location, &lines, &products);
        debug!(cart_id = %cart.id, valid = quote.valid, errors = ?quote.errors, "Checkout quoted");
        Ok(quote)
    }
}

/// Lines of a cart with the current rows of their products.
pub(crate) async fn cart_contents(
    conn: &mut PgConnection,
    cart: &Cart,
) -> Result<(Vec<CartLine>, Vec<Product>), AppError> {
    let lines = carts::lines(&mut *conn, cart.id).await?;
    let ids: Vec<_> = lines.iter().map(|l| l.product_id).collect();
    let products = catalog::get_many_in(&mut *conn, &ids).await?;
    Ok((lines, products))
}
