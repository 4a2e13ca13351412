//! Cart service: session carts, line edits and the cart view.
//!
//! Every operation opens the cart inside its own transaction: the cart row is
//! locked, bound to the signed-in user if it is still anonymous, and emptied
//! with a fresh expiry if it has lapsed.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use local_market_core::cart::{self, Cart, CartBinding, CartLine, LineChange};
use local_market_core::catalog::Product;
use local_market_core::{CartItemId, DomainError, ErrorCode, Money, ProductId, UserId};
use rand::RngCore;
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{debug, info, instrument};

use crate::db::{carts, catalog};
use crate::error::AppError;
use crate::state::AppState;

/// Random bytes in a generated session key.
const SESSION_KEY_BYTES: usize = 24;

/// Generate a new URL-safe session key.
#[must_use]
pub fn generate_session_key() -> String {
    let mut bytes = [0u8; SESSION_KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One cart line as shown to the customer.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub unit_label: Option<String>,
    pub qty: i32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A cart with its lines and subtotal.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub session_key: String,
    pub user_id: Option<UserId>,
    pub expires_at: DateTime<Utc>,
    pub items: Vec<CartItemView>,
    pub subtotal: Money,
}

impl CartView {
    fn build(cart: &Cart, lines: &[CartLine], products: &[Product]) -> Self {
        let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
        let items = lines
            .iter()
            .map(|line| {
                let product = by_id.get(&line.product_id);
                CartItemView {
                    id: line.id,
                    product_id: line.product_id,
                    product_name: product.map(|p| p.name.clone()),
                    unit_label: product.map(|p| p.unit_label.clone()),
                    qty: line.qty,
                    unit_price: line.unit_snapshot_price,
                    line_total: line.line_total(),
                }
            })
            .collect();

        Self {
            session_key: cart.session_key.clone(),
            user_id: cart.user_id,
            expires_at: cart.expires_at,
            items,
            subtotal: cart::subtotal(lines),
        }
    }
}

/// Cart operations for the storefront.
pub struct CartService<'a> {
    state: &'a AppState,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Get the cart for `session_key`, creating one if needed.
    ///
    /// A missing or blank key starts a new cart under a generated key.
    ///
    /// # Errors
    ///
    /// Returns `CART_OWNERSHIP_MISMATCH` if the cart belongs to another user.
    #[instrument(skip(self, session_key))]
    pub async fn get_or_create(
        &self,
        session_key: Option<&str>,
        user: Option<UserId>,
    ) -> Result<CartView, AppError> {
        let mut tx = self.state.pool().begin().await?;
        let cart = open_cart(&mut *tx, session_key, user, self.state).await?;
        let view = load_view(&mut *tx, &cart).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Add `qty` of a product, merging into the existing line if there is one.
    ///
    /// # Errors
    ///
    /// `INVALID_QTY`, `OUT_OF_STOCK`, `MAX_QTY_EXCEEDED` or
    /// `INSUFFICIENT_STOCK` from the add-to-cart checks.
    #[instrument(skip(self, session_key))]
    pub async fn add_item(
        &self,
        session_key: Option<&str>,
        user: Option<UserId>,
        product_id: ProductId,
        qty: i32,
    ) -> Result<CartView, AppError> {
        let now = self.state.now();
        let mut tx = self.state.pool().begin().await?;
        let cart = open_cart(&mut *tx, session_key, user, self.state).await?;

        let product = catalog::get_many_in(&mut *tx, &[product_id]).await?.pop();
        let existing = carts::line_for_product(&mut *tx, cart.id, product_id).await?;

        match cart::plan_add(product.as_ref(), qty, existing.as_ref())? {
            LineChange::Insert {
                qty,
                unit_snapshot_price,
            } => {
                carts::insert_line(&mut *tx, cart.id, product_id, qty, unit_snapshot_price, now)
                    .await?;
            }
            LineChange::Merge { line_id, qty } => {
                carts::update_line(&mut *tx, line_id, qty, None).await?;
            }
        }

        let view = load_view(&mut *tx, &cart).await?;
        tx.commit().await?;

        debug!(cart_id = %cart.id, "Added cart item");
        Ok(view)
    }

    /// Change a line's quantity, re-snapshotting the current price.
    ///
    /// # Errors
    ///
    /// `CART_ITEM_NOT_FOUND` for an unknown line, plus the add-to-cart checks.
    #[instrument(skip(self, session_key))]
    pub async fn update_item(
        &self,
        session_key: Option<&str>,
        user: Option<UserId>,
        item_id: CartItemId,
        qty: i32,
    ) -> Result<CartView, AppError> {
        let mut tx = self.state.pool().begin().await?;
        let cart = open_cart(&mut *tx, session_key, user, self.state).await?;

        let line = carts::get_line(&mut *tx, cart.id, item_id)
            .await?
            .ok_or_else(cart_item_not_found)?;
        let product = catalog::get_many_in(&mut *tx, &[line.product_id]).await?.pop();
        let price = cart::plan_update(product.as_ref(), qty)?;
        carts::update_line(&mut *tx, line.id, qty, Some(price)).await?;

        let view = load_view(&mut *tx, &cart).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// `CART_ITEM_NOT_FOUND` for an unknown line.
    #[instrument(skip(self, session_key))]
    pub async fn remove_item(
        &self,
        session_key: Option<&str>,
        user: Option<UserId>,
        item_id: CartItemId,
    ) -> Result<CartView, AppError> {
        let mut tx = self.state.pool().begin().await?;
        let cart = open_cart(&mut *tx, session_key, user, self.state).await?;

        if !carts::delete_line(&mut *tx, cart.id, item_id).await? {
            return Err(cart_item_not_found().into());
        }

        let view = load_view(&mut *tx, &cart).await?;
        tx.commit().await?;
        Ok(view)
    }
}

fn cart_item_not_found() -> DomainError {
    DomainError::new(ErrorCode::CartItemNotFound, "cart item not found")
}

/// Lock or create the cart for a request, applying binding and expiry rules.
pub(crate) async fn open_cart(
    conn: &mut PgConnection,
    session_key: Option<&str>,
    user: Option<UserId>,
    state: &AppState,
) -> Result<Cart, AppError> {
    let now = state.now();
    let expires_at = now + state.config().cart_ttl;

    let key = session_key.map(str::trim).filter(|k| !k.is_empty());
    let existing = match key {
        Some(key) => carts::lock_by_session_key(&mut *conn, key).await?,
        None => None,
    };

    let Some(mut cart) = existing else {
        let key = key.map_or_else(generate_session_key, str::to_owned);
        let cart = carts::insert(&mut *conn, &key, user, expires_at, now).await?;
        info!(cart_id = %cart.id, "Created cart");
        return Ok(cart);
    };

    if let CartBinding::Bind(user_id) = cart.binding_for(user)? {
        carts::bind_user(&mut *conn, cart.id, user_id).await?;
        cart.user_id = Some(user_id);
    }

    if cart.is_expired(now) {
        carts::renew(&mut *conn, cart.id, expires_at).await?;
        cart.expires_at = expires_at;
        debug!(cart_id = %cart.id, "Renewed expired cart");
    }

    Ok(cart)
}

async fn load_view(conn: &mut PgConnection, cart: &Cart) -> Result<CartView, AppError> {
    let lines = carts::lines(&mut *conn, cart.id).await?;
    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let products = catalog::get_many_in(&mut *conn, &ids).await?;
    Ok(CartView::build(cart, &lines, &products))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use local_market_core::CartId;

    use super::*;

    #[test]
    fn test_session_key_is_url_safe() {
        let key = generate_session_key();
        assert_eq!(key.len(), 32);
        assert!(
            key.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(key, generate_session_key());
    }

    #[test]
    fn test_view_totals_use_snapshot_prices() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap();
        let cart = Cart {
            id: CartId::new(1),
            session_key: "k".to_string(),
            user_id: None,
            expires_at: at,
            created_at: at,
        };
        let line = |id, product, qty, price| CartLine {
            id: CartItemId::new(id),
            cart_id: cart.id,
            product_id: ProductId::new(product),
            qty,
            unit_snapshot_price: Money::from_units(price),
            created_at: at,
        };
        let lines = [line(1, 10, 2, 1500), line(2, 11, 1, 4000)];

        let view = CartView::build(&cart, &lines, &[]);

        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].line_total, Money::from_units(3000));
        assert!(view.items[0].product_name.is_none());
        assert_eq!(view.subtotal, Money::from_units(7000));
    }
}
