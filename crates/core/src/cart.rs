//! Carts and cart lines.
//!
//! A cart is keyed by an opaque session key and may be bound to one signed-in
//! user. Each line freezes the unit price at the moment it was written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::types::{CartId, CartItemId, Money, ProductId, UserId};

/// Allowed quantity range for a single cart line.
pub const LINE_QTY_RANGE: core::ops::RangeInclusive<i32> = 1..=99;

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub session_key: String,
    pub user_id: Option<UserId>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// What to do with a cart's owner when a request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartBinding {
    /// Leave the cart as it is.
    Keep,
    /// Bind the anonymous cart to this user.
    Bind(UserId),
}

impl Cart {
    /// Returns `true` once the retention window has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Decide how a request from `user` relates to this cart.
    ///
    /// # Errors
    ///
    /// Returns `CART_OWNERSHIP_MISMATCH` if the cart is bound to a different user.
    pub fn binding_for(&self, user: Option<UserId>) -> DomainResult<CartBinding> {
        match (self.user_id, user) {
            (None, Some(user)) => Ok(CartBinding::Bind(user)),
            (Some(owner), Some(user)) if owner != user => Err(DomainError::new(
                ErrorCode::CartOwnershipMismatch,
                "this cart belongs to another user",
            )),
            _ => Ok(CartBinding::Keep),
        }
    }
}

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub qty: i32,
    /// Unit price captured when the line was last written.
    pub unit_snapshot_price: Money,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// Snapshot price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_snapshot_price.times(self.qty)
    }
}

/// Sum of line totals.
pub fn subtotal<'a>(lines: impl IntoIterator<Item = &'a CartLine>) -> Money {
    lines.into_iter().map(CartLine::line_total).sum()
}

/// Check a requested line quantity against the per-line bounds.
///
/// # Errors
///
/// Returns `INVALID_QTY` outside `1..=99`.
pub fn check_line_qty(qty: i32) -> DomainResult<()> {
    if LINE_QTY_RANGE.contains(&qty) {
        Ok(())
    } else {
        Err(DomainError::new(
            ErrorCode::InvalidQty,
            "quantity must be between 1 and 99",
        ))
    }
}

/// Result of adding a product to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    /// Insert a new line.
    Insert { qty: i32, unit_snapshot_price: Money },
    /// Raise the quantity of the existing line.
    Merge { line_id: CartItemId, qty: i32 },
}

/// Plan adding `qty` of `product` to a cart that currently holds `existing`.
///
/// At most one line exists per product, so adding a product already in the
/// cart merges quantities and re-checks the merged total. A merge keeps the
/// original price snapshot.
///
/// # Errors
///
/// `INVALID_QTY` for a bad quantity, `OUT_OF_STOCK` for a missing or
/// unsellable product, and the limits from [`Product::check_purchasable`].
pub fn plan_add(
    product: Option<&Product>,
    qty: i32,
    existing: Option<&CartLine>,
) -> DomainResult<LineChange> {
    check_line_qty(qty)?;
    let product = product.ok_or_else(|| {
        DomainError::new(ErrorCode::OutOfStock, "product is not available for sale")
    })?;

    match existing {
        Some(line) => {
            let merged = line.qty + qty;
            product.check_purchasable(merged)?;
            Ok(LineChange::Merge {
                line_id: line.id,
                qty: merged,
            })
        }
        None => {
            product.check_purchasable(qty)?;
            Ok(LineChange::Insert {
                qty,
                unit_snapshot_price: product.effective_price(),
            })
        }
    }
}

/// Plan changing an existing line to `qty`, returning the new price snapshot.
///
/// # Errors
///
/// `INVALID_QTY` for a bad quantity, `PRODUCT_NOT_FOUND` if the product has
/// been removed, and the limits from [`Product::check_purchasable`].
pub fn plan_update(product: Option<&Product>, qty: i32) -> DomainResult<Money> {
    check_line_qty(qty)?;
    let product = product
        .ok_or_else(|| DomainError::new(ErrorCode::ProductNotFound, "product not found"))?;
    product.check_purchasable(qty)?;
    Ok(product.effective_price())
}
