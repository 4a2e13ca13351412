//! Catalog products and price rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::types::{CategoryId, Money, ProductId, ProductStatus};

/// Default unit label for new products.
pub const DEFAULT_UNIT_LABEL: &str = "ea";

/// Default per-order quantity cap for new products.
pub const DEFAULT_MAX_PER_ORDER: i32 = 10;

/// Allowed range for a product's per-order quantity cap.
pub const MAX_PER_ORDER_RANGE: core::ops::RangeInclusive<i32> = 1..=99;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub display_order: i32,
    pub is_active: bool,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub origin_country: Option<String>,
    pub storage_method: Option<String>,
    pub unit_label: String,
    pub is_weight_item: bool,
    pub base_price: Money,
    pub sale_price: Option<Money>,
    pub status: ProductStatus,
    pub is_visible: bool,
    pub pick_location: Option<String>,
    pub popularity: i32,
    pub stock_qty: i32,
    pub reserved_qty: i32,
    pub max_per_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price a customer pays right now.
    ///
    /// The sale price only applies while it is strictly below the base price.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        effective_price(self.base_price, self.sale_price)
    }

    /// Units that can still be sold: stock minus reserved.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.stock_qty - self.reserved_qty
    }

    /// Returns `true` if customers may put this product in a cart.
    #[must_use]
    pub fn is_sellable(&self) -> bool {
        self.is_visible && self.status == ProductStatus::Active
    }

    /// Check that `qty` units can be sold in one order.
    ///
    /// # Errors
    ///
    /// Returns `OUT_OF_STOCK` if the product is hidden or not active,
    /// `MAX_QTY_EXCEEDED` above the per-order cap, and `INSUFFICIENT_STOCK`
    /// above the available quantity.
    pub fn check_purchasable(&self, qty: i32) -> DomainResult<()> {
        if !self.is_sellable() {
            return Err(DomainError::new(
                ErrorCode::OutOfStock,
                format!("{} is not available for sale", self.name),
            ));
        }
        if qty > self.max_per_order {
            return Err(DomainError::new(
                ErrorCode::MaxQtyExceeded,
                format!("at most {} of {} per order", self.max_per_order, self.name),
            ));
        }
        if qty > self.available() {
            return Err(DomainError::new(
                ErrorCode::InsufficientStock,
                format!("not enough stock for {}", self.name),
            ));
        }
        Ok(())
    }
}

/// Effective price for a base/sale pair.
#[must_use]
pub fn effective_price(base_price: Money, sale_price: Option<Money>) -> Money {
    match sale_price {
        Some(sale) if sale < base_price => sale,
        _ => base_price,
    }
}

/// Validate a base/sale price pair.
///
/// # Errors
///
/// Returns `INVALID_PRICE` if either price is negative or the sale price is
/// not strictly below the base price.
pub fn validate_prices(base_price: Money, sale_price: Option<Money>) -> DomainResult<()> {
    if base_price.is_negative() {
        return Err(DomainError::new(
            ErrorCode::InvalidPrice,
            "base_price must not be negative",
        ));
    }
    if let Some(sale) = sale_price {
        if sale.is_negative() {
            return Err(DomainError::new(
                ErrorCode::InvalidPrice,
                "sale_price must not be negative",
            ));
        }
        if sale >= base_price {
            return Err(DomainError::new(
                ErrorCode::InvalidPrice,
                "sale_price must be lower than base_price",
            ));
        }
    }
    Ok(())
}

fn validate_stock(stock_qty: i32, max_per_order: i32) -> DomainResult<()> {
    if stock_qty < 0 {
        return Err(DomainError::invalid_request("stock_qty must not be negative"));
    }
    if !MAX_PER_ORDER_RANGE.contains(&max_per_order) {
        return Err(DomainError::invalid_request(
            "max_per_order must be between 1 and 99",
        ));
    }
    Ok(())
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_unit_label")]
    pub unit_label: String,
    #[serde(default)]
    pub origin_country: Option<String>,
    #[serde(default)]
    pub storage_method: Option<String>,
    #[serde(default)]
    pub is_weight_item: bool,
    pub base_price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub stock_qty: i32,
    #[serde(default = "default_max_per_order")]
    pub max_per_order: i32,
    #[serde(default)]
    pub pick_location: Option<String>,
}

fn default_unit_label() -> String {
    DEFAULT_UNIT_LABEL.to_owned()
}

const fn default_true() -> bool {
    true
}

const fn default_max_per_order() -> i32 {
    DEFAULT_MAX_PER_ORDER
}

impl ProductDraft {
    /// Check the draft before it is written.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` for a blank name or SKU or out-of-range
    /// quantities, and `INVALID_PRICE` for a bad price pair.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::invalid_request("name is required"));
        }
        if self.sku.trim().is_empty() {
            return Err(DomainError::invalid_request("sku is required"));
        }
        validate_stock(self.stock_qty, self.max_per_order)?;
        validate_prices(self.base_price, self.sale_price)
    }
}

impl From<&Product> for ProductDraft {
    fn from(p: &Product) -> Self {
        Self {
            category_id: p.category_id,
            name: p.name.clone(),
            sku: p.sku.clone(),
            description: p.description.clone(),
            unit_label: p.unit_label.clone(),
            origin_country: p.origin_country.clone(),
            storage_method: p.storage_method.clone(),
            is_weight_item: p.is_weight_item,
            base_price: p.base_price,
            sale_price: p.sale_price,
            status: p.status,
            is_visible: p.is_visible,
            stock_qty: p.stock_qty,
            max_per_order: p.max_per_order,
            pick_location: p.pick_location.clone(),
        }
    }
}

/// Partial product update.
///
/// Nullable columns use `Option<Option<_>>`: an absent field leaves the value
/// alone, an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductPatch {
    #[serde(deserialize_with = "present")]
    pub category_id: Option<Option<CategoryId>>,
    pub name: Option<String>,
    pub sku: Option<String>,
    #[serde(deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub unit_label: Option<String>,
    #[serde(deserialize_with = "present")]
    pub origin_country: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub storage_method: Option<Option<String>>,
    pub is_weight_item: Option<bool>,
    pub base_price: Option<Money>,
    #[serde(deserialize_with = "present")]
    pub sale_price: Option<Option<Money>>,
    pub status: Option<ProductStatus>,
    pub is_visible: Option<bool>,
    pub stock_qty: Option<i32>,
    pub max_per_order: Option<i32>,
    #[serde(deserialize_with = "present")]
    pub pick_location: Option<Option<String>>,
}

/// Marks a field as present, keeping an explicit `null` as `Some(None)`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductPatch {
    /// Merge this patch over `current` and validate the result.
    ///
    /// # Errors
    ///
    /// Same as [`ProductDraft::validate`] on the merged product.
    pub fn merge(self, current: &Product) -> DomainResult<ProductDraft> {
        let mut draft = ProductDraft::from(current);
        if let Some(v) = self.category_id {
            draft.category_id = v;
        }
        if let Some(v) = self.name {
            draft.name = v;
        }
        if let Some(v) = self.sku {
            draft.sku = v;
        }
        if let Some(v) = self.description {
            draft.description = v;
        }
        if let Some(v) = self.unit_label {
            draft.unit_label = v;
        }
        if let Some(v) = self.origin_country {
            draft.origin_country = v;
        }
        if let Some(v) = self.storage_method {
            draft.storage_method = v;
        }
        if let Some(v) = self.is_weight_item {
            draft.is_weight_item = v;
        }
        if let Some(v) = self.base_price {
            draft.base_price = v;
        }
        if let Some(v) = self.sale_price {
            draft.sale_price = v;
        }
        if let Some(v) = self.status {
            draft.status = v;
        }
        if let Some(v) = self.is_visible {
            draft.is_visible = v;
        }
        if let Some(v) = self.stock_qty {
            draft.stock_qty = v;
        }
        if let Some(v) = self.max_per_order {
            draft.max_per_order = v;
        }
        if let Some(v) = self.pick_location {
            draft.pick_location = v;
        }
        draft.validate()?;
        Ok(draft)
    }
}

/// Stock and cap update from the inventory screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub stock_qty: i32,
    pub max_per_order: i32,
}

impl InventoryUpdate {
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` for negative stock or a cap outside `1..=99`.
    pub fn validate(&self) -> DomainResult<()> {
        validate_stock(self.stock_qty, self.max_per_order)
    }
}
