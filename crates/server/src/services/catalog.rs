//! Catalog service: public product listing and catalog administration.

use chrono::{DateTime, Utc};
use local_market_core::catalog::{Category, InventoryUpdate, Product, ProductDraft, ProductPatch};
use local_market_core::order::Actor;
use local_market_core::{
    CategoryId, DomainError, ErrorCode, Money, ProductId, ProductStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{info, instrument};

use crate::db::audit::{self, AuditEntry};
use crate::db::{CategoryRepository, ProductRepository, RepositoryError, catalog};
use crate::error::AppError;
use crate::state::AppState;

const AUDIT_ENTITY_PRODUCT: &str = "PRODUCT";

/// A product as customers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub description: Option<String>,
    pub origin_country: Option<String>,
    pub storage_method: Option<String>,
    pub unit_label: String,
    pub is_weight_item: bool,
    pub base_price: Money,
    pub sale_price: Option<Money>,
    pub effective_price: Money,
    pub status: ProductStatus,
    pub available_qty: i32,
    pub max_per_order: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            category_id: p.category_id,
            name: p.name.clone(),
            description: p.description.clone(),
            origin_country: p.origin_country.clone(),
            storage_method: p.storage_method.clone(),
            unit_label: p.unit_label.clone(),
            is_weight_item: p.is_weight_item,
            base_price: p.base_price,
            sale_price: p.sale_price.filter(|s| *s < p.base_price),
            effective_price: p.effective_price(),
            status: p.status,
            available_qty: p.available().max(0),
            max_per_order: p.max_per_order,
            updated_at: p.updated_at,
        }
    }
}

/// Public catalog filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default, alias = "q")]
    pub search: Option<String>,
}

fn product_not_found() -> DomainError {
    DomainError::new(ErrorCode::ProductNotFound, "product not found")
}

/// Map storage outcomes of a product write onto catalog error codes.
fn product_write_error(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => product_not_found().into(),
        RepositoryError::Conflict(_) => {
            DomainError::new(ErrorCode::DuplicateSku, "a product with this SKU already exists")
                .into()
        }
        other => other.into(),
    }
}

/// Catalog reads and writes.
pub struct CatalogService<'a> {
    state: &'a AppState,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(CategoryRepository::new(self.state.pool()).list_active().await?)
    }

    /// Visible products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list_public(&self, query: &ProductQuery) -> Result<Vec<ProductView>, AppError> {
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let products = ProductRepository::new(self.state.pool())
            .list_visible(query.category_id, search)
            .await?;
        Ok(products.iter().map(ProductView::from).collect())
    }

    /// One visible product.
    ///
    /// # Errors
    ///
    /// `PRODUCT_NOT_FOUND` for missing or hidden products.
    pub async fn get_public(&self, id: ProductId) -> Result<ProductView, AppError> {
        let product = ProductRepository::new(self.state.pool())
            .get_by_id(id)
            .await?
            .filter(|p| p.is_visible)
            .ok_or_else(product_not_found)?;
        Ok(ProductView::from(&product))
    }

    /// Every product not soft-deleted, with stock details.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn list_admin(&self) -> Result<Vec<Product>, AppError> {
        Ok(ProductRepository::new(self.state.pool()).list_admin().await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` or `INVALID_PRICE` for a bad draft, `DUPLICATE_SKU`
    /// if the SKU is taken.
    #[instrument(skip(self, draft, actor), fields(sku = %draft.sku, admin = %actor.id))]
    pub async fn create(&self, draft: ProductDraft, actor: &Actor) -> Result<Product, AppError> {
        let draft = ProductDraft {
            name: draft.name.trim().to_owned(),
            sku: draft.sku.trim().to_owned(),
            ..draft
        };
        draft.validate()?;
        let now = self.state.now();

        let mut tx = self.state.pool().begin().await?;
        let product = catalog::insert(&mut *tx, &draft, now)
            .await
            .map_err(product_write_error)?;
        audit_product(&mut *tx, actor, &product, "PRODUCT_CREATED", now).await?;
        tx.commit().await?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Apply a partial update; the merged product is validated as a whole.
    ///
    /// # Errors
    ///
    /// `PRODUCT_NOT_FOUND`, the draft checks, or `DUPLICATE_SKU`.
    #[instrument(skip(self, patch, actor), fields(admin = %actor.id))]
    pub async fn update(
        &self,
        id: ProductId,
        patch: ProductPatch,
        actor: &Actor,
    ) -> Result<Product, AppError> {
        let now = self.state.now();
        let mut tx = self.state.pool().begin().await?;

        let current = catalog::lock(&mut *tx, id)
            .await?
            .ok_or_else(product_not_found)?;
        let draft = patch.merge(&current)?;
        let product = catalog::update(&mut *tx, id, &draft, now)
            .await
            .map_err(product_write_error)?;
        audit_product(&mut *tx, actor, &product, "PRODUCT_UPDATED", now).await?;
        tx.commit().await?;

        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Hide a product and pause it. Order history keeps referring to it.
    ///
    /// # Errors
    ///
    /// `PRODUCT_NOT_FOUND`.
    #[instrument(skip(self, actor), fields(admin = %actor.id))]
    pub async fn delete(&self, id: ProductId, actor: &Actor) -> Result<(), AppError> {
        let now = self.state.now();
        let mut tx = self.state.pool().begin().await?;

        catalog::soft_delete(&mut *tx, id, now)
            .await
            .map_err(product_write_error)?;
        audit::record(
            &mut *tx,
            &AuditEntry {
                actor,
                entity_type: AUDIT_ENTITY_PRODUCT,
                entity_id: id.to_string(),
                action: "PRODUCT_DELETED".to_string(),
                payload: serde_json::json!({ "product_id": id }),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Set stock and the per-order cap.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` for out-of-range values, `PRODUCT_NOT_FOUND`.
    #[instrument(skip(self, actor), fields(admin = %actor.id))]
    pub async fn set_inventory(
        &self,
        id: ProductId,
        update: InventoryUpdate,
        actor: &Actor,
    ) -> Result<Product, AppError> {
        update.validate()?;
        let now = self.state.now();
        let mut tx = self.state.pool().begin().await?;

        let product = catalog::set_inventory(&mut *tx, id, &update, now)
            .await
            .map_err(product_write_error)?;
        audit_product(&mut *tx, actor, &product, "INVENTORY_UPDATED", now).await?;
        tx.commit().await?;

        info!(product_id = %id, stock_qty = update.stock_qty, "Inventory updated");
        Ok(product)
    }
}

async fn audit_product(
    conn: &mut PgConnection,
    actor: &Actor,
    product: &Product,
    action: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    audit::record(
        conn,
        &AuditEntry {
            actor,
            entity_type: AUDIT_ENTITY_PRODUCT,
            entity_id: product.id.to_string(),
            action: action.to_string(),
            payload: serde_json::to_value(product).map_err(|e| AppError::Internal(e.to_string()))?,
        },
        now,
    )
    .await?;
    Ok(())
}
