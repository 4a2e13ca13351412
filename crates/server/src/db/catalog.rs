//! Product and category repository.

use chrono::{DateTime, Utc};
use local_market_core::catalog::{Category, InventoryUpdate, Product, ProductDraft};
use local_market_core::{CategoryId, Money, ProductId, ProductStatus};
use sqlx::{PgConnection, PgPool};

use super::RepositoryError;

/// Maximum rows returned by the public product listing.
pub const PUBLIC_LIST_LIMIT: i64 = 100;

/// Maximum rows returned by the admin product listing.
pub const ADMIN_LIST_LIMIT: i64 = 500;

const PRODUCT_COLUMNS: &str = "id, category_id, name, sku, description, origin_country, \
     storage_method, unit_label, is_weight_item, base_price, sale_price, status, is_visible, \
     pick_location, popularity, stock_qty, reserved_qty, max_per_order, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    name: String,
    sku: String,
    description: Option<String>,
    origin_country: Option<String>,
    storage_method: Option<String>,
    unit_label: String,
    is_weight_item: bool,
    base_price: Money,
    sale_price: Option<Money>,
    status: ProductStatus,
    is_visible: bool,
    pick_location: Option<String>,
    popularity: i32,
    stock_qty: i32,
    reserved_qty: i32,
    max_per_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            sku: row.sku,
            description: row.description,
            origin_country: row.origin_country,
            storage_method: row.storage_method,
            unit_label: row.unit_label,
            is_weight_item: row.is_weight_item,
            base_price: row.base_price,
            sale_price: row.sale_price,
            status: row.status,
            is_visible: row.is_visible,
            pick_location: row.pick_location,
            popularity: row.popularity,
            stock_qty: row.stock_qty,
            reserved_qty: row.reserved_qty,
            max_per_order: row.max_per_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    display_order: i32,
    is_active: bool,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            display_order: row.display_order,
            is_active: row.is_active,
        }
    }
}

// =============================================================================
// Product Repository
// =============================================================================

/// Repository for product reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List visible products, most popular first.
    ///
    /// `search` matches the product name case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_visible(
        &self,
        category_id: Option<CategoryId>,
        search: Option<&str>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE is_visible
               AND ($1::INTEGER IS NULL OR category_id = $1)
               AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')
             ORDER BY popularity DESC, id DESC
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category_id)
            .bind(search)
            .bind(PUBLIC_LIST_LIMIT)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List visible products for the admin console, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_admin(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_visible ORDER BY id ASC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(ADMIN_LIST_LIMIT)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID, visible or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }
}

// =============================================================================
// Transactional Product Operations
// =============================================================================

/// Load several products inside a transaction without locking them, in ID
/// order. Missing IDs are skipped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_many_in(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id");
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(ids)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Lock a product row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: ProductId) -> Result<Option<Product>, RepositoryError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Take `qty` units out of stock. The row must already be locked.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn take_stock(
    conn: &mut PgConnection,
    id: ProductId,
    qty: i32,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET stock_qty = stock_qty - $2, updated_at = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(qty)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Insert a product.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the SKU is already used.
pub async fn insert(
    conn: &mut PgConnection,
    draft: &ProductDraft,
    now: DateTime<Utc>,
) -> Result<Product, RepositoryError> {
    let sql = format!(
        "INSERT INTO products (category_id, name, sku, description, origin_country,
             storage_method, unit_label, is_weight_item, base_price, sale_price, status,
             is_visible, pick_location, stock_qty, max_per_order, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
         RETURNING {PRODUCT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(draft.category_id)
        .bind(&draft.name)
        .bind(&draft.sku)
        .bind(&draft.description)
        .bind(&draft.origin_country)
        .bind(&draft.storage_method)
        .bind(&draft.unit_label)
        .bind(draft.is_weight_item)
        .bind(draft.base_price)
        .bind(draft.sale_price)
        .bind(draft.status)
        .bind(draft.is_visible)
        .bind(&draft.pick_location)
        .bind(draft.stock_qty)
        .bind(draft.max_per_order)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::unique_or_database(e, "SKU already exists"))?;

    Ok(row.into())
}

/// Overwrite a product with a merged draft.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist and
/// `RepositoryError::Conflict` if the new SKU is already used.
pub async fn update(
    conn: &mut PgConnection,
    id: ProductId,
    draft: &ProductDraft,
    now: DateTime<Utc>,
) -> Result<Product, RepositoryError> {
    let sql = format!(
        "UPDATE products SET category_id = $2, name = $3, sku = $4, description = $5,
             origin_country = $6, storage_method = $7, unit_label = $8, is_weight_item = $9,
             base_price = $10, sale_price = $11, status = $12, is_visible = $13,
             pick_location = $14, stock_qty = $15, max_per_order = $16, updated_at = $17
         WHERE id = $1
         RETURNING {PRODUCT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(draft.category_id)
        .bind(&draft.name)
        .bind(&draft.sku)
        .bind(&draft.description)
        .bind(&draft.origin_country)
        .bind(&draft.storage_method)
        .bind(&draft.unit_label)
        .bind(draft.is_weight_item)
        .bind(draft.base_price)
        .bind(draft.sale_price)
        .bind(draft.status)
        .bind(draft.is_visible)
        .bind(&draft.pick_location)
        .bind(draft.stock_qty)
        .bind(draft.max_per_order)
        .bind(now)
        .fetch_optional(conn)
        .await
        .map_err(|e| RepositoryError::unique_or_database(e, "SKU already exists"))?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

/// Hide a product from every listing and pause it.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn soft_delete(
    conn: &mut PgConnection,
    id: ProductId,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET is_visible = FALSE, status = $2, updated_at = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(ProductStatus::Paused)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Set stock and the per-order cap.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
pub async fn set_inventory(
    conn: &mut PgConnection,
    id: ProductId,
    update: &InventoryUpdate,
    now: DateTime<Utc>,
) -> Result<Product, RepositoryError> {
    let sql = format!(
        "UPDATE products SET stock_qty = $2, max_per_order = $3, updated_at = $4
         WHERE id = $1
         RETURNING {PRODUCT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(update.stock_qty)
        .bind(update.max_per_order)
        .bind(now)
        .fetch_optional(conn)
        .await?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

// =============================================================================
// Category Repository
// =============================================================================

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, display_order, is_active FROM categories
             WHERE is_active
             ORDER BY display_order, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a category or update the display order of an existing one with
    /// the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_name(
        &self,
        name: &str,
        display_order: i32,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name, display_order) VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET display_order = EXCLUDED.display_order
             RETURNING id, name, display_order, is_active",
        )
        .bind(name)
        .bind(display_order)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
