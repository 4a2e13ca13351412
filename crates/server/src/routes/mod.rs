//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                               - Liveness
//! GET    /health/ready                         - Readiness (database ping)
//!
//! # Catalog (under /api/v1)
//! GET    /categories                           - Category list
//! GET    /products                             - Visible products (?category_id, ?search)
//! GET    /products/{id}                        - Product detail
//!
//! # Cart
//! GET    /cart                                 - Show cart (?session_key)
//! POST   /cart                                 - Open or resume a cart
//! POST   /cart/items                           - Add a product
//! PATCH  /cart/items/{id}                      - Change quantity
//! DELETE /cart/items/{id}                      - Remove a line (?session_key)
//!
//! # Checkout
//! POST   /checkout/validate                    - { valid, errors }
//! POST   /checkout/quote                       - Full quote
//!
//! # Orders
//! POST   /orders                               - Place an order
//! GET    /orders/lookup                        - Lookup (?order_no, ?phone)
//! GET    /orders/{order_no}                    - Lookup (?phone)
//! POST   /orders/{order_no}/cancel-requests    - Customer cancellation
//!
//! # Admin (x-admin-id / x-admin-role headers)
//! GET    /admin/orders                         - Order list (?status)
//! GET    /admin/orders/{id}                    - Order detail
//! PATCH  /admin/orders/{id}/status             - Status change
//! GET    /admin/orders/{id}/status-logs        - Status history
//! POST   /admin/orders/{id}/shortages          - Shortage action
//! GET    /admin/orders/{id}/refunds            - Refund list
//! POST   /admin/orders/{id}/refunds            - Direct refund
//! GET    /admin/picking-list                   - Picking list (?statuses, ?keyword)
//! GET    /admin/products                       - All products
//! POST   /admin/products                       - Create product (manager)
//! PATCH  /admin/products/{id}                  - Patch product (manager)
//! DELETE /admin/products/{id}                  - Soft delete (manager)
//! PUT    /admin/products/{id}/inventory        - Stock and cap (manager)
//! GET    /admin/policy                         - Store policy
//! PATCH  /admin/policy                         - Patch policy (manager)
//! GET    /admin/zones                          - Delivery zones
//! POST   /admin/zones                          - Create zone (manager)
//! PATCH  /admin/zones/{id}                     - Patch zone (manager)
//! GET    /admin/holidays                       - Holidays
//! POST   /admin/holidays                       - Add holiday (manager)
//! PATCH  /admin/holidays/{id}                  - Patch holiday (manager)
//! DELETE /admin/holidays/{id}                  - Remove holiday (manager)
//! ```

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod extract;
pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::categories))
        .route("/products", get(catalog::products))
        .route("/products/{id}", get(catalog::product))
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::open))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
}

fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(checkout::validate))
        .route("/quote", post(checkout::quote))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create))
        .route("/lookup", get(orders::lookup))
        .route("/{order_no}", get(orders::show))
        .route("/{order_no}/cancel-requests", post(orders::cancel))
}

/// Create the `/api/v1` routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin::router());

    Router::new().nest("/api/v1", api)
}
