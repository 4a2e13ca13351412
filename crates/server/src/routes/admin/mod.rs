//! Admin API handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! requests without an admin identity are rejected with 401 before any work.

pub mod orders;
pub mod products;
pub mod store;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::state::AppState;

/// Admin routes, mounted under `/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}/status-logs", get(orders::status_logs))
        .route("/orders/{id}/shortages", post(orders::shortage))
        .route(
            "/orders/{id}/refunds",
            get(orders::refunds).post(orders::create_refund),
        )
        .route("/picking-list", get(orders::picking_list))
        // Catalog
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            patch(products::update).delete(products::delete),
        )
        .route("/products/{id}/inventory", put(products::set_inventory))
        // Store configuration
        .route("/policy", get(store::policy).patch(store::update_policy))
        .route("/zones", get(store::zones).post(store::create_zone))
        .route("/zones/{id}", patch(store::update_zone))
        .route("/holidays", get(store::holidays).post(store::create_holiday))
        .route(
            "/holidays/{id}",
            patch(store::update_holiday).delete(store::delete_holiday),
        )
}
