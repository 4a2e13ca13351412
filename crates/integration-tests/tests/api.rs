//! HTTP tests against a running server.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The server running (cargo run -p local-market-server)
//!
//! Run with: cargo test -p local-market-integration-tests --test api -- --ignored

use local_market_integration_tests::base_url;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

fn client() -> Client {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

fn api(path: &str) -> String {
    format!("{}/api/v1{path}", base_url())
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health_endpoints() {
    let client = client();

    let resp = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_request_id_is_echoed() {
    let resp = client()
        .get(format!("{}/health", base_url()))
        .header("x-request-id", "edge-trace-1")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.headers()["x-request-id"], "edge-trace-1");
}

// ============================================================================
// Storefront
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_product_list_is_json_array() {
    let resp = client()
        .get(api("/products"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    let products = body.as_array().expect("product list is an array");
    for product in products {
        assert!(product.get("available_qty").is_some());
        assert!(product.get("effective_price").is_some());
        assert!(product.get("stock_qty").is_none());
    }
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_unknown_product_is_404() {
    let resp = client()
        .get(api("/products/2147483647"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_empty_cart_fails_validation() {
    let client = client();

    let cart: Value = client
        .post(api("/cart"))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to open cart")
        .json()
        .await
        .unwrap();
    let session_key = cart["session_key"].as_str().expect("session key").to_owned();

    let resp = client
        .post(api("/checkout/validate"))
        .json(&json!({ "session_key": session_key }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["valid"], false);
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_malformed_json_is_invalid_request() {
    let resp = client()
        .post(api("/checkout/quote"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_order_lookup_needs_phone() {
    let resp = client()
        .get(api("/orders/LM-DOES-NOT-EXIST?phone=010-0000-0000"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_admin_routes_require_identity() {
    let resp = client()
        .get(api("/admin/orders"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_staff_can_read_but_not_edit_catalog() {
    let client = client();

    let resp = client
        .get(api("/admin/products"))
        .header("x-admin-id", "staff-1")
        .header("x-admin-role", "STAFF")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(api("/admin/products"))
        .header("x-admin-id", "staff-1")
        .header("x-admin-role", "STAFF")
        .json(&json!({
            "name": "Staff product",
            "sku": "STAFF-ONLY",
            "base_price": "1000",
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_picking_list_rejects_unknown_status() {
    let resp = client()
        .get(api("/admin/picking-list?statuses=RECEIVED,TELEPORTED"))
        .header("x-admin-id", "staff-1")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
