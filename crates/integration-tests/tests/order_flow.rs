//! Order lifecycle against a real database.
//!
//! These tests require a `PostgreSQL` database reachable through
//! `TEST_DATABASE_URL`. Migrations are applied on first use.
//!
//! Run with: cargo test -p local-market-integration-tests --test order_flow -- --ignored

use std::sync::Arc;

use chrono::Duration;
use local_market_core::fulfillment::{RefundRequest, ShortageRequest};
use local_market_core::order::Actor;
use local_market_core::{
    Clock, DomainError, ErrorCode, FixedClock, ItemStatus, Money, OrderStatus, ShortageAction,
};
use local_market_integration_tests::{
    TEST_PHONE, TestClock, create_product, guest_cart, order_request, store_morning, test_state,
};
use local_market_server::db::ProductRepository;
use local_market_server::error::AppError;
use local_market_server::services::{
    CartService, FulfillmentService, OrderService, StatusUpdateRequest,
};
use local_market_server::state::AppState;

fn code_of(err: &AppError) -> Option<ErrorCode> {
    match err {
        AppError::Domain(DomainError { code, .. }) => Some(*code),
        _ => None,
    }
}

async fn fixed_state() -> AppState {
    test_state(Arc::new(FixedClock::new(store_morning()))).await
}

async fn stock_of(state: &AppState, product: &local_market_core::catalog::Product) -> i32 {
    ProductRepository::new(state.pool())
        .get_by_id(product.id)
        .await
        .unwrap()
        .unwrap()
        .stock_qty
}

fn admin() -> Actor {
    Actor::admin("admin-7")
}

// ============================================================================
// Order creation
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_order_creation_takes_stock_and_clears_cart() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;

    let detail = OrderService::new(&state)
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Received);
    assert!(detail.order.order_no.starts_with("LM"));
    assert_eq!(detail.order.subtotal_estimated, Money::from_units(20_000));
    assert_eq!(detail.order.delivery_fee, Money::from_units(3_000));
    assert_eq!(detail.order.total_estimated, Money::from_units(23_000));
    assert_eq!(
        detail.order.cancelable_until,
        Some(store_morning() + Duration::minutes(30))
    );
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].qty_ordered, 2);

    assert_eq!(stock_of(&state, &product).await, 8);

    let cart = CartService::new(&state)
        .get_or_create(Some(&cart.session_key), None)
        .await
        .unwrap();
    assert!(cart.items.is_empty());

    let logs = OrderService::new(&state)
        .status_logs(detail.order.id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].from_status, None);
    assert_eq!(logs[0].to_status, OrderStatus::Received);
    assert_eq!(logs[0].reason.as_deref(), Some("ORDER_CREATED"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_order_below_minimum_is_rejected_with_error_list() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 1).await;

    let err = OrderService::new(&state)
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap_err();

    match err {
        AppError::CheckoutInvalid { errors } => {
            assert_eq!(errors, vec![ErrorCode::MinOrderNotMet]);
        }
        other => panic!("expected CheckoutInvalid, got {other:?}"),
    }
    assert_eq!(stock_of(&state, &product).await, 10);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_concurrent_orders_do_not_oversell() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 3).await;
    let first = guest_cart(&state, &product, 2).await;
    let second = guest_cart(&state, &product, 2).await;

    let first_request = order_request(&first.session_key);
    let second_request = order_request(&second.session_key);
    let orders = OrderService::new(&state);
    let (a, b) = tokio::join!(
        orders.create(&first_request, None),
        orders.create(&second_request, None),
    );

    let outcomes = [a, b];
    let placed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1, "exactly one order may take the stock");
    // The loser re-reads the locked row and sees the reduced stock
    let err = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(code_of(err), Some(ErrorCode::InsufficientStock));
    assert_eq!(err.status().as_u16(), 400);

    assert_eq!(stock_of(&state, &product).await, 1);
}

// ============================================================================
// Lookup and cancellation
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_guest_lookup_requires_matching_phone() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;
    let orders = OrderService::new(&state);
    let placed = orders
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();
    let order_no = placed.order.order_no.as_str();

    let found = orders
        .lookup(order_no, None, Some(TEST_PHONE))
        .await
        .unwrap();
    assert_eq!(found.order.id, placed.order.id);

    // Phones are compared exactly as entered
    for phone in ["010-9999-0000", "01012345678"] {
        let err = orders
            .lookup(order_no, None, Some(phone))
            .await
            .unwrap_err();
        assert_eq!(code_of(&err), Some(ErrorCode::OrderNotFound));
    }

    let err = orders.lookup(order_no, None, None).await.unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::InvalidRequest));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_guest_cancel_within_window() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;
    let orders = OrderService::new(&state);
    let placed = orders
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();

    let outcome = orders
        .cancel(&placed.order.order_no, None, Some(TEST_PHONE), "changed my mind")
        .await
        .unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.status, OrderStatus::Canceled);

    let logs = orders.status_logs(placed.order.id).await.unwrap();
    let last = logs.last().unwrap();
    assert_eq!(last.to_status, OrderStatus::Canceled);
    assert_eq!(last.changed_by_id, "CUSTOMER_SELF");

    let detail = orders.admin_detail(placed.order.id).await.unwrap();
    assert_eq!(detail.cancellations.len(), 1);
    assert_eq!(detail.cancellations[0].reason, "changed my mind");
    assert_eq!(detail.cancellations[0].status, "APPROVED");

    let err = orders
        .cancel(&placed.order.order_no, None, Some(TEST_PHONE), "again please")
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::OrderNotCancelable));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_cancel_after_window_is_refused() {
    let clock = Arc::new(TestClock::new(store_morning()));
    let state = test_state(Arc::clone(&clock) as Arc<dyn Clock>).await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;
    let orders = OrderService::new(&state);
    let placed = orders
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();

    clock.advance(Duration::minutes(31));

    let err = orders
        .cancel(&placed.order.order_no, None, Some(TEST_PHONE), "too late now")
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::OrderNotCancelable));

    let detail = orders.admin_detail(placed.order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Received);
    assert_eq!(detail.status_logs.len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_cancel_refused_once_picking_started() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;
    let orders = OrderService::new(&state);
    let placed = orders
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();
    let picking = StatusUpdateRequest {
        status: OrderStatus::Picking,
        reason: None,
    };
    orders
        .update_status(placed.order.id, &picking, &admin())
        .await
        .unwrap();

    let err = orders
        .cancel(&placed.order.order_no, None, Some(TEST_PHONE), "still in window")
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::OrderNotCancelable));

    let detail = orders.admin_detail(placed.order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Picking);
    assert_eq!(detail.status_logs.len(), 2);
}

// ============================================================================
// Admin console
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_admin_status_walk_settles_total_on_delivery() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;
    let orders = OrderService::new(&state);
    let placed = orders
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();
    let id = placed.order.id;

    let skip = StatusUpdateRequest {
        status: OrderStatus::Delivered,
        reason: None,
    };
    let err = orders.update_status(id, &skip, &admin()).await.unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::InvalidStatusTransition));

    for status in [
        OrderStatus::Picking,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        let request = StatusUpdateRequest {
            status,
            reason: Some("floor update".to_string()),
        };
        orders.update_status(id, &request, &admin()).await.unwrap();
    }

    // Repeating the current status changes nothing
    let same = StatusUpdateRequest {
        status: OrderStatus::Delivered,
        reason: Some("double tap".to_string()),
    };
    let unchanged = orders.update_status(id, &same, &admin()).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Delivered);

    let detail = orders.admin_detail(id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Delivered);
    assert_eq!(detail.order.total_final, Some(Money::from_units(23_000)));
    assert!(detail.order.picked_at.is_some());
    assert!(detail.order.delivered_at.is_some());
    assert_eq!(detail.status_logs.len(), 4);
    assert!(
        detail.status_logs[1..]
            .iter()
            .all(|log| log.changed_by_id == "admin-7")
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_partial_cancel_refunds_and_recomputes_total() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 3).await;
    let placed = OrderService::new(&state)
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();
    let item = &placed.items[0];

    let outcome = FulfillmentService::new(&state)
        .apply_shortage(
            placed.order.id,
            &ShortageRequest {
                order_item_id: item.id,
                action: ShortageAction::PartialCancel,
                fulfilled_qty: Some(1),
                substitution_product_id: None,
                substitution_qty: None,
                reason: Some("two bruised".to_string()),
            },
            &admin(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.item.item_status, ItemStatus::PartialCanceled);
    assert_eq!(outcome.item.qty_fulfilled, 1);
    assert_eq!(outcome.refund_amount, Money::from_units(20_000));
    assert_eq!(outcome.order.status, OrderStatus::Picking);
    assert_eq!(outcome.order.total_final, Some(Money::from_units(13_000)));

    // The same item cannot be adjusted twice
    let again = FulfillmentService::new(&state)
        .apply_shortage(
            placed.order.id,
            &ShortageRequest {
                order_item_id: item.id,
                action: ShortageAction::OutOfStock,
                fulfilled_qty: None,
                substitution_product_id: None,
                substitution_qty: None,
                reason: None,
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_eq!(code_of(&again), Some(ErrorCode::ItemAlreadyProcessed));

    let detail = OrderService::new(&state)
        .admin_detail(placed.order.id)
        .await
        .unwrap();
    assert_eq!(detail.refunds.len(), 1);
    let last_log = detail.status_logs.last().unwrap();
    assert_eq!(last_log.to_status, OrderStatus::Picking);
    assert_eq!(last_log.reason.as_deref(), Some("PARTIAL_CANCEL"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_substitute_needs_customer_consent() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let replacement = create_product(&state, 9_000, 5).await;
    let cart = guest_cart(&state, &product, 2).await;
    let placed = OrderService::new(&state)
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();

    let err = FulfillmentService::new(&state)
        .apply_shortage(
            placed.order.id,
            &ShortageRequest {
                order_item_id: placed.items[0].id,
                action: ShortageAction::Substitute,
                fulfilled_qty: None,
                substitution_product_id: Some(replacement.id),
                substitution_qty: Some(2),
                reason: None,
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::SubstituteNotAllowed));
    assert_eq!(stock_of(&state, &replacement).await, 5);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_direct_refund_is_capped_by_balance() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 10).await;
    let cart = guest_cart(&state, &product, 2).await;
    let placed = OrderService::new(&state)
        .create(&order_request(&cart.session_key), None)
        .await
        .unwrap();
    let fulfillment = FulfillmentService::new(&state);

    let refund = fulfillment
        .create_refund(
            placed.order.id,
            &RefundRequest {
                amount: Money::from_units(5_000),
                reason: "late delivery".to_string(),
                method: None,
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(refund.method, "COD_ADJUSTMENT");

    let err = fulfillment
        .create_refund(
            placed.order.id,
            &RefundRequest {
                amount: Money::from_units(18_001),
                reason: "goodwill".to_string(),
                method: None,
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_eq!(code_of(&err), Some(ErrorCode::RefundLimitExceeded));

    let refunds = fulfillment.list_refunds(placed.order.id).await.unwrap();
    assert_eq!(refunds.len(), 1);
    let detail = OrderService::new(&state)
        .admin_detail(placed.order.id)
        .await
        .unwrap();
    assert_eq!(detail.order.total_final, Some(Money::from_units(18_000)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_picking_list_groups_open_orders() {
    let state = fixed_state().await;
    let product = create_product(&state, 10_000, 20).await;
    for qty in [2, 3] {
        let cart = guest_cart(&state, &product, qty).await;
        OrderService::new(&state)
            .create(&order_request(&cart.session_key), None)
            .await
            .unwrap();
    }

    let list = OrderService::new(&state)
        .picking_list(None, Some(&product.name))
        .await
        .unwrap_or_else(|e| panic!("picking list failed: {e}"));
    let summary = list
        .summary
        .iter()
        .find(|s| s.product_id == product.id)
        .unwrap();
    assert_eq!(summary.total_qty_ordered, 5);
    assert_eq!(summary.order_count, 2);
}
