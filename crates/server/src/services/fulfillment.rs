//! Fulfillment service: shortage actions and refunds.
//!
//! Both mutations lock the order row first and finish by recomputing the
//! order's final total from every settled refund, inside the same transaction.

use local_market_core::fulfillment::{
    self, Refund, RefundRequest, ShortagePlan, ShortageRequest,
};
use local_market_core::order::{Actor, Order, OrderItem};
use local_market_core::{DomainError, ErrorCode, Money, OrderId, OrderStatus, ShortageAction};
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{info, instrument};

use crate::db::audit::{self, AuditEntry};
use crate::db::orders as order_db;
use crate::db::{OrderRepository, RefundRepository, catalog, refunds};
use crate::error::AppError;
use crate::services::orders::AUDIT_ENTITY_ORDER;
use crate::state::AppState;

const AUDIT_ENTITY_ORDER_ITEM: &str = "ORDER_ITEM";

/// Audit action for a shortage resolution.
#[must_use]
pub fn shortage_audit_action(action: ShortageAction) -> String {
    format!("SHORTAGE_{action}")
}

/// Outcome of a shortage action.
#[derive(Debug, Clone, Serialize)]
pub struct ShortageOutcome {
    pub order: Order,
    pub item: OrderItem,
    pub refund_amount: Money,
    pub refund: Option<Refund>,
}

/// Shortage and refund operations for the admin console.
pub struct FulfillmentService<'a> {
    state: &'a AppState,
}

impl<'a> FulfillmentService<'a> {
    /// Create a new fulfillment service.
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Resolve a shortage on one order item.
    ///
    /// Takes replacement stock for a substitution, writes the item's final
    /// values, records any refund owed, advances a RECEIVED order to PICKING
    /// and recomputes the final total.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND`, `ORDER_ITEM_NOT_FOUND`, `ITEM_ALREADY_PROCESSED`,
    /// or any rejection from the shortage rules.
    #[instrument(
        skip(self, request, actor),
        fields(item_id = %request.order_item_id, action = %request.action, admin = %actor.id)
    )]
    pub async fn apply_shortage(
        &self,
        order_id: OrderId,
        request: &ShortageRequest,
        actor: &Actor,
    ) -> Result<ShortageOutcome, AppError> {
        let now = self.state.now();
        let mut tx = self.state.pool().begin().await?;

        let mut order = order_db::lock(&mut *tx, order_id)
            .await?
            .ok_or_else(order_not_found)?;
        let item = order_db::lock_item(&mut *tx, request.order_item_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::OrderItemNotFound, "order item not found"))?;

        let substitute = match (request.action, request.substitution_product_id) {
            (ShortageAction::Substitute, Some(product_id)) => {
                catalog::lock(&mut *tx, product_id).await?
            }
            _ => None,
        };

        let ShortagePlan {
            adjustment,
            stock_take,
            refund_amount,
            refund,
            advance_to_picking,
        } = fulfillment::plan_shortage(&order, &item, request, substitute.as_ref())?;

        if let Some((product_id, qty)) = stock_take {
            catalog::take_stock(&mut *tx, product_id, qty, now).await?;
        }
        let item = order_db::update_item(&mut *tx, item.id, &adjustment).await?;

        let refund = match refund {
            Some(new_refund) => {
                Some(refunds::insert(&mut *tx, order.id, &new_refund, &actor.id, now).await?)
            }
            None => None,
        };

        let action = shortage_audit_action(request.action);
        if advance_to_picking
            && let Some(change) = order.plan_transition(OrderStatus::Picking, now)?
        {
            order_db::apply_status(&mut *tx, order.id, &change).await?;
            order_db::append_status_log(
                &mut *tx,
                order.id,
                Some(change.from),
                change.to,
                actor,
                Some(action.as_str()),
                now,
            )
            .await?;
            order.apply(&change);
        }

        order.total_final = Some(recompute_final_total(&mut *tx, &order).await?);

        audit::record(
            &mut *tx,
            &AuditEntry {
                actor,
                entity_type: AUDIT_ENTITY_ORDER_ITEM,
                entity_id: item.id.to_string(),
                action: action.clone(),
                payload: serde_json::json!({
                    "order_id": order.id,
                    "item_status": item.item_status,
                    "qty_fulfilled": item.qty_fulfilled,
                    "substitution_product_id": item.substitution_product_id,
                    "refund_amount": refund_amount,
                }),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            item_status = %item.item_status,
            refund_amount = %refund_amount,
            "Shortage resolved"
        );

        Ok(ShortageOutcome {
            order,
            item,
            refund_amount,
            refund,
        })
    }

    /// Record a refund not tied to a shortage.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND`, `INVALID_REQUEST` for a bad amount or reason, and
    /// `REFUND_LIMIT_EXCEEDED` above the refundable balance.
    #[instrument(skip(self, request, actor), fields(amount = %request.amount, admin = %actor.id))]
    pub async fn create_refund(
        &self,
        order_id: OrderId,
        request: &RefundRequest,
        actor: &Actor,
    ) -> Result<Refund, AppError> {
        let now = self.state.now();
        let mut tx = self.state.pool().begin().await?;

        let order = order_db::lock(&mut *tx, order_id)
            .await?
            .ok_or_else(order_not_found)?;
        let existing = refunds::list_for_order(&mut *tx, order.id).await?;
        let new_refund = request.plan(&order, &existing)?;
        let refund = refunds::insert(&mut *tx, order.id, &new_refund, &actor.id, now).await?;

        let total_final = recompute_final_total(&mut *tx, &order).await?;

        audit::record(
            &mut *tx,
            &AuditEntry {
                actor,
                entity_type: AUDIT_ENTITY_ORDER,
                entity_id: order.id.to_string(),
                action: "REFUND_CREATED".to_string(),
                payload: serde_json::json!({
                    "refund_id": refund.id,
                    "amount": refund.amount,
                    "method": refund.method,
                    "reason": refund.reason,
                    "total_final": total_final,
                }),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(order_id = %order.id, refund_id = %refund.id, "Refund created");
        Ok(refund)
    }

    /// Refunds of an order, newest first.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND` or a database error.
    pub async fn list_refunds(&self, order_id: OrderId) -> Result<Vec<Refund>, AppError> {
        if OrderRepository::new(self.state.pool())
            .get_by_id(order_id)
            .await?
            .is_none()
        {
            return Err(order_not_found().into());
        }
        Ok(RefundRepository::new(self.state.pool())
            .list_for_order(order_id)
            .await?)
    }
}

fn order_not_found() -> DomainError {
    DomainError::new(ErrorCode::OrderNotFound, "order not found")
}

/// Write `total_estimated - settled refunds`, floored at zero, as the final total.
async fn recompute_final_total(conn: &mut PgConnection, order: &Order) -> Result<Money, AppError> {
    let all = refunds::list_for_order(&mut *conn, order.id).await?;
    let total = fulfillment::final_total(order.total_estimated, &all);
    order_db::set_total_final(&mut *conn, order.id, total).await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortage_audit_action_names() {
        assert_eq!(shortage_audit_action(ShortageAction::Substitute), "SHORTAGE_SUBSTITUTE");
        assert_eq!(
            shortage_audit_action(ShortageAction::PartialCancel),
            "SHORTAGE_PARTIAL_CANCEL"
        );
        assert_eq!(shortage_audit_action(ShortageAction::OutOfStock), "SHORTAGE_OUT_OF_STOCK");
    }
}
