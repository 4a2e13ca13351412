//! Shortage handling and refund accounting.
//!
//! Shortage actions resolve one order item that cannot be picked as ordered.
//! Any money owed back becomes an approved refund, and the order's final total
//! is always `max(0, total_estimated - settled refunds)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::order::{Order, OrderItem};
use crate::types::{
    ItemStatus, Money, OrderId, OrderItemId, OrderStatus, ProductId, ProductStatus, RefundId,
    RefundStatus, ShortageAction,
};

/// Refund method when none is given; settled against the cash collected on delivery.
pub const DEFAULT_REFUND_METHOD: &str = "COD_ADJUSTMENT";

/// Longest note stored on an order item.
pub const MAX_NOTE_LEN: usize = 200;

/// A refund on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub order_id: OrderId,
    pub amount: Money,
    pub reason: String,
    pub method: String,
    pub status: RefundStatus,
    pub processed_by: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// A refund ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefund {
    pub amount: Money,
    pub reason: String,
    pub method: String,
    pub status: RefundStatus,
}

/// Sum of refunds that count against the order total.
pub fn settled_refunds<'a>(refunds: impl IntoIterator<Item = &'a Refund>) -> Money {
    refunds
        .into_iter()
        .filter(|r| r.status.is_settled())
        .map(|r| r.amount)
        .sum()
}

/// The order's final total given its refunds, never below zero.
pub fn final_total<'a>(total_estimated: Money, refunds: impl IntoIterator<Item = &'a Refund>) -> Money {
    (total_estimated - settled_refunds(refunds)).floor_zero()
}

/// Admin request to resolve a shortage on one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageRequest {
    pub order_item_id: OrderItemId,
    pub action: ShortageAction,
    #[serde(default)]
    pub fulfilled_qty: Option<i32>,
    #[serde(default)]
    pub substitution_product_id: Option<ProductId>,
    #[serde(default)]
    pub substitution_qty: Option<i32>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// New fulfillment values for an order item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAdjustment {
    pub qty_fulfilled: i32,
    pub unit_price_final: Money,
    pub line_final: Money,
    pub item_status: ItemStatus,
    pub substitution_product_id: Option<ProductId>,
    pub note: Option<String>,
}

/// Everything a shortage action changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortagePlan {
    pub adjustment: ItemAdjustment,
    /// Units to take from the replacement product's stock.
    pub stock_take: Option<(ProductId, i32)>,
    /// Amount owed back, zero if nothing is owed.
    pub refund_amount: Money,
    /// Refund row to insert when `refund_amount` is positive.
    pub refund: Option<NewRefund>,
    /// The order is still RECEIVED and must move to PICKING.
    pub advance_to_picking: bool,
}

impl OrderItem {
    /// Returns `true` once a shortage action has been applied.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.item_status != ItemStatus::Confirmed
    }
}

fn note_from(reason: Option<&str>) -> DomainResult<Option<String>> {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if reason.chars().count() > MAX_NOTE_LEN {
        return Err(DomainError::invalid_request(format!(
            "reason must be at most {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(Some(reason.to_owned()))
}

fn invalid_qty(message: &str) -> DomainError {
    DomainError::new(ErrorCode::InvalidQty, message)
}

/// Plan a shortage action on `item`.
///
/// `substitute` is the replacement product as locked in the current
/// transaction, looked up from `request.substitution_product_id`.
///
/// # Errors
///
/// - `ORDER_NOT_ADJUSTABLE` for delivered or canceled orders
/// - `ORDER_ITEM_NOT_FOUND` if the item belongs to another order
/// - `ITEM_ALREADY_PROCESSED` if a shortage action was already applied
/// - `SUBSTITUTE_NOT_ALLOWED`, `INVALID_REQUEST`, `INVALID_SUBSTITUTION` or
///   `INSUFFICIENT_STOCK` for a substitution that cannot be made
/// - `INVALID_QTY` for quantities out of range
pub fn plan_shortage(
    order: &Order,
    item: &OrderItem,
    request: &ShortageRequest,
    substitute: Option<&Product>,
) -> DomainResult<ShortagePlan> {
    if order.status.is_terminal() {
        return Err(DomainError::new(
            ErrorCode::OrderNotAdjustable,
            format!("order is {} and can no longer be adjusted", order.status),
        ));
    }
    if item.order_id != order.id {
        return Err(DomainError::new(
            ErrorCode::OrderItemNotFound,
            "order item not found",
        ));
    }
    if item.is_processed() {
        return Err(DomainError::new(
            ErrorCode::ItemAlreadyProcessed,
            format!("item was already resolved as {}", item.item_status),
        ));
    }

    let note = note_from(request.reason.as_deref())?;
    let (adjustment, stock_take) = match request.action {
        ShortageAction::Substitute => {
            let (adjustment, take) = substitute_item(order, request, substitute, note)?;
            (adjustment, Some(take))
        }
        ShortageAction::PartialCancel | ShortageAction::OutOfStock => {
            (reduce_item(item, request, note)?, None)
        }
    };

    let refund_amount = (item.line_estimated - adjustment.line_final).floor_zero();
    let refund = refund_amount.is_positive().then(|| NewRefund {
        amount: refund_amount,
        reason: request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map_or_else(|| format!("SHORTAGE_{}", request.action), str::to_owned),
        method: DEFAULT_REFUND_METHOD.to_owned(),
        status: RefundStatus::Approved,
    });

    Ok(ShortagePlan {
        adjustment,
        stock_take,
        refund_amount,
        refund,
        advance_to_picking: order.status == OrderStatus::Received,
    })
}

fn substitute_item(
    order: &Order,
    request: &ShortageRequest,
    substitute: Option<&Product>,
    note: Option<String>,
) -> DomainResult<(ItemAdjustment, (ProductId, i32))> {
    if !order.allow_substitution {
        return Err(DomainError::new(
            ErrorCode::SubstituteNotAllowed,
            "the customer did not allow substitutions",
        ));
    }
    let (Some(product_id), Some(qty)) = (request.substitution_product_id, request.substitution_qty)
    else {
        return Err(DomainError::invalid_request(
            "substitution_product_id and substitution_qty are required",
        ));
    };
    if !crate::cart::LINE_QTY_RANGE.contains(&qty) {
        return Err(invalid_qty("substitution_qty must be between 1 and 99"));
    }
    let product = substitute
        .filter(|p| p.id == product_id && p.status == ProductStatus::Active)
        .ok_or_else(|| {
            DomainError::new(
                ErrorCode::InvalidSubstitution,
                "replacement product is not available",
            )
        })?;
    if product.available() < qty {
        return Err(DomainError::new(
            ErrorCode::InsufficientStock,
            format!("not enough stock for replacement {}", product.name),
        ));
    }

    let unit = product.effective_price();
    Ok((
        ItemAdjustment {
            qty_fulfilled: qty,
            unit_price_final: unit,
            line_final: unit.times(qty),
            item_status: ItemStatus::Substituted,
            substitution_product_id: Some(product.id),
            note,
        },
        (product.id, qty),
    ))
}

fn reduce_item(
    item: &OrderItem,
    request: &ShortageRequest,
    note: Option<String>,
) -> DomainResult<ItemAdjustment> {
    let qty = request.fulfilled_qty.unwrap_or(0);
    if qty < 0 {
        return Err(invalid_qty("fulfilled_qty must not be negative"));
    }
    if qty > item.qty_ordered {
        return Err(invalid_qty("fulfilled_qty exceeds the ordered quantity"));
    }

    let item_status = if request.action == ShortageAction::OutOfStock || qty == 0 {
        ItemStatus::OutOfStock
    } else {
        ItemStatus::PartialCanceled
    };
    Ok(ItemAdjustment {
        qty_fulfilled: qty,
        unit_price_final: item.unit_price_estimated,
        line_final: item.unit_price_estimated.times(qty),
        item_status,
        substitution_product_id: None,
        note,
    })
}

/// Admin request for a refund not tied to a shortage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub amount: Money,
    pub reason: String,
    #[serde(default)]
    pub method: Option<String>,
}

impl RefundRequest {
    /// Validate against the order's refundable balance.
    ///
    /// The balance is `total_estimated` minus refunds already settled.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` for a non-positive amount or a bad reason, and
    /// `REFUND_LIMIT_EXCEEDED` if the amount is more than the balance.
    pub fn plan<'a>(
        &self,
        order: &Order,
        existing: impl IntoIterator<Item = &'a Refund>,
    ) -> DomainResult<NewRefund> {
        if !self.amount.is_positive() {
            return Err(DomainError::invalid_request("amount must be positive"));
        }
        let reason = crate::order::validate_reason(&self.reason)?;

        let remaining = (order.total_estimated - settled_refunds(existing)).floor_zero();
        if self.amount > remaining {
            return Err(DomainError::new(
                ErrorCode::RefundLimitExceeded,
                format!("refund of {} exceeds the refundable balance of {remaining}", self.amount),
            ));
        }

        let method = self
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_REFUND_METHOD)
            .to_owned();

        Ok(NewRefund {
            amount: self.amount,
            reason,
            method,
            status: RefundStatus::Approved,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::product;
    use crate::order::tests::{at, order};

    fn item(qty: i32, unit: i64) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(11),
            order_id: OrderId::new(1),
            product_id: ProductId::new(1),
            product_name_snapshot: "Milk".to_owned(),
            unit_snapshot: "ea".to_owned(),
            qty_ordered: qty,
            qty_fulfilled: qty,
            unit_price_estimated: Money::from_units(unit),
            unit_price_final: None,
            is_weight_item: false,
            est_weight_g: None,
            final_weight_g: None,
            line_estimated: Money::from_units(unit).times(qty),
            line_final: None,
            item_status: ItemStatus::Confirmed,
            substitution_product_id: None,
            note: None,
        }
    }

    fn request(action: ShortageAction) -> ShortageRequest {
        ShortageRequest {
            order_item_id: OrderItemId::new(11),
            action,
            fulfilled_qty: None,
            substitution_product_id: None,
            substitution_qty: None,
            reason: None,
        }
    }

    fn refund(amount: i64, status: RefundStatus) -> Refund {
        Refund {
            id: RefundId::new(1),
            order_id: OrderId::new(1),
            amount: Money::from_units(amount),
            reason: "test".to_owned(),
            method: DEFAULT_REFUND_METHOD.to_owned(),
            status,
            processed_by: None,
            processed_at: at(),
        }
    }

    #[test]
    fn test_partial_cancel_scenario() {
        let o = order(OrderStatus::Picking);
        let i = item(3, 1000);
        let req = ShortageRequest {
            fulfilled_qty: Some(1),
            ..request(ShortageAction::PartialCancel)
        };
        let plan = plan_shortage(&o, &i, &req, None).unwrap();
        assert_eq!(plan.adjustment.line_final, Money::from_units(1000));
        assert_eq!(plan.adjustment.item_status, ItemStatus::PartialCanceled);
        assert_eq!(plan.refund_amount, Money::from_units(2000));
        let refund = plan.refund.unwrap();
        assert_eq!(refund.amount, Money::from_units(2000));
        assert_eq!(refund.reason, "SHORTAGE_PARTIAL_CANCEL");
        assert_eq!(refund.method, "COD_ADJUSTMENT");
        assert_eq!(refund.status, RefundStatus::Approved);
        assert!(!plan.advance_to_picking);
        assert!(plan.stock_take.is_none());
    }

    #[test]
    fn test_second_action_rejected() {
        let o = order(OrderStatus::Picking);
        let mut i = item(3, 1000);
        i.item_status = ItemStatus::PartialCanceled;
        let err = plan_shortage(&o, &i, &request(ShortageAction::OutOfStock), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ItemAlreadyProcessed);
    }

    #[test]
    fn test_zero_fulfilled_is_out_of_stock() {
        let o = order(OrderStatus::Received);
        let i = item(2, 1500);
        let plan = plan_shortage(&o, &i, &request(ShortageAction::PartialCancel), None).unwrap();
        assert_eq!(plan.adjustment.item_status, ItemStatus::OutOfStock);
        assert_eq!(plan.adjustment.qty_fulfilled, 0);
        assert_eq!(plan.refund_amount, Money::from_units(3000));
        assert!(plan.advance_to_picking);
    }

    #[test]
    fn test_out_of_stock_with_partial_qty_keeps_action_status() {
        let o = order(OrderStatus::Picking);
        let req = ShortageRequest {
            fulfilled_qty: Some(1),
            reason: Some("bruised".to_owned()),
            ..request(ShortageAction::OutOfStock)
        };
        let plan = plan_shortage(&o, &item(3, 1000), &req, None).unwrap();
        assert_eq!(plan.adjustment.item_status, ItemStatus::OutOfStock);
        assert_eq!(plan.adjustment.note.as_deref(), Some("bruised"));
        assert_eq!(plan.refund.unwrap().reason, "bruised");
    }

    #[test]
    fn test_fulfilled_over_ordered_rejected() {
        let o = order(OrderStatus::Picking);
        let req = ShortageRequest {
            fulfilled_qty: Some(4),
            ..request(ShortageAction::PartialCancel)
        };
        let err = plan_shortage(&o, &item(3, 1000), &req, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQty);
    }

    #[test]
    fn test_terminal_orders_not_adjustable() {
        for status in [OrderStatus::Delivered, OrderStatus::Canceled] {
            let err = plan_shortage(
                &order(status),
                &item(1, 1000),
                &request(ShortageAction::OutOfStock),
                None,
            )
            .unwrap_err();
            assert_eq!(err.code, ErrorCode::OrderNotAdjustable);
        }
    }

    #[test]
    fn test_item_from_other_order() {
        let mut i = item(1, 1000);
        i.order_id = OrderId::new(99);
        let err = plan_shortage(
            &order(OrderStatus::Picking),
            &i,
            &request(ShortageAction::OutOfStock),
            None,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderItemNotFound);
    }

    #[test]
    fn test_substitute_cheaper_refunds_difference() {
        let o = order(OrderStatus::Picking);
        let sub = product(7, 800, 10);
        let req = ShortageRequest {
            substitution_product_id: Some(sub.id),
            substitution_qty: Some(3),
            ..request(ShortageAction::Substitute)
        };
        let plan = plan_shortage(&o, &item(3, 1000), &req, Some(&sub)).unwrap();
        assert_eq!(plan.adjustment.item_status, ItemStatus::Substituted);
        assert_eq!(plan.adjustment.unit_price_final, Money::from_units(800));
        assert_eq!(plan.adjustment.substitution_product_id, Some(sub.id));
        assert_eq!(plan.stock_take, Some((sub.id, 3)));
        assert_eq!(plan.refund_amount, Money::from_units(600));
    }

    #[test]
    fn test_substitute_upsell_is_not_refunded() {
        let o = order(OrderStatus::Picking);
        let sub = product(7, 1500, 10);
        let req = ShortageRequest {
            substitution_product_id: Some(sub.id),
            substitution_qty: Some(3),
            ..request(ShortageAction::Substitute)
        };
        let plan = plan_shortage(&o, &item(3, 1000), &req, Some(&sub)).unwrap();
        assert_eq!(plan.refund_amount, Money::ZERO);
        assert!(plan.refund.is_none());
    }

    #[test]
    fn test_substitute_rejections() {
        let mut o = order(OrderStatus::Picking);
        let mut sub = product(7, 800, 2);
        let req = ShortageRequest {
            substitution_product_id: Some(sub.id),
            substitution_qty: Some(3),
            ..request(ShortageAction::Substitute)
        };
        let i = item(3, 1000);

        assert_eq!(
            plan_shortage(&o, &i, &req, Some(&sub)).unwrap_err().code,
            ErrorCode::InsufficientStock
        );

        sub.status = ProductStatus::Paused;
        assert_eq!(
            plan_shortage(&o, &i, &req, Some(&sub)).unwrap_err().code,
            ErrorCode::InvalidSubstitution
        );
        assert_eq!(
            plan_shortage(&o, &i, &req, None).unwrap_err().code,
            ErrorCode::InvalidSubstitution
        );

        let missing = request(ShortageAction::Substitute);
        assert_eq!(
            plan_shortage(&o, &i, &missing, None).unwrap_err().code,
            ErrorCode::InvalidRequest
        );

        o.allow_substitution = false;
        assert_eq!(
            plan_shortage(&o, &i, &req, Some(&sub)).unwrap_err().code,
            ErrorCode::SubstituteNotAllowed
        );
    }

    #[test]
    fn test_final_total_counts_settled_only() {
        let refunds = [
            refund(2000, RefundStatus::Approved),
            refund(1000, RefundStatus::Done),
            refund(500, RefundStatus::Requested),
            refund(700, RefundStatus::Rejected),
        ];
        assert_eq!(
            final_total(Money::from_units(23000), &refunds),
            Money::from_units(20000)
        );
    }

    #[test]
    fn test_final_total_never_negative() {
        let refunds = [refund(30000, RefundStatus::Approved)];
        assert_eq!(final_total(Money::from_units(23000), &refunds), Money::ZERO);
    }

    #[test]
    fn test_direct_refund_limit() {
        let o = order(OrderStatus::Delivered);
        let existing = [refund(20000, RefundStatus::Approved)];

        let ok = RefundRequest {
            amount: Money::from_units(3000),
            reason: "damaged box".to_owned(),
            method: None,
        };
        let planned = ok.plan(&o, &existing).unwrap();
        assert_eq!(planned.method, DEFAULT_REFUND_METHOD);
        assert_eq!(planned.status, RefundStatus::Approved);

        let too_much = RefundRequest {
            amount: Money::from_units(3001),
            ..ok.clone()
        };
        assert_eq!(
            too_much.plan(&o, &existing).unwrap_err().code,
            ErrorCode::RefundLimitExceeded
        );
    }

    #[test]
    fn test_direct_refund_input_checks() {
        let o = order(OrderStatus::Picking);
        let none: [Refund; 0] = [];
        let zero = RefundRequest {
            amount: Money::ZERO,
            reason: "oops".to_owned(),
            method: None,
        };
        assert_eq!(zero.plan(&o, &none).unwrap_err().code, ErrorCode::InvalidRequest);

        let short_reason = RefundRequest {
            amount: Money::from_units(100),
            reason: "x".to_owned(),
            method: Some("BANK_TRANSFER".to_owned()),
        };
        assert_eq!(
            short_reason.plan(&o, &none).unwrap_err().code,
            ErrorCode::InvalidRequest
        );
    }
}
