//! Status enums for various entities.
//!
//! Every enum here has a stable SCREAMING_SNAKE_CASE wire form shared by JSON,
//! the `PostgreSQL` enum types, and log output.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display`, and `FromStr` from one variant/string table.
macro_rules! impl_status_str {
    ($name:ident, $label:literal { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The stable wire form of this value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Lifecycle status of an order.
///
/// Legal moves between these are defined by
/// [`order::allowed_transitions`](crate::order::allowed_transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, not yet being picked.
    #[default]
    Received,
    /// Staff are collecting the items.
    Picking,
    /// Waiting on a substitution decision.
    SubstitutionPending,
    /// Handed to the courier.
    OutForDelivery,
    /// Delivered to the customer.
    Delivered,
    /// Canceled by the customer or the store.
    Canceled,
}

impl_status_str!(OrderStatus, "order status" {
    Received => "RECEIVED",
    Picking => "PICKING",
    SubstitutionPending => "SUBSTITUTION_PENDING",
    OutForDelivery => "OUT_FOR_DELIVERY",
    Delivered => "DELIVERED",
    Canceled => "CANCELED",
});

impl OrderStatus {
    /// Returns `true` for statuses with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }
}

/// Catalog lifecycle status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Active,
    SoldOut,
    Paused,
}

impl_status_str!(ProductStatus, "product status" {
    Active => "ACTIVE",
    SoldOut => "SOLD_OUT",
    Paused => "PAUSED",
});

/// How a delivery zone matches a customer location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "zone_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    /// Exact apartment complex name.
    Apartment,
    /// Exact administrative-area (dong) code.
    Dong,
    /// Geofence: center point plus radius in meters.
    Radius,
}

impl_status_str!(ZoneType, "zone type" {
    Apartment => "APARTMENT",
    Dong => "DONG",
    Radius => "RADIUS",
});

/// Fulfillment sub-status of a single order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "item_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// As ordered; no shortage action applied yet.
    #[default]
    Confirmed,
    Substituted,
    PartialCanceled,
    OutOfStock,
}

impl_status_str!(ItemStatus, "item status" {
    Confirmed => "CONFIRMED",
    Substituted => "SUBSTITUTED",
    PartialCanceled => "PARTIAL_CANCELED",
    OutOfStock => "OUT_OF_STOCK",
});

/// Approval status of a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "refund_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    #[default]
    Requested,
    Approved,
    Done,
    Rejected,
}

impl_status_str!(RefundStatus, "refund status" {
    Requested => "REQUESTED",
    Approved => "APPROVED",
    Done => "DONE",
    Rejected => "REJECTED",
});

impl RefundStatus {
    /// Statuses whose amount is deducted from the order's final total.
    pub const SETTLED: [Self; 2] = [Self::Approved, Self::Done];

    /// Returns `true` if this refund reduces the order's final total.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Approved | Self::Done)
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "actor_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    System,
    Admin,
    Customer,
}

impl_status_str!(ActorType, "actor type" {
    System => "SYSTEM",
    Admin => "ADMIN",
    Customer => "CUSTOMER",
});

/// Whether an order was placed by a signed-in member or a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_source", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSource {
    #[default]
    Guest,
    Member,
}

impl_status_str!(OrderSource, "order source" {
    Guest => "GUEST",
    Member => "MEMBER",
});

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminRole {
    /// Full access including store policy and catalog pricing.
    Manager,
    /// Day-to-day order handling.
    Staff,
}

impl_status_str!(AdminRole, "admin role" {
    Manager => "MANAGER",
    Staff => "STAFF",
});

/// Resolution applied to an order item that cannot be fulfilled as ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortageAction {
    Substitute,
    PartialCancel,
    OutOfStock,
}

impl_status_str!(ShortageAction, "shortage action" {
    Substitute => "SUBSTITUTE",
    PartialCancel => "PARTIAL_CANCEL",
    OutOfStock => "OUT_OF_STOCK",
});
