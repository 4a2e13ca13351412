//! Domain error codes.
//!
//! Every business-rule failure carries a stable machine-readable [`ErrorCode`]
//! plus a human-readable message. Clients match on the code; the message is
//! for people.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Broad classification of an [`ErrorCode`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request breaks a business rule or is malformed.
    Invalid,
    /// The referenced entity does not exist.
    NotFound,
    /// The request collides with existing state.
    Conflict,
}

/// Declares [`ErrorCode`] with `as_str` and `FromStr` from one
/// variant/wire-name table. Serde goes through the same table.
macro_rules! error_codes {
    ($($variant:ident => $s:literal),+ $(,)?) => {
        /// Stable error codes returned to API clients.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ErrorCode {
            $($variant),+
        }

        impl ErrorCode {
            /// Every code, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire form of this code.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl FromStr for ErrorCode {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(format!("invalid error code: {s}")),
                }
            }
        }
    };
}

error_codes! {
    // Checkout eligibility
    HolidayClosed => "HOLIDAY_CLOSED",
    StoreClosed => "STORE_CLOSED",
    CutoffPassed => "CUTOFF_PASSED",
    SlotUnavailable => "SLOT_UNAVAILABLE",
    OutOfDeliveryZone => "OUT_OF_DELIVERY_ZONE",
    MinOrderNotMet => "MIN_ORDER_NOT_MET",
    CheckoutInvalid => "CHECKOUT_INVALID",

    // Inventory
    OutOfStock => "OUT_OF_STOCK",
    MaxQtyExceeded => "MAX_QTY_EXCEEDED",
    InsufficientStock => "INSUFFICIENT_STOCK",
    InvalidQty => "INVALID_QTY",

    // Order lifecycle
    InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
    OrderNotCancelable => "ORDER_NOT_CANCELABLE",
    OrderNotAdjustable => "ORDER_NOT_ADJUSTABLE",
    ItemAlreadyProcessed => "ITEM_ALREADY_PROCESSED",
    SubstituteNotAllowed => "SUBSTITUTE_NOT_ALLOWED",
    InvalidSubstitution => "INVALID_SUBSTITUTION",
    RefundLimitExceeded => "REFUND_LIMIT_EXCEEDED",

    // Catalog and store configuration
    InvalidPrice => "INVALID_PRICE",
    InvalidZone => "INVALID_ZONE",
    InvalidPolicy => "INVALID_POLICY",

    InvalidRequest => "INVALID_REQUEST",

    // Lookups
    OrderNotFound => "ORDER_NOT_FOUND",
    OrderItemNotFound => "ORDER_ITEM_NOT_FOUND",
    ProductNotFound => "PRODUCT_NOT_FOUND",
    CartItemNotFound => "CART_ITEM_NOT_FOUND",
    ZoneNotFound => "ZONE_NOT_FOUND",
    HolidayNotFound => "HOLIDAY_NOT_FOUND",

    // Conflicts
    DuplicateSku => "DUPLICATE_SKU",
    DuplicateHoliday => "DUPLICATE_HOLIDAY",
    CartOwnershipMismatch => "CART_OWNERSHIP_MISMATCH",
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl ErrorCode {
    /// Classify this code.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::OrderNotFound
            | Self::OrderItemNotFound
            | Self::ProductNotFound
            | Self::CartItemNotFound
            | Self::ZoneNotFound
            | Self::HolidayNotFound => ErrorKind::NotFound,
            Self::DuplicateSku | Self::DuplicateHoliday | Self::CartOwnershipMismatch => {
                ErrorKind::Conflict
            }
            _ => ErrorKind::Invalid,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected business operation.
///
/// No state has been changed when one of these is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct DomainError {
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable explanation.
    pub message: String,
}

impl DomainError {
    /// Create an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// The classification of this error's code.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_form_matches_serde() {
        for &code in ErrorCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            assert_eq!(serde_json::from_str::<ErrorCode>(&json).unwrap(), code);
            assert_eq!(code.as_str().parse::<ErrorCode>().unwrap(), code);
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        assert!("NOT_A_CODE".parse::<ErrorCode>().is_err());
        assert!(serde_json::from_str::<ErrorCode>("\"out_of_stock\"").is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ErrorCode::InsufficientStock.kind(), ErrorKind::Invalid);
        assert_eq!(ErrorCode::ItemAlreadyProcessed.kind(), ErrorKind::Invalid);
        assert_eq!(ErrorCode::OrderNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::CartItemNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::DuplicateSku.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::CartOwnershipMismatch.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_display() {
        let err = DomainError::new(ErrorCode::OrderNotCancelable, "picking has started");
        assert_eq!(err.to_string(), "ORDER_NOT_CANCELABLE: picking has started");
    }
}
