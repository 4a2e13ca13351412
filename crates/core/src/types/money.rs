//! Exact money amounts using decimal arithmetic.
//!
//! The store trades in a single currency, so `Money` is a bare decimal amount
//! kept at two fractional digits. Line totals are computed as exact
//! quantity-times-unit products; nothing here ever goes through floating point.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A monetary amount with two fractional digits.
///
/// Serializes as a decimal string (e.g. `"15000.00"`) so clients never see a
/// float. Deserialized values are rounded like [`Money::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Number of fractional digits stored for every amount.
    pub const SCALE: u32 = 2;

    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding half away from zero to two digits.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Create an amount from whole currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// Get the underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns `true` if the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` if the amount is strictly less than zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Exact product of a unit price and a quantity.
    #[must_use]
    pub fn times(self, quantity: i32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }

    /// Clamp negative amounts to zero.
    #[must_use]
    pub fn floor_zero(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_new_rounds_to_two_digits() {
        assert_eq!(money("1.005"), money("1.01"));
        assert_eq!(money("-1.005"), money("-1.01"));
        assert_eq!(money("3").amount().scale(), 0);
    }

    #[test]
    fn test_times_is_exact() {
        // 0.1 * 3 drifts in binary floating point; must not here.
        assert_eq!(money("0.10").times(3), money("0.30"));
        assert_eq!(money("1990.50").times(7), money("13933.50"));
    }

    #[test]
    fn test_sum_and_sub() {
        let total: Money = [money("1000"), money("2500.25"), money("0.75")]
            .into_iter()
            .sum();
        assert_eq!(total, money("3501"));
        assert_eq!(total - money("3501"), Money::ZERO);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!((money("100") - money("250")).floor_zero(), Money::ZERO);
        assert_eq!(money("5").floor_zero(), money("5"));
    }

    #[test]
    fn test_display_has_two_digits() {
        assert_eq!(Money::from_units(15000).to_string(), "15000.00");
        assert_eq!(money("0.5").to_string(), "0.50");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&money("3000.5")).unwrap();
        assert_eq!(json, "\"3000.5\"");
        let parsed: Money = serde_json::from_str("\"3000.505\"").unwrap();
        assert_eq!(parsed, money("3000.51"));
    }
}
