//! Monetary amounts using decimal arithmetic.
//!
//! All amounts are kept at two decimal places. Line totals are computed as
//! `unit price × quantity` and summed without intermediate rounding.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing a [`Money`] value from input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("amount cannot have more than {max} decimal places")]
    TooPrecise {
        /// Maximum allowed scale.
        max: u32,
    },
    /// The amount does not fit a stored price.
    #[error("amount cannot exceed {}", Money::MAX)]
    TooLarge,
}

/// A non-negative decimal amount.
///
/// Serialized as a string (`"19.99"`) to avoid float rounding in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places amounts are stored with.
    pub const SCALE: u32 = 2;

    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest accepted price, the ceiling of a `NUMERIC(12, 2)` column.
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Parse a validated amount from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative, has more than two
    /// decimal places, or is above [`Money::MAX`].
    pub fn parse(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        if amount.normalize().scale() > Self::SCALE {
            return Err(MoneyError::TooPrecise { max: Self::SCALE });
        }
        if amount > Self::MAX.0 {
            return Err(MoneyError::TooLarge);
        }
        Ok(Self(amount.round_dp(Self::SCALE)))
    }

    /// Build an amount from minor units (e.g. cents).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::SCALE))
    }

    /// Wrap a decimal read back from storage.
    #[must_use]
    pub const fn from_decimal(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Get the underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Whether this amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

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
        Ok(Self(amount))
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
    use super::*;

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(Money::parse(Decimal::new(-1, 2)), Err(MoneyError::Negative));
    }

    #[test]
    fn test_parse_rejects_sub_cent_amounts() {
        assert_eq!(
            Money::parse(Decimal::new(10_001, 3)),
            Err(MoneyError::TooPrecise { max: 2 })
        );
        // trailing zeros are fine
        assert!(Money::parse(Decimal::new(10_000, 3)).is_ok());
    }

    #[test]
    fn test_parse_caps_at_stored_precision() {
        assert_eq!(Money::MAX.to_string(), "9999999999.99");
        assert_eq!(Money::parse(Decimal::new(999_999_999_999, 2)), Ok(Money::MAX));
        assert_eq!(
            Money::parse(Decimal::new(1_000_000_000_000, 2)),
            Err(MoneyError::TooLarge)
        );
        assert_eq!(
            Money::parse(Decimal::new(1_000_000_000_000_000, 2)),
            Err(MoneyError::TooLarge)
        );
    }

    #[test]
    fn test_times_and_sum() {
        let total: Money = [Money::from_cents(1000).times(2), Money::from_cents(500).times(1)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(2500));
        assert_eq!(total.to_string(), "25.00");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_cents(1999)).unwrap();
        assert_eq!(json, "\"19.99\"");
    }
}
