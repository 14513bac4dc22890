//! Fixed-point monetary amounts.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Balances and amounts are `rust_decimal::Decimal` with an explicit scale of
//! two fractional digits, matching the `NUMERIC(15, 2)` store columns.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of fractional digits carried by every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount or balance a `NUMERIC(15, 2)` column holds: 9,999,999,999,999.99.
pub const MAX_AMOUNT: Decimal =
    Decimal::from_parts(0xA4C6_7FFF, 0x0003_8D7E, 0, false, MONEY_SCALE);

/// Reasons an operation amount is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Amount is zero or negative.
    #[error("amount must be greater than zero")]
    NotPositive,

    /// Amount has more fractional digits than the store keeps.
    #[error("amount has more than {} decimal places", MONEY_SCALE)]
    TooPrecise,

    /// Amount is above [`MAX_AMOUNT`].
    #[error("amount exceeds the maximum of {}", MAX_AMOUNT)]
    TooLarge,
}

/// A strictly positive monetary amount with at most [`MONEY_SCALE`] decimal
/// places, no larger than [`MAX_AMOUNT`].
///
/// Constructing a `Money` is the only way an operation amount enters the ledger,
/// so a value of this type is always safe to add to or subtract from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Validates a caller-supplied amount.
    ///
    /// Trailing zeros are ignored when checking precision, so `10.500` is
    /// accepted as `10.50` while `10.505` is rejected. Nothing is rounded.
    pub fn positive(amount: Decimal) -> Result<Self, MoneyError> {
        if amount <= Decimal::ZERO {
            return Err(MoneyError::NotPositive);
        }
        if amount.normalize().scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise);
        }
        if amount > MAX_AMOUNT {
            return Err(MoneyError::TooLarge);
        }
        Ok(Self(to_scale(amount)))
    }

    /// Returns the amount as a decimal at [`MONEY_SCALE`].
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Returns the amount negated, for debiting a balance.
    #[must_use]
    pub fn negated(self) -> Decimal {
        -self.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::positive(raw).map_err(serde::de::Error::custom)
    }
}

/// Rescales a balance or amount to [`MONEY_SCALE`] without changing its value
/// when it already fits; excess digits are rounded half-to-even.
#[must_use]
pub fn to_scale(value: Decimal) -> Decimal {
    let mut scaled = value.round_dp(MONEY_SCALE);
    scaled.rescale(MONEY_SCALE);
    scaled
}
