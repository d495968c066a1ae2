//! Value Objects for the coffee shop

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CommerceError, Result};

/// Money value object
///
/// Always fixed-point; totals are summed in the decimal domain and only
/// formatted at the edge. Arithmetic is checked and reports
/// [`CommerceError::AmountOverflow`] instead of panicking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    /// Decimal places a catalog price may carry; matches the `NUMERIC(10, 2)` columns.
    pub const PRICE_SCALE: u32 = 2;

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_negative(&self) -> bool { self.0 < Decimal::ZERO }

    /// Largest accepted price, 99,999,999.99.
    pub fn max_price() -> Decimal { Decimal::new(9_999_999_999, Self::PRICE_SCALE) }

    /// Checks a catalog price and returns it at two decimal places.
    pub fn validate_price(self) -> Result<Money> {
        if self.is_negative() {
            return Err(CommerceError::NegativePrice(self.0));
        }
        if self.0.normalize().scale() > Self::PRICE_SCALE || self.0 > Self::max_price() {
            return Err(CommerceError::PriceOutOfRange { price: self.0, max: Self::max_price() });
        }
        let mut amount = self.0;
        amount.rescale(Self::PRICE_SCALE);
        Ok(Money(amount))
    }

    pub fn checked_times(&self, qty: u32) -> Result<Money> {
        self.0.checked_mul(Decimal::from(qty)).map(Money).ok_or(CommerceError::AmountOverflow)
    }

    pub fn checked_add(&self, other: Money) -> Result<Money> {
        self.0.checked_add(other.0).map(Money).ok_or(CommerceError::AmountOverflow)
    }

    pub fn checked_sub(&self, other: Money) -> Result<Money> {
        self.0.checked_sub(other.0).map(Money).ok_or(CommerceError::AmountOverflow)
    }

    pub fn try_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money> {
        amounts.into_iter().try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Inclusive per-line quantity bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantityBounds { min: u32, max: u32 }

impl QuantityBounds {
    pub const DEFAULT_MIN: u32 = 1;
    pub const DEFAULT_MAX: u32 = 5;

    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min == 0 {
            return Err(CommerceError::InvalidConfig("minimum quantity must be at least 1".into()));
        }
        if min > max {
            return Err(CommerceError::InvalidConfig(format!("minimum quantity {min} exceeds maximum {max}")));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 { self.min }
    pub fn max(&self) -> u32 { self.max }

    pub fn check(&self, quantity: u32) -> Result<u32> {
        if quantity < self.min || quantity > self.max {
            return Err(CommerceError::QuantityOutOfRange { quantity, min: self.min, max: self.max });
        }
        Ok(quantity)
    }

    /// Quantity after adding `requested` to `existing`, or `None` if it would pass the ceiling.
    pub fn merge(&self, existing: u32, requested: u32) -> Option<u32> {
        existing.checked_add(requested).filter(|total| *total <= self.max)
    }
}

impl Default for QuantityBounds {
    fn default() -> Self { Self { min: Self::DEFAULT_MIN, max: Self::DEFAULT_MAX } }
}
