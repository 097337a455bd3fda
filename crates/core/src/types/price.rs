//! Euro-denominated unit prices.
//!
//! Listings carry a single `unitPriceEuro` column, so unlike a general money
//! type there is no currency field: the currency is part of the type.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`PriceEuro`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount has more than two fractional digits.
    #[error("price must have at most 2 decimal places: {0}")]
    TooPrecise(Decimal),
}

/// A unit price in euros with cent precision.
///
/// ## Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use tristore_core::PriceEuro;
///
/// let price = PriceEuro::new(Decimal::new(500, 2)).unwrap();
/// assert_eq!(price.to_string(), "€5.00");
///
/// assert!(PriceEuro::new(Decimal::new(-1, 0)).is_err());
/// assert!(PriceEuro::new(Decimal::new(1001, 3)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct PriceEuro(Decimal);

impl PriceEuro {
    /// Zero euros.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative or finer than one cent.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        if amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of cents.
    ///
    /// # Errors
    ///
    /// Returns an error if `cents` is negative.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The amount in euros.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for PriceEuro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "€{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for PriceEuro {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PriceEuro> for Decimal {
    fn from(price: PriceEuro) -> Self {
        price.0
    }
}
