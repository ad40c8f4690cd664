//! Amount type
//!
//! Domain primitives for monetary values. Amounts are validated at
//! construction time, so a transfer can never be asked to move zero,
//! negative or out-of-range money.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed amount or balance (1 trillion units of any currency)
const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Maximum decimal places (8)
pub const MAX_SCALE: u32 = 8;

/// Amount represents a validated monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 8 decimal places
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use fx_transfer::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(100, 0)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(100, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount or mutating a Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 8 decimal places
    /// - `AmountError::Overflow` if value > 1 trillion
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        // Trailing zeros ("100.000000000") do not count against the scale limit
        let value = value.normalize();
        if value.scale() > MAX_SCALE {
            return Err(AmountError::TooManyDecimals(value.scale()));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Create an Amount from an integer (no decimal places).
    pub fn from_integer(value: i64) -> Result<Self, AmountError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Convert this amount with an exchange rate.
    ///
    /// The product is rounded half-to-even to [`MAX_SCALE`] places; the rate
    /// itself is used at full precision. A product that rounds to zero or
    /// leaves the valid range is rejected.
    pub fn convert(&self, rate: Decimal) -> Result<Amount, AmountError> {
        let product = self.0.checked_mul(rate).ok_or(AmountError::Overflow)?;
        let rounded = product.round_dp_with_strategy(MAX_SCALE, RoundingStrategy::MidpointNearestEven);
        Amount::new(rounded)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Balance represents an account balance (zero or positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if balance covers a withdrawal of `amount`
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.value()
    }

    /// Add amount to balance
    pub fn credit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        Balance::new(self.0 + amount.value())
    }

    /// Subtract amount from balance
    pub fn debit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        Balance::new(self.0 - amount.value())
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}
