//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which side of an operation an account lookup was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Source,
    Destination,
    Deposit,
    /// Direct lookup by the account's owner
    Requested,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Source => "source",
            Self::Destination => "destination",
            Self::Deposit => "deposit",
            Self::Requested => "requested",
        };
        f.write_str(name)
    }
}

/// Domain-specific errors
///
/// Every variant is detected before any balance or ledger mutation, so a
/// caller receiving one of these can assume nothing was written.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Account not found: {which} account {id}")]
    AccountNotFound { which: AccountRole, id: i64 },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Exchange rate unavailable from {from} to {to}")]
    RateUnavailable { from: String, to: String },

    #[error("Currency not found: {0}")]
    CurrencyNotFound(i64),

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,
}

impl DomainError {
    pub fn account_not_found(which: AccountRole, id: i64) -> Self {
        Self::AccountNotFound { which, id }
    }

    pub fn insufficient_balance(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance { required, available }
    }

    pub fn rate_unavailable(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::RateUnavailable {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Check if this is a client error (caller's fault)
    ///
    /// Lookup misses count: the caller named an id that does not exist or
    /// is not theirs.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound { .. }
                | Self::CurrencyNotFound(_)
                | Self::InsufficientBalance { .. }
                | Self::InvalidAmount(_)
                | Self::SameAccountTransfer
                | Self::RateUnavailable { .. }
        )
    }

    /// Check if this is a lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AccountNotFound { .. } | Self::CurrencyNotFound(_))
    }
}
