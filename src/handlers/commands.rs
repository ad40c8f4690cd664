//! Command definitions
//!
//! Commands represent intentions to change the system state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountWithCurrency, Amount, Transaction};

// =========================================================================
// TransferCommand
// =========================================================================

/// Move `amount` (in the source account's currency) from an account owned
/// by `owner_user_id` to any other account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    /// The authenticated caller; must own the source account
    pub owner_user_id: i64,
    pub amount: Amount,
    pub description: Option<String>,
}

impl TransferCommand {
    pub fn new(source_account_id: i64, destination_account_id: i64, owner_user_id: i64, amount: Amount) -> Self {
        Self {
            source_account_id,
            destination_account_id,
            owner_user_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}

// =========================================================================
// DepositCommand
// =========================================================================

/// Credit external funds to an account.
///
/// The amount is raw so the handler can reject zero or negative values
/// itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    pub account_id: i64,
    pub amount: Decimal,
}

impl DepositCommand {
    pub fn new(account_id: i64, amount: Decimal) -> Self {
        Self { account_id, amount }
    }
}

/// An owned account with its full transaction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetails {
    pub account: AccountWithCurrency,
    pub transactions: Vec<Transaction>,
}

