//! Ledger records
//!
//! Accounts, currencies, users and the immutable transaction record written
//! once per completed transfer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountRole, Amount, Balance, DomainError};

/// A currency-denominated account owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub currency_id: i64,
    pub balance: Balance,
}

impl Account {
    pub fn new(id: i64, user_id: i64, currency_id: i64, balance: Balance) -> Self {
        Self {
            id,
            user_id,
            currency_id,
            balance,
        }
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    /// Withdraw `amount`, failing without change if the balance does not cover it
    pub fn debit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        if !self.balance.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_balance(
                amount.value(),
                self.balance.value(),
            ));
        }

        self.balance = self
            .balance
            .debit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        Ok(())
    }

    pub fn credit(&mut self, amount: &Amount) -> Result<(), DomainError> {
        self.balance = self
            .balance
            .credit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        Ok(())
    }

    pub(crate) fn require_owner(self, user_id: i64) -> Result<Self, DomainError> {
        if self.is_owned_by(user_id) {
            Ok(self)
        } else {
            Err(DomainError::account_not_found(AccountRole::Source, self.id))
        }
    }
}

/// Reference data; never mutated by this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    /// ISO-like three letter code, unique
    pub code: String,
    pub name: String,
}

/// Notification contact details for an account owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

/// An account together with its currency, as listed to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWithCurrency {
    pub account: Account,
    pub currency: Currency,
}

/// Transaction record prior to insertion (no id yet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub source_account_id: i64,
    pub destination_account_id: i64,
    pub source_amount: Decimal,
    pub source_currency_id: i64,
    pub destination_amount: Decimal,
    pub destination_currency_id: i64,
    pub exchange_rate: Decimal,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: i64) -> Transaction {
        Transaction {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            source_account_id: self.source_account_id,
            destination_account_id: self.destination_account_id,
            source_amount: self.source_amount,
            source_currency_id: self.source_currency_id,
            destination_amount: self.destination_amount,
            destination_currency_id: self.destination_currency_id,
            exchange_rate: self.exchange_rate,
            description: self.description,
            timestamp: self.timestamp,
        }
    }
}

/// Append-only ledger entry for one completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub source_account_id: i64,
    pub destination_account_id: i64,
    pub source_amount: Decimal,
    pub source_currency_id: i64,
    pub destination_amount: Decimal,
    pub destination_currency_id: i64,
    pub exchange_rate: Decimal,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn involves_user(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub fn involves_account(&self, account_id: i64) -> bool {
        self.source_account_id == account_id || self.destination_account_id == account_id
    }
}

/// Newest first, ties broken by id so the order is total
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}
