//! Account Query Handler
//!
//! Read-only views over accounts, currencies and the transaction ledger.
//! All results are scoped to the requesting user.

use std::sync::Arc;

use crate::domain::{AccountRole, AccountWithCurrency, Currency, DomainError, Transaction};
use crate::error::AppResult;
use crate::store::{LedgerStore, StoreError};

use super::AccountDetails;

#[derive(Clone)]
pub struct AccountQueryHandler {
    store: Arc<dyn LedgerStore>,
}

impl AccountQueryHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Transactions where the user is sender or receiver, newest first
    pub async fn user_transactions(&self, user_id: i64) -> AppResult<Vec<Transaction>> {
        Ok(self.store.user_transactions(user_id).await?)
    }

    pub async fn user_accounts(&self, user_id: i64) -> AppResult<Vec<AccountWithCurrency>> {
        Ok(self.store.user_accounts(user_id).await?)
    }

    /// An account owned by `user_id` with every transaction touching it.
    ///
    /// Accounts owned by someone else are reported as missing.
    pub async fn account_details(&self, account_id: i64, user_id: i64) -> AppResult<AccountDetails> {
        let account = self
            .store
            .account_owned_by(account_id, user_id)
            .await?
            .ok_or(DomainError::account_not_found(AccountRole::Requested, account_id))?;

        let currency = self.store.currency(account.currency_id).await?.ok_or_else(|| {
            StoreError::integrity(format!(
                "account {} references missing currency {}",
                account.id, account.currency_id
            ))
        })?;

        let transactions = self.store.account_transactions(account.id).await?;

        Ok(AccountDetails {
            account: AccountWithCurrency { account, currency },
            transactions,
        })
    }

    pub async fn currency(&self, currency_id: i64) -> AppResult<Currency> {
        self.store
            .currency(currency_id)
            .await?
            .ok_or_else(|| DomainError::CurrencyNotFound(currency_id).into())
    }
}
