//! Deposit Handler
//!
//! Credits external funds to a single account. Deposits are balance
//! adjustments only and do not produce a ledger transaction.

use std::sync::Arc;

use crate::domain::{Account, AccountRole, Amount, DomainError, OperationContext};
use crate::error::AppResult;
use crate::store::LedgerStore;

use super::DepositCommand;

/// Handler for account deposits
#[derive(Clone)]
pub struct DepositHandler {
    store: Arc<dyn LedgerStore>,
}

impl DepositHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Execute the deposit command, returning the account after the credit
    pub async fn execute(
        &self,
        command: DepositCommand,
        context: &OperationContext,
    ) -> AppResult<Account> {
        // Rejected before the store is touched
        let amount = Amount::new(command.amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        let mut tx = self.store.begin().await?;
        let mut account = tx
            .lock_accounts(&[command.account_id])
            .await?
            .into_iter()
            .next()
            .ok_or(DomainError::account_not_found(AccountRole::Deposit, command.account_id))?;

        account.credit(&amount)?;
        tx.save_account(&account).await?;
        tx.commit().await?;

        tracing::info!(
            account_id = account.id,
            amount = %amount,
            balance = %account.balance.value(),
            correlation_id = ?context.correlation_id,
            "Deposit completed"
        );

        Ok(account)
    }
}
