//! Transfer Handler
//!
//! Moves money between two accounts, converting between currencies when
//! they differ.
//!
//! Validation and the rate lookup run first without holding any lock, so a
//! slow rate provider never blocks other transfers. The settlement then
//! opens a unit of work, locks both accounts in ascending id order and
//! re-validates ownership and balance against the locked rows before
//! writing, which keeps two concurrent transfers from overdrawing the same
//! source.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::domain::{
    Account, AccountRole, Amount, Currency, DomainError, NewTransaction, OperationContext, Transaction,
};
use crate::error::{AppError, AppResult};
use crate::exchange::RateResolver;
use crate::notification::{NotificationSink, TransferNotice};
use crate::store::{LedgerStore, StoreError};

use super::TransferCommand;

/// Everything decided before settlement
#[derive(Debug)]
struct PreparedTransfer {
    owner_user_id: i64,
    source: Account,
    destination: Account,
    source_currency: Currency,
    destination_currency: Currency,
    amount: Amount,
    exchange_rate: Decimal,
    destination_amount: Amount,
    description: Option<String>,
}

/// Handler for transfers between accounts
#[derive(Clone)]
pub struct TransferHandler {
    store: Arc<dyn LedgerStore>,
    resolver: Arc<dyn RateResolver>,
    notifier: Arc<dyn NotificationSink>,
}

impl TransferHandler {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        resolver: Arc<dyn RateResolver>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            resolver,
            notifier,
        }
    }

    /// Execute the transfer command, returning the persisted ledger record
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> AppResult<Transaction> {
        let (transaction, prepared) = match self.run(command).await {
            Ok(done) => done,
            Err(e) => {
                if e.is_client_error() {
                    tracing::info!(error = %e, correlation_id = ?context.correlation_id, "Transfer rejected");
                } else {
                    tracing::error!(error = %e, correlation_id = ?context.correlation_id, "Transfer failed");
                }
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id = transaction.id,
            source_account_id = transaction.source_account_id,
            destination_account_id = transaction.destination_account_id,
            source_amount = %transaction.source_amount,
            destination_amount = %transaction.destination_amount,
            exchange_rate = %transaction.exchange_rate,
            correlation_id = ?context.correlation_id,
            "Transfer completed"
        );

        self.notify(&transaction, &prepared).await;

        Ok(transaction)
    }

    async fn run(&self, command: TransferCommand) -> AppResult<(Transaction, PreparedTransfer)> {
        let prepared = self.prepare(command).await?;
        let transaction = self.settle(&prepared).await?;
        Ok((transaction, prepared))
    }

    /// Validate the request and price it. Nothing is written here.
    async fn prepare(&self, command: TransferCommand) -> AppResult<PreparedTransfer> {
        let TransferCommand {
            source_account_id,
            destination_account_id,
            owner_user_id,
            amount,
            description,
        } = command;

        let source = self
            .store
            .account_owned_by(source_account_id, owner_user_id)
            .await?
            .ok_or(DomainError::account_not_found(AccountRole::Source, source_account_id))?;

        // Any user's account may receive funds
        let destination = self
            .store
            .account(destination_account_id)
            .await?
            .ok_or(DomainError::account_not_found(
                AccountRole::Destination,
                destination_account_id,
            ))?;

        if source.id == destination.id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        if !source.balance.is_sufficient_for(&amount) {
            return Err(DomainError::insufficient_balance(amount.value(), source.balance.value()).into());
        }

        let source_currency = self.currency_of(&source).await?;
        let destination_currency = self.currency_of(&destination).await?;

        let (exchange_rate, destination_amount) = if source_currency.code == destination_currency.code {
            (Decimal::ONE, amount)
        } else {
            let rate = self
                .resolver
                .get_rate(&source_currency.code, &destination_currency.code)
                .await
                .map_err(DomainError::from)?;
            let converted = amount
                .convert(rate)
                .map_err(|e| DomainError::InvalidAmount(format!("converted amount: {e}")))?;
            (rate, converted)
        };

        Ok(PreparedTransfer {
            owner_user_id,
            source,
            destination,
            source_currency,
            destination_currency,
            amount,
            exchange_rate,
            destination_amount,
            description,
        })
    }

    /// A missing currency for an existing account is a broken reference,
    /// not a caller mistake
    async fn currency_of(&self, account: &Account) -> AppResult<Currency> {
        self.store.currency(account.currency_id).await?.ok_or_else(|| {
            AppError::Persistence(StoreError::integrity(format!(
                "account {} references missing currency {}",
                account.id, account.currency_id
            )))
        })
    }

    /// Debit, credit and record the transfer as one unit of work
    async fn settle(&self, prepared: &PreparedTransfer) -> AppResult<Transaction> {
        let source_id = prepared.source.id;
        let destination_id = prepared.destination.id;

        let mut tx = self.store.begin().await?;
        let locked = tx.lock_accounts(&[source_id, destination_id]).await?;

        let mut source = locked
            .iter()
            .find(|account| account.id == source_id)
            .cloned()
            .ok_or(DomainError::account_not_found(AccountRole::Source, source_id))?
            .require_owner(prepared.owner_user_id)?;
        let mut destination = locked
            .iter()
            .find(|account| account.id == destination_id)
            .cloned()
            .ok_or(DomainError::account_not_found(AccountRole::Destination, destination_id))?;

        if source.currency_id != prepared.source_currency.id
            || destination.currency_id != prepared.destination_currency.id
        {
            return Err(StoreError::integrity("account currency changed during transfer").into());
        }

        // Balance re-checked against the locked row
        source.debit(&prepared.amount)?;
        destination.credit(&prepared.destination_amount)?;

        // One timestamp for both sides of the event
        let timestamp = Utc::now();

        tx.save_account(&source).await?;
        tx.save_account(&destination).await?;
        let transaction = tx
            .insert_transaction(NewTransaction {
                sender_id: prepared.owner_user_id,
                receiver_id: destination.user_id,
                source_account_id: source.id,
                destination_account_id: destination.id,
                source_amount: prepared.amount.value(),
                source_currency_id: prepared.source_currency.id,
                destination_amount: prepared.destination_amount.value(),
                destination_currency_id: prepared.destination_currency.id,
                exchange_rate: prepared.exchange_rate,
                description: prepared.description.clone(),
                timestamp,
            })
            .await?;
        tx.commit().await?;

        Ok(transaction)
    }

    /// Best-effort notification of both parties. Never fails the transfer.
    async fn notify(&self, transaction: &Transaction, prepared: &PreparedTransfer) {
        let parties = [(transaction.sender_id, true), (transaction.receiver_id, false)];

        for (user_id, is_sender) in parties {
            let contact = match self.store.user(user_id).await {
                Ok(Some(contact)) => contact,
                Ok(None) => {
                    tracing::warn!(
                        transaction_id = transaction.id,
                        user_id,
                        "No contact details for transfer party, skipping notification"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        transaction_id = transaction.id,
                        user_id,
                        error = %e,
                        "Failed to load transfer party for notification"
                    );
                    continue;
                }
            };

            let notice = TransferNotice {
                recipient_email: &contact.email,
                recipient_name: &contact.full_name,
                transaction,
                source_code: &prepared.source_currency.code,
                destination_code: &prepared.destination_currency.code,
                is_sender,
            };

            if let Err(e) = self.notifier.notify_transfer(notice).await {
                tracing::warn!(
                    transaction_id = transaction.id,
                    user_id,
                    is_sender,
                    error = %e,
                    "Transfer notification failed"
                );
            }
        }
    }
}
