//! Ledger store
//!
//! Persistence contract consumed by the transfer engine. Reads happen
//! directly on the store; every write goes through a [`LedgerTx`] unit of
//! work so balance updates and the transaction insert commit together.

mod memory;
mod postgres;

pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;

use crate::domain::{Account, AccountWithCurrency, Currency, NewTransaction, Transaction, UserContact};

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row referenced by another row is missing
    #[error("Referential integrity violation: {0}")]
    Integrity(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }
}

/// Read access and unit-of-work factory for accounts, currencies, users and
/// the transaction ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError>;

    /// Account `id`, only if it belongs to `user_id`
    async fn account_owned_by(&self, id: i64, user_id: i64) -> Result<Option<Account>, StoreError>;

    async fn user_accounts(&self, user_id: i64) -> Result<Vec<AccountWithCurrency>, StoreError>;

    async fn currency(&self, id: i64) -> Result<Option<Currency>, StoreError>;

    async fn user(&self, id: i64) -> Result<Option<UserContact>, StoreError>;

    /// Transactions where the user is sender or receiver, newest first
    async fn user_transactions(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError>;

    /// Transactions touching the account on either side, newest first
    async fn account_transactions(&self, account_id: i64) -> Result<Vec<Transaction>, StoreError>;

    /// Open a unit of work. Dropping it without [`LedgerTx::commit`] discards
    /// every write made through it.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

/// An open atomic unit of work
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the given accounts for the rest of the unit of work and return
    /// their current state.
    ///
    /// Locks are taken in ascending id order regardless of the order of
    /// `ids`. Ids with no matching row are absent from the result.
    async fn lock_accounts(&mut self, ids: &[i64]) -> Result<Vec<Account>, StoreError>;

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError>;

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Sorted, de-duplicated copy of `ids`; the global lock order
pub(crate) fn lock_order(ids: &[i64]) -> Vec<i64> {
    let mut ordered = ids.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}
