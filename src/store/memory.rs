//! In-memory ledger store
//!
//! Backed by a single `tokio::sync::Mutex`. A unit of work holds that mutex
//! until it commits or is dropped, which locks every account at once and so
//! trivially satisfies the ascending lock order. Writes are staged inside the
//! unit of work and applied to the shared state only on commit.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    models::sort_newest_first, Account, AccountWithCurrency, Currency, NewTransaction, Transaction,
    UserContact,
};

use super::{lock_order, LedgerStore, LedgerTx, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: BTreeMap<i64, Account>,
    currencies: BTreeMap<i64, Currency>,
    users: BTreeMap<i64, UserContact>,
    transactions: Vec<Transaction>,
    last_transaction_id: i64,
}

/// A thread-safe in-memory ledger.
///
/// Cheap to clone; clones share state. Used by tests and the load-test
/// binary.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_currency(&self, currency: Currency) {
        self.state.lock().await.currencies.insert(currency.id, currency);
    }

    pub async fn insert_user(&self, user: UserContact) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_account(&self, account: Account) {
        self.state.lock().await.accounts.insert(account.id, account);
    }

    /// Every committed transaction, in insertion order
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }

    /// Make every subsequent commit fail (fault injection)
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn account_owned_by(&self, id: i64, user_id: i64) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .get(&id)
            .filter(|account| account.is_owned_by(user_id))
            .cloned())
    }

    async fn user_accounts(&self, user_id: i64) -> Result<Vec<AccountWithCurrency>, StoreError> {
        let state = self.state.lock().await;
        state
            .accounts
            .values()
            .filter(|account| account.is_owned_by(user_id))
            .map(|account| {
                let currency = state.currencies.get(&account.currency_id).cloned().ok_or_else(|| {
                    StoreError::integrity(format!(
                        "account {} references missing currency {}",
                        account.id, account.currency_id
                    ))
                })?;
                Ok(AccountWithCurrency {
                    account: account.clone(),
                    currency,
                })
            })
            .collect()
    }

    async fn currency(&self, id: i64) -> Result<Option<Currency>, StoreError> {
        Ok(self.state.lock().await.currencies.get(&id).cloned())
    }

    async fn user(&self, id: i64) -> Result<Option<UserContact>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn user_transactions(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.lock().await;
        let mut list: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.involves_user(user_id))
            .cloned()
            .collect();
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn account_transactions(&self, account_id: i64) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.lock().await;
        let mut list: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.involves_account(account_id))
            .cloned()
            .collect();
        sort_newest_first(&mut list);
        Ok(list)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            guard,
            staged_accounts: BTreeMap::new(),
            staged_transactions: Vec::new(),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged_accounts: BTreeMap<i64, Account>,
    staged_transactions: Vec<Transaction>,
    fail_commit: bool,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_accounts(&mut self, ids: &[i64]) -> Result<Vec<Account>, StoreError> {
        Ok(lock_order(ids)
            .into_iter()
            .filter_map(|id| {
                self.staged_accounts
                    .get(&id)
                    .or_else(|| self.guard.accounts.get(&id))
                    .cloned()
            })
            .collect())
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if !self.guard.accounts.contains_key(&account.id) {
            return Err(StoreError::integrity(format!("account {} does not exist", account.id)));
        }
        self.staged_accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let id = self.guard.last_transaction_id + self.staged_transactions.len() as i64 + 1;
        let transaction = transaction.into_transaction(id);
        self.staged_transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard,
            staged_accounts,
            staged_transactions,
            fail_commit,
        } = *self;

        if fail_commit {
            return Err(StoreError::Backend("commit rejected by fault injection".to_string()));
        }

        guard.accounts.extend(staged_accounts);
        guard.last_transaction_id += staged_transactions.len() as i64;
        guard.transactions.extend(staged_transactions);
        Ok(())
    }
}
