//! PostgreSQL ledger store
//!
//! Balances and ledger rows live in the tables created by
//! `migrations/20260101000000_init.sql`. A unit of work is a database
//! transaction; account rows are locked with `SELECT ... FOR UPDATE` in
//! ascending id order so concurrent transfers touching the same pair of
//! accounts queue up instead of deadlocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};

use crate::domain::{
    Account, AccountWithCurrency, Balance, Currency, NewTransaction, Transaction, UserContact,
};

use super::{lock_order, LedgerStore, LedgerTx, StoreError};

const ACCOUNT_COLUMNS: &str = "id, user_id, currency_id, balance";

const TRANSACTION_COLUMNS: &str = r#"
    id, sender_id, receiver_id, source_account_id, destination_account_id,
    source_amount, source_currency_id, destination_amount, destination_currency_id,
    exchange_rate, description, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    user_id: i64,
    currency_id: i64,
    balance: Decimal,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let balance = Balance::new(row.balance).map_err(|e| {
            StoreError::integrity(format!("account {} has invalid balance: {}", row.id, e))
        })?;
        Ok(Account::new(row.id, row.user_id, row.currency_id, balance))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    source_account_id: i64,
    destination_account_id: i64,
    source_amount: Decimal,
    source_currency_id: i64,
    destination_amount: Decimal,
    destination_currency_id: i64,
    exchange_rate: Decimal,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            source_account_id: row.source_account_id,
            destination_account_id: row.destination_account_id,
            source_amount: row.source_amount,
            source_currency_id: row.source_currency_id,
            destination_amount: row.destination_amount,
            destination_currency_id: row.destination_currency_id,
            exchange_rate: row.exchange_rate,
            description: row.description,
            timestamp: row.created_at,
        }
    }
}

/// Ledger store on a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Account::try_from).transpose()
    }

    async fn account_owned_by(&self, id: i64, user_id: i64) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn user_accounts(&self, user_id: i64) -> Result<Vec<AccountWithCurrency>, StoreError> {
        let rows: Vec<(i64, i64, i64, Decimal, String, String)> = sqlx::query_as(
            r#"
            SELECT a.id, a.user_id, a.currency_id, a.balance, c.code, c.name
            FROM accounts a
            JOIN currencies c ON c.id = a.currency_id
            WHERE a.user_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, user_id, currency_id, balance, code, name)| {
                let account = Account::try_from(AccountRow {
                    id,
                    user_id,
                    currency_id,
                    balance,
                })?;
                Ok(AccountWithCurrency {
                    account,
                    currency: Currency {
                        id: currency_id,
                        code,
                        name,
                    },
                })
            })
            .collect()
    }

    async fn currency(&self, id: i64) -> Result<Option<Currency>, StoreError> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, code, name FROM currencies WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, code, name)| Currency { id, code, name }))
    }

    async fn user(&self, id: i64) -> Result<Option<UserContact>, StoreError> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, email, full_name FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, email, full_name)| UserContact { id, email, full_name }))
    }

    async fn user_transactions(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn account_transactions(&self, account_id: i64) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE source_account_id = $1 OR destination_account_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }
}

struct PgLedgerTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_accounts(&mut self, ids: &[i64]) -> Result<Vec<Account>, StoreError> {
        let ids = lock_order(ids);

        // One statement per row keeps the lock acquisition order explicit
        let mut locked = Vec::with_capacity(ids.len());
        for id in ids {
            let row: Option<AccountRow> = sqlx::query_as(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
            ))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

            if let Some(row) = row {
                locked.push(Account::try_from(row)?);
            }
        }

        Ok(locked)
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError> {
        let rows_affected = sqlx::query("UPDATE accounts SET balance = $2 WHERE id = $1")
            .bind(account.id)
            .bind(account.balance.value())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::integrity(format!("account {} does not exist", account.id)));
        }

        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                sender_id, receiver_id, source_account_id, destination_account_id,
                source_amount, source_currency_id, destination_amount, destination_currency_id,
                exchange_rate, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(transaction.sender_id)
        .bind(transaction.receiver_id)
        .bind(transaction.source_account_id)
        .bind(transaction.destination_account_id)
        .bind(transaction.source_amount)
        .bind(transaction.source_currency_id)
        .bind(transaction.destination_amount)
        .bind(transaction.destination_currency_id)
        .bind(transaction.exchange_rate)
        .bind(&transaction.description)
        .bind(transaction.timestamp)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transaction.into_transaction(id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
