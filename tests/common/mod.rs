//! Common test utilities
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use fx_transfer::domain::{
    Account, AccountWithCurrency, Balance, Currency, Transaction, UserContact,
};
use fx_transfer::exchange::MockRateResolver;
use fx_transfer::handlers::TransferHandler;
use fx_transfer::notification::{LogNotifier, NotificationError, NotificationSink, TransferNotice};
use fx_transfer::store::{InMemoryLedgerStore, LedgerStore, LedgerTx, StoreError};

pub const PEN: i64 = 1;
pub const USD: i64 = 2;
pub const EUR: i64 = 3;

pub const ANA: i64 = 10;
pub const BRUNO: i64 = 20;

/// Ana's PEN account
pub const ANA_PEN: i64 = 100;
/// Ana's USD account
pub const ANA_USD: i64 = 101;
/// Bruno's USD account
pub const BRUNO_USD: i64 = 200;
/// Bruno's EUR account
pub const BRUNO_EUR: i64 = 201;

/// Store with PEN/USD/EUR, two users and four accounts.
///
/// Balances: ANA_PEN 1000, ANA_USD 100, BRUNO_USD 0, BRUNO_EUR 0.
pub async fn seeded_store() -> InMemoryLedgerStore {
    let store = InMemoryLedgerStore::new();

    for (id, code, name) in [(PEN, "PEN", "Peruvian Sol"), (USD, "USD", "US Dollar"), (EUR, "EUR", "Euro")] {
        store
            .insert_currency(Currency {
                id,
                code: code.to_string(),
                name: name.to_string(),
            })
            .await;
    }

    store
        .insert_user(UserContact {
            id: ANA,
            email: "ana@example.com".to_string(),
            full_name: "Ana Quispe".to_string(),
        })
        .await;
    store
        .insert_user(UserContact {
            id: BRUNO,
            email: "bruno@example.com".to_string(),
            full_name: "Bruno Diaz".to_string(),
        })
        .await;

    store.insert_account(account(ANA_PEN, ANA, PEN, Decimal::from(1000))).await;
    store.insert_account(account(ANA_USD, ANA, USD, Decimal::from(100))).await;
    store.insert_account(account(BRUNO_USD, BRUNO, USD, Decimal::ZERO)).await;
    store.insert_account(account(BRUNO_EUR, BRUNO, EUR, Decimal::ZERO)).await;

    store
}

pub fn account(id: i64, user_id: i64, currency_id: i64, balance: Decimal) -> Account {
    Account::new(id, user_id, currency_id, Balance::new(balance).unwrap())
}

pub async fn balance_of(store: &InMemoryLedgerStore, account_id: i64) -> Decimal {
    store
        .account(account_id)
        .await
        .unwrap()
        .expect("account exists")
        .balance
        .value()
}

pub fn mock_handler(store: &InMemoryLedgerStore) -> TransferHandler {
    TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::new()),
        Arc::new(LogNotifier),
    )
}

// =========================================================================
// Notification doubles
// =========================================================================

/// Records every notice and optionally fails delivery
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    /// (recipient email, is_sender, transaction id)
    pub seen: Mutex<Vec<(String, bool, i64)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<(String, bool, i64)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify_transfer(&self, notice: TransferNotice<'_>) -> Result<(), NotificationError> {
        self.seen.lock().unwrap().push((
            notice.recipient_email.to_string(),
            notice.is_sender,
            notice.transaction.id,
        ));
        if self.fail {
            return Err(NotificationError::Delivery("smtp down".to_string()));
        }
        Ok(())
    }
}

// =========================================================================
// Store double
// =========================================================================

/// Delegates to an inner store and counts every call made on it
pub struct CountingStore {
    inner: InMemoryLedgerStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: InMemoryLedgerStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for CountingStore {
    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        self.hit();
        self.inner.account(id).await
    }

    async fn account_owned_by(&self, id: i64, user_id: i64) -> Result<Option<Account>, StoreError> {
        self.hit();
        self.inner.account_owned_by(id, user_id).await
    }

    async fn user_accounts(&self, user_id: i64) -> Result<Vec<AccountWithCurrency>, StoreError> {
        self.hit();
        self.inner.user_accounts(user_id).await
    }

    async fn currency(&self, id: i64) -> Result<Option<Currency>, StoreError> {
        self.hit();
        self.inner.currency(id).await
    }

    async fn user(&self, id: i64) -> Result<Option<UserContact>, StoreError> {
        self.hit();
        self.inner.user(id).await
    }

    async fn user_transactions(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        self.hit();
        self.inner.user_transactions(user_id).await
    }

    async fn account_transactions(&self, account_id: i64) -> Result<Vec<Transaction>, StoreError> {
        self.hit();
        self.inner.account_transactions(account_id).await
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        self.hit();
        self.inner.begin().await
    }
}

// =========================================================================
// PostgreSQL
// =========================================================================

const SCHEMA: &str = include_str!("../../migrations/20260101000000_init.sql");

/// Arbitrary key serialising schema setup across test processes
const SCHEMA_LOCK_KEY: i64 = 0x6678_7472;

/// Connect to DATABASE_URL and apply the schema.
///
/// Returns `None` when DATABASE_URL is unset so the PostgreSQL tests are
/// skipped on machines without a database. Tests never truncate: every
/// test seeds its own users and accounts, so they can share one database.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .expect("Failed to take schema lock");
    sqlx::Executor::execute(&mut *conn, SCHEMA)
        .await
        .expect("Failed to apply schema");
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .expect("Failed to release schema lock");

    Some(pool)
}

/// Insert a user with a unique email and return its id
pub async fn seed_user(pool: &PgPool, full_name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email, full_name) VALUES ($1, $2) RETURNING id")
        .bind(format!("{}@example.test", Uuid::new_v4()))
        .bind(full_name)
        .fetch_one(pool)
        .await
        .expect("Failed to seed user")
}

/// Insert an account in the currency with `code` and return its id
pub async fn seed_account(pool: &PgPool, user_id: i64, code: &str, balance: Decimal) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO accounts (user_id, currency_id, balance)
        SELECT $1, id, $3 FROM currencies WHERE code = $2
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(code)
    .bind(balance)
    .fetch_one(pool)
    .await
    .expect("Failed to seed account")
}

pub async fn pg_balance_of(pool: &PgPool, account_id: i64) -> Decimal {
    sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("account exists")
}

/// Ledger rows touching the account on either side
pub async fn pg_ledger_count(pool: &PgPool, account_id: i64) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions WHERE source_account_id = $1 OR destination_account_id = $1",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await
    .expect("Failed to count ledger rows")
}
