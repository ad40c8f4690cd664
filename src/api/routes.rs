//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{
    Account, AccountWithCurrency, Amount, Currency, DomainError, OperationContext, Transaction,
};
use crate::error::AppResult;
use crate::exchange::{CurrencyNames, ExchangeRateResolver, ProviderSlot, RateResolver};
use crate::handlers::{
    AccountDetails, AccountQueryHandler, DepositCommand, DepositHandler, TransferCommand,
    TransferHandler,
};
use crate::notification::NotificationSink;
use crate::store::LedgerStore;

use super::middleware::RequestUser;

// =========================================================================
// Application state
// =========================================================================

/// Handlers shared by every request
#[derive(Clone)]
pub struct AppState {
    /// Transfers priced by the live failover resolver
    pub transfers: TransferHandler,
    /// Transfers priced by the fixed-table resolver
    pub mocked_transfers: TransferHandler,
    pub deposits: DepositHandler,
    pub queries: AccountQueryHandler,
    pub resolver: Arc<ExchangeRateResolver>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        resolver: Arc<ExchangeRateResolver>,
        mock_resolver: Arc<dyn RateResolver>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let live: Arc<dyn RateResolver> = resolver.clone();
        Self {
            transfers: TransferHandler::new(store.clone(), live, notifier.clone()),
            mocked_transfers: TransferHandler::new(store.clone(), mock_resolver, notifier),
            deposits: DepositHandler::new(store.clone()),
            queries: AccountQueryHandler::new(store),
            resolver,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub user_id: i64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct AccountsResponse {
    pub user_id: i64,
    pub accounts: Vec<AccountWithCurrency>,
}

#[derive(Debug, Serialize)]
pub struct SupportedCurrenciesResponse {
    pub provider: String,
    pub currencies: CurrencyNames,
}

#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    /// "primary" or "fallback"
    pub slot: String,
    pub provider: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Transfers
        .route("/transactions", post(transfer).get(list_transactions))
        .route("/transactions/mocked-exchange", post(mocked_transfer))
        // Accounts
        .route("/accounts", get(list_accounts))
        .route("/accounts/:account_id", get(get_account))
        .route("/accounts/:account_id/deposit", post(deposit))
        // Reference data
        .route("/currencies/:currency_id", get(get_currency))
        // Exchange rate providers
        .route("/exchange/currencies", get(supported_currencies))
        .route("/exchange/provider", get(current_provider))
        .route("/exchange/provider/switch", post(switch_provider))
}

fn transfer_command(user: RequestUser, request: TransferRequest) -> AppResult<TransferCommand> {
    let amount = Amount::new(request.amount).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

    let command = TransferCommand::new(
        request.source_account_id,
        request.destination_account_id,
        user.user_id,
        amount,
    );
    Ok(match request.description {
        Some(description) => command.with_description(description),
        None => command,
    })
}

// =========================================================================
// POST /transactions
// =========================================================================

/// Transfer using the live exchange-rate providers
async fn transfer(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> AppResult<(StatusCode, Json<Transaction>)> {
    let command = transfer_command(user, request)?;
    let transaction = state.transfers.execute(command, &context).await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

// =========================================================================
// POST /transactions/mocked-exchange
// =========================================================================

/// Transfer using the fixed mock rate table
async fn mocked_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> AppResult<(StatusCode, Json<Transaction>)> {
    let command = transfer_command(user, request)?;
    let transaction = state.mocked_transfers.execute(command, &context).await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

// =========================================================================
// GET /transactions
// =========================================================================

async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
) -> AppResult<Json<TransactionsResponse>> {
    let transactions = state.queries.user_transactions(user.user_id).await?;

    Ok(Json(TransactionsResponse {
        user_id: user.user_id,
        transactions,
    }))
}

// =========================================================================
// Accounts
// =========================================================================

async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
) -> AppResult<Json<AccountsResponse>> {
    let accounts = state.queries.user_accounts(user.user_id).await?;

    Ok(Json(AccountsResponse {
        user_id: user.user_id,
        accounts,
    }))
}

async fn get_account(
    State(state): State<AppState>,
    Extension(user): Extension<RequestUser>,
    Path(account_id): Path<i64>,
) -> AppResult<Json<AccountDetails>> {
    let details = state.queries.account_details(account_id, user.user_id).await?;
    Ok(Json(details))
}

async fn deposit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(account_id): Path<i64>,
    Json(request): Json<DepositRequest>,
) -> AppResult<Json<Account>> {
    let account = state
        .deposits
        .execute(DepositCommand::new(account_id, request.amount), &context)
        .await?;
    Ok(Json(account))
}

async fn get_currency(
    State(state): State<AppState>,
    Path(currency_id): Path<i64>,
) -> AppResult<Json<Currency>> {
    Ok(Json(state.queries.currency(currency_id).await?))
}

// =========================================================================
// Exchange providers
// =========================================================================

async fn supported_currencies(
    State(state): State<AppState>,
) -> AppResult<Json<SupportedCurrenciesResponse>> {
    let currencies = state.resolver.supported_currencies().await?;
    let provider = state.resolver.current_provider_name().await;

    Ok(Json(SupportedCurrenciesResponse {
        provider,
        currencies,
    }))
}

async fn current_provider(State(state): State<AppState>) -> Json<ProviderResponse> {
    let slot = state.resolver.current_provider().await;
    Json(provider_response(&state, slot).await)
}

async fn switch_provider(State(state): State<AppState>) -> Json<ProviderResponse> {
    let slot = state.resolver.switch_provider().await;
    Json(provider_response(&state, slot).await)
}

async fn provider_response(state: &AppState, slot: ProviderSlot) -> ProviderResponse {
    ProviderResponse {
        slot: slot.to_string(),
        provider: state.resolver.current_provider_name().await,
    }
}
