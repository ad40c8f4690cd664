//! fx_transfer - multi-currency transfer backend API
//!
//! Moves money between accounts, converting currencies through a pair of
//! failover exchange-rate providers, and records every transfer in a ledger.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fx_transfer::api::{self, AppState};
use fx_transfer::exchange::{
    CurrencyConverterProvider, ExchangeRateApiProvider, ExchangeRateResolver, MockRateResolver,
};
use fx_transfer::notification::LogNotifier;
use fx_transfer::store::PgLedgerStore;
use fx_transfer::{db, Config};

/// Initialize tracing/logging
fn init_tracing(production: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fx_transfer=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if production {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    init_tracing(config.is_production());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting fx_transfer server");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Verify database schema
    db::verify_connection(&pool).await?;
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let exchange = &config.exchange;
    let primary = ExchangeRateApiProvider::new(&exchange.primary_url, &exchange.primary_api_key, exchange.timeout)?;
    let fallback =
        CurrencyConverterProvider::new(&exchange.fallback_url, &exchange.fallback_api_key, exchange.timeout)?;
    let resolver = ExchangeRateResolver::new(Arc::new(primary), Arc::new(fallback)).with_timeout(exchange.timeout);
    let mock_resolver = MockRateResolver::new().with_latency(exchange.mock_latency);

    let state = AppState::new(
        Arc::new(PgLedgerStore::new(pool.clone())),
        Arc::new(resolver),
        Arc::new(mock_resolver),
        Arc::new(LogNotifier),
    );

    let app = api::build_router(state).layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
