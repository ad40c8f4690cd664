//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};

pub use routes::{create_router, AppState};

/// Full application router: `/health` plus the identity-protected `/api/v1`
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: identity, then logging, then the handler
    let protected_routes = create_router()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_user_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", protected_routes)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
