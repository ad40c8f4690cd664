//! API Middleware
//!
//! Request identity and request logging middleware.

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;

/// Header set by the upstream authenticator
pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// Request user from X-Request-User-Id header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestUser {
    pub user_id: i64,
}

// =========================================================================
// Request identity middleware
// =========================================================================

/// Require X-Request-User-Id and attach the caller's `OperationContext`.
///
/// Authentication happens upstream; this only trusts and parses the header.
pub async fn request_user_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = request_user(&headers)?;
    let context = request_context(user, &headers);

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

fn request_user(headers: &HeaderMap) -> Result<RequestUser, AppError> {
    let raw = headers
        .get(REQUEST_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::MissingHeader(REQUEST_USER_HEADER.to_string()))?;

    let user_id = raw.trim().parse().map_err(|_| {
        AppError::InvalidRequest(format!("{REQUEST_USER_HEADER} must be an integer user id"))
    })?;

    Ok(RequestUser { user_id })
}

/// Caller's context; a missing or malformed correlation id gets a fresh one
fn request_context(user: RequestUser, headers: &HeaderMap) -> OperationContext {
    let mut context = OperationContext::new().with_request_user(user.user_id);

    if let Some(id) = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        context = context.with_correlation_id(id);
    }
    context.ensure_correlation_id();

    if let Some(ip) = forwarded_ip(headers) {
        context = context.with_client_ip(ip);
    }

    context
}

/// First address in X-Forwarded-For, if it parses
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|list| list.split(',').next())
        .and_then(|first| first.trim().parse().ok())
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
