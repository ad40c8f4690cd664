//! Error handling module
//!
//! Service-level error type and its HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    /// Storage fault; the store guarantees nothing partial was written
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// A rate provider could not answer a direct query
    #[error("Upstream provider failure: {0}")]
    Upstream(#[from] crate::exchange::ProviderError),
}

impl AppError {
    /// Check if the caller is at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidRequest(_) | Self::MissingHeader(_) => true,
            Self::Domain(e) => e.is_client_error(),
            Self::Persistence(_) | Self::Upstream(_) => false,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::UNAUTHORIZED, "missing_header", Some(header.clone()))
            }

            AppError::Domain(domain_err) => {
                let status = if domain_err.is_not_found() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                };
                let (error_code, details) = match domain_err {
                    DomainError::AccountNotFound { which, id } => {
                        ("account_not_found", Some(format!("{which} account {id}")))
                    }
                    DomainError::CurrencyNotFound(id) => ("currency_not_found", Some(id.to_string())),
                    DomainError::InsufficientBalance { .. } => {
                        ("insufficient_balance", Some(domain_err.to_string()))
                    }
                    DomainError::InvalidAmount(msg) => ("invalid_amount", Some(msg.clone())),
                    DomainError::RateUnavailable { from, to } => {
                        ("rate_unavailable", Some(format!("{from}->{to}")))
                    }
                    DomainError::SameAccountTransfer => ("same_account_transfer", None),
                };
                (status, error_code, details)
            }

            AppError::Persistence(e) => {
                tracing::error!("Persistence failure: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure", None)
            }
            AppError::Upstream(e) => {
                tracing::warn!(error = %e, "Rate provider failure");
                (StatusCode::BAD_GATEWAY, "upstream_unavailable", Some(e.to_string()))
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
