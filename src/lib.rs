//! fx_transfer Library
//!
//! Multi-currency account transfers with exchange-rate failover.
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod handlers;
pub mod notification;
pub mod store;

pub use config::Config;
pub use domain::{Amount, AmountError, Balance, DomainError, OperationContext};
pub use error::{AppError, AppResult};
