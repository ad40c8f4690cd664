//! Domain module
//!
//! Core domain types and business rules.

pub mod amount;
pub mod context;
pub mod error;
pub mod models;

pub use amount::{Amount, AmountError, Balance, MAX_SCALE};
pub use context::OperationContext;
pub use error::{AccountRole, DomainError};
pub use models::{
    Account, AccountWithCurrency, Currency, NewTransaction, Transaction, UserContact,
};
