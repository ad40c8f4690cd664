//! Command Handlers module
//!
//! Handlers that orchestrate business operations.
//! Each handler coordinates the ledger store, the rate resolver and
//! notification delivery.

mod commands;
mod deposit_handler;
mod query_handler;
mod transfer_handler;


pub use commands::*;
pub use deposit_handler::DepositHandler;
pub use query_handler::AccountQueryHandler;
pub use transfer_handler::TransferHandler;
