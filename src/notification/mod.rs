//! Transfer notifications
//!
//! Delivery is best-effort: the transfer is already committed when a sink
//! is called, so a failing sink is logged by the caller and otherwise
//! ignored. Sinks must not assume they are retried.

use async_trait::async_trait;

use crate::domain::Transaction;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Who a notification is for and which side of the transfer they were on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNotice<'a> {
    pub recipient_email: &'a str,
    pub recipient_name: &'a str,
    pub transaction: &'a Transaction,
    pub source_code: &'a str,
    pub destination_code: &'a str,
    pub is_sender: bool,
}

/// Best-effort, non-blocking delivery of transfer notices.
///
/// Returning an error never affects the transfer; implementations used as
/// test doubles can record the attempt and fail freely.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_transfer(&self, notice: TransferNotice<'_>) -> Result<(), NotificationError>;
}

/// Sink that records each notice as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify_transfer(&self, notice: TransferNotice<'_>) -> Result<(), NotificationError> {
        let tx = notice.transaction;
        let (amount, code) = if notice.is_sender {
            (tx.source_amount, notice.source_code)
        } else {
            (tx.destination_amount, notice.destination_code)
        };

        tracing::info!(
            transaction_id = tx.id,
            recipient = notice.recipient_email,
            recipient_name = notice.recipient_name,
            is_sender = notice.is_sender,
            amount = %amount,
            currency = code,
            exchange_rate = %tx.exchange_rate,
            "Transfer notification"
        );
        Ok(())
    }
}
