//! Transfer engine integration tests against the in-memory ledger

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use fx_transfer::domain::{AccountRole, Amount, DomainError, OperationContext};
use fx_transfer::exchange::MockRateResolver;
use fx_transfer::handlers::{DepositCommand, DepositHandler, TransferCommand, TransferHandler};
use fx_transfer::AppError;

mod common;
use common::*;

fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

// =========================================================================
// Balance arithmetic
// =========================================================================

#[tokio::test]
async fn test_cross_currency_transfer_moves_exact_amounts() {
    let store = seeded_store().await;
    let handler = mock_handler(&store);

    let tx = handler
        .execute(
            TransferCommand::new(ANA_PEN, BRUNO_USD, ANA, amount(dec!(250))),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    // PEN -> USD = 0.27
    assert_eq!(tx.exchange_rate, dec!(0.27));
    assert_eq!(tx.destination_amount, dec!(67.5));
    assert_eq!(balance_of(&store, ANA_PEN).await, dec!(750));
    assert_eq!(balance_of(&store, BRUNO_USD).await, dec!(67.5));

    let ledger = store.transactions().await;
    assert_eq!(ledger, vec![tx]);
}

#[tokio::test]
async fn test_inverse_rate_is_rounded_half_even() {
    let store = seeded_store().await;
    // Only EUR -> USD is known, so USD -> EUR is 1 / 1.08
    let handler = TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::empty().with_rate("EUR", "USD", dec!(1.08))),
        Arc::new(RecordingNotifier::default()),
    );

    let tx = handler
        .execute(
            TransferCommand::new(ANA_USD, BRUNO_EUR, ANA, amount(dec!(10))),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    let expected = (dec!(10) * (Decimal::ONE / dec!(1.08)))
        .round_dp_with_strategy(8, rust_decimal::RoundingStrategy::MidpointNearestEven);
    assert_eq!(tx.destination_amount, expected);
    assert_eq!(balance_of(&store, ANA_USD).await, dec!(90));
    assert_eq!(balance_of(&store, BRUNO_EUR).await, expected);
}

#[tokio::test]
async fn test_same_currency_transfer_uses_rate_one() {
    let store = seeded_store().await;
    // Empty table: any resolver call would fail
    let handler = TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::empty()),
        Arc::new(RecordingNotifier::default()),
    );

    let tx = handler
        .execute(
            TransferCommand::new(ANA_USD, BRUNO_USD, ANA, amount(dec!(40.25)))
                .with_description("dinner".to_string()),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(tx.exchange_rate, Decimal::ONE);
    assert_eq!(tx.destination_amount, tx.source_amount);
    assert_eq!(tx.description.as_deref(), Some("dinner"));
    assert_eq!(balance_of(&store, ANA_USD).await, dec!(59.75));
    assert_eq!(balance_of(&store, BRUNO_USD).await, dec!(40.25));
}

#[tokio::test]
async fn test_exact_balance_can_be_transferred() {
    let store = seeded_store().await;
    let handler = mock_handler(&store);

    assert_ok!(
        handler
            .execute(
                TransferCommand::new(ANA_USD, BRUNO_USD, ANA, amount(dec!(100))),
                &OperationContext::new(),
            )
            .await
    );
    assert_eq!(balance_of(&store, ANA_USD).await, Decimal::ZERO);
}

// =========================================================================
// Validation failures leave everything untouched
// =========================================================================

#[tokio::test]
async fn test_insufficient_balance_mutates_nothing() {
    let store = seeded_store().await;
    let handler = mock_handler(&store);

    let err = handler
        .execute(
            TransferCommand::new(ANA_USD, BRUNO_USD, ANA, amount(dec!(2000))),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();

    match err {
        AppError::Domain(DomainError::InsufficientBalance { required, available }) => {
            assert_eq!(required, dec!(2000));
            assert_eq!(available, dec!(100));
        }
        other => panic!("Expected InsufficientBalance, got: {:?}", other),
    }
    assert_eq!(balance_of(&store, ANA_USD).await, dec!(100));
    assert_eq!(balance_of(&store, BRUNO_USD).await, Decimal::ZERO);
    assert!(store.transactions().await.is_empty());
}

#[tokio::test]
async fn test_missing_destination_leaves_source_unchanged() {
    let store = seeded_store().await;
    let handler = mock_handler(&store);

    let err = handler
        .execute(
            TransferCommand::new(ANA_PEN, 9999, ANA, amount(dec!(10))),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Domain(DomainError::AccountNotFound {
            which: AccountRole::Destination,
            id: 9999
        })
    ));
    assert_eq!(balance_of(&store, ANA_PEN).await, dec!(1000));
    assert!(store.transactions().await.is_empty());
}

#[tokio::test]
async fn test_unknown_pair_is_rate_unavailable() {
    let store = seeded_store().await;
    let handler = TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::empty()),
        Arc::new(RecordingNotifier::default()),
    );

    let err = handler
        .execute(
            TransferCommand::new(ANA_PEN, BRUNO_USD, ANA, amount(dec!(10))),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();

    match err {
        AppError::Domain(DomainError::RateUnavailable { from, to }) => {
            assert_eq!(from, "PEN");
            assert_eq!(to, "USD");
        }
        other => panic!("Expected RateUnavailable, got: {:?}", other),
    }
    assert_eq!(balance_of(&store, ANA_PEN).await, dec!(1000));
    assert!(store.transactions().await.is_empty());
}

// =========================================================================
// Atomicity
// =========================================================================

#[tokio::test]
async fn test_failed_commit_writes_nothing() {
    let store = seeded_store().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let handler = TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::new()),
        notifier.clone(),
    );
    store.fail_commits(true);

    let err = handler
        .execute(
            TransferCommand::new(ANA_PEN, BRUNO_USD, ANA, amount(dec!(100))),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Persistence(_)));
    assert!(!err.is_client_error());
    assert_eq!(balance_of(&store, ANA_PEN).await, dec!(1000));
    assert_eq!(balance_of(&store, BRUNO_USD).await, Decimal::ZERO);
    assert!(store.transactions().await.is_empty());
    assert!(notifier.seen().is_empty());

    // The store recovers once commits are accepted again
    store.fail_commits(false);
    assert_ok!(
        handler
            .execute(
                TransferCommand::new(ANA_PEN, BRUNO_USD, ANA, amount(dec!(100))),
                &OperationContext::new(),
            )
            .await
    );
}

// =========================================================================
// Notifications
// =========================================================================

#[tokio::test]
async fn test_both_parties_are_notified() {
    let store = seeded_store().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let handler = TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::new()),
        notifier.clone(),
    );

    let tx = handler
        .execute(
            TransferCommand::new(ANA_PEN, BRUNO_USD, ANA, amount(dec!(10))),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        notifier.seen(),
        vec![
            ("ana@example.com".to_string(), true, tx.id),
            ("bruno@example.com".to_string(), false, tx.id),
        ]
    );
}

#[tokio::test]
async fn test_notification_failure_does_not_affect_transfer() {
    let store = seeded_store().await;
    let notifier = Arc::new(RecordingNotifier::failing());
    let handler = TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::new()),
        notifier.clone(),
    );

    let tx = handler
        .execute(
            TransferCommand::new(ANA_PEN, BRUNO_USD, ANA, amount(dec!(100))),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    // Both deliveries were attempted and both failed
    assert_eq!(notifier.seen().len(), 2);
    assert_eq!(tx.destination_amount, dec!(27));
    assert_eq!(balance_of(&store, ANA_PEN).await, dec!(900));
    assert_eq!(balance_of(&store, BRUNO_USD).await, dec!(27));
    assert_eq!(store.transactions().await, vec![tx]);
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_cannot_overdraw() {
    let store = seeded_store().await;
    // Latency keeps both transfers in the unlocked phase at the same time,
    // so both pass the early balance check
    let handler = Arc::new(TransferHandler::new(
        Arc::new(store.clone()),
        Arc::new(MockRateResolver::new().with_latency(Duration::from_millis(50))),
        Arc::new(RecordingNotifier::default()),
    ));

    let spawn_transfer = |handler: Arc<TransferHandler>| {
        tokio::spawn(async move {
            handler
                .execute(
                    TransferCommand::new(ANA_USD, BRUNO_EUR, ANA, amount(dec!(60))),
                    &OperationContext::new(),
                )
                .await
        })
    };

    let first = spawn_transfer(handler.clone());
    let second = spawn_transfer(handler.clone());
    let results = [first.await.unwrap(), second.await.unwrap()];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(AppError::Domain(DomainError::InsufficientBalance { .. }))
            )
        })
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(insufficient, 1);
    assert_eq!(balance_of(&store, ANA_USD).await, dec!(40));
    // USD -> EUR = 0.92
    assert_eq!(balance_of(&store, BRUNO_EUR).await, dec!(55.2));
    assert_eq!(store.transactions().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_do_not_deadlock() {
    let store = seeded_store().await;
    store.insert_account(account(300, BRUNO, USD, dec!(500))).await;
    let handler = Arc::new(mock_handler(&store));

    let mut tasks = Vec::new();
    for i in 0..20 {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            let command = if i % 2 == 0 {
                TransferCommand::new(ANA_USD, 300, ANA, amount(dec!(1)))
            } else {
                TransferCommand::new(300, ANA_USD, BRUNO, amount(dec!(1)))
            };
            handler.execute(command, &OperationContext::new()).await
        }));
    }

    let all = tokio::time::timeout(Duration::from_secs(10), async {
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }
    })
    .await;

    assert_ok!(all);
    assert_eq!(balance_of(&store, ANA_USD).await, dec!(100));
    assert_eq!(balance_of(&store, 300).await, dec!(500));
    assert_eq!(store.transactions().await.len(), 20);
}

// =========================================================================
// Deposits
// =========================================================================

#[tokio::test]
async fn test_invalid_deposit_makes_no_store_calls() {
    let store = Arc::new(CountingStore::new(seeded_store().await));
    let handler = DepositHandler::new(store.clone());

    for value in [Decimal::ZERO, dec!(-10)] {
        let err = handler
            .execute(DepositCommand::new(ANA_PEN, value), &OperationContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::InvalidAmount(_))));
    }

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_deposit_then_transfer() {
    let store = seeded_store().await;
    let deposits = DepositHandler::new(Arc::new(store.clone()));
    let transfers = mock_handler(&store);

    let account = deposits
        .execute(DepositCommand::new(BRUNO_USD, dec!(10)), &OperationContext::new())
        .await
        .unwrap();
    assert_eq!(account.balance.value(), dec!(10));
    assert!(store.transactions().await.is_empty());

    assert_err!(
        transfers
            .execute(
                TransferCommand::new(BRUNO_USD, ANA_USD, BRUNO, amount(dec!(10.01))),
                &OperationContext::new(),
            )
            .await
    );
    assert_ok!(
        transfers
            .execute(
                TransferCommand::new(BRUNO_USD, ANA_USD, BRUNO, amount(dec!(10))),
                &OperationContext::new(),
            )
            .await
    );
    assert_eq!(balance_of(&store, ANA_USD).await, dec!(110));
}
