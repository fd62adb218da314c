mod common;

use common::{test_context, FEE_STROOPS, STARTING_BALANCE};
use paydesk_core::domain::{Amount, TransactionKind, TransactionStatus};
use paydesk_core::ports::{TransactionRepository, WalletRepository};
use paydesk_core::services::balance::RECORD_ATTEMPTS;
use paydesk_core::services::PaymentError;

fn amount(raw: &str) -> Amount {
    raw.parse().unwrap()
}

#[tokio::test]
async fn test_internal_send_records_both_sides() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let bob = ctx.register("Bob Ltd", "bob@acme.io").await;

    let outcome = ctx
        .state
        .transfers
        .initiate_send(
            alice.business.id,
            &bob.wallet.public_key,
            amount("10.0000000"),
            Some("rent".to_string()),
        )
        .await
        .unwrap();

    let sent = &outcome.transaction;
    assert_eq!(sent.status, TransactionStatus::Completed);
    assert_eq!(sent.kind, TransactionKind::Send);
    assert!(sent.stellar_tx_hash.is_some());
    assert_eq!(sent.from_business_id, Some(alice.business.id));
    assert_eq!(sent.to_business_id, Some(bob.business.id));

    let mirrored = outcome.mirrored.clone().unwrap();
    assert_eq!(mirrored.kind, TransactionKind::Receive);
    assert_eq!(mirrored.status, TransactionStatus::Completed);
    assert_eq!(mirrored.amount, sent.amount);
    assert_eq!(mirrored.memo.as_deref(), Some("rent"));
    assert_eq!(mirrored.to_business_id, Some(bob.business.id));
    assert_eq!(mirrored.stellar_tx_hash, None);

    assert_eq!(ctx.store.list_transactions().await.unwrap().len(), 2);

    let alice_history = ctx
        .store
        .transactions_for_business(alice.business.id)
        .await
        .unwrap();
    assert_eq!(alice_history.len(), 1);
    assert_eq!(alice_history[0].kind, TransactionKind::Send);

    let bob_history = ctx
        .store
        .transactions_for_business(bob.business.id)
        .await
        .unwrap();
    assert_eq!(bob_history.len(), 1);
    assert_eq!(bob_history[0].kind, TransactionKind::Receive);
}

#[tokio::test]
async fn test_balances_come_from_ledger_after_settlement() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let bob = ctx.register("Bob Ltd", "bob@acme.io").await;

    let outcome = ctx
        .state
        .transfers
        .initiate_send(
            alice.business.id,
            &bob.wallet.public_key,
            amount("10"),
            None,
        )
        .await
        .unwrap();

    let expected_alice = Amount::from_stroops(STARTING_BALANCE - 100_000_000 - FEE_STROOPS);
    let expected_bob = Amount::from_stroops(STARTING_BALANCE + 100_000_000);
    assert_eq!(outcome.sender_balance, expected_alice);
    assert_eq!(ctx.ledger.balance_of(&alice.wallet.public_key), expected_alice);

    let alice_wallet = ctx
        .store
        .wallet_for_business(alice.business.id)
        .await
        .unwrap()
        .unwrap();
    let bob_wallet = ctx
        .store
        .wallet_for_business(bob.business.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice_wallet.balance, expected_alice);
    assert_eq!(bob_wallet.balance, expected_bob);
}

#[tokio::test]
async fn test_external_send_has_no_mirror() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let outsider = ctx.ledger.add_external_account();

    let outcome = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &outsider, amount("1.5"), None)
        .await
        .unwrap();

    assert!(outcome.mirrored.is_none());
    assert_eq!(outcome.transaction.to_business_id, None);
    assert_eq!(outcome.transaction.to_address, outsider);
    assert_eq!(ctx.ledger.submissions().len(), 1);
    assert_eq!(ctx.ledger.submissions()[0].destination, outsider);
}

#[tokio::test]
async fn test_failed_send_is_recorded_as_failed() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let bob = ctx.register("Bob Ltd", "bob@acme.io").await;
    ctx.ledger.fail_submissions(true);

    let result = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &bob.wallet.public_key, amount("5"), None)
        .await;
    assert!(matches!(result, Err(PaymentError::Settlement(_))));

    let rows = ctx.store.list_transactions().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, TransactionStatus::Failed);
    assert_eq!(rows[0].stellar_tx_hash, None);
    assert_eq!(rows[0].kind, TransactionKind::Send);
    assert_eq!(ctx.ledger.balance_of(&alice.wallet.public_key).stroops(), STARTING_BALANCE);
}

#[tokio::test]
async fn test_unknown_destination_is_rejected_before_any_record() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let nowhere = format!("G{}", "B".repeat(55));

    let result = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &nowhere, amount("1"), None)
        .await;

    assert!(matches!(result, Err(PaymentError::InvalidAddress(_))));
    assert!(ctx.store.list_transactions().await.unwrap().is_empty());
    assert!(ctx.ledger.submissions().is_empty());
}

#[tokio::test]
async fn test_send_to_own_wallet_is_rejected() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;

    let result = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &alice.wallet.public_key, amount("1"), None)
        .await;

    assert!(matches!(result, Err(PaymentError::Validation(_))));
    assert!(ctx.store.list_transactions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_send_without_wallet_fails() {
    let ctx = test_context();
    let outsider = ctx.ledger.add_external_account();

    let result = ctx
        .state
        .transfers
        .initiate_send(404, &outsider, amount("1"), None)
        .await;

    assert!(matches!(result, Err(PaymentError::WalletNotFound(404))));
}

#[tokio::test]
async fn test_concurrent_sends_from_one_wallet_all_settle() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let bob = ctx.register("Bob Ltd", "bob@acme.io").await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let transfers = ctx.state.transfers.clone();
        let destination = bob.wallet.public_key.clone();
        let sender = alice.business.id;
        handles.push(tokio::spawn(async move {
            transfers
                .initiate_send(sender, &destination, "1".parse().unwrap(), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let rows = ctx.store.list_transactions().await.unwrap();
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|tx| tx.status == TransactionStatus::Completed));

    let hashes: std::collections::HashSet<_> = rows
        .iter()
        .filter_map(|tx| tx.stellar_tx_hash.clone())
        .collect();
    assert_eq!(hashes.len(), 5);
}

#[tokio::test]
async fn test_balance_cache_failures_do_not_undo_a_settled_send() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let bob = ctx.register("Bob Ltd", "bob@acme.io").await;

    // Both the sender and the recipient refresh fail.
    ctx.faults.fail_balance_updates(2);
    let outcome = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &bob.wallet.public_key, amount("3"), None)
        .await
        .unwrap();

    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert!(outcome.mirrored.is_some());
    assert_eq!(
        outcome.sender_balance,
        ctx.ledger.balance_of(&alice.wallet.public_key)
    );
    assert_eq!(ctx.store.list_transactions().await.unwrap().len(), 2);

    // The cached balance is stale until the next refresh.
    let cached = ctx
        .store
        .wallet_for_business(alice.business.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.balance, Amount::from_stroops(STARTING_BALANCE));
}

#[tokio::test]
async fn test_completing_the_record_is_retried() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let outsider = ctx.ledger.add_external_account();

    ctx.faults.fail_finishes(2);
    let outcome = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &outsider, amount("1"), None)
        .await
        .unwrap();

    let stored = ctx
        .store
        .transaction(outcome.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert_eq!(stored.stellar_tx_hash, outcome.transaction.stellar_tx_hash);
}

#[tokio::test]
async fn test_settled_payment_is_reported_when_record_stays_pending() {
    let ctx = test_context();
    let alice = ctx.register("Alice Co", "alice@acme.io").await;
    let outsider = ctx.ledger.add_external_account();

    ctx.faults.fail_finishes(RECORD_ATTEMPTS);
    let outcome = ctx
        .state
        .transfers
        .initiate_send(alice.business.id, &outsider, amount("1"), None)
        .await
        .unwrap();

    let submissions = ctx.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
    assert_eq!(
        outcome.transaction.stellar_tx_hash.as_deref(),
        Some(submissions[0].hash.as_str())
    );

    let stored = ctx
        .store
        .transaction(outcome.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}
