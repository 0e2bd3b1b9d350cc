//! Engine property tests
//!
//! Run against the in-memory store, so they exercise the full movement
//! protocol (locking, staging, balance re-check, commit/rollback) without a
//! database.

use std::time::Duration;

use uuid::Uuid;

use ledger_api::{
    AccountRecord, EntryDirection, LedgerError, LedgerStore, MemoryLedgerStore, NewAccount,
    TransactionEngine, TransactionKind, TransactionStatus,
};

async fn new_account(store: &MemoryLedgerStore) -> AccountRecord {
    store
        .create_account(NewAccount {
            user_id: Uuid::new_v4(),
            account_type: "checking".to_string(),
            currency: "USD".to_string(),
        })
        .await
        .unwrap()
}

async fn balance_of(store: &MemoryLedgerStore, account: Uuid) -> String {
    store.account_balance(account).await.unwrap().to_string()
}

#[tokio::test]
async fn test_seed_then_transfer_scenario() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;
    let b = new_account(&store).await.id;

    engine.deposit(a, "100.0000", "seed").await.unwrap();
    assert_eq!(balance_of(&store, a).await, "100.0000");

    let receipt = engine.transfer(a, b, "40.0000", "pay").await.unwrap();
    assert_eq!(receipt.status, TransactionStatus::Completed);

    assert_eq!(balance_of(&store, a).await, "60.0000");
    assert_eq!(balance_of(&store, b).await, "40.0000");

    // The transfer produced exactly one DEBIT on A and one CREDIT on B,
    // both for the full amount, under the same transaction.
    let a_entries = store.account_entries(a).await.unwrap();
    let debit = a_entries
        .iter()
        .find(|e| e.transaction_id == receipt.transaction_id)
        .expect("transfer entry on source");
    assert_eq!(debit.direction, EntryDirection::Debit);
    assert_eq!(debit.amount.to_string(), "40.0000");

    let b_entries = store.account_entries(b).await.unwrap();
    assert_eq!(b_entries.len(), 1);
    assert_eq!(b_entries[0].transaction_id, receipt.transaction_id);
    assert_eq!(b_entries[0].direction, EntryDirection::Credit);
    assert_eq!(b_entries[0].amount.to_string(), "40.0000");

    let transaction = store.find_transaction(receipt.transaction_id).unwrap();
    assert_eq!(transaction.kind, TransactionKind::Transfer);
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.source_account_id, Some(a));
    assert_eq!(transaction.destination_account_id, Some(b));
}

#[tokio::test]
async fn test_overdraw_rejected_without_trace() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;

    engine.deposit(a, "60.0000", "seed").await.unwrap();
    let transactions_before = store.transaction_count();
    let entries_before = store.entry_count();

    let err = engine.withdraw(a, "1000.0000", "overdraw").await.unwrap_err();
    match err {
        LedgerError::InsufficientFunds {
            account_id,
            balance,
        } => {
            assert_eq!(account_id, a);
            assert_eq!(balance.to_string(), "-940.0000");
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    // Rollback is exact: balance unchanged, zero new rows.
    assert_eq!(balance_of(&store, a).await, "60.0000");
    assert_eq!(store.transaction_count(), transactions_before);
    assert_eq!(store.entry_count(), entries_before);
}

#[tokio::test]
async fn test_transfer_from_missing_account() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let existing = new_account(&store).await.id;
    let missing = Uuid::new_v4();

    let err = engine
        .transfer(missing, existing, "10.0000", "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(id) if id == missing));

    let err = engine
        .transfer(existing, missing, "10.0000", "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(id) if id == missing));

    assert_eq!(store.transaction_count(), 0);
    assert_eq!(store.entry_count(), 0);
    assert_eq!(balance_of(&store, existing).await, "0.0000");
}

#[tokio::test]
async fn test_invalid_amounts_never_reach_the_store() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;
    let b = new_account(&store).await.id;

    for amount in ["0", "-5.00", "1.23456", "abc", ""] {
        let err = engine.transfer(a, b, amount, "bad").await.unwrap_err();
        assert!(
            matches!(err, LedgerError::InvalidAmount(_)),
            "amount {:?} must be rejected as InvalidAmount",
            amount
        );
    }

    assert_eq!(store.transaction_count(), 0);
    assert_eq!(store.entry_count(), 0);
}

#[tokio::test]
async fn test_withdraw_to_exactly_zero_is_allowed() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;

    engine.deposit(a, "50.0000", "seed").await.unwrap();
    engine.withdraw(a, "50.0000", "all of it").await.unwrap();

    assert_eq!(balance_of(&store, a).await, "0.0000");

    // One more cent is one too many.
    let err = engine.withdraw(a, "0.0001", "overdraw").await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
}

#[tokio::test]
async fn test_deposit_entry_shapes() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;

    let deposit = engine.deposit(a, "25.5000", "top up").await.unwrap();
    let withdrawal = engine.withdraw(a, "5.5000", "fees").await.unwrap();

    // A deposit books a single CREDIT, a withdrawal a single DEBIT; the
    // external counterparty is not modeled in the ledger.
    let entries = store.account_entries(a).await.unwrap();
    assert_eq!(entries.len(), 2);

    let credit = entries
        .iter()
        .find(|e| e.transaction_id == deposit.transaction_id)
        .unwrap();
    assert_eq!(credit.direction, EntryDirection::Credit);

    let debit = entries
        .iter()
        .find(|e| e.transaction_id == withdrawal.transaction_id)
        .unwrap();
    assert_eq!(debit.direction, EntryDirection::Debit);

    assert_eq!(balance_of(&store, a).await, "20.0000");

    let deposit_row = store.find_transaction(deposit.transaction_id).unwrap();
    assert_eq!(deposit_row.kind, TransactionKind::Deposit);
    assert_eq!(deposit_row.source_account_id, None);
    assert_eq!(deposit_row.destination_account_id, Some(a));

    let withdrawal_row = store.find_transaction(withdrawal.transaction_id).unwrap();
    assert_eq!(withdrawal_row.kind, TransactionKind::Withdrawal);
    assert_eq!(withdrawal_row.source_account_id, Some(a));
    assert_eq!(withdrawal_row.destination_account_id, None);
}

#[tokio::test]
async fn test_same_account_transfer_nets_to_zero() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;

    engine.deposit(a, "100.0000", "seed").await.unwrap();
    let receipt = engine.transfer(a, a, "30.0000", "to self").await.unwrap();
    assert_eq!(receipt.status, TransactionStatus::Completed);

    // Offsetting DEBIT and CREDIT on the one account; balance unchanged.
    assert_eq!(balance_of(&store, a).await, "100.0000");
    let entries = store.account_entries(a).await.unwrap();
    let own: Vec<_> = entries
        .iter()
        .filter(|e| e.transaction_id == receipt.transaction_id)
        .collect();
    assert_eq!(own.len(), 2);
    assert!(own.iter().any(|e| e.direction == EntryDirection::Debit));
    assert!(own.iter().any(|e| e.direction == EntryDirection::Credit));
}

#[tokio::test]
async fn test_opposing_transfers_do_not_deadlock() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;
    let b = new_account(&store).await.id;

    engine.deposit(a, "100.0000", "seed").await.unwrap();
    engine.deposit(b, "100.0000", "seed").await.unwrap();

    // Opposing directions, many rounds. A hang is a deadlock, so the whole
    // exercise runs under a timeout.
    let rounds = tokio::time::timeout(Duration::from_secs(10), async {
        for _ in 0..25 {
            let forward = {
                let engine = engine.clone();
                tokio::spawn(async move { engine.transfer(a, b, "5.0000", "ping").await })
            };
            let backward = {
                let engine = engine.clone();
                tokio::spawn(async move { engine.transfer(b, a, "5.0000", "pong").await })
            };
            forward.await.unwrap().unwrap();
            backward.await.unwrap().unwrap();
        }
    })
    .await;
    assert!(rounds.is_ok(), "opposing transfers deadlocked");

    assert_eq!(balance_of(&store, a).await, "100.0000");
    assert_eq!(balance_of(&store, b).await, "100.0000");
}

#[tokio::test]
async fn test_concurrent_overdraws_commit_exactly_while_covered() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;

    engine.deposit(a, "100.0000", "seed").await.unwrap();

    // Five racing withdrawals of 30 against a balance of 100: whatever the
    // interleaving, exactly three fit.
    let mut handles = Vec::new();
    for _ in 0..5 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.withdraw(a, "30.0000", "race").await
        }));
    }

    let mut committed = 0;
    let mut rejected = 0;
    for handle in handles {
        match tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("withdrawal hung")
            .unwrap()
        {
            Ok(receipt) => {
                assert_eq!(receipt.status, TransactionStatus::Completed);
                committed += 1;
            }
            Err(LedgerError::InsufficientFunds { account_id, .. }) => {
                assert_eq!(account_id, a);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(committed, 3);
    assert_eq!(rejected, 2);
    assert_eq!(balance_of(&store, a).await, "10.0000");

    // Seed credit plus three debits; the rejected attempts left nothing.
    assert_eq!(store.entry_count(), 4);
    assert_eq!(store.transaction_count(), 4);
}

#[tokio::test]
async fn test_balance_never_negative_after_commits() {
    let store = MemoryLedgerStore::new();
    let engine = TransactionEngine::new(store.clone());
    let a = new_account(&store).await.id;
    let b = new_account(&store).await.id;

    engine.deposit(a, "20.0000", "seed").await.unwrap();

    let operations: Vec<(&str, Uuid, Option<Uuid>)> = vec![
        ("15.0000", a, Some(b)),
        ("10.0000", b, Some(a)),
        ("30.0000", a, None),
        ("5.0000", a, None),
    ];
    for (amount, from, to) in operations {
        let result = match to {
            Some(to) => engine.transfer(from, to, amount, "step").await,
            None => engine.withdraw(from, amount, "step").await,
        };
        // Whether each step commits or is rejected, no committed balance may
        // ever be negative.
        if let Err(err) = result {
            assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        }
        assert!(!store.account_balance(a).await.unwrap().is_negative());
        assert!(!store.account_balance(b).await.unwrap().is_negative());
    }

    // 20 seeded, 15 to B, 10 back, 30 rejected, 5 withdrawn.
    assert_eq!(balance_of(&store, a).await, "10.0000");
    assert_eq!(balance_of(&store, b).await, "5.0000");
}
