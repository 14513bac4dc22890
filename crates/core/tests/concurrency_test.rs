//! Concurrency tests for the ledger engine over the in-memory store.
//!
//! These run on a multi-threaded runtime and use a barrier so the racing
//! operations start together.

use std::sync::Arc;
use std::time::Duration;

use bankcore_core::{AccountStore, LedgerEngine, LedgerError, MemoryLedgerStore, UnitOfWorkProvider};
use bankcore_shared::types::UserId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

type Engine = LedgerEngine<MemoryLedgerStore, MemoryLedgerStore>;

fn engine_with(store: MemoryLedgerStore) -> (Engine, Arc<MemoryLedgerStore>) {
    let store = Arc::new(store);
    (LedgerEngine::new(Arc::clone(&store), Arc::clone(&store)), store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_of_full_balance_allow_exactly_one() {
    let (engine, _) = engine_with(MemoryLedgerStore::new());
    let account = engine.create_account(UserId::new(1), "0001").await.unwrap();
    engine.deposit(account.id, dec!(100.00)).await.unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                engine.withdraw(account.id, dec!(100.00)).await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(insufficient, 1);

    assert_eq!(engine.get_account(account.id).await.unwrap().balance, dec!(0.00));
    assert_eq!(engine.list_transactions(account.id).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_between_same_pair_both_complete() {
    let (engine, _) = engine_with(MemoryLedgerStore::new());
    let a = engine.create_account(UserId::new(1), "A-1").await.unwrap();
    let b = engine.create_account(UserId::new(2), "B-1").await.unwrap();
    engine.deposit(a.id, dec!(500.00)).await.unwrap();
    engine.deposit(b.id, dec!(500.00)).await.unwrap();

    let rounds: usize = 50;
    let barrier = Arc::new(Barrier::new(2));
    let spawn = |from: &'static str, to: &'static str| {
        let engine = engine.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            for _ in 0..rounds {
                engine.transfer(from, to, dec!(1.00), "ping").await?;
            }
            Ok::<_, LedgerError>(())
        })
    };
    let forward = spawn("A-1", "B-1");
    let backward = spawn("B-1", "A-1");

    let (forward, backward) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(forward, backward)
    })
    .await
    .expect("transfers deadlocked");
    forward.unwrap().unwrap();
    backward.unwrap().unwrap();

    assert_eq!(engine.get_account(a.id).await.unwrap().balance, dec!(500.00));
    assert_eq!(engine.get_account(b.id).await.unwrap().balance, dec!(500.00));
    assert_eq!(engine.list_transactions(a.id).await.unwrap().len(), 1 + 2 * rounds);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_deposits_are_all_applied() {
    let (engine, _) = engine_with(MemoryLedgerStore::new());
    let account = engine.create_account(UserId::new(1), "0001").await.unwrap();

    let tasks = 32;
    let barrier = Arc::new(Barrier::new(tasks));
    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                engine.deposit(account.id, dec!(0.10)).await
            })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let expected = Decimal::from(tasks) * dec!(0.10);
    assert_eq!(engine.get_account(account.id).await.unwrap().balance, expected);
    assert_eq!(engine.list_transactions(account.id).await.unwrap().len(), tasks);
}

#[tokio::test]
async fn held_row_lock_surfaces_retryable_error() {
    let (engine, store) =
        engine_with(MemoryLedgerStore::new().with_lock_timeout(Duration::from_millis(25)));
    let account = engine.create_account(UserId::new(1), "0001").await.unwrap();
    engine.deposit(account.id, dec!(10.00)).await.unwrap();

    let mut holder = store.begin().await.unwrap();
    store.lock_by_id(&mut holder, account.id).await.unwrap();

    let err = engine.withdraw(account.id, dec!(5.00)).await.unwrap_err();
    assert!(matches!(err, LedgerError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    drop(holder);
    let account = engine.withdraw(account.id, dec!(5.00)).await.unwrap();
    assert_eq!(account.balance, dec!(5.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_operation_releases_its_locks() {
    let (engine, store) =
        engine_with(MemoryLedgerStore::new().with_lock_timeout(Duration::from_millis(200)));
    let account = engine.create_account(UserId::new(1), "0001").await.unwrap();

    let mut holder = store.begin().await.unwrap();
    store.lock_by_id(&mut holder, account.id).await.unwrap();

    // The deposit blocks on the row lock and is abandoned mid-flight.
    let pending = tokio::time::timeout(
        Duration::from_millis(20),
        engine.deposit(account.id, dec!(1.00)),
    )
    .await;
    assert!(pending.is_err());
    drop(holder);

    engine.deposit(account.id, dec!(1.00)).await.unwrap();
    assert_eq!(engine.get_account(account.id).await.unwrap().balance, dec!(1.00));
    assert_eq!(engine.list_transactions(account.id).await.unwrap().len(), 1);
}
