//! Property-based tests for `LedgerEngine`.
//!
//! Feature: ledger-engine
//! - Property 1: Conservation of value
//! - Property 2: Non-negative balances
//! - Property 3: Log replay matches balance

use std::sync::Arc;

use bankcore_shared::types::UserId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::entry::TransactionLogEntry;
use super::error::LedgerError;
use super::service::LedgerEngine;
use crate::memory::MemoryLedgerStore;

const ACCOUNTS: [&str; 3] = ["0001", "0002", "0003"];

#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, Decimal),
    Withdraw(usize, Decimal),
    Transfer(usize, usize, Decimal),
}

/// Strategy to generate positive decimal amounts (0.01 to 500.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn account_index() -> impl Strategy<Value = usize> {
    0..ACCOUNTS.len()
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (account_index(), positive_amount()).prop_map(|(i, a)| Op::Deposit(i, a)),
        (account_index(), positive_amount()).prop_map(|(i, a)| Op::Withdraw(i, a)),
        (account_index(), account_index(), positive_amount())
            .prop_map(|(from, to, a)| Op::Transfer(from, to, a)),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Applies `ops` and returns final balances plus the net external injection.
fn run(ops: &[Op]) -> (Vec<Decimal>, Decimal, Vec<Decimal>) {
    runtime().block_on(async {
        let store = Arc::new(MemoryLedgerStore::new());
        let engine = LedgerEngine::new(Arc::clone(&store), Arc::clone(&store));

        let mut ids = Vec::new();
        for number in ACCOUNTS {
            ids.push(engine.create_account(UserId::new(1), number).await.unwrap().id);
        }

        let mut net = Decimal::ZERO;
        for op in ops {
            match *op {
                Op::Deposit(i, amount) => {
                    engine.deposit(ids[i], amount).await.unwrap();
                    net += amount;
                }
                Op::Withdraw(i, amount) => match engine.withdraw(ids[i], amount).await {
                    Ok(_) => net -= amount,
                    Err(LedgerError::InsufficientFunds { .. }) => {}
                    Err(other) => panic!("unexpected withdraw error: {other}"),
                },
                Op::Transfer(from, to, amount) => {
                    match engine
                        .transfer(ACCOUNTS[from], ACCOUNTS[to], amount, "prop")
                        .await
                    {
                        Ok(()) => assert_ne!(from, to),
                        Err(LedgerError::SameAccount(_)) => assert_eq!(from, to),
                        Err(LedgerError::InsufficientFunds { .. }) => {}
                        Err(other) => panic!("unexpected transfer error: {other}"),
                    }
                }
            }
        }

        let mut balances = Vec::new();
        let mut replayed = Vec::new();
        for id in ids {
            balances.push(engine.get_account(id).await.unwrap().balance);
            let history = engine.list_transactions(id).await.unwrap();
            replayed.push(
                history
                    .iter()
                    .map(TransactionLogEntry::signed_amount)
                    .sum::<Decimal>(),
            );
        }
        (balances, net, replayed)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property 1: the sum of balances changes only by deposits minus withdrawals.
    #[test]
    fn prop_value_is_conserved(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (balances, net, _) = run(&ops);
        let total: Decimal = balances.iter().copied().sum();
        prop_assert_eq!(total, net);
    }

    /// Property 2: no committed balance is ever negative.
    #[test]
    fn prop_balances_never_negative(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (balances, _, _) = run(&ops);
        for balance in balances {
            prop_assert!(balance >= Decimal::ZERO, "negative balance {}", balance);
        }
    }

    /// Property 3: replaying an account's log reproduces its balance.
    #[test]
    fn prop_log_replay_matches_balance(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (balances, _, replayed) = run(&ops);
        prop_assert_eq!(balances, replayed);
    }

    /// Transfers alone never change the total.
    #[test]
    fn prop_transfers_preserve_total(
        seed in positive_amount(),
        transfers in prop::collection::vec(
            (account_index(), account_index(), positive_amount()),
            1..30,
        ),
    ) {
        let mut ops = vec![Op::Deposit(0, seed)];
        ops.extend(transfers.into_iter().map(|(from, to, a)| Op::Transfer(from, to, a)));
        let (balances, net, _) = run(&ops);
        prop_assert_eq!(net, seed);
        prop_assert_eq!(balances.iter().copied().sum::<Decimal>(), seed);
    }
}
