//! Demo data seeder for Bankcore development and testing.
//!
//! Opens a set of demo accounts through the ledger engine, funds them, and
//! moves money between them so a fresh database has some history to show.
//! Re-running it is safe: accounts that already exist are reused.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use bankcore_core::{Account, LedgerEngine, LedgerError};
use bankcore_db::PgLedgerStore;
use bankcore_shared::types::UserId;
use bankcore_shared::{AppConfig, LogConfig};
use rust_decimal_macros::dec;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type Engine = LedgerEngine<PgLedgerStore, PgLedgerStore>;

/// Demo accounts: (owner, account number).
const DEMO_ACCOUNTS: [(i64, &str); 3] = [(1, "0001"), (1, "0002"), (2, "0003")];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log);

    info!("Connecting to database...");
    let db = bankcore_db::connect_with(&config.database)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgLedgerStore::from_config(db.clone(), &config.ledger));
    let engine = LedgerEngine::from_config(Arc::clone(&store), store, &config.ledger);

    info!("Seeding demo accounts...");
    let mut accounts = Vec::with_capacity(DEMO_ACCOUNTS.len());
    for (user_id, number) in DEMO_ACCOUNTS {
        accounts.push(ensure_account(&engine, UserId::new(user_id), number).await?);
    }

    info!("Seeding demo movements...");
    engine.deposit(accounts[0].id, dec!(1000.00)).await?;
    engine.deposit(accounts[2].id, dec!(250.00)).await?;
    engine.withdraw(accounts[0].id, dec!(75.50)).await?;
    engine
        .transfer("0001", "0002", dec!(300.00), "Seed: monthly allowance")
        .await?;
    engine
        .transfer("0003", "0001", dec!(42.25), "Seed: dinner split")
        .await?;

    for account in &accounts {
        let current = engine.get_account(account.id).await?;
        println!("{} balance {}", current.account_number, current.balance);
        for entry in engine.list_transactions(account.id).await? {
            println!(
                "  #{} {:<12} {:>10} {}  {}",
                entry.id,
                entry.kind.as_str(),
                entry.amount.to_string(),
                entry.created_at,
                entry.description
            );
        }
    }

    db.close().await.context("Failed to close database connection")?;
    info!("Seeding complete!");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Opens the account, or loads it if a previous run already did.
async fn ensure_account(engine: &Engine, user_id: UserId, number: &str) -> anyhow::Result<Account> {
    match engine.create_account(user_id, number).await {
        Ok(account) => Ok(account),
        Err(LedgerError::Conflict(_)) => {
            warn!(account_number = number, "Account already exists, reusing");
            Ok(engine.get_account_by_number(number).await?)
        }
        Err(err) => Err(err.into()),
    }
}
