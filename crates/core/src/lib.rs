//! Core ledger logic for Bankcore.
//!
//! This crate contains the ledger engine with ZERO web or database dependencies.
//! Persistence is reached only through the capability traits in [`store`].
//!
//! # Modules
//!
//! - `ledger` - Deposit, withdrawal and transfer orchestration
//! - `store` - Account store, transaction log store and unit-of-work traits
//! - `memory` - In-process implementation of the store traits

pub mod ledger;
pub mod memory;
pub mod store;

pub use ledger::{Account, AccountRole, EntryKind, LedgerEngine, LedgerError, TransactionLogEntry};
pub use memory::{MemoryLedgerStore, MemoryUnitOfWork};
pub use store::{AccountStore, StoreError, TransactionLogStore, UnitOfWork, UnitOfWorkProvider};
