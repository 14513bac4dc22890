//! Account balances and the transaction log.
//!
//! This module implements the ledger engine and its domain types:
//! - Account snapshots and account number rules
//! - Transaction log entries and their kinds
//! - Error types for ledger operations
//! - `LedgerEngine` for deposits, withdrawals and transfers

pub mod account;
pub mod entry;
pub mod error;
pub mod service;

#[cfg(test)]
mod service_props;

pub use account::{Account, MAX_ACCOUNT_NUMBER_LEN, normalize_account_number};
pub use entry::{EntryKind, TransactionLogEntry};
pub use error::{AccountRole, LedgerError};
pub use service::{
    DEPOSIT_DESCRIPTION, DESCRIPTION_COLUMN_LEN, LedgerEngine, MAX_DESCRIPTION_LEN,
    WITHDRAW_DESCRIPTION,
};
