//! Repository abstractions for data access.
//!
//! Repositories implement the ledger store capabilities over `SeaORM`,
//! hiding the database details from the ledger engine.

pub mod ledger;

pub use ledger::{PgLedgerStore, PgUnitOfWork, map_db_err};
