//! Store capabilities the ledger engine depends on.
//!
//! The engine never talks to a database directly. It is handed an
//! [`AccountStore`] and a [`TransactionLogStore`] that share one
//! [`UnitOfWork`] type, so a single unit-of-work can span balance
//! adjustments and log appends. `bankcore-db` implements these over
//! PostgreSQL; [`crate::memory`] implements them in-process.

use async_trait::async_trait;
use bankcore_shared::types::{AccountId, EntryId, Money, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::{Account, EntryKind, TransactionLogEntry};

/// Errors surfaced by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Conflict(String),

    /// Transient failure: lock-wait timeout, deadlock victim, lost connection.
    /// Nothing was committed, so the whole operation may be retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Backend(String),
}

/// A scoped set of store writes that commits or aborts as one step.
///
/// Dropping a unit-of-work without calling [`commit`](Self::commit) must
/// discard its writes and release every lock it holds.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Makes every write performed under this unit-of-work durable and visible.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discards every write performed under this unit-of-work.
    async fn rollback(self) -> Result<(), StoreError>;
}

/// Something that can open units-of-work.
#[async_trait]
pub trait UnitOfWorkProvider: Send + Sync {
    /// Unit-of-work type shared by the store capabilities.
    type Uow: UnitOfWork;

    /// Opens a new unit-of-work.
    async fn begin(&self) -> Result<Self::Uow, StoreError>;
}

/// Durable keyed account records.
#[async_trait]
pub trait AccountStore: UnitOfWorkProvider {
    /// Inserts a new account with a zero balance.
    ///
    /// Fails with [`StoreError::Conflict`] if the number is taken.
    async fn create(&self, user_id: UserId, account_number: &str) -> Result<Account, StoreError>;

    /// Reads the committed state of an account.
    async fn get_by_id(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Reads the committed state of an account by its external number.
    async fn get_by_number(&self, account_number: &str) -> Result<Account, StoreError>;

    /// Reads an account under an exclusive row lock held until `uow` resolves.
    ///
    /// The snapshot includes writes already staged in `uow`, and locking a
    /// row that `uow` already holds returns immediately.
    async fn lock_by_id(&self, uow: &mut Self::Uow, id: AccountId) -> Result<Account, StoreError>;

    /// Applies `balance += delta` under `uow`.
    ///
    /// Does not check sufficiency; the caller validates against a locked read first.
    async fn adjust_balance(
        &self,
        uow: &mut Self::Uow,
        id: AccountId,
        delta: Decimal,
    ) -> Result<(), StoreError>;
}

/// Durable append-only log of balance movements.
#[async_trait]
pub trait TransactionLogStore: UnitOfWorkProvider {
    /// Appends one immutable entry under `uow`.
    async fn append(
        &self,
        uow: &mut Self::Uow,
        account_id: AccountId,
        kind: EntryKind,
        amount: Money,
        description: &str,
    ) -> Result<EntryId, StoreError>;

    /// Lists committed entries for an account, newest first.
    ///
    /// Entries with equal timestamps are ordered by descending id so repeated
    /// reads without intervening writes return identical sequences.
    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLogEntry>, StoreError>;
}
