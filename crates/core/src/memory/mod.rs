//! In-process ledger store.
//!
//! Implements [`AccountStore`] and [`TransactionLogStore`] over shared maps so
//! the engine can run without a database. Row locks are per-account
//! `tokio::sync::Mutex`es owned by the unit-of-work; writes are staged on the
//! unit-of-work and applied in one step at commit. Dropping a
//! [`MemoryUnitOfWork`] discards its staged writes and releases its locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bankcore_shared::LedgerConfig;
use bankcore_shared::types::{AccountId, EntryId, MAX_AMOUNT, Money, UserId, to_scale};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::ledger::{Account, EntryKind, TransactionLogEntry};
use crate::store::{AccountStore, StoreError, TransactionLogStore, UnitOfWork, UnitOfWorkProvider};

type RowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    by_number: HashMap<String, AccountId>,
    row_locks: HashMap<AccountId, RowLock>,
    entries: Vec<TransactionLogEntry>,
    last_account_id: i64,
    last_entry_id: i64,
}

#[derive(Default)]
struct State {
    tables: Mutex<Tables>,
}

impl State {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store state poisoned".to_string()))
    }
}

/// Ledger store kept entirely in process memory.
///
/// Cloning is cheap and every clone shares the same accounts and log.
#[derive(Clone)]
pub struct MemoryLedgerStore {
    state: Arc<State>,
    lock_timeout: Duration,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedgerStore")
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl MemoryLedgerStore {
    /// Creates an empty store with the default lock-wait timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&LedgerConfig::default())
    }

    /// Creates an empty store using the lock-wait timeout in `config`.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            state: Arc::new(State::default()),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }

    /// Overrides how long a unit-of-work waits for a row lock.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

struct PendingEntry {
    id: EntryId,
    account_id: AccountId,
    kind: EntryKind,
    amount: Decimal,
    description: String,
}

/// Unit-of-work for [`MemoryLedgerStore`].
pub struct MemoryUnitOfWork {
    state: Arc<State>,
    guards: HashMap<AccountId, OwnedMutexGuard<()>>,
    deltas: HashMap<AccountId, Decimal>,
    pending: Vec<PendingEntry>,
}

impl std::fmt::Debug for MemoryUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUnitOfWork")
            .field("locked", &self.guards.keys().collect::<Vec<_>>())
            .field("pending_entries", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl MemoryUnitOfWork {
    fn staged(&self, id: AccountId) -> Decimal {
        self.deltas.get(&id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Committed row with this unit-of-work's staged delta applied.
    fn snapshot(&self, tables: &Tables, id: AccountId) -> Result<Account, StoreError> {
        let mut account = tables.accounts.get(&id).cloned().ok_or(StoreError::NotFound)?;
        let delta = self.staged(id);
        if !delta.is_zero() {
            account.balance = apply_delta(id, account.balance, delta)?;
            account.updated_at = Utc::now();
        }
        Ok(account)
    }
}

/// Adds `delta` to `balance` within the range a `NUMERIC(15, 2)` column holds.
fn apply_delta(id: AccountId, balance: Decimal, delta: Decimal) -> Result<Decimal, StoreError> {
    balance
        .checked_add(delta)
        .filter(|next| *next <= MAX_AMOUNT)
        .map(to_scale)
        .ok_or_else(|| StoreError::Backend(format!("balance of account {id} is out of range")))
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        let mut tables = self.state.tables()?;

        // Validate everything before touching anything, so a refused commit
        // leaves the tables as they were.
        let mut balances = Vec::with_capacity(self.deltas.len());
        for (&id, &delta) in &self.deltas {
            let account = tables.accounts.get(&id).ok_or(StoreError::NotFound)?;
            let balance = apply_delta(id, account.balance, delta)?;
            if balance < Decimal::ZERO {
                return Err(StoreError::Backend(format!(
                    "balance of account {id} would become negative"
                )));
            }
            balances.push((id, balance));
        }

        let now: DateTime<Utc> = Utc::now();
        for (id, balance) in balances {
            if let Some(account) = tables.accounts.get_mut(&id) {
                account.balance = balance;
                account.updated_at = now;
            }
        }
        for pending in self.pending {
            tables.entries.push(TransactionLogEntry {
                id: pending.id,
                account_id: pending.account_id,
                kind: pending.kind,
                amount: pending.amount,
                description: pending.description,
                created_at: now,
            });
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl UnitOfWorkProvider for MemoryLedgerStore {
    type Uow = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Uow, StoreError> {
        Ok(MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            guards: HashMap::new(),
            deltas: HashMap::new(),
            pending: Vec::new(),
        })
    }
}

#[async_trait]
impl AccountStore for MemoryLedgerStore {
    async fn create(&self, user_id: UserId, account_number: &str) -> Result<Account, StoreError> {
        let mut tables = self.state.tables()?;
        if tables.by_number.contains_key(account_number) {
            return Err(StoreError::Conflict(format!(
                "account number {account_number}"
            )));
        }

        tables.last_account_id += 1;
        let id = AccountId::new(tables.last_account_id);
        let now = Utc::now();
        let account = Account {
            id,
            user_id,
            account_number: account_number.to_string(),
            balance: to_scale(Decimal::ZERO),
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(id, account.clone());
        tables.by_number.insert(account_number.to_string(), id);
        tables.row_locks.insert(id, RowLock::default());

        info!(account_id = %id, "Account row inserted");
        Ok(account)
    }

    async fn get_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        let tables = self.state.tables()?;
        tables.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_by_number(&self, account_number: &str) -> Result<Account, StoreError> {
        let tables = self.state.tables()?;
        tables
            .by_number
            .get(account_number)
            .and_then(|id| tables.accounts.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn lock_by_id(&self, uow: &mut Self::Uow, id: AccountId) -> Result<Account, StoreError> {
        if !uow.guards.contains_key(&id) {
            let row_lock = {
                let tables = self.state.tables()?;
                tables.row_locks.get(&id).cloned().ok_or(StoreError::NotFound)?
            };

            debug!(account_id = %id, "Waiting for row lock");
            let guard = tokio::time::timeout(self.lock_timeout, row_lock.lock_owned())
                .await
                .map_err(|_| {
                    StoreError::Unavailable(format!(
                        "lock wait on account {id} exceeded {}ms",
                        self.lock_timeout.as_millis()
                    ))
                })?;
            debug!(account_id = %id, "Row lock acquired");
            uow.guards.insert(id, guard);
        }

        let tables = self.state.tables()?;
        uow.snapshot(&tables, id)
    }

    async fn adjust_balance(
        &self,
        uow: &mut Self::Uow,
        id: AccountId,
        delta: Decimal,
    ) -> Result<(), StoreError> {
        // An update takes the row lock implicitly, as it would in SQL.
        self.lock_by_id(uow, id).await?;
        let staged = uow.deltas.entry(id).or_insert(Decimal::ZERO);
        *staged = staged.checked_add(delta).ok_or_else(|| {
            StoreError::Backend(format!("staged change to account {id} is out of range"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl TransactionLogStore for MemoryLedgerStore {
    async fn append(
        &self,
        uow: &mut Self::Uow,
        account_id: AccountId,
        kind: EntryKind,
        amount: Money,
        description: &str,
    ) -> Result<EntryId, StoreError> {
        let id = {
            let mut tables = self.state.tables()?;
            if !tables.accounts.contains_key(&account_id) {
                return Err(StoreError::NotFound);
            }
            // Ids are reserved like a sequence: a rolled-back entry leaves a gap.
            tables.last_entry_id += 1;
            EntryId::new(tables.last_entry_id)
        };

        uow.pending.push(PendingEntry {
            id,
            account_id,
            kind,
            amount: amount.amount(),
            description: description.to_string(),
        });
        Ok(id)
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLogEntry>, StoreError> {
        let tables = self.state.tables()?;
        let mut entries: Vec<_> = tables
            .entries
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}
