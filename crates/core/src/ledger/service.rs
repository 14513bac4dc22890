//! Ledger engine: deposit, withdrawal and transfer orchestration.
//!
//! Every mutating operation runs inside one unit-of-work:
//!
//! ```text
//! Started -> Validated -> Applied -> Committed
//!        \-> Aborted (validation, lookup, funds or store failure)
//! ```
//!
//! Amounts and account numbers are validated before the store is touched.
//! Each account row that will be adjusted is locked before its balance is
//! read, and transfers lock their two rows in ascending id order so opposite
//! transfers between the same pair cannot deadlock.

use std::sync::Arc;

use bankcore_shared::LedgerConfig;
use bankcore_shared::types::{AccountId, Money, UserId};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::account::{Account, MAX_ACCOUNT_NUMBER_LEN, normalize_account_number};
use super::entry::{EntryKind, TransactionLogEntry};
use super::error::{AccountRole, LedgerError};
use crate::store::{AccountStore, StoreError, TransactionLogStore, UnitOfWork, UnitOfWorkProvider};

/// Description recorded on deposit entries.
pub const DEPOSIT_DESCRIPTION: &str = "Deposit funds";

/// Description recorded on withdrawal entries.
pub const WITHDRAW_DESCRIPTION: &str = "Withdrawal funds";

/// Capacity, in characters, of a stored log entry description.
pub const DESCRIPTION_COLUMN_LEN: usize = 512;

/// Largest transfer description that still fits the column after the
/// longest system prefix, `"Transfer from {number}: "`.
pub const MAX_DESCRIPTION_LEN: usize =
    DESCRIPTION_COLUMN_LEN - "Transfer from ".len() - MAX_ACCOUNT_NUMBER_LEN - ": ".len();

/// Ledger engine over an account store and a transaction log store.
///
/// The engine holds no balance state of its own. Both stores must share a
/// unit-of-work type so balance adjustments and log appends commit together.
pub struct LedgerEngine<A, L> {
    accounts: Arc<A>,
    logs: Arc<L>,
    max_description_len: usize,
}

impl<A, L> Clone for LedgerEngine<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            logs: Arc::clone(&self.logs),
            max_description_len: self.max_description_len,
        }
    }
}

impl<A, L> std::fmt::Debug for LedgerEngine<A, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEngine")
            .field("max_description_len", &self.max_description_len)
            .finish_non_exhaustive()
    }
}

impl<A, L> LedgerEngine<A, L>
where
    A: AccountStore,
    L: TransactionLogStore + UnitOfWorkProvider<Uow = A::Uow>,
{
    /// Creates an engine with the default description limit.
    pub fn new(accounts: Arc<A>, logs: Arc<L>) -> Self {
        Self {
            accounts,
            logs,
            max_description_len: LedgerConfig::default().max_description_len,
        }
    }

    /// Creates an engine using the limits in `config`.
    pub fn from_config(accounts: Arc<A>, logs: Arc<L>, config: &LedgerConfig) -> Self {
        Self::new(accounts, logs).with_max_description_len(config.max_description_len)
    }

    /// Overrides the maximum transfer description length, in characters.
    ///
    /// Values above [`MAX_DESCRIPTION_LEN`] are clamped to it.
    #[must_use]
    pub fn with_max_description_len(mut self, max: usize) -> Self {
        if max > MAX_DESCRIPTION_LEN {
            warn!(
                configured = max,
                limit = MAX_DESCRIPTION_LEN,
                "Description limit exceeds column capacity, clamping"
            );
        }
        self.max_description_len = max.min(MAX_DESCRIPTION_LEN);
        self
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Opens a new account with a zero balance.
    ///
    /// # Errors
    ///
    /// - `InvalidAccountNumber` if the trimmed number is empty or too long
    /// - `Conflict` if the number is already taken
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn create_account(
        &self,
        user_id: UserId,
        account_number: &str,
    ) -> Result<Account, LedgerError> {
        let number = parse_account_number(account_number)?;

        let account = self
            .accounts
            .create(user_id, number)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => LedgerError::Conflict(number.to_string()),
                other => LedgerError::from_store(other, AccountRole::Account, number),
            })
            .inspect_err(|err| {
                warn!(code = err.error_code(), error = %err, "Account creation rejected");
            })?;

        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            "Account created"
        );
        Ok(account)
    }

    /// Reads the committed state of an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get_by_id(account_id)
            .await
            .map_err(|err| LedgerError::from_store(err, AccountRole::Account, account_id))
    }

    /// Reads the committed state of an account by its number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAccountNumber` or `NotFound`.
    pub async fn get_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<Account, LedgerError> {
        let number = parse_account_number(account_number)?;
        self.resolve(number, AccountRole::Account).await
    }

    // ========================================================================
    // Balance mutations
    // ========================================================================

    /// Credits `amount` to an account and records a `deposit` entry.
    ///
    /// Returns the account as it stands after the deposit.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive, finer than a cent or too large
    /// - `NotFound` if the account does not exist
    /// - `StoreUnavailable` on a transient store failure; nothing was applied
    #[instrument(
        skip(self, account_id, amount),
        fields(account_id = %account_id, amount = %amount)
    )]
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Account, LedgerError> {
        let money = parse_amount(amount)?;

        let mut uow = self.begin().await?;
        let outcome = self.apply_deposit(&mut uow, account_id, money).await;
        let account = Self::finish(uow, outcome)
            .await
            .inspect_err(|err| warn!(code = err.error_code(), error = %err, "Deposit rejected"))?;

        info!(balance = %account.balance, "Deposit committed");
        Ok(account)
    }

    /// Debits `amount` from an account and records a `withdraw` entry.
    ///
    /// Returns the account as it stands after the withdrawal.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive, finer than a cent or too large
    /// - `NotFound` if the account does not exist
    /// - `InsufficientFunds` if the balance is below `amount`
    /// - `StoreUnavailable` on a transient store failure; nothing was applied
    #[instrument(
        skip(self, account_id, amount),
        fields(account_id = %account_id, amount = %amount)
    )]
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Account, LedgerError> {
        let money = parse_amount(amount)?;

        let mut uow = self.begin().await?;
        let outcome = self.apply_withdraw(&mut uow, account_id, money).await;
        let account = Self::finish(uow, outcome)
            .await
            .inspect_err(|err| {
                warn!(code = err.error_code(), error = %err, "Withdrawal rejected");
            })?;

        info!(balance = %account.balance, "Withdrawal committed");
        Ok(account)
    }

    /// Moves `amount` between two accounts identified by number.
    ///
    /// Both balance adjustments and both log entries commit together or not
    /// at all. `description` is stored verbatim after a system prefix.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount`, `InvalidAccountNumber`, `SameAccount` or
    ///   `DescriptionTooLong` before any store access
    /// - `NotFound` naming the source or destination
    /// - `InsufficientFunds` if the source balance is below `amount`
    /// - `StoreUnavailable` on a transient store failure; nothing was applied
    #[instrument(skip(self, amount, description), fields(amount = %amount))]
    pub async fn transfer(
        &self,
        from_number: &str,
        to_number: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<(), LedgerError> {
        let money = parse_amount(amount)?;
        let from = parse_account_number(from_number)?;
        let to = parse_account_number(to_number)?;
        if from == to {
            return Err(LedgerError::SameAccount(from.to_string()));
        }
        let len = description.chars().count();
        if len > self.max_description_len {
            return Err(LedgerError::DescriptionTooLong {
                len,
                max: self.max_description_len,
            });
        }

        let source = self.resolve(from, AccountRole::Source).await?;
        let destination = self.resolve(to, AccountRole::Destination).await?;

        let mut uow = self.begin().await?;
        let outcome = self
            .apply_transfer(&mut uow, &source, &destination, money, description)
            .await;
        Self::finish(uow, outcome)
            .await
            .inspect_err(|err| warn!(code = err.error_code(), error = %err, "Transfer rejected"))?;

        info!(
            source_id = %source.id,
            destination_id = %destination.id,
            "Transfer committed"
        );
        Ok(())
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Lists an account's transaction log, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    #[instrument(skip(self, account_id), fields(account_id = %account_id))]
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLogEntry>, LedgerError> {
        self.get_account(account_id).await?;
        self.logs
            .list_by_account(account_id)
            .await
            .map_err(|err| LedgerError::from_store(err, AccountRole::Account, account_id))
    }

    // ========================================================================
    // Unit-of-work steps
    // ========================================================================

    async fn apply_deposit(
        &self,
        uow: &mut A::Uow,
        account_id: AccountId,
        money: Money,
    ) -> Result<Account, LedgerError> {
        self.lock(uow, account_id, AccountRole::Account).await?;
        self.adjust(uow, account_id, money.amount(), AccountRole::Account)
            .await?;
        self.record(
            uow,
            account_id,
            EntryKind::Deposit,
            money,
            DEPOSIT_DESCRIPTION,
            AccountRole::Account,
        )
        .await?;
        self.lock(uow, account_id, AccountRole::Account).await
    }

    async fn apply_withdraw(
        &self,
        uow: &mut A::Uow,
        account_id: AccountId,
        money: Money,
    ) -> Result<Account, LedgerError> {
        let account = self.lock(uow, account_id, AccountRole::Account).await?;
        ensure_funds(&account, money)?;
        self.adjust(uow, account_id, money.negated(), AccountRole::Account)
            .await?;
        self.record(
            uow,
            account_id,
            EntryKind::Withdraw,
            money,
            WITHDRAW_DESCRIPTION,
            AccountRole::Account,
        )
        .await?;
        self.lock(uow, account_id, AccountRole::Account).await
    }

    async fn apply_transfer(
        &self,
        uow: &mut A::Uow,
        source: &Account,
        destination: &Account,
        money: Money,
        description: &str,
    ) -> Result<(), LedgerError> {
        // Lock order follows the ids, never the transfer direction.
        let locked_source = if source.id < destination.id {
            let locked = self.lock(uow, source.id, AccountRole::Source).await?;
            self.lock(uow, destination.id, AccountRole::Destination)
                .await?;
            locked
        } else {
            self.lock(uow, destination.id, AccountRole::Destination)
                .await?;
            self.lock(uow, source.id, AccountRole::Source).await?
        };
        ensure_funds(&locked_source, money)?;

        self.adjust(uow, source.id, money.negated(), AccountRole::Source)
            .await?;
        self.adjust(uow, destination.id, money.amount(), AccountRole::Destination)
            .await?;

        let out_description = format!("Transfer to {}: {description}", destination.account_number);
        let in_description = format!("Transfer from {}: {description}", source.account_number);
        self.record(
            uow,
            source.id,
            EntryKind::TransferOut,
            money,
            &out_description,
            AccountRole::Source,
        )
        .await?;
        self.record(
            uow,
            destination.id,
            EntryKind::TransferIn,
            money,
            &in_description,
            AccountRole::Destination,
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn begin(&self) -> Result<A::Uow, LedgerError> {
        self.accounts
            .begin()
            .await
            .map_err(|err| LedgerError::StoreUnavailable(format!("begin failed: {err}")))
    }

    /// Commits on success; otherwise rolls back and surfaces the original error.
    async fn finish<T>(uow: A::Uow, outcome: Result<T, LedgerError>) -> Result<T, LedgerError> {
        match outcome {
            Ok(value) => {
                uow.commit()
                    .await
                    .map_err(|err| LedgerError::from_commit(&err))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    // The unit-of-work is gone either way; the store discards
                    // its writes when the connection drops the transaction.
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn resolve(&self, number: &str, which: AccountRole) -> Result<Account, LedgerError> {
        self.accounts
            .get_by_number(number)
            .await
            .map_err(|err| LedgerError::from_store(err, which, number))
    }

    async fn lock(
        &self,
        uow: &mut A::Uow,
        account_id: AccountId,
        which: AccountRole,
    ) -> Result<Account, LedgerError> {
        self.accounts
            .lock_by_id(uow, account_id)
            .await
            .map_err(|err| LedgerError::from_store(err, which, account_id))
    }

    async fn adjust(
        &self,
        uow: &mut A::Uow,
        account_id: AccountId,
        delta: Decimal,
        which: AccountRole,
    ) -> Result<(), LedgerError> {
        self.accounts
            .adjust_balance(uow, account_id, delta)
            .await
            .map_err(|err| LedgerError::from_store(err, which, account_id))
    }

    async fn record(
        &self,
        uow: &mut A::Uow,
        account_id: AccountId,
        kind: EntryKind,
        money: Money,
        description: &str,
        which: AccountRole,
    ) -> Result<(), LedgerError> {
        self.logs
            .append(uow, account_id, kind, money, description)
            .await
            .map(|_| ())
            .map_err(|err| LedgerError::from_store(err, which, account_id))
    }
}

fn parse_amount(amount: Decimal) -> Result<Money, LedgerError> {
    Money::positive(amount).map_err(|reason| LedgerError::InvalidAmount { amount, reason })
}

fn parse_account_number(raw: &str) -> Result<&str, LedgerError> {
    normalize_account_number(raw).ok_or_else(|| LedgerError::InvalidAccountNumber(raw.to_string()))
}

fn ensure_funds(account: &Account, money: Money) -> Result<(), LedgerError> {
    if account.can_cover(money.amount()) {
        Ok(())
    } else {
        Err(LedgerError::InsufficientFunds {
            account: account.id,
            balance: account.balance,
            requested: money.amount(),
        })
    }
}
