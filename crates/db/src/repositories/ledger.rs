//! `PostgreSQL` implementation of the ledger store capabilities.
//!
//! A unit-of-work is one `DatabaseTransaction`. Row locks are taken with
//! `SELECT ... FOR UPDATE` and bounded by `SET LOCAL lock_timeout`, so a
//! contended lock surfaces as a retryable error instead of hanging.

use std::time::Duration;

use async_trait::async_trait;
use bankcore_core::{
    Account, AccountStore, EntryKind, StoreError, TransactionLogEntry, TransactionLogStore,
    UnitOfWork, UnitOfWorkProvider,
};
use bankcore_shared::LedgerConfig;
use bankcore_shared::types::{AccountId, EntryId, Money, UserId, to_scale};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, RuntimeErr, Set, SqlErr,
    TransactionTrait,
};
use tracing::{debug, info};

use crate::entities::{accounts, transaction_logs};

/// SQLSTATE codes after which the whole unit-of-work may be retried.
const TRANSIENT_SQLSTATES: [&str; 4] = [
    "55P03", // lock_not_available (lock_timeout)
    "40P01", // deadlock_detected
    "40001", // serialization_failure
    "57P01", // admin_shutdown
];

/// Ledger store backed by a `PostgreSQL` connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    /// Creates a new store using the lock-wait timeout in `config`.
    #[must_use]
    pub fn from_config(db: DatabaseConnection, config: &LedgerConfig) -> Self {
        Self {
            db,
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
        }
    }
}

/// Unit-of-work for [`PgLedgerStore`]: one open database transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PgUnitOfWork {
    txn: DatabaseTransaction,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(map_db_err)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.txn.rollback().await.map_err(map_db_err)
    }
}

#[async_trait]
impl UnitOfWorkProvider for PgLedgerStore {
    type Uow = PgUnitOfWork;

    async fn begin(&self) -> Result<Self::Uow, StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        // Scoped to this transaction only
        let sql = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        txn.execute_unprepared(&sql).await.map_err(map_db_err)?;

        Ok(PgUnitOfWork { txn })
    }
}

#[async_trait]
impl AccountStore for PgLedgerStore {
    async fn create(&self, user_id: UserId, account_number: &str) -> Result<Account, StoreError> {
        let account = accounts::ActiveModel {
            user_id: Set(user_id.into_inner()),
            account_number: Set(account_number.to_string()),
            balance: Set(to_scale(Decimal::ZERO)),
            ..Default::default()
        };

        let model = account.insert(&self.db).await.map_err(map_db_err)?;
        info!(account_id = model.id, "Account row inserted");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(Account::from)
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_number(&self, account_number: &str) -> Result<Account, StoreError> {
        accounts::Entity::find()
            .filter(accounts::Column::AccountNumber.eq(account_number))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(Account::from)
            .ok_or(StoreError::NotFound)
    }

    async fn lock_by_id(&self, uow: &mut Self::Uow, id: AccountId) -> Result<Account, StoreError> {
        debug!(account_id = %id, "Locking account row");
        let account = accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&uow.txn)
            .await
            .map_err(map_db_err)?
            .map(Account::from)
            .ok_or(StoreError::NotFound)?;
        debug!(account_id = %id, "Account row locked");
        Ok(account)
    }

    async fn adjust_balance(
        &self,
        uow: &mut Self::Uow,
        id: AccountId,
        delta: Decimal,
    ) -> Result<(), StoreError> {
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).add(delta),
            )
            .filter(accounts::Column::Id.eq(id.into_inner()))
            .exec(&uow.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionLogStore for PgLedgerStore {
    async fn append(
        &self,
        uow: &mut Self::Uow,
        account_id: AccountId,
        kind: EntryKind,
        amount: Money,
        description: &str,
    ) -> Result<EntryId, StoreError> {
        let entry = transaction_logs::ActiveModel {
            account_id: Set(account_id.into_inner()),
            kind: Set(kind.into()),
            amount: Set(amount.amount()),
            description: Set(description.to_string()),
            // Stamped per entry, not per transaction, so a unit-of-work that
            // waited on a row lock still sorts after the one it waited for.
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        let model = entry.insert(&uow.txn).await.map_err(map_db_err)?;
        Ok(EntryId::new(model.id))
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLogEntry>, StoreError> {
        let entries = transaction_logs::Entity::find()
            .filter(transaction_logs::Column::AccountId.eq(account_id.into_inner()))
            .order_by_desc(transaction_logs::Column::CreatedAt)
            .order_by_desc(transaction_logs::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(entries.into_iter().map(TransactionLogEntry::from).collect())
    }
}

/// Classifies a database error into a store error kind.
#[allow(clippy::needless_pass_by_value)] // used as a `map_err` callback
pub fn map_db_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => return StoreError::Conflict(detail),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => return StoreError::NotFound,
        _ => {}
    }

    match &err {
        DbErr::RecordNotFound(_) => StoreError::NotFound,
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Unavailable(err.to_string()),
        DbErr::Exec(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
            if is_transient(sqlx_err) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            TRANSIENT_SQLSTATES.contains(&&*code) || code.starts_with("08")
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_db_err_kinds() {
        assert_eq!(
            map_db_err(DbErr::RecordNotFound("accounts".into())),
            StoreError::NotFound
        );
        assert!(matches!(
            map_db_err(DbErr::Conn(RuntimeErr::Internal("refused".into()))),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_db_err(DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::PoolTimedOut))),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_db_err(DbErr::Custom("boom".into())),
            StoreError::Backend(_)
        ));
    }
}
