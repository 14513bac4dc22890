//! Ledger schema migration.
//!
//! Creates the accounts and transaction log tables, the entry kind enum, and
//! the triggers that keep `updated_at` current and the log append-only.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TABLES
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(TRANSACTION_LOGS_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Kinds of balance movement recorded in the transaction log
CREATE TYPE ledger_entry_kind AS ENUM (
    'deposit',
    'withdraw',
    'transfer_out',
    'transfer_in'
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    account_number VARCHAR(20) NOT NULL,
    balance NUMERIC(15, 2) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_accounts_number UNIQUE (account_number),
    CONSTRAINT chk_accounts_number_not_blank CHECK (length(btrim(account_number)) > 0),
    CONSTRAINT chk_accounts_balance_non_negative CHECK (balance >= 0)
);

-- Index for listing a user's accounts
CREATE INDEX idx_accounts_user ON accounts(user_id);
";

const TRANSACTION_LOGS_SQL: &str = r"
CREATE TABLE transaction_logs (
    id BIGSERIAL PRIMARY KEY,
    account_id BIGINT NOT NULL REFERENCES accounts(id),
    kind ledger_entry_kind NOT NULL,
    amount NUMERIC(15, 2) NOT NULL,
    description VARCHAR(512) NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
    CONSTRAINT chk_transaction_logs_amount_positive CHECK (amount > 0)
);

-- Index for account history, newest first
CREATE INDEX idx_transaction_logs_account ON transaction_logs(account_id, created_at DESC, id DESC);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: set_updated_at
-- Stamps updated_at on every account update
-- ============================================================
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_accounts_updated_at
BEFORE UPDATE ON accounts
FOR EACH ROW
EXECUTE FUNCTION set_updated_at();

-- ============================================================
-- FUNCTION: prevent_log_modification
-- Transaction log entries are immutable once written
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_log_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Transaction log entries are append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_log_modification
BEFORE UPDATE OR DELETE ON transaction_logs
FOR EACH ROW
EXECUTE FUNCTION prevent_log_modification();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS transaction_logs CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP FUNCTION IF EXISTS prevent_log_modification() CASCADE;
DROP FUNCTION IF EXISTS set_updated_at() CASCADE;
DROP TYPE IF EXISTS ledger_entry_kind;
";

#[cfg(test)]
mod tests {
    use super::*;
    use bankcore_core::ledger::DESCRIPTION_COLUMN_LEN;

    #[test]
    fn test_description_column_matches_engine_limit() {
        let column = format!("description VARCHAR({DESCRIPTION_COLUMN_LEN})");
        assert!(TRANSACTION_LOGS_SQL.contains(&column));
    }
}
