//! `SeaORM` entity definitions for the ledger schema.

pub mod accounts;
pub mod sea_orm_active_enums;
pub mod transaction_logs;
