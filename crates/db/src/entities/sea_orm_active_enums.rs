//! `SeaORM` active enums mirroring `PostgreSQL` enum types.

use bankcore_core::EntryKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ledger_entry_kind")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    #[sea_orm(string_value = "deposit")]
    Deposit,
    #[sea_orm(string_value = "withdraw")]
    Withdraw,
    #[sea_orm(string_value = "transfer_out")]
    TransferOut,
    #[sea_orm(string_value = "transfer_in")]
    TransferIn,
}

impl From<EntryKind> for LedgerEntryKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Deposit => Self::Deposit,
            EntryKind::Withdraw => Self::Withdraw,
            EntryKind::TransferOut => Self::TransferOut,
            EntryKind::TransferIn => Self::TransferIn,
        }
    }
}

impl From<LedgerEntryKind> for EntryKind {
    fn from(kind: LedgerEntryKind) -> Self {
        match kind {
            LedgerEntryKind::Deposit => Self::Deposit,
            LedgerEntryKind::Withdraw => Self::Withdraw,
            LedgerEntryKind::TransferOut => Self::TransferOut,
            LedgerEntryKind::TransferIn => Self::TransferIn,
        }
    }
}
