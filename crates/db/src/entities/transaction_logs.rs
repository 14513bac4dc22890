//! `SeaORM` Entity for transaction_logs table.
//!
//! Rows are append-only; the migration installs a trigger rejecting updates
//! and deletes.

use bankcore_core::TransactionLogEntry;
use bankcore_shared::types::{AccountId, EntryId};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::LedgerEntryKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub kind: LedgerEntryKind,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TransactionLogEntry {
    fn from(model: Model) -> Self {
        Self {
            id: EntryId::new(model.id),
            account_id: AccountId::new(model.account_id),
            kind: model.kind.into(),
            amount: model.amount,
            description: model.description,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
