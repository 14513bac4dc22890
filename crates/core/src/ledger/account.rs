//! Account domain types.

use bankcore_shared::types::{AccountId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Longest account number the store accepts.
pub const MAX_ACCOUNT_NUMBER_LEN: usize = 20;

/// Snapshot of an account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identifier.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// Caller-visible account number, unique across the ledger.
    pub account_number: String,
    /// Current balance, never negative once committed.
    pub balance: Decimal,
    /// When the account was opened.
    pub created_at: DateTime<Utc>,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Returns true if the balance covers `amount`.
    #[must_use]
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Normalizes caller input into a storable account number.
///
/// Returns `None` when the trimmed number is empty or too long.
#[must_use]
pub fn normalize_account_number(raw: &str) -> Option<&str> {
    let number = raw.trim();
    let len = number.chars().count();
    (len > 0 && len <= MAX_ACCOUNT_NUMBER_LEN).then_some(number)
}
