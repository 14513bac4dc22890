//! Transaction log entry domain types.

use bankcore_shared::types::{AccountId, EntryId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of a transaction log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Funds added to the account from outside the ledger.
    Deposit,
    /// Funds removed from the account to outside the ledger.
    Withdraw,
    /// Outbound leg of a transfer.
    TransferOut,
    /// Inbound leg of a transfer.
    TransferIn,
}

impl EntryKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Deposit,
        Self::Withdraw,
        Self::TransferOut,
        Self::TransferIn,
    ];

    /// Get string representation used by the store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
        }
    }

    /// Returns true if the entry increases the account balance.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::TransferIn)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown entry kind: {s}"))
    }
}

/// A committed, immutable transaction log entry.
///
/// `amount` is always a positive magnitude; the direction comes from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    /// Store-assigned identifier.
    pub id: EntryId,
    /// Account the entry belongs to.
    pub account_id: AccountId,
    /// What kind of movement this records.
    pub kind: EntryKind,
    /// Positive magnitude of the movement.
    pub amount: Decimal,
    /// Free-text description.
    pub description: String,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

impl TransactionLogEntry {
    /// Returns the effect of this entry on the account balance.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
