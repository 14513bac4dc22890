//! Ledger error types.
//!
//! Every engine failure maps to exactly one variant so the boundary layer can
//! translate kinds into distinct caller-visible outcomes. Validation errors are
//! raised before the store is touched; store errors arrive through
//! [`LedgerError::from_store`].

use bankcore_shared::AppError;
use bankcore_shared::types::{AccountId, MoneyError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::store::StoreError;

/// Which account of an operation a lookup failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    /// The single account of a deposit, withdrawal or listing.
    Account,
    /// The debited side of a transfer.
    Source,
    /// The credited side of a transfer.
    Destination,
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Account => "account",
            Self::Source => "source account",
            Self::Destination => "destination account",
        })
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount is not positive, finer than a cent or above the column maximum.
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The rejected amount.
        amount: Decimal,
        /// Why it was rejected.
        reason: MoneyError,
    },

    /// Account number is empty or too long.
    #[error("Invalid account number: '{0}'")]
    InvalidAccountNumber(String),

    /// Transfer description exceeds the configured limit.
    #[error("Description is {len} characters, maximum is {max}")]
    DescriptionTooLong {
        /// Length of the supplied description, in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Source and destination of a transfer are the same account.
    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(String),

    // ========== Lookup Errors ==========
    /// Account does not exist.
    #[error("{which} not found: {key}")]
    NotFound {
        /// Role of the missing account in the operation.
        which: AccountRole,
        /// Identifier or number that was looked up.
        key: String,
    },

    // ========== Business Rule Errors ==========
    /// Balance does not cover the requested debit.
    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// The account that would go negative.
        account: AccountId,
        /// Balance read under the row lock.
        balance: Decimal,
        /// Amount requested.
        requested: Decimal,
    },

    /// Account number already exists.
    #[error("Account number '{0}' already exists")]
    Conflict(String),

    // ========== Store Errors ==========
    /// Transient store failure; nothing was committed and the operation may be retried.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Non-transient store failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl LedgerError {
    /// Builds a not-found error for the given role.
    pub fn not_found(which: AccountRole, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            which,
            key: key.to_string(),
        }
    }

    /// Translates a store failure for the account playing `which` under `key`.
    pub fn from_store(err: StoreError, which: AccountRole, key: impl std::fmt::Display) -> Self {
        match err {
            StoreError::NotFound => Self::not_found(which, key),
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Unavailable(detail) => Self::StoreUnavailable(detail),
            StoreError::Backend(detail) => Self::Store(detail),
        }
    }

    /// Translates a failure to commit.
    ///
    /// The unit-of-work guarantees nothing was applied, so every commit failure
    /// is reported as transient.
    pub fn from_commit(err: &StoreError) -> Self {
        Self::StoreUnavailable(format!("commit failed: {err}"))
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InvalidAccountNumber(_) => "INVALID_ACCOUNT_NUMBER",
            Self::DescriptionTooLong { .. } => "DESCRIPTION_TOO_LONG",
            Self::SameAccount(_) => "SAME_ACCOUNT",
            Self::NotFound {
                which: AccountRole::Account,
                ..
            } => "ACCOUNT_NOT_FOUND",
            Self::NotFound {
                which: AccountRole::Source,
                ..
            } => "SOURCE_ACCOUNT_NOT_FOUND",
            Self::NotFound {
                which: AccountRole::Destination,
                ..
            } => "DESTINATION_ACCOUNT_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Conflict(_) => "ACCOUNT_NUMBER_CONFLICT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidAmount { .. }
            | Self::InvalidAccountNumber(_)
            | Self::DescriptionTooLong { .. }
            | Self::SameAccount(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 409 Conflict
            Self::Conflict(_) => 409,

            // 422 Unprocessable - business rule
            Self::InsufficientFunds { .. } => 422,

            // 503 Service Unavailable - retryable
            Self::StoreUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::Store(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidAccountNumber(_)
            | LedgerError::DescriptionTooLong { .. }
            | LedgerError::SameAccount(_) => Self::Validation(message),
            LedgerError::NotFound { .. } => Self::NotFound(message),
            LedgerError::InsufficientFunds { .. } => Self::BusinessRule(message),
            LedgerError::Conflict(_) => Self::Conflict(message),
            LedgerError::StoreUnavailable(_) => Self::Unavailable(message),
            LedgerError::Store(_) => Self::Database(message),
        }
    }
}
