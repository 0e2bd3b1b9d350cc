//! Ledger Error Types
//!
//! The closed error taxonomy for engine and store operations. The transport
//! layer maps these kinds to status codes explicitly; nothing anywhere
//! dispatches on error message text.

use thiserror::Error;
use uuid::Uuid;

use super::money::{Balance, MoneyError};

/// Errors surfaced by ledger operations.
///
/// Every failure detected inside a unit of work triggers rollback before the
/// error is returned. The engine never retries; a rollback failure surfaces
/// as `Store`, superseding the error that caused the rollback.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount was malformed, non-positive, or out of range
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    /// Referenced account does not exist (checked at lock time and on reads)
    #[error("Account {0} not found")]
    AccountNotFound(Uuid),

    /// The movement would leave the account's derived balance negative
    #[error("Insufficient funds: account {account_id} balance would be {balance}")]
    InsufficientFunds { account_id: Uuid, balance: Balance },

    /// The underlying transactional store could not complete an operation.
    /// Always fatal to the movement, never retried internally.
    #[error("Ledger store failure: {0}")]
    Store(anyhow::Error),
}

impl LedgerError {
    /// Wrap an arbitrary store-layer cause.
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Self::Store(err.into())
    }

    /// Check if this is a client error (caller's fault) as opposed to a
    /// store failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_) | Self::AccountNotFound(_) | Self::InsufficientFunds { .. }
        )
    }
}
