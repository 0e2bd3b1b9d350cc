//! Account Service
//!
//! Query-side surface: account creation and balance/history reads. Reads go
//! straight to committed state; balances are always derived from entries at
//! read time, never cached.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AccountRecord, Balance, LedgerEntry, LedgerError, NewAccount};
use crate::store::LedgerStore;

/// An account's attributes together with its current derived balance.
#[derive(Debug, Clone, Serialize)]
pub struct AccountDetails {
    #[serde(flatten)]
    pub account: AccountRecord,
    pub balance: Balance,
}

/// Account queries over an injected [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct AccountService<S> {
    store: S,
}

impl<S: LedgerStore> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create an account for a user. New accounts start `active` with no
    /// entries, so their derived balance is zero.
    pub async fn create(
        &self,
        user_id: Uuid,
        account_type: String,
        currency: String,
    ) -> Result<AccountRecord, LedgerError> {
        self.store
            .create_account(NewAccount {
                user_id,
                account_type,
                currency,
            })
            .await
    }

    /// Fetch an account with its current derived balance.
    pub async fn get(&self, id: Uuid) -> Result<AccountDetails, LedgerError> {
        let account = self
            .store
            .fetch_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        let balance = self.store.account_balance(id).await?;
        Ok(AccountDetails { account, balance })
    }

    /// Full entry history for an account, most recent first.
    ///
    /// Existence is checked independently of the entries: an account with no
    /// movements yields an empty list, not an error.
    pub async fn ledger(&self, id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError> {
        if self.store.fetch_account(id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(id));
        }
        self.store.account_entries(id).await
    }
}
