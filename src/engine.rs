//! Transaction Engine
//!
//! Executes money movements as atomic double-entry transactions. Every
//! operation runs the same protocol inside one unit of work: validate the
//! amount, lock the involved accounts in ascending id order, record the
//! transaction and its balanced DEBIT/CREDIT entries, re-check the derived
//! balance on the side that can decrease, then commit. Any failure rolls the
//! unit of work back and leaves no rows behind.
//!
//! The engine is stateless apart from the injected store, so one instance is
//! shared across all requests.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{EntryDirection, LedgerError, Money, TransactionKind, TransactionStatus};
use crate::store::{LedgerStore, LedgerUow};

/// Outcome of a committed movement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementReceipt {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
}

/// Lock acquisition order for a movement: ascending account id, never
/// call-argument order, each account at most once. Two movements touching
/// the same accounts always lock them in the same sequence, so neither can
/// wait on a lock the other holds.
fn lock_order(source: Option<Uuid>, destination: Option<Uuid>) -> Vec<Uuid> {
    let mut accounts: Vec<Uuid> = source.into_iter().chain(destination).collect();
    accounts.sort_unstable();
    accounts.dedup();
    accounts
}

/// Double-entry transaction engine over an injected [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct TransactionEngine<S> {
    store: S,
}

impl<S: LedgerStore> TransactionEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Move `amount` from `source` to `destination`.
    ///
    /// A transfer whose source equals its destination is permitted: it locks
    /// the one account once and records offsetting entries.
    pub async fn transfer(
        &self,
        source: Uuid,
        destination: Uuid,
        amount: &str,
        description: &str,
    ) -> Result<MovementReceipt, LedgerError> {
        self.execute(
            TransactionKind::Transfer,
            Some(source),
            Some(destination),
            amount,
            description,
        )
        .await
    }

    /// Credit `amount` into `account` from outside the ledger.
    pub async fn deposit(
        &self,
        account: Uuid,
        amount: &str,
        description: &str,
    ) -> Result<MovementReceipt, LedgerError> {
        self.execute(
            TransactionKind::Deposit,
            None,
            Some(account),
            amount,
            description,
        )
        .await
    }

    /// Debit `amount` out of `account`, rejected if it would overdraw.
    pub async fn withdraw(
        &self,
        account: Uuid,
        amount: &str,
        description: &str,
    ) -> Result<MovementReceipt, LedgerError> {
        self.execute(
            TransactionKind::Withdrawal,
            Some(account),
            None,
            amount,
            description,
        )
        .await
    }

    async fn execute(
        &self,
        kind: TransactionKind,
        source: Option<Uuid>,
        destination: Option<Uuid>,
        amount: &str,
        description: &str,
    ) -> Result<MovementReceipt, LedgerError> {
        // Amount validation happens before any store interaction.
        let amount: Money = amount.parse()?;

        let mut uow = self.store.begin().await?;
        match Self::apply(&mut uow, kind, source, destination, &amount, description).await {
            Ok(transaction_id) => {
                uow.commit().await?;
                tracing::info!(
                    %transaction_id,
                    kind = %kind,
                    amount = %amount,
                    "movement committed"
                );
                Ok(MovementReceipt {
                    transaction_id,
                    status: TransactionStatus::Completed,
                })
            }
            Err(err) => {
                // A rollback failure supersedes the original error.
                uow.rollback().await?;
                if err.is_client_error() {
                    tracing::warn!(kind = %kind, error = %err, "movement rejected");
                } else {
                    tracing::error!(kind = %kind, error = %err, "movement failed");
                }
                Err(err)
            }
        }
    }

    /// Everything that happens inside the unit of work: lock, record,
    /// re-check. The caller decides the unit of work's fate from the result.
    async fn apply(
        uow: &mut S::Uow,
        kind: TransactionKind,
        source: Option<Uuid>,
        destination: Option<Uuid>,
        amount: &Money,
        description: &str,
    ) -> Result<Uuid, LedgerError> {
        for account_id in lock_order(source, destination) {
            uow.lock_account(account_id).await?;
        }

        let transaction_id = uow
            .insert_transaction(kind, amount, source, destination, description)
            .await?;

        if let Some(account_id) = source {
            uow.insert_entry(transaction_id, account_id, amount, EntryDirection::Debit)
                .await?;
        }
        if let Some(account_id) = destination {
            uow.insert_entry(transaction_id, account_id, amount, EntryDirection::Credit)
                .await?;
        }

        // Only the debited side can decrease; its entries are already staged,
        // so a violation is caught here before anything becomes visible.
        if let Some(account_id) = source {
            let balance = uow.derived_balance(account_id).await?;
            if balance.is_negative() {
                return Err(LedgerError::InsufficientFunds {
                    account_id,
                    balance,
                });
            }
        }

        uow.mark_completed(transaction_id).await?;
        Ok(transaction_id)
    }
}
