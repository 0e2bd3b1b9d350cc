//! In-memory Ledger Store
//!
//! Intended for tests/dev. Not optimized for performance.
//!
//! Implements the same unit-of-work contract as the Postgres store:
//! per-account row locks that block conflicting units of work, writes staged
//! privately until commit, and read-your-own-writes balance derivation. Lock
//! acquisition awaits a real async mutex, so misordered lock acquisition
//! deadlocks here just as it would against the database.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    AccountRecord, AccountStatus, Balance, EntryDirection, LedgerEntry, LedgerError, Money,
    NewAccount, TransactionKind, TransactionRecord, TransactionStatus, BASE_CURRENCY,
};

use super::{LedgerStore, LedgerUow};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<Uuid, AccountRecord>,
    transactions: Vec<TransactionRecord>,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<Uuid, Arc<RowLock<()>>>>,
}

fn apply_entries<'a>(
    start: Balance,
    entries: impl Iterator<Item = &'a LedgerEntry>,
    account_id: Uuid,
) -> Balance {
    entries
        .filter(|entry| entry.account_id == account_id)
        .fold(start, |balance, entry| match entry.direction {
            EntryDirection::Credit => balance.credit(&entry.amount),
            EntryDirection::Debit => balance.debit(&entry.amount),
        })
}

/// Ledger store held entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transaction rows, for assertions.
    pub fn transaction_count(&self) -> usize {
        self.shared.tables.lock().transactions.len()
    }

    /// Number of committed ledger entry rows, for assertions.
    pub fn entry_count(&self) -> usize {
        self.shared.tables.lock().entries.len()
    }

    /// Look up a committed transaction row, for assertions.
    pub fn find_transaction(&self, id: Uuid) -> Option<TransactionRecord> {
        self.shared
            .tables
            .lock()
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Uow = MemoryLedgerUow;

    async fn begin(&self) -> Result<Self::Uow, LedgerError> {
        Ok(MemoryLedgerUow {
            shared: Arc::clone(&self.shared),
            row_guards: Vec::new(),
            staged_transactions: Vec::new(),
            staged_entries: Vec::new(),
        })
    }

    async fn create_account(&self, new: NewAccount) -> Result<AccountRecord, LedgerError> {
        let account = AccountRecord {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            account_type: new.account_type,
            currency: new.currency,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        };
        self.shared
            .tables
            .lock()
            .accounts
            .insert(account.id, account.clone());
        Ok(account)
    }

    async fn fetch_account(&self, id: Uuid) -> Result<Option<AccountRecord>, LedgerError> {
        Ok(self.shared.tables.lock().accounts.get(&id).cloned())
    }

    async fn account_balance(&self, id: Uuid) -> Result<Balance, LedgerError> {
        let tables = self.shared.tables.lock();
        Ok(apply_entries(Balance::zero(), tables.entries.iter(), id))
    }

    async fn account_entries(&self, id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError> {
        let tables = self.shared.tables.lock();
        // Rows append in commit order, so most recent first is reverse order.
        Ok(tables
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.account_id == id)
            .cloned()
            .collect())
    }
}

/// Unit of work over the in-memory tables.
///
/// Holds the row locks it acquired and stages its writes locally; `commit`
/// appends the staged rows under the table lock so they become visible all at
/// once, then releases the row locks. Dropping the value releases the row
/// locks and discards the staged rows.
pub struct MemoryLedgerUow {
    shared: Arc<Shared>,
    row_guards: Vec<OwnedMutexGuard<()>>,
    staged_transactions: Vec<TransactionRecord>,
    staged_entries: Vec<LedgerEntry>,
}

#[async_trait::async_trait]
impl LedgerUow for MemoryLedgerUow {
    async fn lock_account(&mut self, id: Uuid) -> Result<(), LedgerError> {
        let row_lock = {
            let mut locks = self.shared.row_locks.lock();
            Arc::clone(locks.entry(id).or_default())
        };
        let guard = row_lock.lock_owned().await;
        // Existence is checked under the row lock, like SELECT ... FOR UPDATE.
        if !self.shared.tables.lock().accounts.contains_key(&id) {
            return Err(LedgerError::AccountNotFound(id));
        }
        self.row_guards.push(guard);
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        kind: TransactionKind,
        amount: &Money,
        source: Option<Uuid>,
        destination: Option<Uuid>,
        description: &str,
    ) -> Result<Uuid, LedgerError> {
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            amount: amount.clone(),
            currency: BASE_CURRENCY.to_string(),
            kind,
            status: TransactionStatus::Pending,
            source_account_id: source,
            destination_account_id: destination,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        let id = record.id;
        self.staged_transactions.push(record);
        Ok(id)
    }

    async fn insert_entry(
        &mut self,
        transaction_id: Uuid,
        account_id: Uuid,
        amount: &Money,
        direction: EntryDirection,
    ) -> Result<(), LedgerError> {
        self.staged_entries.push(LedgerEntry {
            id: Uuid::new_v4(),
            transaction_id,
            account_id,
            amount: amount.clone(),
            direction,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn derived_balance(&mut self, account_id: Uuid) -> Result<Balance, LedgerError> {
        let committed = {
            let tables = self.shared.tables.lock();
            apply_entries(Balance::zero(), tables.entries.iter(), account_id)
        };
        Ok(apply_entries(
            committed,
            self.staged_entries.iter(),
            account_id,
        ))
    }

    async fn mark_completed(&mut self, transaction_id: Uuid) -> Result<(), LedgerError> {
        let staged = self
            .staged_transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| {
                LedgerError::store(anyhow::anyhow!(
                    "transaction {transaction_id} is not staged in this unit of work"
                ))
            })?;
        staged.status = TransactionStatus::Completed;
        Ok(())
    }

    async fn commit(mut self) -> Result<(), LedgerError> {
        let mut tables = self.shared.tables.lock();
        tables.transactions.append(&mut self.staged_transactions);
        tables.entries.append(&mut self.staged_entries);
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), LedgerError> {
        self.staged_transactions.clear();
        self.staged_entries.clear();
        Ok(())
    }
}
