//! Ledger Store
//!
//! The transactional boundary of the system. A store hands out one
//! [`LedgerUow`] per engine operation; everything the operation does happens
//! inside that unit of work and commits or rolls back as a whole.
//!
//! The store is injected into the engine and the query surface at
//! construction time. [`PgLedgerStore`] is the production implementation;
//! [`MemoryLedgerStore`] is an in-process implementation with the same
//! locking and isolation contract, used as a test double.

mod memory;
mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AccountRecord, Balance, EntryDirection, LedgerEntry, LedgerError, Money, NewAccount,
    TransactionKind,
};

/// A transactional ledger store.
///
/// `begin` opens a unit of work. The remaining methods are the read-only
/// surface used by the query component; they run outside any unit of work
/// and only ever observe committed state.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Uow: LedgerUow;

    /// Open a unit of work.
    async fn begin(&self) -> Result<Self::Uow, LedgerError>;

    /// Insert a new account row (status `active`).
    async fn create_account(&self, new: NewAccount) -> Result<AccountRecord, LedgerError>;

    /// Fetch an account's attributes, or `None` if it does not exist.
    async fn fetch_account(&self, id: Uuid) -> Result<Option<AccountRecord>, LedgerError>;

    /// Derive the account's balance from its committed entries.
    async fn account_balance(&self, id: Uuid) -> Result<Balance, LedgerError>;

    /// All committed entries for the account, most recent first.
    async fn account_entries(&self, id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// One atomic, isolated unit of work.
///
/// Writes staged here are invisible to concurrent readers until `commit`,
/// and become visible all at once. Dropping an uncommitted unit of work
/// behaves like `rollback`: row locks are released and staged writes are
/// discarded.
#[async_trait]
pub trait LedgerUow: Send {
    /// Acquire an exclusive row lock on the account for the rest of this
    /// unit of work. Blocks while a conflicting unit of work holds the
    /// lock; fails with `AccountNotFound` if the row does not exist.
    async fn lock_account(&mut self, id: Uuid) -> Result<(), LedgerError>;

    /// Insert a transaction row with status `pending`, returning its id.
    async fn insert_transaction(
        &mut self,
        kind: TransactionKind,
        amount: &Money,
        source: Option<Uuid>,
        destination: Option<Uuid>,
        description: &str,
    ) -> Result<Uuid, LedgerError>;

    /// Insert one ledger entry row.
    async fn insert_entry(
        &mut self,
        transaction_id: Uuid,
        account_id: Uuid,
        amount: &Money,
        direction: EntryDirection,
    ) -> Result<(), LedgerError>;

    /// Derive the account's balance over all entries, including ones staged
    /// in this unit of work (read-your-own-writes).
    async fn derived_balance(&mut self, account_id: Uuid) -> Result<Balance, LedgerError>;

    /// Flip the transaction's status from `pending` to `completed`.
    async fn mark_completed(&mut self, transaction_id: Uuid) -> Result<(), LedgerError>;

    /// Commit every staged write and end the unit of work.
    async fn commit(self) -> Result<(), LedgerError>;

    /// Discard every staged write and end the unit of work.
    async fn rollback(self) -> Result<(), LedgerError>;
}
