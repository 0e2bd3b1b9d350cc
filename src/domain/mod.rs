//! Domain module
//!
//! Core domain types: money, accounts, transactions, and the ledger error
//! taxonomy.

pub mod account;
pub mod error;
pub mod money;
pub mod transaction;

pub use account::{AccountRecord, AccountStatus, NewAccount};
pub use error::LedgerError;
pub use money::{Balance, Money, MoneyError};
pub use transaction::{
    EntryDirection, LedgerEntry, TransactionKind, TransactionRecord, TransactionStatus,
    BASE_CURRENCY,
};
