//! ledger_api Library
//!
//! Re-exports modules for integration testing and external use.

pub mod accounts;
pub mod api;
pub mod domain;
pub mod engine;
pub mod store;

// Private modules (used only by main.rs binary)
pub mod config;
pub mod db;
mod error;

pub use accounts::{AccountDetails, AccountService};
pub use config::Config;
pub use domain::{AccountRecord, AccountStatus, Balance, LedgerError, Money, MoneyError, NewAccount};
pub use domain::{
    EntryDirection, LedgerEntry, TransactionKind, TransactionRecord, TransactionStatus,
};
pub use engine::{MovementReceipt, TransactionEngine};
pub use error::{AppError, AppResult};
pub use store::{LedgerStore, LedgerUow, MemoryLedgerStore, PgLedgerStore};
