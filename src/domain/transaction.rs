//! Transaction and ledger-entry records
//!
//! A transaction row describes one money movement; its ledger entries are the
//! double-entry bookkeeping for that movement. Both are created exactly once
//! inside a single unit of work, and the only update ever applied is the
//! transaction's `pending` -> `completed` status flip before commit. A rolled
//! back movement leaves no rows at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::money::Money;

/// Currency every transaction is recorded in. Accounts may carry their own
/// currency code, but the ledger itself books all movements in USD.
pub const BASE_CURRENCY: &str = "USD";

/// The kind of money movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Deposit,
    Withdrawal,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Transfer => write!(f, "transfer"),
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(TransactionKind::Transfer),
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }
}

/// Transaction status. `pending` exists only inside the owning unit of work;
/// every committed transaction is `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

/// Which side of the books a ledger entry lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "DEBIT"),
            EntryDirection::Credit => write!(f, "CREDIT"),
        }
    }
}

impl FromStr for EntryDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBIT" => Ok(EntryDirection::Debit),
            "CREDIT" => Ok(EntryDirection::Credit),
            _ => Err(format!("Invalid entry direction: {}", s)),
        }
    }
}

/// A stored transaction row.
///
/// A transfer references both accounts, a deposit only the destination, a
/// withdrawal only the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub amount: Money,
    pub currency: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A stored ledger entry row: one account's side of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub amount: Money,
    pub direction: EntryDirection,
    pub created_at: DateTime<Utc>,
}
