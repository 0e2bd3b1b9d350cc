//! Account records
//!
//! Accounts are created once and never deleted; everything except `status`
//! is immutable after creation. An account row carries no balance; balances
//! are always derived from ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Frozen => write!(f, "frozen"),
            AccountStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "frozen" => Ok(AccountStatus::Frozen),
            "closed" => Ok(AccountStatus::Closed),
            _ => Err(format!("Invalid account status: {}", s)),
        }
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        AccountStatus::Active
    }
}

/// A stored account row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Free-form classification, e.g. "checking" or "savings".
    #[serde(rename = "type")]
    pub account_type: String,
    /// 3-letter currency code.
    pub currency: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

/// Attributes of an account to be created.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub account_type: String,
    pub currency: String,
}
