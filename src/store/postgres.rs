//! Postgres Ledger Store
//!
//! Production [`LedgerStore`] backed by sqlx. A unit of work is a database
//! transaction; account locks are `SELECT ... FOR UPDATE` row locks, so
//! isolation and lock release on rollback come from Postgres itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    AccountRecord, Balance, EntryDirection, LedgerEntry, LedgerError, Money, NewAccount,
    TransactionKind, TransactionStatus, BASE_CURRENCY,
};

use super::{LedgerStore, LedgerUow};

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::store(err)
    }
}

/// Rows read back from the database are expected to satisfy the schema
/// constraints; a row that does not parse is reported as a store failure.
fn corrupt_row(detail: String) -> LedgerError {
    LedgerError::store(anyhow::anyhow!("corrupt row: {detail}"))
}

type AccountRow = (Uuid, Uuid, String, String, String, DateTime<Utc>);
type EntryRow = (Uuid, Uuid, Uuid, Decimal, String, DateTime<Utc>);

fn account_from_row(row: AccountRow) -> Result<AccountRecord, LedgerError> {
    let (id, user_id, account_type, currency, status, created_at) = row;
    Ok(AccountRecord {
        id,
        user_id,
        account_type,
        currency,
        status: status.parse().map_err(corrupt_row)?,
        created_at,
    })
}

fn entry_from_row(row: EntryRow) -> Result<LedgerEntry, LedgerError> {
    let (id, transaction_id, account_id, amount, direction, created_at) = row;
    Ok(LedgerEntry {
        id,
        transaction_id,
        account_id,
        amount: Money::new(amount).map_err(LedgerError::store)?,
        direction: direction.parse().map_err(corrupt_row)?,
        created_at,
    })
}

const BALANCE_SQL: &str = r#"
    SELECT COALESCE(SUM(CASE WHEN direction = 'CREDIT' THEN amount ELSE -amount END), 0)
    FROM ledger_entries
    WHERE account_id = $1
"#;

/// Ledger store backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new store on top of a database pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    type Uow = PgLedgerUow;

    async fn begin(&self) -> Result<Self::Uow, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerUow { tx })
    }

    async fn create_account(&self, new: NewAccount) -> Result<AccountRecord, LedgerError> {
        let row: AccountRow = sqlx::query_as(
            r#"
            INSERT INTO accounts (user_id, type, currency)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, type, currency, status, created_at
            "#,
        )
        .bind(new.user_id)
        .bind(&new.account_type)
        .bind(&new.currency)
        .fetch_one(&self.pool)
        .await?;

        account_from_row(row)
    }

    async fn fetch_account(&self, id: Uuid) -> Result<Option<AccountRecord>, LedgerError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, type, currency, status, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn account_balance(&self, id: Uuid) -> Result<Balance, LedgerError> {
        let sum: Decimal = sqlx::query_scalar(BALANCE_SQL)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Balance::from_decimal(sum))
    }

    async fn account_entries(&self, id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, transaction_id, account_id, amount, direction, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}

/// One database transaction's worth of ledger work.
pub struct PgLedgerUow {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl LedgerUow for PgLedgerUow {
    async fn lock_account(&mut self, id: Uuid) -> Result<(), LedgerError> {
        let locked: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM accounts WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match locked {
            Some(_) => Ok(()),
            None => Err(LedgerError::AccountNotFound(id)),
        }
    }

    async fn insert_transaction(
        &mut self,
        kind: TransactionKind,
        amount: &Money,
        source: Option<Uuid>,
        destination: Option<Uuid>,
        description: &str,
    ) -> Result<Uuid, LedgerError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                amount, currency, kind, status,
                source_account_id, destination_account_id, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(amount.value())
        .bind(BASE_CURRENCY)
        .bind(kind.to_string())
        .bind(TransactionStatus::Pending.to_string())
        .bind(source)
        .bind(destination)
        .bind(description)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn insert_entry(
        &mut self,
        transaction_id: Uuid,
        account_id: Uuid,
        amount: &Money,
        direction: EntryDirection,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (transaction_id, account_id, amount, direction)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(transaction_id)
        .bind(account_id)
        .bind(amount.value())
        .bind(direction.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn derived_balance(&mut self, account_id: Uuid) -> Result<Balance, LedgerError> {
        let sum: Decimal = sqlx::query_scalar(BALANCE_SQL)
            .bind(account_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(Balance::from_decimal(sum))
    }

    async fn mark_completed(&mut self, transaction_id: Uuid) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            UPDATE transactions SET status = $1 WHERE id = $2
            "#,
        )
        .bind(TransactionStatus::Completed.to_string())
        .bind(transaction_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
