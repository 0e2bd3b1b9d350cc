//! Database module
//!
//! Database connectivity and schema bootstrap.

use sqlx::{Executor, PgPool};

/// Schema applied at startup. Every statement is IF NOT EXISTS, so running
/// it against an already-initialized database is a no-op.
const SCHEMA_SQL: &str = include_str!("../migrations/001_init.sql");

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Apply the schema. Executed as a raw script so the file can hold multiple
/// statements.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(SCHEMA_SQL).await?;

    Ok(())
}
