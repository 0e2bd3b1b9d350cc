//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the test database and make sure the schema exists.
///
/// Returns `None` when `DATABASE_URL` is unset so database-backed tests can
/// skip instead of fail; the engine's behavior is covered without a database
/// by the in-memory store tests.
///
/// Tests share one database, so every test works against accounts it created
/// itself and never asserts on global table state.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping database-backed test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    ledger_api::db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");

    Some(pool)
}
