mod db;
mod errors;

pub mod orders;

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

pub const DEFAULT_SQLITE_DB_URL: &str = "sqlite://data/bank_payments.db";

/// Opens a connection pool, creating the database file if it does not exist yet.
///
/// Concurrent webhook deliveries write from several connections at once, so writers wait on the database lock for a
/// while instead of failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections.max(1)).connect_with(options).await?;
    Ok(pool)
}
