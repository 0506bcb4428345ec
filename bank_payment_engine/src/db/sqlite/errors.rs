use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Cannot insert duplicate order #{0}")]
    DuplicateOrder(OrderId),
}
