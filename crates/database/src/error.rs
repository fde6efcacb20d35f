use ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load configuration for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("A stored row could not be mapped: {0}")]
    MappingError(String),
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}
