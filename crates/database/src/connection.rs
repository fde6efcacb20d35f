use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL database.
///
/// The URL comes from `database.url` in the configuration, which itself falls
/// back to `DATABASE_URL`. The pool can be shared across the entire
/// application; `DbRepository` clones are cheap handles onto it.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let database_url = settings.url.as_deref().ok_or_else(|| {
        DbError::ConnectionConfigError("database.url or DATABASE_URL must be set.".to_string())
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = settings.max_connections, "Connected to the ledger database.");
    Ok(pool)
}

/// Applies the embedded migrations under `./migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
