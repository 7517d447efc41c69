//! Database module for persistent storage of transfer events.
//!
//! This module provides SQLite-based storage for the ingested `Transfer`
//! events of the collection.
//!
//! # Architecture
//!
//! - `models`: Domain record and table row types
//! - `repository`: Insert-if-absent and per-token queries
//! - Connection pooling with SQLite WAL mode for concurrent API reads
//! - Migration system for schema versioning

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::TrackerError;

pub mod models;
pub mod repository;

/// Creates a SQLite connection pool and brings the schema up to date.
///
/// # Configuration
///
/// - **WAL mode**: Enables concurrent readers during writes
/// - **Busy timeout**: 30 seconds to handle lock contention
/// - **Max connections**: 5, or 1 for `:memory:` databases (each connection
///   would otherwise see its own empty database)
///
/// # Example
///
/// ```no_run
/// use bayc_transfer_indexer::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./transfers.db").await?;
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// Returns a database error if the URL is malformed, the connection fails,
/// or migrations cannot be applied.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, TrackerError> {
    info!(database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            TrackerError::database(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            TrackerError::database(
                format!("Failed to connect to database at {database_url}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

/// Runs database migrations to ensure schema is up-to-date.
///
/// Migrations are embedded from the `migrations/` directory and are
/// idempotent (safe to run multiple times).
///
/// # Errors
///
/// Returns a database error if a migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), TrackerError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            TrackerError::database(
                "Failed to run database migrations".to_string(),
                Some(Box::new(e)),
            )
        })?;

    Ok(())
}

/// Verify that the `transfer_events` table exists after migrations.
///
/// # Errors
///
/// Returns a database error if the schema is missing.
pub async fn verify_database(pool: &SqlitePool) -> Result<(), TrackerError> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT name FROM sqlite_master
        WHERE type='table' AND name = 'transfer_events'
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        TrackerError::database("Failed to verify database schema".to_string(), Some(Box::new(e)))
    })?;

    if rows.is_empty() {
        return Err(TrackerError::database(
            "Database schema incomplete: transfer_events table missing".to_string(),
            None,
        ));
    }

    Ok(())
}
