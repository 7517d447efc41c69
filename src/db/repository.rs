//! Repository pattern for database operations.
//!
//! Provides the insert-if-absent write path used by the ingester and the
//! read queries used by the API. The [`TransferStore`] trait is the seam the
//! ingestion pipeline writes through.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{InsertOutcome, TransferEventRow, TransferRecord};
use crate::error::TrackerError;

/// Write side of the store as seen by the ingestion pipeline.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Attempts a single insert of `record`.
    ///
    /// A natural-key collision is reported as [`InsertOutcome::AlreadyIngested`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record fails its field checks, or a
    /// database error if the write itself fails.
    async fn insert_transfer(&self, record: &TransferRecord)
        -> Result<InsertOutcome, TrackerError>;
}

/// Repository for database operations.
///
/// Wraps a SQLite connection pool and provides type-safe methods
/// for all database interactions.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Creates a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a transfer unless one with the same transaction hash exists.
    ///
    /// The record is validated again here before it touches the table.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use alloy::primitives::U256;
    /// use bayc_transfer_indexer::db::{create_pool, models::TransferRecord, repository::Repository};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let pool = create_pool("sqlite:./transfers.db").await?;
    ///     let repo = Repository::new(pool);
    ///
    ///     let outcome = repo.insert_transfer(&TransferRecord {
    ///         token_id: U256::from(7u64),
    ///         from_address: "0x0000000000000000000000000000000000000000".to_string(),
    ///         to_address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
    ///         tx_hash: format!("0x{}", "ab".repeat(32)),
    ///         block_number: 19_000_000,
    ///     }).await?;
    ///     println!("{outcome:?}");
    ///     Ok(())
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed record or a database error
    /// if the insert fails.
    #[instrument(skip(self, record), fields(tx_hash = %record.tx_hash, token_id = %record.token_id))]
    pub async fn insert_transfer(
        &self,
        record: &TransferRecord,
    ) -> Result<InsertOutcome, TrackerError> {
        record.validate()?;
        let block_number = record.block_number_column()?;
        let tx_hash = record.tx_hash_key();

        let result = sqlx::query(
            r#"
            INSERT INTO transfer_events (
                tx_hash, token_id, from_address, to_address, block_number, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (tx_hash) DO NOTHING
            "#,
        )
        .bind(&tx_hash)
        .bind(record.token_id.to_string())
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(block_number)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            TrackerError::database(
                format!("Failed to insert transfer {tx_hash}"),
                Some(Box::new(e)),
            )
        })?;

        if result.rows_affected() == 0 {
            debug!("Transfer already ingested");
            Ok(InsertOutcome::AlreadyIngested)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Returns every stored transfer of `token_id` (decimal text), oldest block first.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn get_transfers_by_token(
        &self,
        token_id: &str,
    ) -> Result<Vec<TransferEventRow>, TrackerError> {
        let rows = sqlx::query_as::<_, TransferEventRow>(
            r#"
            SELECT id, tx_hash, token_id, from_address, to_address, block_number, created_at
            FROM transfer_events
            WHERE token_id = ?
            ORDER BY block_number ASC, id ASC
            "#,
        )
        .bind(token_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            TrackerError::database(
                format!("Failed to query transfers for token {token_id}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(rows)
    }

    /// Looks up a transfer by its transaction hash, in either hex case.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn get_transfer_by_tx_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransferEventRow>, TrackerError> {
        let row = sqlx::query_as::<_, TransferEventRow>(
            r#"
            SELECT id, tx_hash, token_id, from_address, to_address, block_number, created_at
            FROM transfer_events
            WHERE tx_hash = ?
            "#,
        )
        .bind(tx_hash.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            TrackerError::database(
                "Failed to query transfer by hash".to_string(),
                Some(Box::new(e)),
            )
        })?;

        Ok(row)
    }

    /// Total number of stored transfers.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn count_transfers(&self) -> Result<u64, TrackerError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transfer_events")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                TrackerError::database("Failed to count transfers".to_string(), Some(Box::new(e)))
            })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Highest block number among stored transfers, if any.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn latest_block(&self) -> Result<Option<u64>, TrackerError> {
        let (block,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(block_number) FROM transfer_events")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    TrackerError::database(
                        "Failed to query latest block".to_string(),
                        Some(Box::new(e)),
                    )
                })?;

        Ok(block.and_then(|b| u64::try_from(b).ok()))
    }

    /// Health check for database connectivity.
    ///
    /// # Errors
    ///
    /// Returns a database error if the database is unreachable.
    pub async fn health_check(&self) -> Result<(), TrackerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TrackerError::database(
                    "Database health check failed".to_string(),
                    Some(Box::new(e)),
                )
            })?;

        Ok(())
    }
}

#[async_trait]
impl TransferStore for Repository {
    async fn insert_transfer(
        &self,
        record: &TransferRecord,
    ) -> Result<InsertOutcome, TrackerError> {
        Self::insert_transfer(self, record).await
    }
}
