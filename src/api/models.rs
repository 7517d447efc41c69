//! API request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::TransferEventRow;

/// One stored transfer of a token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferEventResponse {
    /// Database-assigned identifier
    pub id: i64,
    /// Token id (decimal)
    #[schema(example = "7804")]
    pub token_id: String,
    /// Previous owner (checksummed)
    pub from_address: String,
    /// New owner (checksummed)
    pub to_address: String,
    /// Transaction hash
    pub tx_hash: String,
    /// Block the transfer was included in
    pub block_number: u64,
    /// When the transfer was ingested (ISO 8601)
    pub ingested_at: DateTime<Utc>,
}

impl From<TransferEventRow> for TransferEventResponse {
    fn from(row: TransferEventRow) -> Self {
        Self {
            id: row.id,
            token_id: row.token_id,
            from_address: row.from_address,
            to_address: row.to_address,
            tx_hash: row.tx_hash,
            block_number: u64::try_from(row.block_number).unwrap_or_default(),
            ingested_at: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Application version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Database status
    pub database_status: HealthStatus,
    /// Whether the ingester is currently streaming live events
    pub ingester_streaming: bool,
    /// Number of stored transfers
    pub total_transfers: u64,
    /// Highest block among stored transfers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_block: Option<u64>,
}

/// Health status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All services healthy
    Healthy,
    /// Partial degradation
    Degraded,
    /// Unhealthy state
    Unhealthy,
}

/// Error response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Optional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
