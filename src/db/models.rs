//! Transfer records and their database rows.
//!
//! [`TransferRecord`] is the domain entity produced by the decoder and
//! handed to the store. [`TransferEventRow`] is what the `transfer_events`
//! table hands back.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::codec::{is_valid_address, is_valid_tx_hash};
use crate::error::{TrackerError, TrackerResult};

/// One ownership transfer of a collection token.
///
/// Built by [`crate::events::decode_transfer`] and never mutated afterwards.
/// `tx_hash` is the natural key: at most one record per transaction is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Token identifier (full 256-bit range)
    pub token_id: U256,
    /// Previous owner, checksummed `0x` + 40 hex
    pub from_address: String,
    /// New owner, checksummed `0x` + 40 hex
    pub to_address: String,
    /// Transaction hash, `0x` + 64 hex
    pub tx_hash: String,
    /// Block the transfer was included in
    pub block_number: u64,
}

impl TransferRecord {
    /// Runs the field-level checks every record must pass before it is written.
    ///
    /// The block number must also fit the signed 64-bit INTEGER column; a value
    /// that would wrap negative is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ValidationError`] naming the first failing field.
    pub fn validate(&self) -> TrackerResult<()> {
        if !is_valid_address(&self.from_address) {
            return Err(TrackerError::validation(
                "fromAddress",
                self.from_address.clone(),
            ));
        }

        if !is_valid_address(&self.to_address) {
            return Err(TrackerError::validation("toAddress", self.to_address.clone()));
        }

        if !is_valid_tx_hash(&self.tx_hash) {
            return Err(TrackerError::validation("txHash", self.tx_hash.clone()));
        }

        self.block_number_column()?;

        Ok(())
    }

    /// The block number as stored in the signed 64-bit INTEGER column.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::ValidationError`] for `blockNumber` if the value
    /// would wrap negative.
    pub fn block_number_column(&self) -> TrackerResult<i64> {
        i64::try_from(self.block_number)
            .map_err(|_| TrackerError::validation("blockNumber", self.block_number.to_string()))
    }

    /// The transaction hash in its stored form: lowercase hex.
    ///
    /// Hex case carries no meaning, so `0xAB..` and `0xab..` name the same
    /// transaction and must collide on the natural key.
    #[must_use]
    pub fn tx_hash_key(&self) -> String {
        self.tx_hash.to_ascii_lowercase()
    }
}

/// Row of the `transfer_events` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferEventRow {
    /// Database-assigned unique identifier
    pub id: i64,
    /// Transaction hash (natural key)
    pub tx_hash: String,
    /// Token id as decimal TEXT (U256 precision)
    pub token_id: String,
    /// Previous owner
    pub from_address: String,
    /// New owner
    pub to_address: String,
    /// Block number
    pub block_number: i64,
    /// Unix timestamp when the row was written
    pub created_at: i64,
}

/// Result of a single insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written.
    Inserted,
    /// A record with the same transaction hash already exists.
    AlreadyIngested,
}
