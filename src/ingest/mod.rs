//! Transfer ingestion pipeline.
//!
//! ```text
//! LifecycleManager ──connect──▶ Session ──▶ backfill::run_backfill ──┐
//!        ▲                         │                                 ├──▶ decode_transfer ──▶ TransferStore
//!        │                         └──▶ subscription::process_stream ┘
//!        └──────────── transport error / stream end (backoff) ───────┘
//! ```
//!
//! - [`backfill`]: one bounded range query over the lookback window
//! - [`subscription`]: the live log stream, record by record
//! - [`lifecycle`]: connection state machine with reconnect backoff
//!
//! Storage goes through [`TransferStore`]; deduplication by transaction hash
//! happens there, so backfill and live records may overlap freely.

use alloy::primitives::{Address, B256};
use tracing::{debug, warn};

use crate::db::models::{InsertOutcome, TransferRecord};
use crate::db::repository::TransferStore;
use crate::events::{decode_transfer, transfer_topic, RawLog};
use crate::error::TrackerResult;
use crate::rpc::ChainNode;

pub mod backfill;
pub mod lifecycle;
pub mod subscription;

pub use backfill::{estimate_start_block, run_backfill, BackfillReport};
pub use lifecycle::{Backoff, ConnectionState, LifecycleConfig, LifecycleManager};
pub use subscription::{process_stream, StreamStats};

/// Everything one connection needs, built once per successful connect.
///
/// Immutable for its whole life; a reconnect builds a new one.
pub struct Session<N> {
    node: N,
    contract: Address,
    topic: B256,
}

impl<N: ChainNode> Session<N> {
    /// Binds a connected node to the contract, computing the event topic.
    #[must_use]
    pub fn new(node: N, contract: Address) -> Self {
        Self {
            node,
            contract,
            topic: transfer_topic(),
        }
    }

    /// The connected node.
    pub const fn node(&self) -> &N {
        &self.node
    }

    /// The indexed contract.
    pub const fn contract(&self) -> Address {
        self.contract
    }

    /// The `Transfer` topic signature.
    pub const fn topic(&self) -> B256 {
        self.topic
    }
}

/// How a single log fared on its way to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    /// Written as a new row
    Stored,
    /// Its transaction hash was already stored
    Duplicate,
    /// The store rejected or failed the write; already logged
    Failed,
}

/// Persists an already-decoded record, folding store errors into [`LogOutcome::Failed`].
///
/// Store failures never stop ingestion; they are logged here and the
/// record is dropped.
pub(crate) async fn persist<S>(store: &S, record: &TransferRecord) -> LogOutcome
where
    S: TransferStore + ?Sized,
{
    match store.insert_transfer(record).await {
        Ok(InsertOutcome::Inserted) => {
            debug!(
                tx_hash = %record.tx_hash,
                token_id = %record.token_id,
                from = %record.from_address,
                to = %record.to_address,
                block = record.block_number,
                "Recorded transfer"
            );
            LogOutcome::Stored
        }
        Ok(InsertOutcome::AlreadyIngested) => {
            debug!(tx_hash = %record.tx_hash, "Transfer already ingested, skipping");
            LogOutcome::Duplicate
        }
        Err(e) => {
            warn!(error = %e, tx_hash = %record.tx_hash, "Failed to store transfer");
            LogOutcome::Failed
        }
    }
}

/// Decodes `log` and persists it.
///
/// # Errors
///
/// Returns the decoding or validation error if the log is malformed. Store
/// failures are not errors here; see [`LogOutcome::Failed`].
pub async fn ingest_log<S>(store: &S, log: &RawLog, topic: B256) -> TrackerResult<LogOutcome>
where
    S: TransferStore + ?Sized,
{
    let record = decode_transfer(log, topic)?;
    Ok(persist(store, &record).await)
}
