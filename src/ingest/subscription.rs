//! Live subscription processing.
//!
//! Logs are handled strictly in arrival order, one at a time. A bad record
//! (decode, validation or store failure) is logged and skipped; only the
//! transport going away ends processing.

use alloy::primitives::B256;
use futures_util::stream::StreamExt;
use tracing::{debug, info, warn};

use super::{ingest_log, LogOutcome};
use crate::db::repository::TransferStore;
use crate::error::TrackerError;
use crate::rpc::LogStream;

/// Running counters for one subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Notifications received
    pub received: u64,
    /// Newly stored records
    pub stored: u64,
    /// Records whose transaction hash was already stored
    pub duplicates: u64,
    /// Logs that failed to decode or validate
    pub rejected: u64,
    /// Records the store failed to write
    pub failed: u64,
}

/// Consumes `stream` until the transport ends or errors.
///
/// `stats` is updated as each notification is handled, so the caller can
/// observe progress even though this only returns on failure.
///
/// Returns the transport error that ended the stream. A stream that simply
/// runs dry is reported as [`TrackerError::WebSocketDisconnected`].
pub async fn process_stream<S>(
    mut stream: LogStream,
    store: &S,
    topic: B256,
    stats: &mut StreamStats,
) -> TrackerError
where
    S: TransferStore + ?Sized,
{
    info!("Listening for new Transfer events");

    while let Some(item) = stream.next().await {
        let log = match item {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, received = stats.received, "Subscription stream failed");
                return e;
            }
        };

        stats.received += 1;
        debug!(
            tx_hash = ?log.transaction_hash,
            block = ?log.block_number,
            "Transfer notification received"
        );

        match ingest_log(store, &log, topic).await {
            Ok(LogOutcome::Stored) => stats.stored += 1,
            Ok(LogOutcome::Duplicate) => stats.duplicates += 1,
            Ok(LogOutcome::Failed) => stats.failed += 1,
            Err(e) => {
                stats.rejected += 1;
                warn!(
                    error = %e,
                    tx_hash = ?log.transaction_hash,
                    "Discarding malformed Transfer log"
                );
            }
        }
    }

    info!(
        received = stats.received,
        stored = stats.stored,
        "Subscription stream ended"
    );
    TrackerError::websocket_disconnected("Subscription stream ended")
}
