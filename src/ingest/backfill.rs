//! Historical gap-fill before the live subscription starts.
//!
//! The start block is estimated from a fixed average block interval rather
//! than looked up by timestamp, so the window is approximate. Overlap with
//! the live feed is harmless because the store deduplicates by transaction
//! hash.

use std::time::Instant;

use tracing::{info, instrument, warn};

use super::{persist, LogOutcome, Session};
use crate::db::repository::TransferStore;
use crate::error::TrackerResult;
use crate::events::decode_transfer;
use crate::rpc::ChainNode;

/// Default backfill window: 24 hours.
pub const DEFAULT_LOOKBACK_SECS: u64 = 24 * 60 * 60;

/// Default average block interval estimate.
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 15;

/// Summary of one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// First block queried (inclusive)
    pub from_block: u64,
    /// Head block at query time (inclusive)
    pub to_block: u64,
    /// Logs returned by the node
    pub fetched: usize,
    /// Newly stored records
    pub stored: usize,
    /// Records whose transaction hash was already stored
    pub duplicates: usize,
    /// Records the store failed to write
    pub failed: usize,
}

/// Estimates the first block of the lookback window.
///
/// `head - lookback / block_time`, saturating at block 0. A zero
/// `block_time_secs` is treated as one second.
#[must_use]
pub const fn estimate_start_block(head: u64, lookback_secs: u64, block_time_secs: u64) -> u64 {
    let block_time = if block_time_secs == 0 { 1 } else { block_time_secs };
    head.saturating_sub(lookback_secs / block_time)
}

/// Fetches and stores every `Transfer` log in the lookback window.
///
/// Records are processed in the order the node returned them.
///
/// # Errors
///
/// Any head-block or log-query failure, or any log that fails to decode,
/// aborts the run. Store failures are logged and counted in
/// [`BackfillReport::failed`] instead.
#[instrument(skip_all, fields(contract = %session.contract()))]
pub async fn run_backfill<N, S>(
    session: &Session<N>,
    store: &S,
    lookback_secs: u64,
    block_time_secs: u64,
) -> TrackerResult<BackfillReport>
where
    N: ChainNode,
    S: TransferStore + ?Sized,
{
    let started = Instant::now();
    let head = session.node().head_block().await?;
    let from_block = estimate_start_block(head.number, lookback_secs, block_time_secs);

    info!(
        from_block,
        to_block = head.number,
        head_timestamp = head.timestamp,
        "Backfilling Transfer events"
    );

    let logs = session
        .node()
        .transfer_logs(session.contract(), session.topic(), from_block, head.number)
        .await?;

    let mut report = BackfillReport {
        from_block,
        to_block: head.number,
        fetched: logs.len(),
        ..BackfillReport::default()
    };

    for log in &logs {
        let record = match decode_transfer(log, session.topic()) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, tx_hash = ?log.transaction_hash, "Backfill log failed to decode");
                return Err(e);
            }
        };

        match persist(store, &record).await {
            LogOutcome::Stored => report.stored += 1,
            LogOutcome::Duplicate => report.duplicates += 1,
            LogOutcome::Failed => report.failed += 1,
        }
    }

    info!(
        fetched = report.fetched,
        stored = report.stored,
        duplicates = report.duplicates,
        failed = report.failed,
        duration_ms = started.elapsed().as_millis(),
        "Backfill complete"
    );

    Ok(report)
}
