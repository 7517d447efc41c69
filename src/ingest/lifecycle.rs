//! Connection lifecycle: connect, backfill, subscribe, stream, retry.
//!
//! # State machine
//!
//! ```text
//!              ┌──────────────┐
//!   ┌────────▶ │ Disconnected │ ◀──────────── any failure ───────────┐
//!   │          └──────┬───────┘                                      │
//!   │ backoff         ▼                                              │
//!   │          ┌──────────────┐   ┌─────────────┐   ┌─────────────┐  │
//!   └───────── │  Connecting  │──▶│ Backfilling │──▶│ Subscribing │──┤
//!              └──────────────┘   └─────────────┘   └──────┬──────┘  │
//!                                                          ▼         │
//!                                                   ┌─────────────┐  │
//!                                                   │  Streaming  │──┘
//!                                                   └─────────────┘
//! ```
//!
//! The reconnect delay grows by 1.5x after every failed cycle up to a
//! ceiling and goes back to its initial value once a cycle reaches
//! `Streaming`. There is no retry limit; the loop only stops when its
//! [`CancellationToken`] fires.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::backfill::{run_backfill, DEFAULT_BLOCK_TIME_SECS, DEFAULT_LOOKBACK_SECS};
use super::subscription::{process_stream, StreamStats};
use super::Session;
use crate::config::Config;
use crate::db::repository::TransferStore;
use crate::error::TrackerResult;
use crate::events::BAYC_CONTRACT;
use crate::rpc::{ChainNode, NodeConnector};

/// Growth factor applied to the delay after each failed cycle.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Where the manager currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; waiting out the backoff delay
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Running the historical gap-fill
    Backfilling,
    /// Opening the live log subscription
    Subscribing,
    /// Processing live notifications
    Streaming,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Backfilling => "backfilling",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Reconnect delay, owned by the manager's loop.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bayc_transfer_indexer::ingest::Backoff;
///
/// let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
/// assert_eq!(backoff.record_failure(), Duration::from_millis(1500));
/// assert_eq!(backoff.record_failure(), Duration::from_millis(2250));
///
/// backoff.reset();
/// assert_eq!(backoff.current(), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
}

impl Backoff {
    /// Creates a backoff starting at `initial` and never exceeding `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
            failures: 0,
        }
    }

    /// Current delay.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Grows the delay after a failed cycle and returns the wait before the next attempt.
    ///
    /// After `k` consecutive failures this is `min(initial * 1.5^k, max)`.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.mul_f64(BACKOFF_MULTIPLIER).min(self.max);
        self.current
    }

    /// Returns to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.failures = 0;
    }
}

/// Settings for a [`LifecycleManager`].
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Collection contract
    pub contract: Address,
    /// Backfill window in seconds
    pub lookback_secs: u64,
    /// Average block interval for the backfill estimate
    pub block_time_secs: u64,
    /// First reconnect delay
    pub backoff_initial: Duration,
    /// Reconnect delay ceiling
    pub backoff_max: Duration,
}

impl LifecycleConfig {
    /// Picks the ingestion settings out of the process configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            contract: config.contract_address(),
            lookback_secs: config.backfill_lookback_secs(),
            block_time_secs: config.block_time_secs(),
            backoff_initial: config.backoff_initial(),
            backoff_max: config.backoff_max(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            contract: BAYC_CONTRACT,
            lookback_secs: DEFAULT_LOOKBACK_SECS,
            block_time_secs: DEFAULT_BLOCK_TIME_SECS,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// Drives the ingestion pipeline forever, reconnecting with backoff.
///
/// # Example
///
/// ```no_run
/// use bayc_transfer_indexer::db::{create_pool, repository::Repository};
/// use bayc_transfer_indexer::ingest::{LifecycleConfig, LifecycleManager};
/// use bayc_transfer_indexer::rpc::WsConnector;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let repo = Repository::new(create_pool("sqlite:./transfers.db").await?);
///     let connector = WsConnector::new("wss://mainnet.infura.io/ws/v3/YOUR_KEY".to_string());
///
///     let cancel = CancellationToken::new();
///     LifecycleManager::new(connector, repo, LifecycleConfig::default())
///         .run(cancel)
///         .await;
///     Ok(())
/// }
/// ```
pub struct LifecycleManager<C, S> {
    connector: C,
    store: S,
    config: LifecycleConfig,
    state: ConnectionState,
    streaming: Arc<AtomicBool>,
}

impl<C, S> LifecycleManager<C, S>
where
    C: NodeConnector,
    S: TransferStore,
{
    /// Creates a manager in the `Disconnected` state.
    pub fn new(connector: C, store: S, config: LifecycleConfig) -> Self {
        Self {
            connector,
            store,
            config,
            state: ConnectionState::Disconnected,
            streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares `flag` as the "currently streaming" indicator.
    #[must_use]
    pub fn with_streaming_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.streaming = flag;
        self
    }

    /// Flag that is `true` exactly while the manager is in `Streaming`.
    #[must_use]
    pub fn streaming_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.streaming)
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs until `cancel` fires.
    ///
    /// Cancellation is checked while connecting, backfilling, streaming
    /// and sleeping out the backoff.
    #[instrument(skip_all, name = "lifecycle", fields(contract = %self.config.contract))]
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.config.backoff_initial, self.config.backoff_max);
        info!("Starting Transfer ingestion");

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.run_cycle(&mut backoff) => result,
            };

            let error = match result {
                Ok(never) => match never {},
                Err(error) => error,
            };

            self.transition(ConnectionState::Disconnected);
            let delay = backoff.record_failure();
            if error.is_transport() {
                warn!(
                    error = %error,
                    attempt = backoff.failures(),
                    delay_ms = delay.as_millis(),
                    "Connection cycle failed, retrying after backoff"
                );
            } else {
                error!(
                    error = %error,
                    attempt = backoff.failures(),
                    delay_ms = delay.as_millis(),
                    "Ingestion aborted, retrying after backoff"
                );
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(ConnectionState::Disconnected);
        info!("Transfer ingestion stopped");
    }

    /// One connect → backfill → subscribe → stream pass. Only ever returns an error.
    async fn run_cycle(&mut self, backoff: &mut Backoff) -> TrackerResult<Infallible> {
        self.transition(ConnectionState::Connecting);
        let node = self.connector.connect().await?;

        self.transition(ConnectionState::Backfilling);
        let session = Session::new(node, self.config.contract);
        run_backfill(
            &session,
            &self.store,
            self.config.lookback_secs,
            self.config.block_time_secs,
        )
        .await?;

        self.transition(ConnectionState::Subscribing);
        let stream = session
            .node()
            .subscribe_transfer_logs(session.contract(), session.topic())
            .await?;

        self.transition(ConnectionState::Streaming);
        backoff.reset();

        let mut stats = StreamStats::default();
        let error = process_stream(stream, &self.store, session.topic(), &mut stats).await;
        info!(
            received = stats.received,
            stored = stats.stored,
            duplicates = stats.duplicates,
            rejected = stats.rejected,
            failed = stats.failed,
            "Subscription closed"
        );

        Err(error)
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
        }
        self.streaming
            .store(next == ConnectionState::Streaming, Ordering::SeqCst);
    }
}

impl<C, S> fmt::Debug for LifecycleManager<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Duration, expected_secs: f64) {
        let diff = (actual.as_secs_f64() - expected_secs).abs();
        assert!(
            diff < 1e-6,
            "expected {expected_secs}s, got {}s",
            actual.as_secs_f64()
        );
    }

    #[test]
    fn test_backoff_growth_matches_closed_form() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));

        for k in 1..=12 {
            let delay = backoff.record_failure();
            let expected = 1.5f64.powi(k).min(30.0);
            assert_close(delay, expected);
        }
        assert_eq!(backoff.failures(), 12);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..50 {
            backoff.record_failure();
        }
        assert_eq!(backoff.current(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(100));
        backoff.record_failure();
        backoff.record_failure();
        backoff.reset();

        assert_eq!(backoff.current(), Duration::from_millis(10));
        assert_eq!(backoff.failures(), 0);
        assert_close(backoff.record_failure(), 0.015);
    }

    #[test]
    fn test_backoff_initial_clamped_to_max() {
        let backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(backoff.current(), Duration::from_secs(30));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Streaming.to_string(), "streaming");
    }

    #[test]
    fn test_lifecycle_config_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.contract, BAYC_CONTRACT);
        assert_eq!(config.lookback_secs, 86_400);
        assert_eq!(config.block_time_secs, 15);
        assert_eq!(config.backoff_initial, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(30));
    }
}
