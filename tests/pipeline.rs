//! End-to-end ingestion tests against a scripted node.
//!
//! The mock connector hands out nodes that serve a fixed head block and
//! backfill range, and a live stream fed from an mpsc channel owned by the
//! test. Connect and range-query failures can be scripted to exercise the
//! reconnect path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use bayc_transfer_indexer::db::{
    create_pool,
    models::{InsertOutcome, TransferRecord},
    repository::{Repository, TransferStore},
};
use bayc_transfer_indexer::error::{TrackerError, TrackerResult};
use bayc_transfer_indexer::events::{transfer_topic, RawLog, BAYC_CONTRACT};
use bayc_transfer_indexer::ingest::{LifecycleConfig, LifecycleManager};
use bayc_transfer_indexer::rpc::{BlockHead, ChainNode, LogStream, NodeConnector};
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const ALICE: Address = address!("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
const BOB: Address = address!("fB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");

type LiveSender = mpsc::UnboundedSender<TrackerResult<RawLog>>;
type LiveReceiver = mpsc::UnboundedReceiver<TrackerResult<RawLog>>;

fn transfer(tx_byte: u8, from: Address, to: Address, token_id: u64, block: u64) -> RawLog {
    RawLog {
        address: Some(BAYC_CONTRACT),
        topics: vec![
            transfer_topic(),
            B256::left_padding_from(from.as_slice()),
            B256::left_padding_from(to.as_slice()),
            B256::from(U256::from(token_id).to_be_bytes::<32>()),
        ],
        transaction_hash: Some(B256::repeat_byte(tx_byte)),
        block_number: Some(block),
    }
}

fn tx_hash(tx_byte: u8) -> String {
    format!("0x{}", alloy::hex::encode([tx_byte; 32]))
}

/// What the scripted node serves, shared by every connection.
struct Script {
    head: BlockHead,
    backfill: Vec<RawLog>,
    failing_connects: AtomicUsize,
    failing_backfills: AtomicUsize,
    connects: AtomicUsize,
    connect_times: Mutex<Vec<Instant>>,
    subscriptions: AtomicUsize,
    ranges: Mutex<Vec<(u64, u64)>>,
    live: Mutex<Vec<LiveReceiver>>,
}

impl Script {
    fn new(head: BlockHead, backfill: Vec<RawLog>, failing_connects: usize) -> Arc<Self> {
        Arc::new(Self {
            head,
            backfill,
            failing_connects: AtomicUsize::new(failing_connects),
            failing_backfills: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            connect_times: Mutex::new(Vec::new()),
            subscriptions: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
            live: Mutex::new(Vec::new()),
        })
    }

    /// Queues a live feed for the next subscription and returns its sender.
    fn push_live_feed(&self) -> LiveSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.live.lock().unwrap().push(rx);
        tx
    }
}

struct MockConnector(Arc<Script>);

struct MockNode(Arc<Script>);

#[async_trait]
impl NodeConnector for MockConnector {
    type Node = MockNode;

    async fn connect(&self) -> TrackerResult<MockNode> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        self.0.connect_times.lock().unwrap().push(Instant::now());
        let remaining = self.0.failing_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.failing_connects.store(remaining - 1, Ordering::SeqCst);
            return Err(TrackerError::websocket_connection("connection refused", None));
        }
        Ok(MockNode(Arc::clone(&self.0)))
    }
}

#[async_trait]
impl ChainNode for MockNode {
    async fn head_block(&self) -> TrackerResult<BlockHead> {
        Ok(self.0.head)
    }

    async fn transfer_logs(
        &self,
        _contract: Address,
        _topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> TrackerResult<Vec<RawLog>> {
        self.0.ranges.lock().unwrap().push((from_block, to_block));
        let remaining = self.0.failing_backfills.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.failing_backfills.store(remaining - 1, Ordering::SeqCst);
            return Err(TrackerError::rpc("eth_getLogs timed out", None));
        }
        Ok(self.0.backfill.clone())
    }

    async fn subscribe_transfer_logs(
        &self,
        _contract: Address,
        _topic: B256,
    ) -> TrackerResult<LogStream> {
        self.0.subscriptions.fetch_add(1, Ordering::SeqCst);
        let queued = {
            let mut live = self.0.live.lock().unwrap();
            if live.is_empty() {
                None
            } else {
                Some(live.remove(0))
            }
        };

        Ok(match queued {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed(),
            // No feed queued: a quiet but healthy subscription.
            None => stream::pending().boxed(),
        })
    }
}

/// Repository wrapper that counts insert attempts.
#[derive(Clone)]
struct CountingStore {
    inner: Repository,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl TransferStore for CountingStore {
    async fn insert_transfer(&self, record: &TransferRecord) -> Result<InsertOutcome, TrackerError> {
        let outcome = self.inner.insert_transfer(record).await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

/// Store that accepts everything without touching a database.
struct AcceptAllStore;

#[async_trait]
impl TransferStore for AcceptAllStore {
    async fn insert_transfer(&self, _record: &TransferRecord) -> Result<InsertOutcome, TrackerError> {
        Ok(InsertOutcome::Inserted)
    }
}

fn fast_config() -> LifecycleConfig {
    LifecycleConfig {
        backoff_initial: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
        ..LifecycleConfig::default()
    }
}

async fn wait_for<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn wait_for_count(repo: &Repository, expected: u64) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while repo.count_transfers().await.unwrap() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {expected} stored transfers");
}

#[tokio::test]
async fn test_backfill_then_live_stream_end_to_end() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite:{}", dir.path().join("transfers.db").display());
    let repo = Repository::new(create_pool(&url).await?);

    let script = Script::new(
        BlockHead {
            number: 1_000,
            timestamp: 1_700_000_000,
        },
        vec![
            transfer(0x01, Address::ZERO, ALICE, 1, 990),
            transfer(0x02, ALICE, BOB, 1, 995),
        ],
        0,
    );
    let live = script.push_live_feed();

    let attempts = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        inner: repo.clone(),
        attempts: Arc::clone(&attempts),
    };
    let streaming = Arc::new(AtomicBool::new(false));
    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), store, fast_config())
        .with_streaming_flag(Arc::clone(&streaming));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    wait_for("streaming", || streaming.load(Ordering::SeqCst)).await;

    // 24h at 15s per block reaches past genesis, so the window starts at 0.
    assert_eq!(*script.ranges.lock().unwrap(), vec![(0, 1_000)]);
    assert_eq!(repo.count_transfers().await?, 2);

    live.send(Ok(transfer(0x03, BOB, ALICE, 7_804, 1_001)))?;
    wait_for_count(&repo, 3).await;

    // Redelivery of an already stored transaction is absorbed by the store.
    live.send(Ok(transfer(0x03, BOB, ALICE, 7_804, 1_001)))?;
    wait_for("duplicate attempt", || attempts.load(Ordering::SeqCst) == 4).await;
    assert_eq!(repo.count_transfers().await?, 3);

    let history = repo.get_transfers_by_token("1").await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tx_hash, tx_hash(0x01));
    assert_eq!(history[0].from_address, Address::ZERO.to_checksum(None));
    assert_eq!(history[1].to_address, BOB.to_checksum(None));

    let live_row = repo
        .get_transfer_by_tx_hash(&tx_hash(0x03))
        .await?
        .ok_or_else(|| eyre::eyre!("live transfer missing"))?;
    assert_eq!(live_row.token_id, "7804");
    assert_eq!(live_row.block_number, 1_001);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    assert!(!streaming.load(Ordering::SeqCst));
    assert_eq!(script.connects.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_reconnects_after_connect_failures_and_stream_end() -> eyre::Result<()> {
    let repo = Repository::new(create_pool("sqlite::memory:").await?);

    let script = Script::new(
        BlockHead {
            number: 20_000,
            timestamp: 1_700_000_000,
        },
        vec![transfer(0x11, ALICE, BOB, 42, 19_999)],
        2,
    );
    let first_feed = script.push_live_feed();

    let streaming = Arc::new(AtomicBool::new(false));
    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), repo.clone(), fast_config())
        .with_streaming_flag(Arc::clone(&streaming));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    // Two refused connects, then a successful third attempt.
    wait_for("first stream", || streaming.load(Ordering::SeqCst)).await;
    assert_eq!(script.connects.load(Ordering::SeqCst), 3);
    assert_eq!(
        *script.ranges.lock().unwrap(),
        vec![(20_000 - 86_400 / 15, 20_000)]
    );

    // The live feed closing forces a full reconnect, backfill included.
    drop(first_feed);
    wait_for("second connect", || script.connects.load(Ordering::SeqCst) == 4).await;
    wait_for("second stream", || streaming.load(Ordering::SeqCst)).await;
    assert_eq!(script.ranges.lock().unwrap().len(), 2);

    // The repeated backfill found nothing new.
    assert_eq!(repo.count_transfers().await?, 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    assert!(!streaming.load(Ordering::SeqCst));

    Ok(())
}

#[tokio::test]
async fn test_stream_error_triggers_reconnect() -> eyre::Result<()> {
    let repo = Repository::new(create_pool("sqlite::memory:").await?);

    let script = Script::new(
        BlockHead {
            number: 100,
            timestamp: 1_700_000_000,
        },
        Vec::new(),
        0,
    );
    let feed = script.push_live_feed();

    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), repo.clone(), fast_config());
    let streaming = manager.streaming_flag();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    wait_for("stream", || streaming.load(Ordering::SeqCst)).await;

    // A malformed notification is skipped; the subscription stays up.
    let mut truncated = transfer(0x21, ALICE, BOB, 5, 101);
    truncated.topics.truncate(3);
    feed.send(Ok(truncated))?;
    feed.send(Ok(transfer(0x22, ALICE, BOB, 6, 101)))?;
    wait_for_count(&repo, 1).await;
    assert_eq!(script.connects.load(Ordering::SeqCst), 1);

    feed.send(Err(TrackerError::websocket_subscription("socket reset", None)))?;
    wait_for("reconnect", || script.connects.load(Ordering::SeqCst) == 2).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;

    Ok(())
}

#[tokio::test]
async fn test_cancel_during_backoff_stops_promptly() -> eyre::Result<()> {
    let repo = Repository::new(create_pool("sqlite::memory:").await?);
    let script = Script::new(
        BlockHead {
            number: 1,
            timestamp: 0,
        },
        Vec::new(),
        usize::MAX,
    );

    let config = LifecycleConfig {
        backoff_initial: Duration::from_secs(60),
        backoff_max: Duration::from_secs(60),
        ..LifecycleConfig::default()
    };
    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), repo, config);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    wait_for("first attempt", || script.connects.load(Ordering::SeqCst) == 1).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    assert_eq!(script.connects.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_malformed_backfill_log_never_reaches_streaming() -> eyre::Result<()> {
    let repo = Repository::new(create_pool("sqlite::memory:").await?);

    let mut truncated = transfer(0x32, ALICE, BOB, 2, 499);
    truncated.topics.truncate(2);
    let script = Script::new(
        BlockHead {
            number: 500,
            timestamp: 1_700_000_000,
        },
        vec![
            transfer(0x31, ALICE, BOB, 1, 498),
            truncated,
            transfer(0x33, ALICE, BOB, 3, 500),
        ],
        0,
    );

    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), repo.clone(), fast_config());
    let streaming = manager.streaming_flag();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    // Every cycle aborts in backfill and goes back to connecting.
    wait_for("repeated cycles", || script.connects.load(Ordering::SeqCst) >= 3).await;
    assert_eq!(script.subscriptions.load(Ordering::SeqCst), 0);
    assert!(!streaming.load(Ordering::SeqCst));

    // Only the log ahead of the malformed one was stored.
    assert_eq!(repo.count_transfers().await?, 1);
    assert!(repo.get_transfer_by_tx_hash(&tx_hash(0x33)).await?.is_none());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    assert_eq!(script.subscriptions.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_failed_range_query_is_retried_before_subscribing() -> eyre::Result<()> {
    let repo = Repository::new(create_pool("sqlite::memory:").await?);

    let script = Script::new(
        BlockHead {
            number: 10_000,
            timestamp: 1_700_000_000,
        },
        vec![transfer(0x41, ALICE, BOB, 9, 9_999)],
        0,
    );
    script.failing_backfills.store(2, Ordering::SeqCst);

    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), repo.clone(), fast_config());
    let streaming = manager.streaming_flag();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    wait_for("stream", || streaming.load(Ordering::SeqCst)).await;
    assert_eq!(script.connects.load(Ordering::SeqCst), 3);
    assert_eq!(script.ranges.lock().unwrap().len(), 3);
    assert_eq!(script.subscriptions.load(Ordering::SeqCst), 1);
    assert_eq!(repo.count_transfers().await?, 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_backoff_resets_after_reaching_streaming() -> eyre::Result<()> {
    let script = Script::new(
        BlockHead {
            number: 100,
            timestamp: 1_700_000_000,
        },
        Vec::new(),
        3,
    );
    // The first successful subscription closes at once; the next one stays quiet.
    drop(script.push_live_feed());

    let config = LifecycleConfig {
        backoff_initial: Duration::from_millis(100),
        backoff_max: Duration::from_secs(10),
        ..LifecycleConfig::default()
    };
    let manager = LifecycleManager::new(MockConnector(Arc::clone(&script)), AcceptAllStore, config);
    let streaming = manager.streaming_flag();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(manager.run(cancel.clone()));

    wait_for("fifth connect", || script.connects.load(Ordering::SeqCst) == 5).await;
    wait_for("second stream", || streaming.load(Ordering::SeqCst)).await;

    let times = script.connect_times.lock().unwrap().clone();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let expected = [
        Duration::from_millis(150),
        Duration::from_millis(225),
        Duration::from_micros(337_500),
        // Back to the first step instead of 506.25ms.
        Duration::from_millis(150),
    ];
    assert_eq!(gaps.len(), expected.len());
    for (gap, want) in gaps.iter().zip(expected) {
        let diff = if *gap > want { *gap - want } else { want - *gap };
        assert!(diff <= Duration::from_millis(1), "gap {gap:?}, expected {want:?}");
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;

    Ok(())
}
