//! WebSocket-backed chain node.
//!
//! One [`WebSocketProvider`] wraps one Alloy pubsub connection and serves all
//! three node operations over it: the head block and the backfill range query
//! go out as ordinary requests, the live feed as an `eth_subscribe("logs")`.
//!
//! Reconnection is not handled here. When the socket drops, the log stream
//! ends and the lifecycle manager opens a new connection through
//! [`WsConnector`].

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{Address, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::BlockTransactionsKind,
    transports::BoxTransport,
};
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use tracing::{debug, error, info, instrument};

use super::{BlockHead, ChainNode, LogStream, NodeConnector};
use crate::error::{TrackerError, TrackerResult};
use crate::events::{create_transfer_filter, create_transfer_subscription_filter, RawLog};

/// Strips the path (which usually carries the API key) from an endpoint URL.
fn redact_host(url: &str) -> &str {
    let after_scheme = url.find("://").map_or(0, |i| i + 3);
    url[after_scheme..]
        .find('/')
        .map_or(url, |i| &url[..after_scheme + i])
}

/// Chain node reached over a single WebSocket connection.
///
/// # Example
///
/// ```no_run
/// use bayc_transfer_indexer::rpc::{ChainNode, WebSocketProvider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let node = WebSocketProvider::connect("wss://mainnet.infura.io/ws/v3/YOUR_KEY").await?;
///     let head = node.head_block().await?;
///     println!("Head block: {}", head.number);
///     Ok(())
/// }
/// ```
pub struct WebSocketProvider {
    provider: RootProvider<BoxTransport>,
    host: String,
}

impl WebSocketProvider {
    /// Connects to a WebSocket RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::WebSocketConnectionError`] if the URL is
    /// invalid or the handshake fails.
    #[instrument(skip(ws_url), fields(ws_host = tracing::field::Empty, duration_ms = tracing::field::Empty))]
    pub async fn connect(ws_url: &str) -> TrackerResult<Self> {
        let host = redact_host(ws_url);
        tracing::Span::current().record("ws_host", host);

        info!(ws_host = host, "Connecting to WebSocket");
        let start = std::time::Instant::now();

        let provider = ProviderBuilder::new()
            .on_builtin(ws_url)
            .await
            .map_err(|e| {
                error!(error = %e, ws_host = host, "WebSocket connection failed");
                TrackerError::websocket_connection(
                    format!("Failed to connect to {host}"),
                    Some(Box::new(e)),
                )
            })?;

        let duration = start.elapsed();
        tracing::Span::current().record("duration_ms", duration.as_millis() as u64);
        info!(
            ws_host = host,
            duration_ms = duration.as_millis(),
            "WebSocket connected"
        );

        Ok(Self {
            provider,
            host: host.to_string(),
        })
    }

    /// Endpoint host, without the path.
    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl ChainNode for WebSocketProvider {
    #[instrument(skip(self))]
    async fn head_block(&self) -> TrackerResult<BlockHead> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest, BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| TrackerError::rpc("Failed to fetch head block", Some(Box::new(e))))?
            .ok_or_else(|| TrackerError::rpc("Node returned no head block", None))?;

        let head = BlockHead {
            number: block.header.number,
            timestamp: block.header.timestamp,
        };
        debug!(block = head.number, timestamp = head.timestamp, "Head block fetched");

        Ok(head)
    }

    #[instrument(skip(self, topic))]
    async fn transfer_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> TrackerResult<Vec<RawLog>> {
        let filter = create_transfer_filter(contract, topic, from_block, to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            TrackerError::rpc(
                format!("Failed to fetch Transfer logs for blocks {from_block}..={to_block}"),
                Some(Box::new(e)),
            )
        })?;

        debug!(count = logs.len(), "Fetched Transfer logs");
        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    #[instrument(skip(self, topic))]
    async fn subscribe_transfer_logs(
        &self,
        contract: Address,
        topic: B256,
    ) -> TrackerResult<LogStream> {
        let filter = create_transfer_subscription_filter(contract, topic);

        let subscription = self.provider.subscribe_logs(&filter).await.map_err(|e| {
            error!(error = %e, "Log subscription failed");
            TrackerError::websocket_subscription(
                "Failed to subscribe to Transfer logs",
                Some(Box::new(e)),
            )
        })?;

        info!("Transfer log subscription active");
        Ok(subscription
            .into_stream()
            .map(|log| Ok(RawLog::from(log)))
            .boxed())
    }
}

/// Opens a new [`WebSocketProvider`] on every connect.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for `url`.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl NodeConnector for WsConnector {
    type Node = WebSocketProvider;

    async fn connect(&self) -> TrackerResult<Self::Node> {
        WebSocketProvider::connect(&self.url).await
    }
}
