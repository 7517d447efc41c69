//! Chain node access for the ingestion pipeline.
//!
//! The pipeline only needs three things from a node: the head block, a
//! bounded log range query and a live log subscription. Those are captured by
//! the [`ChainNode`] trait; [`NodeConnector`] produces a fresh node handle
//! for each connection attempt.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     connect()     ┌──────────────────────┐
//! │   LifecycleManager   │ ────────────────▶ │    NodeConnector     │
//! └──────────────────────┘                   └──────────────────────┘
//!            │                                          │
//!            │ head_block / transfer_logs /             │ produces
//!            │ subscribe_transfer_logs                  ▼
//!            │                               ┌──────────────────────┐
//!            └─────────────────────────────▶ │      ChainNode       │
//!                                            └──────────────────────┘
//!                                                       │
//!                                          WebSocketProvider (Alloy)
//! ```
//!
//! Tests swap in an in-memory node through the same traits.

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::TrackerResult;
use crate::events::RawLog;

pub mod websocket;

pub use websocket::{WebSocketProvider, WsConnector};

/// Number and timestamp of the chain head at the time of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHead {
    /// Block number
    pub number: u64,
    /// Block timestamp (unix seconds)
    pub timestamp: u64,
}

/// Live stream of logs from a subscription.
///
/// An `Err` item, or the stream ending, means the transport is gone.
pub type LogStream = BoxStream<'static, TrackerResult<RawLog>>;

/// Connected chain node handle.
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Reads the current head block.
    async fn head_block(&self) -> TrackerResult<BlockHead>;

    /// Fetches `Transfer` logs of `contract` in `[from_block, to_block]`.
    async fn transfer_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> TrackerResult<Vec<RawLog>>;

    /// Opens a live subscription to `Transfer` logs of `contract`.
    async fn subscribe_transfer_logs(
        &self,
        contract: Address,
        topic: B256,
    ) -> TrackerResult<LogStream>;
}

/// Opens transport connections to a node.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Node handle produced by a successful connect.
    type Node: ChainNode;

    /// Opens one connection.
    async fn connect(&self) -> TrackerResult<Self::Node>;
}
