//! # NFT Transfer Indexer
//!
//! Ingests `Transfer(address,address,uint256)` events of one NFT collection
//! (Bored Ape Yacht Club by default) from an Ethereum node over WebSocket,
//! using [Alloy](https://github.com/alloy-rs/alloy), stores them in SQLite
//! and serves each token's transfer history over HTTP.
//!
//! ## Features
//!
//! - **Type-safe event decoding** of the indexed `from`/`to`/`tokenId` topics
//! - **Gap-filling backfill** over a configurable lookback window on every connect
//! - **Self-healing subscription** with exponential reconnect backoff
//! - **Idempotent storage** keyed by transaction hash
//! - **Read API** with rate limiting and OpenAPI docs
//!
//! ## Architecture
//!
//! 1. **Codec** ([`codec`]) - Topic bytes to checksummed addresses and hashes
//! 2. **Events** ([`events`]) - Filters and the raw-log decoder
//! 3. **RPC** ([`rpc`]) - Node seam and its WebSocket implementation
//! 4. **Ingest** ([`ingest`]) - Backfill, live stream processing, lifecycle manager
//! 5. **Storage** ([`db`]) - SQLite pool, migrations, repository
//! 6. **API** ([`api`]) - axum read endpoints
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use bayc_transfer_indexer::{
//!     config::Config,
//!     db::{create_pool, repository::Repository},
//!     ingest::{LifecycleConfig, LifecycleManager},
//!     rpc::WsConnector,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let repo = Repository::new(create_pool(config.database_url()).await?);
//!     let connector = WsConnector::new(config.ws_rpc_url()?.to_string());
//!
//!     LifecycleManager::new(connector, repo, LifecycleConfig::from_config(&config))
//!         .run(CancellationToken::new())
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Setup
//!
//! ```text
//! WS_RPC_URL=wss://mainnet.infura.io/ws/v3/your_key
//! DATABASE_URL=sqlite:./transfers.db
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::TrackerResult<T>`](error::TrackerResult):
//!
//! ```rust
//! use bayc_transfer_indexer::error::{TrackerError, TrackerResult};
//!
//! fn example() -> TrackerResult<()> {
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ingest;
pub mod observability;
pub mod rpc;
