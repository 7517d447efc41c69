//! Configuration management for the transfer indexer.
//!
//! This module handles loading and validating configuration from environment variables
//! using the `dotenvy` crate. All operations return [`TrackerResult`] for comprehensive
//! error handling.
//!
//! ## Environment Variables
//!
//! Required for ingestion:
//! - `WS_RPC_URL` (or `INFURA_WS_URL`): WebSocket endpoint of the Ethereum node
//!
//! Optional (with defaults):
//! - `CONTRACT_ADDRESS` (or `BAYC_CONTRACT_ADDRESS`): collection contract (default: BAYC)
//! - `DATABASE_URL`: SQLite database (default: "sqlite:./transfers.db")
//! - `API_PORT`: Read API port (default: 8080)
//! - `RATE_LIMIT_RPM`: API requests per minute (default: 600)
//! - `CORS_ORIGINS`: Comma separated allowed origins (default: "*")
//! - `BACKFILL_LOOKBACK_SECS`: Backfill window (default: 86400)
//! - `BLOCK_TIME_SECS`: Average block interval estimate (default: 15)
//! - `BACKOFF_INITIAL_SECS` / `BACKOFF_MAX_SECS`: Reconnect backoff bounds (default: 1 / 30)
//! - `RUST_LOG`: Logging level (default: "bayc_transfer_indexer=info,warn")
//!
//! ## Example
//!
//! ```no_run
//! use bayc_transfer_indexer::config::Config;
//! use bayc_transfer_indexer::error::TrackerResult;
//!
//! # fn main() -> TrackerResult<()> {
//! let config = Config::from_env()?;
//! println!("Contract: {}", config.contract_address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::codec::is_valid_address;
use crate::error::{TrackerError, TrackerResult};
use crate::events::BAYC_CONTRACT;

/// Main configuration struct for the indexer.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket node endpoint; only the ingester needs it
    ws_rpc_url: Option<String>,

    /// Collection contract to index
    contract_address: Address,

    /// SQLite database URL
    database_url: String,

    /// Read API port
    api_port: u16,

    /// API requests allowed per minute
    rate_limit_rpm: u32,

    /// Allowed CORS origins (`*` allows any)
    cors_origins: Vec<String>,

    /// Backfill window in seconds
    backfill_lookback_secs: u64,

    /// Average block interval used for the backfill estimate
    block_time_secs: u64,

    /// First reconnect delay
    backoff_initial: Duration,

    /// Reconnect delay ceiling
    backoff_max: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for optional variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A numeric variable does not parse
    /// - The contract address is malformed or fails its checksum
    /// - The endpoint URL is not a `ws://` or `wss://` URL
    /// - `BLOCK_TIME_SECS` is zero, or the backoff bounds are inverted
    pub fn from_env() -> TrackerResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// [`Config::from_env`] delegates here with the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> TrackerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let ws_rpc_url = non_empty("WS_RPC_URL").or_else(|| non_empty("INFURA_WS_URL"));
        if let Some(url) = &ws_rpc_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(TrackerError::config(
                    format!("WS_RPC_URL must be a ws:// or wss:// URL, got: {url}"),
                    None,
                ));
            }
        }

        let contract_text = non_empty("CONTRACT_ADDRESS")
            .or_else(|| non_empty("BAYC_CONTRACT_ADDRESS"))
            .unwrap_or_else(|| BAYC_CONTRACT.to_checksum(None));
        let contract_address = parse_contract_address(&contract_text)?;

        let database_url =
            non_empty("DATABASE_URL").unwrap_or_else(|| "sqlite:./transfers.db".to_string());

        let api_port = parse_or(&non_empty, "API_PORT", 8080u16)?;
        let rate_limit_rpm = parse_or(&non_empty, "RATE_LIMIT_RPM", 600u32)?;
        if rate_limit_rpm == 0 {
            return Err(TrackerError::config("RATE_LIMIT_RPM must be positive", None));
        }

        let cors_origins = non_empty("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let backfill_lookback_secs = parse_or(&non_empty, "BACKFILL_LOOKBACK_SECS", 86_400u64)?;
        let block_time_secs = parse_or(&non_empty, "BLOCK_TIME_SECS", 15u64)?;
        if block_time_secs == 0 {
            return Err(TrackerError::config("BLOCK_TIME_SECS must be positive", None));
        }

        let backoff_initial =
            Duration::from_secs(parse_or(&non_empty, "BACKOFF_INITIAL_SECS", 1u64)?);
        let backoff_max = Duration::from_secs(parse_or(&non_empty, "BACKOFF_MAX_SECS", 30u64)?);
        if backoff_initial.is_zero() || backoff_max < backoff_initial {
            return Err(TrackerError::config(
                "BACKOFF_INITIAL_SECS must be positive and not exceed BACKOFF_MAX_SECS",
                None,
            ));
        }

        Ok(Self {
            ws_rpc_url,
            contract_address,
            database_url,
            api_port,
            rate_limit_rpm,
            cors_origins,
            backfill_lookback_secs,
            block_time_secs,
            backoff_initial,
            backoff_max,
        })
    }

    /// Get the WebSocket node endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither `WS_RPC_URL` nor
    /// `INFURA_WS_URL` is set.
    pub fn ws_rpc_url(&self) -> TrackerResult<&str> {
        self.ws_rpc_url.as_deref().ok_or_else(|| {
            TrackerError::config(
                "WS_RPC_URL (or INFURA_WS_URL) environment variable is required\n\nUsage:\n  WS_RPC_URL=\"wss://mainnet.infura.io/ws/v3/YOUR_KEY\" cargo run -- listen",
                None,
            )
        })
    }

    /// Get the collection contract address.
    #[must_use]
    pub const fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Get the read API port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Get the API rate limit (requests per minute).
    #[must_use]
    pub const fn rate_limit_rpm(&self) -> u32 {
        self.rate_limit_rpm
    }

    /// Get the allowed CORS origins.
    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    /// Get the backfill window in seconds.
    #[must_use]
    pub const fn backfill_lookback_secs(&self) -> u64 {
        self.backfill_lookback_secs
    }

    /// Get the block interval estimate in seconds.
    #[must_use]
    pub const fn block_time_secs(&self) -> u64 {
        self.block_time_secs
    }

    /// Get the first reconnect delay.
    #[must_use]
    pub const fn backoff_initial(&self) -> Duration {
        self.backoff_initial
    }

    /// Get the reconnect delay ceiling.
    #[must_use]
    pub const fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> TrackerResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim().parse::<T>().map_err(|e| {
            TrackerError::config(
                format!("{key} must be a valid number, got: {raw}"),
                Some(Box::new(e)),
            )
        })
    })
}

fn parse_contract_address(text: &str) -> TrackerResult<Address> {
    if !is_valid_address(text) {
        return Err(TrackerError::config(
            format!(
                "CONTRACT_ADDRESS must be a valid Ethereum address (0x + 40 hex chars, EIP-55 checksum), got: {text}"
            ),
            None,
        ));
    }

    text.parse::<Address>().map_err(|e| {
        TrackerError::config(
            format!("Failed to parse CONTRACT_ADDRESS: {text}"),
            Some(Box::new(e)),
        )
    })
}
