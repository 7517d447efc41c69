//! Error types for the transfer indexer.
//!
//! This module provides a unified error type [`TrackerError`] that encompasses
//! all errors that can occur while ingesting, validating and serving
//! `Transfer` events.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`TrackerError::ConfigError`]: Configuration and environment issues
//! - [`TrackerError::RpcError`]: Node queries (head block, log ranges)
//! - [`TrackerError::DecodingError`]: Malformed raw log records
//! - [`TrackerError::ValidationError`]: A decoded field failed its well-formedness check
//! - [`TrackerError::DatabaseError`]: Persistence failures
//! - `WebSocket*`: Transport lifecycle (connect, subscribe, stream end)
//! - [`TrackerError::ServerError`]: The read API could not bind or stopped serving
//!
//! Transport errors are recovered by the lifecycle manager with a reconnect;
//! decoding and validation errors only ever discard the offending record.
//!
//! # Example
//!
//! ```
//! use bayc_transfer_indexer::error::{TrackerError, TrackerResult};
//!
//! fn require_block(block_number: Option<u64>) -> TrackerResult<u64> {
//!     block_number.ok_or_else(|| TrackerError::decoding("log is missing blockNumber", None))
//! }
//! ```

use std::fmt;

/// Result type alias using [`TrackerError`].
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Boxed error source carried by most variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the transfer indexer.
#[derive(Debug)]
pub enum TrackerError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing or invalid environment variables
    /// - Invalid contract address or endpoint URL
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Node query errors (head block, log range queries).
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// A raw log record could not be decoded.
    ///
    /// Variants include:
    /// - Wrong topic count or topic signature mismatch
    /// - Missing transaction hash or block number
    /// - Wrong byte length for a fixed-width field
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// A decoded field failed validation and the record was rejected.
    ValidationError {
        /// Name of the offending field (e.g. `fromAddress`)
        field: &'static str,
        /// Raw value that failed the check
        value: String,
    },

    /// Database operation errors.
    ///
    /// Variants include:
    /// - Connection failures
    /// - Query execution errors
    /// - Migration failures
    DatabaseError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// WebSocket connection errors.
    WebSocketConnectionError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// WebSocket subscription errors.
    ///
    /// Variants include:
    /// - Failed to create subscription
    /// - Subscription dropped with a transport error
    WebSocketSubscriptionError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// The subscription stream ended and a reconnect is required.
    WebSocketDisconnected {
        /// Human-readable error message
        message: String,
    },

    /// HTTP server errors (bind failure, accept loop failure).
    ServerError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },
}

impl TrackerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use bayc_transfer_indexer::error::TrackerError;
    ///
    /// let err = TrackerError::config("WS_RPC_URL not set", None);
    /// assert!(matches!(err, TrackerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use bayc_transfer_indexer::error::TrackerError;
    ///
    /// let err = TrackerError::decoding("expected 4 topics, got 3", None);
    /// assert!(matches!(err, TrackerError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new validation error for `field` holding `value`.
    ///
    /// # Example
    ///
    /// ```
    /// use bayc_transfer_indexer::error::TrackerError;
    ///
    /// let err = TrackerError::validation("txHash", "0x1234");
    /// assert_eq!(err.to_string(), "Validation error: txHash is malformed: '0x1234'");
    /// ```
    #[must_use]
    pub fn validation(field: &'static str, value: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            value: value.into(),
        }
    }

    /// Create a new database error.
    #[must_use]
    pub fn database(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket connection error.
    #[must_use]
    pub fn websocket_connection(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::WebSocketConnectionError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket subscription error.
    #[must_use]
    pub fn websocket_subscription(
        message: impl Into<String>,
        source: Option<BoxedSource>,
    ) -> Self {
        Self::WebSocketSubscriptionError {
            message: message.into(),
            source,
        }
    }

    /// Create a new WebSocket disconnection error.
    ///
    /// # Example
    ///
    /// ```
    /// use bayc_transfer_indexer::error::TrackerError;
    ///
    /// let err = TrackerError::websocket_disconnected("Stream ended unexpectedly");
    /// assert!(err.is_transport());
    /// ```
    #[must_use]
    pub fn websocket_disconnected(message: impl Into<String>) -> Self {
        Self::WebSocketDisconnected {
            message: message.into(),
        }
    }

    /// Create a new HTTP server error.
    #[must_use]
    pub fn server(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ServerError {
            message: message.into(),
            source,
        }
    }

    /// Whether this error came from the node transport rather than a single record.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::RpcError { .. }
                | Self::WebSocketConnectionError { .. }
                | Self::WebSocketSubscriptionError { .. }
                | Self::WebSocketDisconnected { .. }
        )
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::ValidationError { field, value } => {
                write!(f, "Validation error: {field} is malformed: '{value}'")
            }
            Self::DatabaseError { message, .. } => write!(f, "Database error: {message}"),
            Self::WebSocketConnectionError { message, .. } => {
                write!(f, "WebSocket connection error: {message}")
            }
            Self::WebSocketSubscriptionError { message, .. } => {
                write!(f, "WebSocket subscription error: {message}")
            }
            Self::WebSocketDisconnected { message } => {
                write!(f, "WebSocket disconnected: {message}")
            }
            Self::ServerError { message, .. } => write!(f, "Server error: {message}"),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::DatabaseError { source, .. }
            | Self::WebSocketConnectionError { source, .. }
            | Self::WebSocketSubscriptionError { source, .. }
            | Self::ServerError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::ValidationError { .. } | Self::WebSocketDisconnected { .. } => None,
        }
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = TrackerError::config("test error", None);
        assert!(matches!(err, TrackerError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_decoding_error() {
        let err = TrackerError::decoding("invalid log", None);
        assert!(matches!(err, TrackerError::DecodingError { .. }));
        assert_eq!(err.to_string(), "Decoding error: invalid log");
    }

    #[test]
    fn test_validation_error_names_field_and_value() {
        let err = TrackerError::validation("fromAddress", "0xnothex");
        assert_eq!(
            err.to_string(),
            "Validation error: fromAddress is malformed: '0xnothex'"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = TrackerError::config("failed to load", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Configuration error: failed to load");
    }

    #[test]
    fn test_transport_classification() {
        assert!(TrackerError::rpc("head block", None).is_transport());
        assert!(TrackerError::websocket_connection("refused", None).is_transport());
        assert!(TrackerError::websocket_subscription("dropped", None).is_transport());
        assert!(TrackerError::websocket_disconnected("closed").is_transport());
        assert!(!TrackerError::decoding("bad topic", None).is_transport());
        assert!(!TrackerError::validation("txHash", "0x").is_transport());
        assert!(!TrackerError::database("locked", None).is_transport());
        assert!(!TrackerError::server("bind", None).is_transport());
    }

    #[test]
    fn test_server_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = TrackerError::server("API server failed on port 8080", Some(Box::new(source)));

        assert!(matches!(err, TrackerError::ServerError { .. }));
        assert_eq!(err.to_string(), "Server error: API server failed on port 8080");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("address in use"));
    }
}
