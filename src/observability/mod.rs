//! Observability and structured logging infrastructure.
//!
//! This module provides production-grade logging using the tracing framework,
//! enabling filtering, performance profiling, and production observability.
//!
//! # Features
//!
//! - **Structured Logging**: Key-value pairs for machine-parseable logs
//! - **Span Tracking**: Connection cycles, backfills and subscriptions each get a span
//! - **Multiple Formats**: Console (pretty/JSON) and file output
//! - **Environment Filtering**: RUST_LOG variable support
//!
//! # Usage
//!
//! Initialize tracing at application startup and keep the guard alive:
//!
//! ```no_run
//! use bayc_transfer_indexer::observability;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _guard = observability::init_tracing(None, None, false)?;
//!
//!     // Run application...
//!     Ok(())
//! }
//! ```
//!
//! # Environment Configuration
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=bayc_transfer_indexer=debug,sqlx=warn cargo run
//!
//! # Enable JSON output for production
//! LOG_JSON=true cargo run
//!
//! # Write logs to file with daily rotation
//! LOG_FILE=./logs/indexer.log cargo run
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
///
/// Info for this crate, warn for SQLx, Alloy and the rest.
pub const DEFAULT_FILTER: &str = "bayc_transfer_indexer=info,warn";

/// Keeps the non-blocking file writer flushing.
///
/// Dropping it stops file logging, so hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct TracingGuard {
    _file: Option<WorkerGuard>,
}

/// Picks the filter directives: `RUST_LOG` wins, then `log_level`, then [`DEFAULT_FILTER`].
fn filter_directives(rust_log: Option<String>, log_level: Option<String>) -> String {
    rust_log
        .filter(|value| !value.trim().is_empty())
        .or(log_level)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize the tracing subscriber with configurable output formats.
///
/// # Arguments
///
/// * `log_level` - Optional filter override (e.g., "debug"). `RUST_LOG` takes precedence.
/// * `log_file` - Optional file path for log output. Enables daily log rotation.
/// * `json_output` - If true, console output is JSON; otherwise pretty-printed.
///
/// # Examples
///
/// ```no_run
/// use bayc_transfer_indexer::observability;
/// use std::path::PathBuf;
///
/// // Production: JSON console output + rotating file
/// let _guard = observability::init_tracing(
///     Some("info".to_string()),
///     Some(PathBuf::from("./logs/indexer.log")),
///     true,
/// )?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - The log directory cannot be created
/// - A global subscriber is already installed
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<TracingGuard, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::new(filter_directives(std::env::var("RUST_LOG").ok(), log_level));

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .boxed()
    };

    let mut file_guard = None;
    let file_layer = if let Some(ref path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("indexer.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        // File always uses JSON for structured log analysis
        Some(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized"
    );

    Ok(TracingGuard { _file: file_guard })
}

/// Initialize tracing for unit tests; output goes to the test harness.
///
/// Safe to call from every test.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
