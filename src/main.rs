//! CLI entry point for the transfer indexer.
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli.rs (command dispatch, Ctrl-C)
//!     ↓
//! ingest::LifecycleManager  ──▶ db::Repository ◀── api::server
//! ```

use bayc_transfer_indexer::{cli, observability};
use tracing::error;

/// Entry point for the transfer indexer.
///
/// Logging is controlled by:
/// - `RUST_LOG`: filter directives (e.g. `bayc_transfer_indexer=debug`)
/// - `LOG_JSON`: JSON console output (`true` / `false`)
/// - `LOG_FILE`: additional daily-rotated JSON log file
#[tokio::main]
async fn main() {
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    // RUST_LOG is read inside init_tracing.
    let _guard = match observability::init_tracing(None, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
