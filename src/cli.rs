//! Command-line interface for the transfer indexer.
//!
//! # Commands
//!
//! - *(none)*: run the ingester and the read API together
//! - `listen`: run the ingester only
//! - `serve`: run the read API only
//! - `history <TOKEN_ID>`: print a token's stored transfers
//!
//! # Example
//!
//! ```bash
//! # Ingest and serve
//! WS_RPC_URL=wss://mainnet.infura.io/ws/v3/KEY bayc-transfer-indexer
//!
//! # Look up a token (decimal or 0x hex)
//! bayc-transfer-indexer history 7804
//! ```

use std::sync::{atomic::AtomicBool, Arc};

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::server::run_server;
use crate::app_state::AppState;
use crate::codec::parse_token_id;
use crate::config::Config;
use crate::db::{create_pool, models::TransferEventRow, repository::Repository};
use crate::error::{TrackerError, TrackerResult};
use crate::ingest::{LifecycleConfig, LifecycleManager};
use crate::rpc::WsConnector;

/// NFT collection Transfer event indexer
#[derive(Parser, Debug)]
#[command(name = "bayc-transfer-indexer")]
#[command(about = "Ingests NFT Transfer events into SQLite and serves per-token history", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute; runs ingester and API when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ingester only
    Listen,

    /// Run the read API only
    Serve {
        /// Port to listen on (overrides API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the stored transfers of one token
    History {
        /// Token id, decimal or 0x hex
        token_id: String,
    },
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - The database cannot be opened
/// - The API server fails to start
pub async fn run() -> TrackerResult<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        None => run_all(&config).await,
        Some(Commands::Listen) => run_listen(&config).await,
        Some(Commands::Serve { port }) => run_serve(&config, port).await,
        Some(Commands::History { token_id }) => run_history(&config, &token_id).await,
    }
}

/// Cancels `cancel` on Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                println!();
                println!("{}", "Shutting down...".yellow().bold());
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        cancel.cancel();
    });
}

async fn open_repository(config: &Config) -> TrackerResult<Repository> {
    let pool = create_pool(config.database_url()).await?;
    Ok(Repository::new(pool))
}

fn build_manager(
    config: &Config,
    repository: Repository,
    streaming: Arc<AtomicBool>,
) -> TrackerResult<LifecycleManager<WsConnector, Repository>> {
    let connector = WsConnector::new(config.ws_rpc_url()?.to_string());
    Ok(
        LifecycleManager::new(connector, repository, LifecycleConfig::from_config(config))
            .with_streaming_flag(streaming),
    )
}

async fn serve(state: AppState, config: &Config, port: u16, cancel: CancellationToken) -> TrackerResult<()> {
    run_server(
        state,
        port,
        config.rate_limit_rpm(),
        config.cors_origins().to_vec(),
        cancel,
    )
    .await
    .map_err(|e| TrackerError::server(format!("API server failed on port {port}"), Some(e)))
}

/// Ingester and API share one database and the streaming flag.
async fn run_all(config: &Config) -> TrackerResult<()> {
    let repository = open_repository(config).await?;
    let streaming = Arc::new(AtomicBool::new(false));
    let manager = build_manager(config, repository.clone(), Arc::clone(&streaming))?;
    let state = AppState::with_streaming_flag(repository, streaming);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    print_banner(config, Some(config.api_port()));

    let ingester = manager.run(cancel.clone());
    let server = async {
        let result = serve(state, config, config.api_port(), cancel.clone()).await;
        // Without the API there is nothing left to serve; stop ingesting too.
        cancel.cancel();
        result
    };

    let ((), served) = tokio::join!(ingester, server);
    served?;

    println!("{}", "Shutdown complete".green().bold());
    Ok(())
}

async fn run_listen(config: &Config) -> TrackerResult<()> {
    let repository = open_repository(config).await?;
    let manager = build_manager(config, repository, Arc::new(AtomicBool::new(false)))?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    print_banner(config, None);
    manager.run(cancel).await;

    println!("{}", "Shutdown complete".green().bold());
    Ok(())
}

async fn run_serve(config: &Config, port: Option<u16>) -> TrackerResult<()> {
    let repository = open_repository(config).await?;
    let port = port.unwrap_or_else(|| config.api_port());

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    println!(
        "{} {}",
        "Serving transfer history on port".cyan().bold(),
        port.to_string().yellow()
    );
    serve(AppState::new(repository), config, port, cancel).await
}

async fn run_history(config: &Config, raw_token_id: &str) -> TrackerResult<()> {
    let token_id = parse_token_id(raw_token_id)
        .ok_or_else(|| TrackerError::validation("tokenId", raw_token_id))?;

    let repository = open_repository(config).await?;
    let rows = repository
        .get_transfers_by_token(&token_id.to_string())
        .await?;

    if rows.is_empty() {
        println!(
            "{}",
            format!("No transfers stored for token {token_id}").yellow().bold()
        );
        return Ok(());
    }

    println!(
        "{} {} ({} transfers)",
        "Token".cyan().bold(),
        token_id.to_string().yellow().bold(),
        rows.len()
    );
    for row in &rows {
        println!("{}", format_transfer_row(row));
    }

    Ok(())
}

fn print_banner(config: &Config, api_port: Option<u16>) {
    println!(
        "{} {}",
        "Watching Transfer events for".cyan().bold(),
        config.contract_address().to_checksum(None).yellow()
    );
    if let Some(port) = api_port {
        println!(
            "{} {}",
            "Read API on port".cyan(),
            port.to_string().yellow()
        );
    }
    println!();
}

/// One history line: block, from → to, hash.
fn format_transfer_row(row: &TransferEventRow) -> String {
    format!(
        "  {} {} {} {} {}",
        format!("#{}", row.block_number).yellow(),
        row.from_address.blue(),
        "->".dimmed(),
        row.to_address.magenta(),
        row.tx_hash.dimmed()
    )
}
