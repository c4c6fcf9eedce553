mod bridge;
mod config;
mod engine;
mod event;
mod island;
mod media;
mod paths;
mod policy;
mod queue;
mod state;
mod status;
mod timers;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::transport::JsonLinesTransport;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "capsule-island-daemon")]
#[command(about = "Event arbitration daemon for the capsule island overlay")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and status.toml
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read holds a blocking thread until the next line arrives.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run(cli: Cli) -> Result<()> {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = match cli.data_dir {
        Some(dir) => dir,
        None => paths::app_data_dir()?,
    };
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("failed to create app data directory {}", app_dir.display()))?;

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path(&app_dir);
    let initial_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        warn!("config error (using defaults): {e:#}");
        Config::default()
    });

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, handle) = Engine::new(
        &initial_config,
        JsonLinesTransport::new(std::io::stdout()),
    );
    let status_path = paths::status_file_path(&app_dir);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(status::run_writer(status_path.clone(), engine.subscribe()));
    tokio::spawn(config::watch_config(config_path, handle.clone()));

    // The host closing our stdin means it is gone; stop with it.
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = bridge::run(stdin, handle.clone()).await {
                warn!("bridge stopped: {e:#}");
            }
            let _ = handle.shutdown().await;
        });
    }

    // Graceful shutdown on Ctrl+C.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = handle.shutdown().await;
        }
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %app_dir.display(),
        "capsule-island-daemon started"
    );

    // ── Event loop ────────────────────────────────────────────────────────────
    let final_state = engine.run().await;
    status::write_status(&status_path, &status::IslandStatus::from_state(&final_state));
    info!("capsule-island-daemon stopped");
    Ok(())
}

/// Logs go to stderr; stdout carries outbound requests to the host.
fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("capsule_island_daemon=debug,info")
        } else {
            EnvFilter::new("capsule_island_daemon=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
