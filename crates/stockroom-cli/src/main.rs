//! Stockroom CLI - sign in to the inventory backend, watch its health and
//! browse dashboard stats from the terminal.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockroom_core::config::data_dir;
use stockroom_core::{ApiClient, AppConfig, FileStore, Orchestrator, Timings};

use commands::Cli;

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr. Long-running commands also get a daily rolling file
/// in the data directory; the returned guard flushes it on drop.
fn init_tracing(log_dir: Option<&std::path::Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "stockroom.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).with(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let command = Cli::parse().command;

    let dir = data_dir()?;
    let store = Arc::new(FileStore::new(&dir).context("Failed to open data directory")?);
    let _guard = init_tracing(command.is_long_running().then_some(dir.as_path()));
    info!(data_dir = %dir.display(), "Stockroom starting");

    let config = AppConfig::load(store.as_ref()).with_env_overrides();
    let client = Arc::new(ApiClient::new(&config.base_url)?);
    let orchestrator = Orchestrator::new(client.clone(), store, config, Timings::default());

    orchestrator.initialize().await;
    let result = commands::run(command, &orchestrator, &client).await;
    orchestrator.shutdown();
    result
}
