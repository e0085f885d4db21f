mod analytics;
mod config;
mod error;
mod history;
mod logger;
mod model;
mod parser;
mod pipeline;
mod queue;
mod supervisor;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use analytics::AnalyticsPaths;
use config::AppConfig;
use pipeline::Pipeline;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "crypto-pulse", about = "Real-time crypto market-data ingestion and analytics pipeline")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = load_config(Path::new(&cli.config))?;

    init_tracing(&config);

    info!(
        data_dir = %config.general.data_dir,
        logs_dir = %config.general.logs_dir,
        queue_capacity = config.general.queue_capacity,
        "starting crypto-pulse pipeline"
    );

    let pipeline = Pipeline::new(config.general.queue_capacity);
    let cancel = CancellationToken::new();

    let logger_handle = tokio::spawn({
        let queue = pipeline.queue.clone();
        let cancel = cancel.clone();
        let logs_dir = config.general.logs_dir.clone();
        async move { logger::run(queue, cancel, Path::new(&logs_dir)).await }
    });

    let analytics_handle = tokio::spawn({
        let histories = pipeline.histories.clone();
        let cancel = cancel.clone();
        let paths = AnalyticsPaths::new(config.general.data_dir.clone(), config.general.logs_dir.clone());
        async move { analytics::run(histories, paths, cancel).await }
    });

    let supervisor_handle = tokio::spawn({
        let queue = pipeline.queue.clone();
        let histories = pipeline.histories.clone();
        let cancel = cancel.clone();
        async move { supervisor::run(queue, histories, cancel).await }
    });

    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("interrupt received, shutting down");
    cancel.cancel();

    // Signal first, then wait for every worker to observe it and exit,
    // draining the queue before any transport state is torn down, in place
    // of the original's context-destroy-before-signal race.
    for (name, handle) in [
        ("supervisor", supervisor_handle),
        ("logger", logger_handle),
        ("analytics", analytics_handle),
    ] {
        match tokio::time::timeout(Duration::from_secs(5), handle).await {
            Ok(Ok(())) => info!(worker = name, "worker stopped"),
            Ok(Err(e)) => tracing::error!(worker = name, error = ?e, "worker task panicked"),
            Err(_) => tracing::warn!(worker = name, "worker did not stop within shutdown timeout"),
        }
    }

    info!("shutdown complete");
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig, Report<AppError>> {
    config::load(path).change_context(AppError::Config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
