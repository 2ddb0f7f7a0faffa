//! Posture Server - snapshot ingestion and fleet reporting
//!
//! This is the main entry point for the server binary.

use anyhow::{Context, Result};
use clap::Parser;
use posture_common::config::DEFAULT_SERVER_CONFIG;
use posture_common::{init_logging_with_config, Config, LogConfig, LogFormat};
use posture_ingest::{HostStore, InMemoryStore, Normalizer};
use posture_transport::{serve, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Posture Ingest Server
#[derive(Parser, Debug)]
#[command(name = "posture-server")]
#[command(version)]
#[command(about = "Receives host snapshots and serves fleet posture reports", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_SERVER_CONFIG)]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact); overrides config
    #[arg(long)]
    log_format: Option<String>,

    /// Listen address; overrides config
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config))?
        .merge_env();
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let log_format: LogFormat = config.logging.format.parse()?;
    init_logging_with_config(LogConfig::from_section(&config.logging).format(log_format))?;

    info!("Posture Server v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn HostStore> = Arc::new(InMemoryStore::new());
    let normalizer =
        Normalizer::new(Arc::clone(&store)).with_max_attempts(config.server.ingest_attempts as usize);
    if config.server.api_key.as_deref().map_or(true, str::is_empty) {
        warn!("No API key configured; the API is open to any client");
    }
    let state = AppState::new(store)
        .with_normalizer(normalizer)
        .with_api_key(config.server.api_key.clone());

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;

    serve(listener, state, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
    })
    .await?;

    Ok(())
}
