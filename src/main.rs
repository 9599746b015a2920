//! Span blob capture proxy.
//!
//! A tracing reverse proxy that records request and response payloads as blobs.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                   CAPTURE PROXY                       │
//!                     │                                                       │
//!   Client Request    │  ┌──────────┐   ┌────────────┐   ┌────────────────┐  │
//!   ──────────────────┼─▶│  server  │──▶│   proxy    │──▶│  client hooks  │──┼──▶ Upstream
//!                     │  │  hooks   │   │  handler   │   │ (ClientBlob-   │  │
//!   Client Response   │  │ (request │   │            │   │  Layer)        │  │
//!   ◀─────────────────┼──│ response)│◀──│            │◀──│                │◀─┼──
//!                     │  └────┬─────┘   └────────────┘   └───────┬────────┘  │
//!                     │       │                                  │           │
//!                     │       ▼                                  ▼           │
//!                     │  ┌───────────────────────────────────────────────┐   │
//!                     │  │ BlobCapture → sampling → BlobStore (file/agent)│   │
//!                     │  └───────────────────────────────────────────────┘   │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use span_blobs::config::validation::validate_config;
use span_blobs::config::{load_config, AppConfig, ConfigError};
use span_blobs::lifecycle;
use span_blobs::observability::logging;

#[derive(Parser)]
#[command(name = "span-blobs")]
#[command(about = "Tracing reverse proxy that captures payloads as blobs", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AppConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!("span-blobs v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        blobs_enabled = config.blobs.enabled,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
