//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics and blob capture from a validated config
//! - Bind the listener and run the proxy until shutdown
//!
//! # Design Decisions
//! - Fail fast: an unusable blob store is fatal before any traffic is accepted
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::blobs::{BlobCapture, BlobError};
use crate::bundle::TracerBundle;
use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("blob capture misconfigured: {0}")]
    Capture(#[from] BlobError),

    #[error("invalid upstream address: {0}")]
    Upstream(#[from] axum::http::uri::InvalidUri),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the tracer bundle for `config`, forcing the capture store to initialize now.
pub fn build_bundle(config: &AppConfig) -> Result<TracerBundle, StartupError> {
    let capture = Arc::new(BlobCapture::new(config.blobs.clone()));
    let bundle = TracerBundle::new(config.tracer.service_name.clone(), capture)?;

    tracing::info!(
        service = %config.tracer.service_name,
        blobs_enabled = config.blobs.enabled,
        store = %config.blobs.store.name,
        "Tracer configured"
    );
    Ok(bundle)
}

/// Start every subsystem and serve until SIGINT/SIGTERM.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bundle = build_bundle(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, &bundle)?;
    let receiver = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    server.run(listener, receiver).await?;
    Ok(())
}
