//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the capture proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream the proxy forwards traffic to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Tracer identity used for span naming and blob keys.
    pub tracer: TracerConfig,

    /// Blob capture settings.
    pub blobs: BlobsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Tracer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Service name reported on every span.
    pub service_name: String,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            service_name: "span-blobs".to_string(),
        }
    }
}

/// Blob capture configuration.
///
/// When `enabled` is false nothing else in this section is consulted.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BlobsConfig {
    /// Enable blob capture.
    pub enabled: bool,

    /// Where captured blobs are written.
    pub store: StoreConfig,

    /// Maximum blob writes per second. Unset (or negative) means unlimited.
    pub rate_per_sec: Option<f64>,
}

impl BlobsConfig {
    /// The effective sampling rate, `None` meaning "accept everything".
    pub fn sampling_rate(&self) -> Option<f64> {
        self.rate_per_sec.filter(|rate| *rate >= 0.0)
    }
}

/// Blob store selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store kind: "file" or "agent".
    pub name: String,

    /// Agent host (agent store only).
    pub host: String,

    /// Agent port (agent store only).
    pub port: u16,

    /// Agent request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "file".to_string(),
            host: "localhost".to_string(),
            port: 35001,
            timeout_ms: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
