//! Span blob capture library.
//!
//! Captures the request and response payloads of traced HTTP calls as blobs, keyed by
//! the span that carried them, so a trace viewer can show what was actually sent.

pub mod blobs;
pub mod bundle;
pub mod config;
pub mod decorators;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use blobs::{BlobCapture, BlobError, BlobExtractor, Entity};
pub use bundle::TracerBundle;
pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
