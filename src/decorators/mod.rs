//! Span decorators that capture blobs at the four tracing hook points.
//!
//! # Hook Points
//! ```text
//! server.rs   inbound request received   → request blob
//!             outbound response sent     → response blob
//! client.rs   outbound request sent      → request blob
//!             inbound response received  → response blob
//! ```
//!
//! # Design Decisions
//! - Hooks never fail the traced call: every error ends as [`CaptureOutcome::Failed`]
//! - At most one capture per hook call, no retries
//! - Decorators hold no per-call state

pub mod client;
pub mod server;

use std::sync::Arc;

use crate::blobs::{
    BlobCapture, BlobContent, BlobExtractor, BlobResult, BlobType, BlobWriterFactory,
    SpanBlobContext, WriteOutcome,
};
use crate::observability::metrics;
use crate::observability::span::ActiveSpan;

pub use client::{ClientBlobLayer, ClientBlobService, ClientSpanDecorator};
pub use server::{server_blob_middleware, ServerBlobState, ServerSpanDecorator};

/// What a hook call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Blob capture is switched off.
    Disabled,
    /// The extraction strategy declined this message.
    Rejected,
    /// The sampling predicate declined the write.
    Sampled,
    /// The blob was stored under `key`.
    Written { key: String },
    /// Extraction or storage failed. The traced call is unaffected.
    Failed,
}

/// Which side of a call a decorator runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Server => "server",
            Side::Client => "client",
        }
    }
}

/// Capture steps shared by the server and client decorators.
#[derive(Clone)]
struct Capturer {
    side: Side,
    writers: Option<Arc<BlobWriterFactory>>,
    extractor: Arc<dyn BlobExtractor>,
}

impl Capturer {
    fn new(capture: &BlobCapture, side: Side) -> BlobResult<Self> {
        Ok(Self {
            side,
            writers: capture.factory()?,
            extractor: capture.extractor(),
        })
    }

    fn is_enabled(&self) -> bool {
        self.writers.is_some()
    }

    fn rejected(&self, span: &ActiveSpan, blob_type: BlobType) -> CaptureOutcome {
        tracing::debug!(
            side = self.side.as_str(),
            blob_type = %blob_type,
            operation = %span.operation(),
            "Message not eligible for capture"
        );
        metrics::record_blob_skipped(self.side.as_str(), "rejected");
        CaptureOutcome::Rejected
    }

    async fn write(
        &self,
        span: &ActiveSpan,
        blob_type: BlobType,
        extracted: BlobResult<BlobContent>,
    ) -> CaptureOutcome {
        let Some(writers) = &self.writers else {
            return CaptureOutcome::Disabled;
        };
        let side = self.side.as_str();

        let content = match extracted {
            Ok(content) => content,
            Err(err) => {
                tracing::error!(
                    side,
                    blob_type = %blob_type,
                    operation = %span.operation(),
                    error = %err,
                    "Failed to extract blob"
                );
                metrics::record_blob_failed(side, "extract");
                return CaptureOutcome::Failed;
            }
        };

        let writer = writers.create(SpanBlobContext::new(span));
        match writer.write_content(blob_type, content).await {
            Ok(WriteOutcome::Written { key, size }) => {
                tracing::debug!(side, key = %key, size, "Blob captured");
                metrics::record_blob_written(side, blob_type.as_str(), size);
                CaptureOutcome::Written { key }
            }
            Ok(WriteOutcome::Sampled) => {
                metrics::record_blob_skipped(side, "sampled");
                CaptureOutcome::Sampled
            }
            Err(err) => {
                tracing::error!(
                    side,
                    blob_type = %blob_type,
                    operation = %span.operation(),
                    error = %err,
                    "Failed to write blob"
                );
                metrics::record_blob_failed(side, "write");
                CaptureOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::blobs::{Blob, BlobCapture, BlobError, BlobResult, BlobStore, MemoryStore};
    use crate::config::{BlobsConfig, StoreConfig};

    /// A store that rejects every write.
    pub struct FailingStore;

    #[async_trait]
    impl BlobStore for FailingStore {
        async fn store(&self, _blob: Blob) -> BlobResult<()> {
            Err(BlobError::AgentStatus(500))
        }
    }

    pub fn config(rate_per_sec: Option<f64>) -> BlobsConfig {
        BlobsConfig {
            enabled: true,
            store: StoreConfig::default(),
            rate_per_sec,
        }
    }

    pub fn capture_into(store: MemoryStore, rate_per_sec: Option<f64>) -> BlobCapture {
        BlobCapture::new(config(rate_per_sec))
            .with_store_builder(move |_, _| Ok(Arc::new(store.clone())))
    }

    pub fn failing_capture() -> BlobCapture {
        BlobCapture::new(config(None)).with_store_builder(|_, _| Ok(Arc::new(FailingStore)))
    }
}
