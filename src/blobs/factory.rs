//! Lazily-initialized capture factory and per-span blob writers.
//!
//! # Lifecycle
//! ```text
//! BlobCapture::new(config)          startup, nothing built yet
//!     → factory()                   first call builds store + sampling predicate once
//!     → BlobWriterFactory::create   one writer per span, per hook call
//!     → BlobWriter::write           sampling check, producer, metadata, store
//! ```
//!
//! # Design Decisions
//! - Disabled capture never builds a store (no directories, no connections)
//! - Construction is exactly-once under concurrent first use (`OnceCell`)
//! - An unknown store kind is returned as an error, never swallowed

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use once_cell::sync::OnceCell;
use xxhash_rust::xxh3::xxh3_64;

use crate::blobs::error::{BlobError, BlobResult};
use crate::blobs::extractor::{BlobExtractor, CaptureAll};
use crate::blobs::sampling::SamplingPredicate;
use crate::blobs::store::{build_store, BlobStore};
use crate::blobs::types::{Blob, BlobContent, BlobMetadata, BlobType, ContentType};
use crate::config::{BlobsConfig, StoreConfig};
use crate::observability::span::ActiveSpan;

/// Custom store constructor, replacing the built-in `file` / `agent` selection.
pub type StoreBuilder =
    Arc<dyn Fn(&StoreConfig, &std::path::Path) -> BlobResult<Arc<dyn BlobStore>> + Send + Sync>;

/// Process-wide capture configuration plus its lazily-built writer factory.
pub struct BlobCapture {
    config: BlobsConfig,
    extractor: Arc<dyn BlobExtractor>,
    working_dir: Option<PathBuf>,
    store_builder: Option<StoreBuilder>,
    writers: OnceCell<Arc<BlobWriterFactory>>,
}

impl BlobCapture {
    pub fn new(config: BlobsConfig) -> Self {
        Self {
            config,
            extractor: Arc::new(CaptureAll),
            working_dir: None,
            store_builder: None,
            writers: OnceCell::new(),
        }
    }

    /// Replace the default capture-everything extraction strategy.
    pub fn with_extractor(mut self, extractor: Arc<dyn BlobExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Create the `blobs` directory under `dir` instead of the process working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Construct the store with `builder` instead of selecting it by kind.
    pub fn with_store_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&StoreConfig, &std::path::Path) -> BlobResult<Arc<dyn BlobStore>> + Send + Sync + 'static,
    {
        self.store_builder = Some(Arc::new(builder));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn extractor(&self) -> Arc<dyn BlobExtractor> {
        self.extractor.clone()
    }

    /// The writer factory, or `None` when capture is disabled.
    ///
    /// The first enabled call builds the store and sampling predicate; every later call
    /// returns the same instance. Concurrent first callers block until the single
    /// construction finishes.
    pub fn factory(&self) -> BlobResult<Option<Arc<BlobWriterFactory>>> {
        if !self.config.enabled {
            return Ok(None);
        }

        self.writers
            .get_or_try_init(|| self.build_writers())
            .map(|writers| Some(writers.clone()))
    }

    fn build_writers(&self) -> BlobResult<Arc<BlobWriterFactory>> {
        let working_dir = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| BlobError::StoreInit {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let store = match &self.store_builder {
            Some(builder) => builder(&self.config.store, &working_dir)?,
            None => build_store(&self.config.store, &working_dir)?,
        };
        let predicate = SamplingPredicate::from_rate(self.config.sampling_rate());

        tracing::info!(
            store = %self.config.store.name,
            rate_per_sec = ?self.config.sampling_rate(),
            "Blob capture initialized"
        );

        Ok(Arc::new(BlobWriterFactory::new(store, predicate)))
    }
}

impl std::fmt::Debug for BlobCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobCapture")
            .field("config", &self.config)
            .field("working_dir", &self.working_dir)
            .field("initialized", &self.writers.get().is_some())
            .finish()
    }
}

/// Produces per-span writers bound to one store and one sampling predicate.
pub struct BlobWriterFactory {
    store: Arc<dyn BlobStore>,
    predicate: SamplingPredicate,
}

impl BlobWriterFactory {
    pub fn new(store: Arc<dyn BlobStore>, predicate: SamplingPredicate) -> Self {
        Self { store, predicate }
    }

    pub fn create<'a>(&'a self, context: SpanBlobContext<'a>) -> BlobWriter<'a> {
        BlobWriter {
            context,
            store: self.store.as_ref(),
            predicate: &self.predicate,
        }
    }
}

/// Associates a blob write with the span that triggered it.
#[derive(Debug, Clone, Copy)]
pub struct SpanBlobContext<'a> {
    span: &'a ActiveSpan,
}

impl<'a> SpanBlobContext<'a> {
    pub fn new(span: &'a ActiveSpan) -> Self {
        Self { span }
    }

    /// `{service}_{operation}_{span_id}_{blob_type}`, safe to use as a file name.
    pub fn blob_key(&self, blob_type: BlobType) -> String {
        format!(
            "{}_{}_{}_{}",
            sanitize(self.span.service()),
            sanitize(self.span.operation()),
            sanitize(self.span.span_id()),
            blob_type
        )
    }

    fn metadata(&self, blob_type: BlobType, content_type: &ContentType) -> BlobMetadata {
        let mut metadata = BlobMetadata::new();
        metadata.insert("blob-type".into(), blob_type.to_string());
        metadata.insert("content-type".into(), content_type.to_string());
        metadata.insert("service".into(), self.span.service().to_string());
        metadata.insert("operation".into(), self.span.operation().to_string());
        metadata.insert("trace-id".into(), self.span.trace_id().to_string());
        metadata.insert("span-id".into(), self.span.span_id().to_string());
        metadata
    }

    fn on_blob_key_created(&self, key: &str, blob_type: BlobType) {
        self.span.set_tag(blob_type.span_tag(), key);
    }
}

/// Longest a single key component may be. Three capped components plus the
/// blob type and a store suffix stay well under the 255-byte file name limit.
const MAX_COMPONENT_LEN: usize = 64;
const HASH_SUFFIX_LEN: usize = 16;

fn sanitize(value: &str) -> String {
    let clean = value
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => c,
            _ => '-',
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string();

    if clean.len() <= MAX_COMPONENT_LEN {
        return clean;
    }

    // `clean` is ASCII, so any byte offset is a char boundary.
    let head = &clean[..MAX_COMPONENT_LEN - HASH_SUFFIX_LEN - 1];
    format!("{}-{:016x}", head, xxh3_64(clean.as_bytes()))
}

/// Result of a writer call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The blob reached the store under this key.
    Written { key: String, size: usize },
    /// The sampling predicate declined the write.
    Sampled,
}

/// Writes the blobs of one span.
pub struct BlobWriter<'a> {
    context: SpanBlobContext<'a>,
    store: &'a dyn BlobStore,
    predicate: &'a SamplingPredicate,
}

impl<'a> BlobWriter<'a> {
    /// Write one blob.
    ///
    /// `producer` streams the payload and is invoked at most once, only after the
    /// sampling predicate accepted the write. `metadata` may add entries to the
    /// standard metadata before the blob is stored.
    pub async fn write<P, M>(
        &self,
        blob_type: BlobType,
        content_type: ContentType,
        producer: P,
        metadata: M,
    ) -> BlobResult<WriteOutcome>
    where
        P: FnOnce(&mut dyn io::Write) -> io::Result<()> + Send,
        M: FnOnce(&mut BlobMetadata) + Send,
    {
        if !self.predicate.accept() {
            return Ok(WriteOutcome::Sampled);
        }

        let mut data = Vec::new();
        producer(&mut data).map_err(BlobError::Producer)?;

        let mut blob_metadata = self.context.metadata(blob_type, &content_type);
        metadata(&mut blob_metadata);

        let key = self.context.blob_key(blob_type);
        let size = data.len();
        self.store
            .store(Blob {
                key: key.clone(),
                blob_type,
                content_type,
                metadata: blob_metadata,
                data: Bytes::from(data),
            })
            .await?;

        self.context.on_blob_key_created(&key, blob_type);
        Ok(WriteOutcome::Written { key, size })
    }

    /// Write already-extracted content with no extra metadata.
    pub async fn write_content(
        &self,
        blob_type: BlobType,
        content: BlobContent,
    ) -> BlobResult<WriteOutcome> {
        let (data, content_type) = content.into_parts();
        self.write(
            blob_type,
            content_type,
            move |out: &mut dyn io::Write| out.write_all(&data),
            |_metadata: &mut BlobMetadata| {},
        )
        .await
    }
}
