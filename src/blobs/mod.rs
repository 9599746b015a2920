//! Request and response blob capture.
//!
//! # Data Flow
//! ```text
//! decorator hook
//!     → BlobCapture::factory()          None when disabled
//!     → BlobExtractor::is_*_valid        skip unwanted messages
//!     → BlobExtractor::extract_*         bytes + content type, body restored
//!     → BlobWriter::write                sampling, metadata, key
//!     → BlobStore::store                 file / agent / memory
//!     → span tag request_blob / response_blob
//! ```

pub mod content;
pub mod error;
pub mod extractor;
pub mod factory;
pub mod sampling;
pub mod store;
pub mod types;

pub use error::{BlobError, BlobResult};
pub use extractor::{BlobExtractor, CaptureAll};
pub use factory::{
    BlobCapture, BlobWriter, BlobWriterFactory, SpanBlobContext, StoreBuilder, WriteOutcome,
};
pub use sampling::SamplingPredicate;
pub use store::{AgentStore, BlobStore, FileStore, MemoryStore, StoredBlob};
pub use types::{Blob, BlobContent, BlobMetadata, BlobType, ContentType, Entity};
