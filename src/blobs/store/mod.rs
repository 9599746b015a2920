//! Blob store backends.
//!
//! # Implementations
//! - `file.rs`: writes blobs under a local `blobs/` directory
//! - `agent.rs`: ships blobs to a remote collection agent over HTTP
//! - `memory.rs`: keeps blobs in memory, for embedding and tests
//!
//! Only `file` and `agent` are selectable by configuration. Any other store is
//! injected through [`BlobCapture::with_store_builder`](crate::blobs::BlobCapture::with_store_builder).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::blobs::error::{BlobError, BlobResult};
use crate::blobs::types::Blob;
use crate::config::StoreConfig;

pub mod agent;
pub mod file;
pub mod memory;

pub use agent::AgentStore;
pub use file::{FileStore, StoredBlob};
pub use memory::MemoryStore;

/// Directory created under the working directory by the file store.
pub const BLOB_DIRECTORY: &str = "blobs";

/// Destination for captured blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist one blob. Called at most once per captured request or response.
    async fn store(&self, blob: Blob) -> BlobResult<()>;
}

/// Build the store named by `config.name`.
///
/// `file` creates `<working_dir>/blobs` if needed; `agent` builds a client for
/// `host:port`. Anything else is a configuration error.
pub fn build_store(config: &StoreConfig, working_dir: &Path) -> BlobResult<Arc<dyn BlobStore>> {
    match config.name.to_ascii_lowercase().as_str() {
        "file" => {
            let store = FileStore::open(working_dir.join(BLOB_DIRECTORY))?;
            Ok(Arc::new(store))
        }
        "agent" => {
            let store = AgentStore::new(&config.host, config.port, config.timeout_ms)?;
            Ok(Arc::new(store))
        }
        _ => Err(BlobError::UnsupportedStore(config.name.clone())),
    }
}
