//! In-memory blob store.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::blobs::error::BlobResult;
use crate::blobs::store::BlobStore;
use crate::blobs::types::Blob;

/// Keeps every stored blob in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<Vec<Blob>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored so far, in write order.
    pub fn blobs(&self) -> Vec<Blob> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn store(&self, blob: Blob) -> BlobResult<()> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(blob);
        Ok(())
    }
}
