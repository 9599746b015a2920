//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::blobs::error::{BlobError, BlobResult};
use crate::blobs::store::BlobStore;
use crate::blobs::types::{Blob, BlobMetadata, BlobType};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Writes each blob as `<key>` with a `<key>.meta.json` sidecar.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

/// Contents of a `<key>.meta.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub key: String,
    pub blob_type: BlobType,
    pub content_type: String,
    pub size: usize,
    pub metadata: BlobMetadata,
}

impl FileStore {
    /// Open a store over `directory`, creating it if it does not exist.
    pub fn open(directory: impl Into<PathBuf>) -> BlobResult<Self> {
        let directory = directory.into();
        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|source| BlobError::StoreInit {
                path: directory.clone(),
                source,
            })?;
            tracing::info!(path = %directory.display(), "Created blob directory");
        }
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{}{}", key, SIDECAR_SUFFIX))
    }
}

#[async_trait]
impl BlobStore for FileStore {
    async fn store(&self, blob: Blob) -> BlobResult<()> {
        let sidecar = StoredBlob {
            key: blob.key.clone(),
            blob_type: blob.blob_type,
            content_type: blob.content_type.to_string(),
            size: blob.data.len(),
            metadata: blob.metadata,
        };
        let sidecar = serde_json::to_vec_pretty(&sidecar)?;

        let data_path = self.directory.join(&blob.key);
        let meta_path = self.sidecar_path(&blob.key);

        tokio::fs::write(&data_path, &blob.data)
            .await
            .map_err(BlobError::Write)?;
        // A data file without its sidecar is never left behind.
        if let Err(err) = tokio::fs::write(&meta_path, sidecar).await {
            if let Err(cleanup) = tokio::fs::remove_file(&data_path).await {
                tracing::warn!(
                    path = %data_path.display(),
                    error = %cleanup,
                    "Could not remove orphaned blob"
                );
            }
            return Err(BlobError::Write(err));
        }

        tracing::debug!(path = %data_path.display(), size = blob.data.len(), "Blob written");
        Ok(())
    }
}
