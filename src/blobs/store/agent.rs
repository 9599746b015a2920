//! Remote agent blob store.
//!
//! Each blob is sent as `POST /v1/blobs/{key}` with the raw bytes as the body, the
//! blob content type as `content-type`, the blob type as `x-blob-type` and one
//! `x-blob-meta-{name}` header per metadata entry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::blobs::error::{BlobError, BlobResult};
use crate::blobs::store::BlobStore;
use crate::blobs::types::Blob;

const BLOB_TYPE_HEADER: &str = "x-blob-type";
const METADATA_HEADER_PREFIX: &str = "x-blob-meta-";

/// Client for a blob collection agent listening on `host:port`.
#[derive(Debug, Clone)]
pub struct AgentStore {
    client: reqwest::Client,
    endpoint: String,
}

impl AgentStore {
    /// Build a client. No connection is made until the first blob is sent.
    pub fn new(host: &str, port: u16, timeout_ms: u64) -> BlobResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(BlobError::AgentInit)?;

        let endpoint = format!("http://{}:{}/v1/blobs", host, port);
        tracing::info!(endpoint = %endpoint, "Blob agent client configured");
        Ok(Self { client, endpoint })
    }

    fn headers(blob: &Blob) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(blob.content_type.as_str()) {
            headers.insert(CONTENT_TYPE, value);
        }
        headers.insert(
            HeaderName::from_static(BLOB_TYPE_HEADER),
            HeaderValue::from_static(blob.blob_type.as_str()),
        );
        for (name, value) in &blob.metadata {
            let name = HeaderName::try_from(format!("{}{}", METADATA_HEADER_PREFIX, name));
            let value = HeaderValue::from_str(value);
            match (name, value) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::debug!(key = %blob.key, "Skipping metadata entry not valid as a header"),
            }
        }
        headers
    }
}

#[async_trait]
impl BlobStore for AgentStore {
    async fn store(&self, blob: Blob) -> BlobResult<()> {
        let url = format!("{}/{}", self.endpoint, blob.key);
        let response = self
            .client
            .post(&url)
            .headers(Self::headers(&blob))
            .body(blob.data)
            .send()
            .await
            .map_err(BlobError::Agent)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::AgentStatus(status.as_u16()));
        }

        tracing::debug!(url = %url, "Blob dispatched to agent");
        Ok(())
    }
}
