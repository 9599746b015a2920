//! Blob capture error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised inside the capture subsystem.
///
/// Only [`BlobError::UnsupportedStore`], [`BlobError::StoreInit`] and
/// [`BlobError::AgentInit`] ever leave the subsystem (at construction time). Every
/// other variant is logged and swallowed at the decorator boundary.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The configured store kind is unknown.
    #[error("blob store type {0} is not supported")]
    UnsupportedStore(String),

    /// The local blob directory could not be prepared.
    #[error("failed to prepare blob directory {path}: {source}")]
    StoreInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The agent client could not be built.
    #[error("failed to build agent client: {0}")]
    AgentInit(#[source] reqwest::Error),

    /// Reading a request or response body failed.
    #[error("failed to read entity stream: {0}")]
    Stream(String),

    /// Serializing an entity as JSON failed.
    #[error("failed to serialize entity as json: {0}")]
    Json(#[from] serde_json::Error),

    /// Serializing an entity in binary form failed.
    #[error("failed to serialize entity: {0}")]
    Binary(#[from] rmp_serde::encode::Error),

    /// The byte producer handed to a writer failed.
    #[error("blob producer failed: {0}")]
    Producer(#[source] std::io::Error),

    /// The store failed to persist a blob.
    #[error("blob store write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The agent rejected a blob.
    #[error("blob agent responded with status {0}")]
    AgentStatus(u16),

    /// The agent could not be reached.
    #[error("blob agent request failed: {0}")]
    Agent(#[source] reqwest::Error),
}

impl BlobError {
    /// Whether this error reflects misconfiguration rather than a per-call condition.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BlobError::UnsupportedStore(_) | BlobError::StoreInit { .. } | BlobError::AgentInit(_)
        )
    }
}

/// Result type for capture operations.
pub type BlobResult<T> = Result<T, BlobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BlobError::UnsupportedStore("s3".into());
        assert_eq!(err.to_string(), "blob store type s3 is not supported");
        assert!(err.is_config());

        let err = BlobError::AgentStatus(503);
        assert_eq!(err.to_string(), "blob agent responded with status 503");
        assert!(!err.is_config());
    }
}
