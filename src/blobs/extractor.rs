//! Pluggable extraction strategy.
//!
//! Each hook (server request/response, client request/response) asks the strategy
//! two questions: whether this message should be captured at all, and how to turn
//! it into bytes. Every method has a default, so an implementation overrides only
//! what it needs.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};

use crate::blobs::content::{buffer_body, entity_or_body};
use crate::blobs::error::BlobResult;
use crate::blobs::types::BlobContent;

/// Decides which messages are captured and extracts their bytes.
///
/// Extraction must leave the message usable downstream. The default implementations
/// guarantee this by replacing any consumed body with an identical one.
#[async_trait]
pub trait BlobExtractor: Send + Sync {
    fn is_server_request_valid(&self, _request: &Request<Body>) -> bool {
        true
    }

    fn is_server_response_valid(&self, _response: &Response<Body>) -> bool {
        true
    }

    fn is_client_request_valid(&self, _request: &Request<Body>) -> bool {
        true
    }

    fn is_client_response_valid(&self, _response: &Response<Body>) -> bool {
        true
    }

    /// Inbound request, read from the wire.
    async fn extract_server_request(&self, request: &mut Request<Body>) -> BlobResult<BlobContent> {
        buffer_body(request).await
    }

    /// Outbound response, usually still holding a materialized entity.
    async fn extract_server_response(
        &self,
        response: &mut Response<Body>,
    ) -> BlobResult<BlobContent> {
        entity_or_body(response).await
    }

    /// Outbound client request, usually still holding a materialized entity.
    async fn extract_client_request(&self, request: &mut Request<Body>) -> BlobResult<BlobContent> {
        entity_or_body(request).await
    }

    /// Inbound client response, read from the wire.
    async fn extract_client_response(
        &self,
        response: &mut Response<Body>,
    ) -> BlobResult<BlobContent> {
        buffer_body(response).await
    }
}

/// Captures every request and response with the default extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureAll;

impl BlobExtractor for CaptureAll {}
