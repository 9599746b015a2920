//! Default byte extraction for requests and responses.
//!
//! # Responsibilities
//! - Turn a materialized [`Entity`] into blob bytes plus a content type
//! - Copy a body stream verbatim and put an identical body back
//!
//! # Precedence
//! ```text
//! Entity::Text              → UTF-8 bytes,   tag from header
//! Entity::Bytes             → bytes as is,   tag from header
//! Entity::Object + JSON hdr → serde_json,    tag Json
//! Entity::Object otherwise  → MessagePack,   tag from header
//! no entity                 → body bytes,    tag from header
//! ```
//!
//! # Design Decisions
//! - The declared entity kind wins over the header at every call site
//! - A consumed body is always replaced, even when reading it failed

use std::io;

use axum::body::{Body, Bytes};
use axum::http::{header, Extensions, HeaderMap, Request, Response};

use crate::blobs::error::{BlobError, BlobResult};
use crate::blobs::types::{BlobContent, ContentType, Entity, DEFAULT_CONTENT_TYPE};

/// The parts of an HTTP message extraction needs, shared by requests and responses.
pub trait HttpMessage: Send {
    fn headers(&self) -> &HeaderMap;
    fn extensions(&self) -> &Extensions;
    fn body_mut(&mut self) -> &mut Body;
}

impl HttpMessage for Request<Body> {
    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }

    fn body_mut(&mut self) -> &mut Body {
        Request::body_mut(self)
    }
}

impl HttpMessage for Response<Body> {
    fn headers(&self) -> &HeaderMap {
        Response::headers(self)
    }

    fn extensions(&self) -> &Extensions {
        Response::extensions(self)
    }

    fn body_mut(&mut self) -> &mut Body {
        Response::body_mut(self)
    }
}

/// The declared content type of a message, `text/plain` when absent or unreadable.
pub fn declared_content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Convert a materialized entity into blob content.
pub fn from_entity(entity: &Entity, content_type: &str) -> BlobResult<BlobContent> {
    let tag = ContentType::from_mime(content_type);
    match entity {
        Entity::Text(text) => Ok(BlobContent::new(Bytes::from(text.clone()), tag)),
        Entity::Bytes(bytes) => Ok(BlobContent::new(bytes.clone(), tag)),
        Entity::Object(object) if tag.is_json() => {
            Ok(BlobContent::new(object.to_json()?, ContentType::Json))
        }
        Entity::Object(object) => Ok(BlobContent::new(object.to_msgpack()?, tag)),
    }
}

/// Drain the message body, put an identical body back, and return the bytes.
///
/// When the read fails the body is replaced with one that fails the same way, so the
/// downstream consumer still observes the error.
pub async fn buffer_body<M: HttpMessage>(message: &mut M) -> BlobResult<BlobContent> {
    let content_type = ContentType::from_mime(&declared_content_type(message.headers()));
    let body = std::mem::take(message.body_mut());

    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            *message.body_mut() = Body::from(bytes.clone());
            Ok(BlobContent::new(bytes, content_type))
        }
        Err(err) => {
            let reason = err.to_string();
            *message.body_mut() = failed_body(reason.clone());
            Err(BlobError::Stream(reason))
        }
    }
}

/// Use the message's [`Entity`] extension if present, otherwise buffer the body.
pub async fn entity_or_body<M: HttpMessage>(message: &mut M) -> BlobResult<BlobContent> {
    if let Some(entity) = message.extensions().get::<Entity>() {
        let content_type = declared_content_type(message.headers());
        return from_entity(entity, &content_type);
    }
    buffer_body(message).await
}

fn failed_body(reason: String) -> Body {
    Body::from_stream(futures_util::stream::once(async move {
        Err::<Bytes, io::Error>(io::Error::other(reason))
    }))
}
