//! Value types shared by extraction, writers and stores.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

/// Content type used when a message carries no `content-type` header.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Distinguishes the request and response captures of the same span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobType {
    Request,
    Response,
}

impl BlobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::Request => "request",
            BlobType::Response => "response",
        }
    }

    /// Span tag under which the blob key of this type is recorded.
    pub fn span_tag(&self) -> &'static str {
        match self {
            BlobType::Request => "request_blob",
            BlobType::Response => "response_blob",
        }
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content type tag attached to a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    Xml,
    Text,
    /// Any other content type, stored as the header text it came from.
    Other(String),
}

impl ContentType {
    /// Derive a tag from a `content-type` header value.
    ///
    /// Matching looks at the case-insensitive mime essence, so parameters such as
    /// `charset` do not affect it. Anything unmatched is kept verbatim (trimmed)
    /// as [`ContentType::Other`].
    pub fn from_mime(value: &str) -> Self {
        let value = value.trim();
        let essence = value
            .parse::<mime::Mime>()
            .map(|parsed| parsed.essence_str().to_ascii_lowercase());

        match essence.as_deref() {
            Ok("application/json" | "text/json") => ContentType::Json,
            Ok("application/xml" | "text/xml") => ContentType::Xml,
            Ok("text/plain") => ContentType::Text,
            _ => ContentType::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::Text => DEFAULT_CONTENT_TYPE,
            ContentType::Other(mime) => mime,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ContentType::Json)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes extracted from a request or response, with their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    data: Bytes,
    content_type: ContentType,
}

impl BlobContent {
    pub fn new(data: impl Into<Bytes>, content_type: ContentType) -> Self {
        Self {
            data: data.into(),
            content_type,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn into_parts(self) -> (Bytes, ContentType) {
        (self.data, self.content_type)
    }
}

/// Metadata stored alongside a blob.
pub type BlobMetadata = BTreeMap<String, String>;

/// A blob as handed to a [`BlobStore`](crate::blobs::store::BlobStore).
#[derive(Debug, Clone)]
pub struct Blob {
    pub key: String,
    pub blob_type: BlobType,
    pub content_type: ContentType,
    pub metadata: BlobMetadata,
    pub data: Bytes,
}

/// A typed value that can be serialized on demand for capture.
///
/// Implemented for every `Serialize + Send + Sync + 'static` type, so applications
/// never implement it by hand.
pub trait EntityObject: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
    fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error>;
    fn type_name(&self) -> &'static str;
}

impl<T> EntityObject for T
where
    T: Serialize + Send + Sync + 'static,
{
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A materialized message payload.
///
/// Handlers and clients place an `Entity` in the request or response extensions when
/// they still hold the payload in typed form. Extraction then works from the entity
/// instead of draining the body.
#[derive(Clone)]
pub enum Entity {
    Text(String),
    Bytes(Bytes),
    Object(Arc<dyn EntityObject>),
}

impl Entity {
    pub fn object<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Entity::Object(Arc::new(value))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Entity::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Entity::Object(object) => f.debug_tuple("Object").field(&object.type_name()).finish(),
        }
    }
}

impl From<String> for Entity {
    fn from(text: String) -> Self {
        Entity::Text(text)
    }
}

impl From<&'static str> for Entity {
    fn from(text: &'static str) -> Self {
        Entity::Text(text.to_string())
    }
}

impl From<Bytes> for Entity {
    fn from(bytes: Bytes) -> Self {
        Entity::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Entity {
    fn from(bytes: Vec<u8>) -> Self {
        Entity::Bytes(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_mime() {
        assert_eq!(ContentType::from_mime("application/json"), ContentType::Json);
        assert_eq!(
            ContentType::from_mime("Application/JSON; charset=utf-8"),
            ContentType::Json
        );
        assert_eq!(ContentType::from_mime("text/xml"), ContentType::Xml);
        assert_eq!(ContentType::from_mime("text/plain"), ContentType::Text);
        assert_eq!(
            ContentType::from_mime("image/PNG"),
            ContentType::Other("image/PNG".into())
        );
        assert_eq!(
            ContentType::from_mime(" text/csv; charset=Shift_JIS "),
            ContentType::Other("text/csv; charset=Shift_JIS".into())
        );
        assert_eq!(
            ContentType::from_mime("not a mime"),
            ContentType::Other("not a mime".into())
        );
    }

    #[test]
    fn test_content_type_display() {
        assert_eq!(ContentType::Json.to_string(), "application/json");
        assert_eq!(ContentType::Text.to_string(), DEFAULT_CONTENT_TYPE);
        assert_eq!(
            ContentType::Other("application/octet-stream".into()).to_string(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_blob_type_labels() {
        assert_eq!(BlobType::Request.to_string(), "request");
        assert_eq!(BlobType::Response.span_tag(), "response_blob");
    }

    #[test]
    fn test_entity_debug_hides_payload() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let entity = Entity::object(User { name: "Alice" });
        let debug = format!("{:?}", entity);
        assert!(debug.starts_with("Object("));
        assert!(debug.contains("User"));
        assert!(!debug.contains("Alice"));
    }
}
