//! Active span handles passed to the capture hooks.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Propagate trace context to outgoing requests
//! - Carry span identity and tags for blob keys
//!
//! # Design Decisions
//! - Trace id comes from `x-trace-id`, then `x-request-id`, else a fresh UUID v4
//! - Every hook call gets a fresh span id
//! - Tags are mirrored onto the `tracing::Span` when it declares the field
//! - Server and client spans carry `http.method`, `http.url` and `http.status_code`

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use uuid::Uuid;

pub const X_TRACE_ID: &str = "x-trace-id";
pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_PARENT_SPAN_ID: &str = "x-parent-span-id";

pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_URL: &str = "http.url";
pub const HTTP_STATUS_CODE: &str = "http.status_code";

/// The span a capture hook runs under.
///
/// Cheap to clone; clones share tags.
#[derive(Debug, Clone)]
pub struct ActiveSpan {
    service: Arc<str>,
    operation: String,
    trace_id: String,
    span_id: String,
    parent_id: Option<String>,
    span: tracing::Span,
    tags: Arc<Mutex<BTreeMap<String, String>>>,
}

impl ActiveSpan {
    pub fn new(
        service: impl Into<Arc<str>>,
        operation: impl Into<String>,
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        span: tracing::Span,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_id: None,
            span,
            tags: Arc::default(),
        }
    }

    /// Start the span for a request received by this service.
    pub fn for_server_request<B>(service: &Arc<str>, request: &Request<B>) -> Self {
        let trace_id = header_str(request.headers(), X_TRACE_ID)
            .or_else(|| header_str(request.headers(), X_REQUEST_ID))
            .map(str::to_string)
            .unwrap_or_else(new_id);
        let parent_id = header_str(request.headers(), X_PARENT_SPAN_ID).map(str::to_string);
        let operation = format!("{} {}", request.method(), request.uri().path());
        let span_id = new_id();

        let span = tracing::info_span!(
            "server",
            service = %service,
            operation = %operation,
            trace_id = %trace_id,
            span_id = %span_id,
            request_blob = tracing::field::Empty,
            response_blob = tracing::field::Empty,
            "http.method" = tracing::field::Empty,
            "http.url" = tracing::field::Empty,
            "http.status_code" = tracing::field::Empty,
        );

        let active = Self {
            parent_id,
            ..Self::new(service.clone(), operation, trace_id, span_id, span)
        };
        active.tag_request(request);
        active
    }

    /// Start the span for a request this service is about to send.
    ///
    /// Joins the trace of `parent` when there is one.
    pub fn for_client_request<B>(
        service: &Arc<str>,
        parent: Option<&ActiveSpan>,
        request: &Request<B>,
    ) -> Self {
        let trace_id = parent
            .map(|parent| parent.trace_id.clone())
            .unwrap_or_else(new_id);
        let authority = request
            .uri()
            .authority()
            .map(|authority| authority.as_str())
            .unwrap_or_default();
        let operation = format!("{} {}{}", request.method(), authority, request.uri().path());
        let span_id = new_id();

        let span = tracing::info_span!(
            parent: parent.and_then(|parent| parent.span.id()),
            "client",
            service = %service,
            operation = %operation,
            trace_id = %trace_id,
            span_id = %span_id,
            request_blob = tracing::field::Empty,
            response_blob = tracing::field::Empty,
            "http.method" = tracing::field::Empty,
            "http.url" = tracing::field::Empty,
            "http.status_code" = tracing::field::Empty,
        );

        let active = Self {
            parent_id: parent.map(|parent| parent.span_id.clone()),
            ..Self::new(service.clone(), operation, trace_id, span_id, span)
        };
        active.tag_request(request);
        active
    }

    fn tag_request<B>(&self, request: &Request<B>) {
        self.set_tag(HTTP_METHOD, request.method().as_str());
        self.set_tag(HTTP_URL, &request.uri().to_string());
    }

    /// Record the status of the response that ends this span.
    pub fn set_status(&self, status: StatusCode) {
        self.set_tag(HTTP_STATUS_CODE, status.as_str());
    }

    /// Write the trace context headers for a downstream call.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.trace_id) {
            headers.insert(X_TRACE_ID, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.span_id) {
            headers.insert(X_PARENT_SPAN_ID, value);
        }
    }

    pub fn set_tag(&self, key: &str, value: &str) {
        self.span.record(key, value);
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn tag(&self, key: &str) -> Option<String> {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn tracing_span(&self) -> &tracing::Span {
        &self.span
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn service() -> Arc<str> {
        Arc::from("orders")
    }

    #[test]
    fn test_server_span_reuses_incoming_trace_id() {
        let request = Request::builder()
            .method("POST")
            .uri("/users?active=true")
            .header(X_TRACE_ID, "trace-123")
            .header(X_PARENT_SPAN_ID, "parent-9")
            .body(Body::empty())
            .unwrap();

        let span = ActiveSpan::for_server_request(&service(), &request);
        assert_eq!(span.service(), "orders");
        assert_eq!(span.operation(), "POST /users");
        assert_eq!(span.trace_id(), "trace-123");
        assert_eq!(span.parent_id(), Some("parent-9"));
        assert!(Uuid::parse_str(span.span_id()).is_ok());
        assert_eq!(span.tag(HTTP_METHOD).as_deref(), Some("POST"));
        assert_eq!(span.tag(HTTP_URL).as_deref(), Some("/users?active=true"));
        assert_eq!(span.tag(HTTP_STATUS_CODE), None);

        span.set_status(StatusCode::CREATED);
        assert_eq!(span.tag(HTTP_STATUS_CODE).as_deref(), Some("201"));
    }

    #[test]
    fn test_server_span_falls_back_to_request_id() {
        let request = Request::builder()
            .uri("/")
            .header(X_REQUEST_ID, "req-1")
            .body(Body::empty())
            .unwrap();
        let span = ActiveSpan::for_server_request(&service(), &request);
        assert_eq!(span.trace_id(), "req-1");

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let span = ActiveSpan::for_server_request(&service(), &request);
        assert!(Uuid::parse_str(span.trace_id()).is_ok());
    }

    #[test]
    fn test_client_span_joins_parent_trace() {
        let inbound = Request::builder()
            .uri("/checkout")
            .header(X_TRACE_ID, "trace-abc")
            .body(Body::empty())
            .unwrap();
        let parent = ActiveSpan::for_server_request(&service(), &inbound);

        let outbound = Request::builder()
            .method("GET")
            .uri("http://inventory:8080/items/42")
            .body(Body::empty())
            .unwrap();
        let child = ActiveSpan::for_client_request(&service(), Some(&parent), &outbound);

        assert_eq!(child.trace_id(), "trace-abc");
        assert_eq!(child.parent_id(), Some(parent.span_id()));
        assert_eq!(child.operation(), "GET inventory:8080/items/42");
        assert_eq!(child.tag(HTTP_URL).as_deref(), Some("http://inventory:8080/items/42"));
        assert_ne!(child.span_id(), parent.span_id());

        let mut headers = HeaderMap::new();
        child.inject(&mut headers);
        assert_eq!(headers[X_TRACE_ID], "trace-abc");
        assert_eq!(headers[X_PARENT_SPAN_ID], child.span_id());
    }

    #[test]
    fn test_tags_are_shared_between_clones() {
        let span = ActiveSpan::new("svc", "op", "t", "s", tracing::Span::none());
        let clone = span.clone();
        clone.set_tag("request_blob", "svc_op_s_request");
        assert_eq!(span.tag("request_blob").as_deref(), Some("svc_op_s_request"));
        assert_eq!(span.tag("response_blob"), None);
    }
}
