//! Server-side hooks: capture the request a handler receives and the response it sends.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Response;
use axum::middleware::Next;
use tracing::Instrument;

use crate::blobs::{BlobCapture, BlobResult, BlobType};
use crate::decorators::{CaptureOutcome, Capturer, Side};
use crate::observability::span::ActiveSpan;

/// Captures inbound requests and outbound responses of a server span.
#[derive(Clone)]
pub struct ServerSpanDecorator {
    capturer: Capturer,
}

impl ServerSpanDecorator {
    /// Fails when the capture configuration names an unusable store.
    pub fn new(capture: &BlobCapture) -> BlobResult<Self> {
        Ok(Self {
            capturer: Capturer::new(capture, Side::Server)?,
        })
    }

    pub async fn decorate_request(
        &self,
        request: &mut Request<Body>,
        span: &ActiveSpan,
    ) -> CaptureOutcome {
        if !self.capturer.is_enabled() {
            return CaptureOutcome::Disabled;
        }
        if !self.capturer.extractor.is_server_request_valid(request) {
            return self.capturer.rejected(span, BlobType::Request);
        }

        let extracted = self.capturer.extractor.extract_server_request(request).await;
        self.capturer.write(span, BlobType::Request, extracted).await
    }

    pub async fn decorate_response(
        &self,
        response: &mut Response<Body>,
        span: &ActiveSpan,
    ) -> CaptureOutcome {
        if !self.capturer.is_enabled() {
            return CaptureOutcome::Disabled;
        }
        if !self.capturer.extractor.is_server_response_valid(response) {
            return self.capturer.rejected(span, BlobType::Response);
        }

        let extracted = self.capturer.extractor.extract_server_response(response).await;
        self.capturer.write(span, BlobType::Response, extracted).await
    }
}

/// State for [`server_blob_middleware`].
pub struct ServerBlobState {
    service: Arc<str>,
    decorator: ServerSpanDecorator,
}

impl ServerBlobState {
    pub fn new(service: impl Into<Arc<str>>, decorator: ServerSpanDecorator) -> Self {
        Self {
            service: service.into(),
            decorator,
        }
    }
}

/// Opens a server span per request and runs both server hooks around the handler.
///
/// The span is placed in the request extensions so outbound calls made while
/// handling the request join its trace.
pub async fn server_blob_middleware(
    State(state): State<Arc<ServerBlobState>>,
    mut request: Request,
    next: Next,
) -> Response<Body> {
    let span = ActiveSpan::for_server_request(&state.service, &request);
    request.extensions_mut().insert(span.clone());
    let tracing_span = span.tracing_span().clone();

    async move {
        let outcome = state.decorator.decorate_request(&mut request, &span).await;
        tracing::trace!(?outcome, "Request hook finished");

        let mut response = next.run(request).await;
        span.set_status(response.status());

        let outcome = state.decorator.decorate_response(&mut response, &span).await;
        tracing::trace!(?outcome, "Response hook finished");
        response
    }
    .instrument(tracing_span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::{BlobCapture, ContentType, Entity, MemoryStore};
    use crate::config::BlobsConfig;
    use crate::decorators::testing::{capture_into, failing_capture};
    use crate::blobs::store::BLOB_DIRECTORY;
    use crate::observability::span::{HTTP_METHOD, HTTP_STATUS_CODE, HTTP_URL};
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Extension, Router};
    use serde::Serialize;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Serialize)]
    struct User {
        name: &'static str,
    }

    fn span() -> ActiveSpan {
        ActiveSpan::new("users", "POST /users", "trace-1", "span-1", tracing::Span::none())
    }

    fn json_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn json_response() -> Response<Body> {
        let mut response = Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\":\"Alice\"}"))
            .unwrap();
        response
            .extensions_mut()
            .insert(Entity::object(User { name: "Alice" }));
        response
    }

    #[tokio::test]
    async fn test_request_and_response_are_written() {
        let store = MemoryStore::new();
        let decorator = ServerSpanDecorator::new(&capture_into(store.clone(), None)).unwrap();
        let span = span();

        let mut request = json_request("{\"name\":\"Alice\"}");
        let outcome = decorator.decorate_request(&mut request, &span).await;
        assert_eq!(
            outcome,
            CaptureOutcome::Written {
                key: "users_POST--users_span-1_request".into()
            }
        );

        let mut response = json_response();
        let outcome = decorator.decorate_response(&mut response, &span).await;
        assert!(matches!(outcome, CaptureOutcome::Written { .. }));

        let blobs = store.blobs();
        assert_eq!(blobs.len(), 2);
        for blob in &blobs {
            assert_eq!(blob.data.as_ref(), b"{\"name\":\"Alice\"}");
            assert_eq!(blob.content_type, ContentType::Json);
        }
        assert_eq!(blobs[0].blob_type, BlobType::Request);
        assert_eq!(blobs[1].blob_type, BlobType::Response);
        assert_eq!(span.tag("request_blob"), Some(blobs[0].key.clone()));
        assert_eq!(span.tag("response_blob"), Some(blobs[1].key.clone()));

        // The handler still sees the full request body.
        let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"{\"name\":\"Alice\"}");
    }

    #[tokio::test]
    async fn test_disabled_capture_writes_nothing() {
        let decorator = ServerSpanDecorator::new(&BlobCapture::new(BlobsConfig::default())).unwrap();
        let span = span();

        let mut request = json_request("{}");
        assert_eq!(
            decorator.decorate_request(&mut request, &span).await,
            CaptureOutcome::Disabled
        );
        let mut response = json_response();
        assert_eq!(
            decorator.decorate_response(&mut response, &span).await,
            CaptureOutcome::Disabled
        );
        assert_eq!(span.tag("request_blob"), None);
    }

    #[tokio::test]
    async fn test_rejected_messages_are_not_written() {
        struct NothingValid;

        impl crate::blobs::BlobExtractor for NothingValid {
            fn is_server_request_valid(&self, _request: &Request<Body>) -> bool {
                false
            }

            fn is_server_response_valid(&self, _response: &Response<Body>) -> bool {
                false
            }
        }

        let store = MemoryStore::new();
        let capture = capture_into(store.clone(), None).with_extractor(Arc::new(NothingValid));
        let decorator = ServerSpanDecorator::new(&capture).unwrap();
        let span = span();

        let mut request = json_request("{}");
        assert_eq!(
            decorator.decorate_request(&mut request, &span).await,
            CaptureOutcome::Rejected
        );
        let mut response = json_response();
        assert_eq!(
            decorator.decorate_response(&mut response, &span).await,
            CaptureOutcome::Rejected
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_is_swallowed() {
        let store = MemoryStore::new();
        let decorator = ServerSpanDecorator::new(&capture_into(store.clone(), None)).unwrap();

        let broken = Body::from_stream(futures_util::stream::once(async {
            Err::<axum::body::Bytes, std::io::Error>(std::io::Error::other("reset"))
        }));
        let mut request = Request::new(broken);

        assert_eq!(
            decorator.decorate_request(&mut request, &span()).await,
            CaptureOutcome::Failed
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let decorator = ServerSpanDecorator::new(&failing_capture()).unwrap();
        let span = span();

        let mut request = json_request("{\"name\":\"Alice\"}");
        assert_eq!(
            decorator.decorate_request(&mut request, &span).await,
            CaptureOutcome::Failed
        );
        assert_eq!(span.tag("request_blob"), None);

        let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"{\"name\":\"Alice\"}");
    }

    #[tokio::test]
    async fn test_zero_rate_samples_everything_out() {
        let store = MemoryStore::new();
        let decorator = ServerSpanDecorator::new(&capture_into(store.clone(), Some(0.0))).unwrap();

        for _ in 0..5 {
            let mut request = json_request("{}");
            assert_eq!(
                decorator.decorate_request(&mut request, &span()).await,
                CaptureOutcome::Sampled
            );
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_long_path_is_written_to_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let capture = BlobCapture::new(crate::decorators::testing::config(None))
            .with_working_dir(dir.path());
        let decorator = ServerSpanDecorator::new(&capture).unwrap();

        let path = format!("/items/{}", "a".repeat(300));
        let mut request = Request::builder()
            .method("POST")
            .uri(path.as_str())
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("payload"))
            .unwrap();
        let span = ActiveSpan::for_server_request(&Arc::from("items"), &request);

        let outcome = decorator.decorate_request(&mut request, &span).await;
        let CaptureOutcome::Written { key } = outcome else {
            panic!("expected a written blob, got {outcome:?}");
        };
        assert!(key.len() + ".meta.json".len() <= 255);

        let data = std::fs::read(dir.path().join(BLOB_DIRECTORY).join(&key)).unwrap();
        assert_eq!(data, b"payload");
        assert_eq!(span.tag("request_blob"), Some(key));
    }

    #[test]
    fn test_unsupported_store_fails_construction() {
        let mut config = crate::decorators::testing::config(None);
        config.store.name = "s3".into();
        let dir = tempfile::tempdir().unwrap();
        let capture = BlobCapture::new(config).with_working_dir(dir.path());
        assert!(ServerSpanDecorator::new(&capture).is_err());
    }

    #[tokio::test]
    async fn test_middleware_captures_round_trip() {
        async fn create_user(body: String) -> impl IntoResponse {
            let mut response = (
                [(header::CONTENT_TYPE, "application/json")],
                body.clone(),
            )
                .into_response();
            response.extensions_mut().insert(Entity::Text(body));
            response
        }

        let store = MemoryStore::new();
        let decorator = ServerSpanDecorator::new(&capture_into(store.clone(), None)).unwrap();
        let state = Arc::new(ServerBlobState::new("users", decorator));
        let app = Router::new()
            .route("/users", post(create_user))
            .layer(axum::middleware::from_fn_with_state(state, server_blob_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/users")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-trace-id", "trace-77")
                    .body(Body::from("{\"name\":\"Alice\"}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"{\"name\":\"Alice\"}");

        let blobs = store.blobs();
        assert_eq!(blobs.len(), 2);
        assert!(blobs[0].key.starts_with("users_POST--users_"));
        assert!(blobs[0].key.ends_with("_request"));
        assert!(blobs[1].key.ends_with("_response"));
        for blob in &blobs {
            assert_eq!(blob.data.as_ref(), b"{\"name\":\"Alice\"}");
            assert_eq!(blob.content_type, ContentType::Json);
            assert_eq!(blob.metadata["trace-id"], "trace-77");
        }
        assert_eq!(blobs[0].metadata["span-id"], blobs[1].metadata["span-id"]);
    }

    #[tokio::test]
    async fn test_middleware_tags_http_fields() {
        let handled: Arc<Mutex<Option<ActiveSpan>>> = Arc::default();
        let slot = handled.clone();
        let handler = move |Extension(span): Extension<ActiveSpan>| {
            let slot = slot.clone();
            async move {
                *slot.lock().unwrap() = Some(span);
                StatusCode::CREATED
            }
        };

        let decorator = ServerSpanDecorator::new(&capture_into(MemoryStore::new(), None)).unwrap();
        let state = Arc::new(ServerBlobState::new("users", decorator));
        let app = Router::new()
            .route("/users", post(handler))
            .layer(axum::middleware::from_fn_with_state(state, server_blob_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/users?dry_run=1")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let span = handled.lock().unwrap().clone().unwrap();
        assert_eq!(span.tag(HTTP_METHOD).as_deref(), Some("POST"));
        assert_eq!(span.tag(HTTP_URL).as_deref(), Some("/users?dry_run=1"));
        assert_eq!(span.tag(HTTP_STATUS_CODE).as_deref(), Some("201"));
    }
}
