//! Client-side hooks: capture the requests this service sends and the responses it
//! gets back.
//!
//! [`ClientBlobLayer`] wraps any tower service that speaks `http::Request<Body>`,
//! e.g. a `hyper_util` legacy client. A request carrying an [`ActiveSpan`] in its
//! extensions becomes a child span of it, and the inner service sees the child
//! span in place of the parent.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Request, Response};
use axum::BoxError;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::blobs::{BlobCapture, BlobResult, BlobType};
use crate::decorators::{CaptureOutcome, Capturer, Side};
use crate::observability::span::ActiveSpan;

/// Captures outbound requests and inbound responses of a client span.
#[derive(Clone)]
pub struct ClientSpanDecorator {
    capturer: Capturer,
}

impl ClientSpanDecorator {
    /// Fails when the capture configuration names an unusable store.
    pub fn new(capture: &BlobCapture) -> BlobResult<Self> {
        Ok(Self {
            capturer: Capturer::new(capture, Side::Client)?,
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
        if !self.capturer.extractor.is_client_request_valid(request) {
            return self.capturer.rejected(span, BlobType::Request);
        }

        let extracted = self.capturer.extractor.extract_client_request(request).await;
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
        if !self.capturer.extractor.is_client_response_valid(response) {
            return self.capturer.rejected(span, BlobType::Response);
        }

        let extracted = self.capturer.extractor.extract_client_response(response).await;
        self.capturer.write(span, BlobType::Response, extracted).await
    }
}

struct ClientHooks {
    service: Arc<str>,
    decorator: ClientSpanDecorator,
}

/// Tower layer applying [`ClientSpanDecorator`] around an HTTP client.
#[derive(Clone)]
pub struct ClientBlobLayer {
    hooks: Arc<ClientHooks>,
}

impl ClientBlobLayer {
    pub fn new(service: impl Into<Arc<str>>, decorator: ClientSpanDecorator) -> Self {
        Self {
            hooks: Arc::new(ClientHooks {
                service: service.into(),
                decorator,
            }),
        }
    }
}

impl<S> Layer<S> for ClientBlobLayer {
    type Service = ClientBlobService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientBlobService {
            inner,
            hooks: self.hooks.clone(),
        }
    }
}

/// Service produced by [`ClientBlobLayer`].
#[derive(Clone)]
pub struct ClientBlobService<S> {
    inner: S,
    hooks: Arc<ClientHooks>,
}

impl<S, ResBody> Service<Request<Body>> for ClientBlobService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // The readied service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let hooks = self.hooks.clone();

        let parent = request.extensions().get::<ActiveSpan>().cloned();
        let span = ActiveSpan::for_client_request(&hooks.service, parent.as_ref(), &request);
        span.inject(request.headers_mut());
        request.extensions_mut().insert(span.clone());
        let tracing_span = span.tracing_span().clone();

        Box::pin(
            async move {
                let outcome = hooks.decorator.decorate_request(&mut request, &span).await;
                tracing::trace!(?outcome, "Client request hook finished");

                let mut response = inner.call(request).await?.map(Body::new);
                span.set_status(response.status());

                let outcome = hooks.decorator.decorate_response(&mut response, &span).await;
                tracing::trace!(?outcome, "Client response hook finished");
                Ok(response)
            }
            .instrument(tracing_span),
        )
    }
}
