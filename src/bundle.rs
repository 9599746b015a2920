//! One-stop wiring of blob capture into an axum application and its HTTP clients.

use std::sync::Arc;

use axum::Router;

use crate::blobs::{BlobCapture, BlobResult};
use crate::decorators::{
    server_blob_middleware, ClientBlobLayer, ClientSpanDecorator, ServerBlobState,
    ServerSpanDecorator,
};

/// Server and client hooks for one service, built from one [`BlobCapture`].
///
/// ```ignore
/// let bundle = TracerBundle::new("orders", capture)?;
/// let app = bundle.attach(Router::new().route("/orders", post(create_order)));
/// let client = ServiceBuilder::new()
///     .layer(bundle.client_layer())
///     .service(hyper_client);
/// ```
#[derive(Clone)]
pub struct TracerBundle {
    service: Arc<str>,
    capture: Arc<BlobCapture>,
    server: ServerSpanDecorator,
    client: ClientSpanDecorator,
}

impl TracerBundle {
    /// Build both decorators. A store that cannot be built fails here, at startup.
    pub fn new(service: impl Into<Arc<str>>, capture: Arc<BlobCapture>) -> BlobResult<Self> {
        let server = ServerSpanDecorator::new(&capture)?;
        let client = ClientSpanDecorator::new(&capture)?;

        Ok(Self {
            service: service.into(),
            capture,
            server,
            client,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn capture(&self) -> &BlobCapture {
        &self.capture
    }

    /// Mount the server hooks on every route of `router`.
    pub fn attach<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let state = Arc::new(ServerBlobState::new(self.service.clone(), self.server.clone()));
        router.layer(axum::middleware::from_fn_with_state(state, server_blob_middleware))
    }

    /// Layer for outbound HTTP clients.
    pub fn client_layer(&self) -> ClientBlobLayer {
        ClientBlobLayer::new(self.service.clone(), self.client.clone())
    }
}
