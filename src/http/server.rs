//! HTTP server setup for the capture proxy.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy handler
//! - Mount the server blob hooks and the tower-http middleware
//! - Forward every request to the upstream through the client blob hooks
//! - Drain in-flight requests on shutdown

use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, InvalidUri, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{Layer, ServiceExt};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::bundle::TracerBundle;
use crate::config::AppConfig;
use crate::decorators::ClientBlobService;
use crate::observability::metrics;

type UpstreamClient = ClientBlobService<Client<HttpConnector, Body>>;

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    client: UpstreamClient,
    upstream: Authority,
}

/// HTTP server for the capture proxy.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server forwarding to `config.upstream.address`, captured through `bundle`.
    pub fn new(config: AppConfig, bundle: &TracerBundle) -> Result<Self, InvalidUri> {
        let upstream = Authority::from_str(&config.upstream.address)?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let client = bundle.client_layer().layer(client);

        let state = AppState { client, upstream };
        let router = Self::build_router(&config, bundle, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, bundle: &TracerBundle, state: AppState) -> Router {
        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);

        bundle
            .attach(router)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forwards the request to the upstream unchanged and relays its response.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let (mut parts, body) = request.into_parts();

    tracing::debug!(method = %method, path = %parts.uri.path(), "Proxying request");

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(err) => {
            tracing::warn!(error = %err, "Could not build upstream URI");
            metrics::record_request(&method, 400, start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    // The client sets the upstream host from the URI.
    parts.headers.remove(header::HOST);

    // Extensions (including the server span) travel with the request.
    let upstream_request = Request::from_parts(parts, body);

    match state.client.clone().oneshot(upstream_request).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response.into_response()
        }
        Err(err) => {
            tracing::error!(upstream = %state.upstream, error = %err, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
