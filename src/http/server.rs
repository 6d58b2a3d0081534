//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Forward every request to the primary upstream (the "next" handler)
//! - Wrap the primary handler in the mirror handler
//! - Wire up middleware (tracing, timeout)
//! - Serve with connect info so `client.ip` can be extracted
//! - Stop on the shutdown signal

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, MirrorConfig};
use crate::http::mirror::MirrorError;
use crate::observability::metrics;

/// Error building the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// State for the primary forwarding handler.
#[derive(Clone)]
struct PrimaryState {
    client: Client<HttpConnector, Body>,
    upstream: Authority,
}

/// HTTP server for the mirroring proxy.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server. `mirror` is the validated form of
    /// `config.mirror`.
    pub fn new(config: AppConfig, mirror: MirrorConfig) -> Result<Self, ServerError> {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let primary = Router::new()
            .fallback(primary_handler)
            .with_state(PrimaryState { client, upstream });

        let router = Self::build_router(&config, mirror.new_handler(primary)?);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<S>(config: &AppConfig, handler: S) -> Router
    where
        S: tower::Service<Request<Body>, Error = std::convert::Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        Router::new()
            .fallback_service(handler)
            .layer(TimeoutLayer::new(Duration::from_secs(config.upstream.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown signal fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            mirror = %self.config.mirror.host,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Forward the request to the primary upstream and return its response.
async fn primary_handler(State(state): State<PrimaryState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Cannot rewrite request URI");
            metrics::record_primary(StatusCode::BAD_REQUEST.as_u16(), start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    tracing::debug!(method = %method, path = %path, upstream = %state.upstream, "Proxying request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_primary(response.status().as_u16(), start_time);
            let (parts, body): (_, Incoming) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Upstream error");
            metrics::record_primary(StatusCode::BAD_GATEWAY.as_u16(), start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
