//! Shared utilities for integration testing.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, Uri},
    response::IntoResponse,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A request as seen by the mirror target.
#[derive(Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct Recorder {
    tx: mpsc::UnboundedSender<RecordedRequest>,
    delay: Duration,
}

async fn record(State(recorder): State<Recorder>, request: Request<Body>) -> &'static str {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    tokio::time::sleep(recorder.delay).await;
    let _ = recorder.tx.send(RecordedRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    });
    "mirrored"
}

/// Start a mirror target that reports every request it receives.
pub async fn start_recording_backend() -> (SocketAddr, mpsc::UnboundedReceiver<RecordedRequest>) {
    start_slow_recording_backend(Duration::ZERO).await
}

/// Like [`start_recording_backend`], but each response is held back by `delay`.
pub async fn start_slow_recording_backend(delay: Duration) -> (SocketAddr, mpsc::UnboundedReceiver<RecordedRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().fallback(record).with_state(Recorder { tx, delay });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, rx)
}

/// Serve `service` on a loopback port with connect info enabled.
pub async fn serve<S>(service: S) -> SocketAddr
where
    S: tower::Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .fallback_service(service)
        .into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a bare TCP backend that answers every request with `response`.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                // Drain the request head so closing doesn't reset the connection.
                let mut buf = [0u8; 4096];
                let mut head = Vec::new();
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
