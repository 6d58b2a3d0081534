//! Request mirroring middleware.
//!
//! # Responsibilities
//! - Run the next handler and hand its response back unchanged
//! - Decide whether the request may be mirrored (admission limiter)
//! - Replay admitted requests to the mirror target in a detached task
//!
//! # Design Decisions
//! - The caller only ever observes the next handler's output
//! - Mirror tasks are not tied to the inbound request; closing the client
//!   connection does not cancel them
//! - Every failure on the mirror path is logged and swallowed

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes, HttpBody},
    http::Request,
};
use futures_util::future::{self, BoxFuture};
use futures_util::stream::{self, Stream, StreamExt};
use http_body_util::{BodyExt, BodyStream, StreamBody};
use hyper::body::Frame;
use thiserror::Error;
use tower::Service;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::MirrorConfig;
use crate::http::forward::{ForwardTarget, Forwarder};
use crate::http::request::MirrorRequest;
use crate::observability::metrics::{self, MirrorOutcome};
use crate::security::{AdmissionLimiter, KeyExtractor};

/// Error building a mirror handler.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("failed to build mirror client: {0}")]
    Client(#[from] reqwest::Error),
}

struct Admission {
    extractor: KeyExtractor,
    limiter: AdmissionLimiter,
}

/// State shared by every clone of one handler and by its mirror tasks.
struct MirrorState {
    config: MirrorConfig,
    forwarder: Forwarder,
    admission: Option<Admission>,
}

impl MirrorConfig {
    /// Wrap `next` in a mirroring handler.
    ///
    /// Each call builds a fresh admission limiter; handlers built from the
    /// same config never share quota.
    pub fn new_handler<S>(&self, next: S) -> Result<MirrorHandler<S>, MirrorError> {
        MirrorHandler::new(self.clone(), next)
    }
}

/// Mirroring wrapper around a `tower::Service`.
///
/// Clones share the same limiter and client.
#[derive(Clone)]
pub struct MirrorHandler<S> {
    next: S,
    state: Arc<MirrorState>,
}

impl<S> MirrorHandler<S> {
    pub fn new(config: MirrorConfig, next: S) -> Result<Self, MirrorError> {
        let forwarder = Forwarder::new(&config)?;

        let admission = (config.connections() > 0).then(|| Admission {
            extractor: KeyExtractor::new(config.variable().clone()),
            limiter: AdmissionLimiter::new(config.connections()),
        });

        tracing::debug!(
            config = %config,
            limited = admission.is_some(),
            "Mirror handler created"
        );

        Ok(Self {
            next,
            state: Arc::new(MirrorState {
                config,
                forwarder,
                admission,
            }),
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.state.config
    }

    /// `None` when the configured connection limit is zero.
    pub fn limiter(&self) -> Option<&AdmissionLimiter> {
        self.state.admission.as_ref().map(|a| &a.limiter)
    }
}

impl<S> Service<Request<Body>> for MirrorHandler<S>
where
    S: Service<Request<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Response: Send,
    S::Error: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Keep the instance that was polled ready, leave a fresh clone behind.
        let clone = self.next.clone();
        let next = std::mem::replace(&mut self.next, clone);
        let state = Arc::clone(&self.state);

        Box::pin(state.handle(request, next))
    }
}

impl MirrorState {
    async fn handle<S>(self: Arc<Self>, request: Request<Body>, mut next: S) -> Result<S::Response, S::Error>
    where
        S: Service<Request<Body>>,
    {
        let (request, captured) = self.capture(request).await;

        let result = next.call(request).await;

        if let Some(captured) = captured {
            self.dispatch(captured);
        }
        result
    }

    /// Buffer the body so it can be sent twice.
    ///
    /// Frames are read until the body ends or `max_body_bytes` is passed.
    /// Next always receives the exact frame sequence the client sent: an
    /// oversized body continues with its unread remainder, a failed read
    /// ends with the same error. Only a fully read body is mirrored.
    async fn capture(&self, request: Request<Body>) -> (Request<Body>, Option<MirrorRequest>) {
        let (parts, mut body) = request.into_parts();
        let limit = self.config.max_body_bytes();

        if body.size_hint().lower() > limit as u64 {
            tracing::debug!(
                path = %parts.uri.path(),
                max_body_bytes = limit,
                "Request body too large, not mirroring"
            );
            metrics::record_mirror(MirrorOutcome::BodySkipped);
            return (Request::from_parts(parts, body), None);
        }

        let mut frames = Vec::new();
        let mut buffered = 0;
        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    buffered += frame.data_ref().map_or(0, Bytes::len);
                    frames.push(frame);
                    if buffered > limit {
                        tracing::debug!(
                            path = %parts.uri.path(),
                            max_body_bytes = limit,
                            "Request body too large, not mirroring"
                        );
                        metrics::record_mirror(MirrorOutcome::BodySkipped);
                        let body = replay(frames, BodyStream::new(body));
                        return (Request::from_parts(parts, body), None);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
                    metrics::record_mirror(MirrorOutcome::BodySkipped);
                    let body = replay(frames, stream::once(future::ready(Err(e))));
                    return (Request::from_parts(parts, body), None);
                }
            }
        }

        let mut data = Vec::with_capacity(buffered);
        for chunk in frames.iter().filter_map(Frame::data_ref) {
            data.extend_from_slice(chunk);
        }
        let bytes = Bytes::from(data);
        let captured = MirrorRequest::from_parts(&parts, bytes.clone());

        let body = if frames.iter().any(Frame::is_trailers) {
            replay(frames, stream::empty())
        } else {
            Body::from(bytes)
        };
        (Request::from_parts(parts, body), Some(captured))
    }

    /// Admission check, then spawn the mirror task.
    fn dispatch(self: &Arc<Self>, request: MirrorRequest) {
        if let Some(admission) = &self.admission {
            let (key, weight) = match admission.extractor.extract(&request) {
                Ok(extracted) => extracted,
                Err(e) => {
                    tracing::error!(
                        variable = %admission.extractor.variable(),
                        error = %e,
                        "Failed to extract source of the request"
                    );
                    metrics::record_mirror(MirrorOutcome::ExtractionFailed);
                    return;
                }
            };

            if let Err(e) = admission.limiter.acquire(&key, weight) {
                tracing::info!(key = %key, error = %e, "Limiting mirrored request source");
                metrics::record_mirror(MirrorOutcome::Limited);
                return;
            }
        }

        let span = tracing::debug_span!(
            "mirror",
            mirror_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.uri.path()
        );
        metrics::record_mirror(MirrorOutcome::Dispatched);

        let state = Arc::clone(self);
        tokio::spawn(async move { state.forward(request).await }.instrument(span));
    }

    async fn forward(&self, request: MirrorRequest) {
        let target = match ForwardTarget::for_request(&self.config, &request) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot build mirror target");
                metrics::record_mirror(MirrorOutcome::Failed);
                return;
            }
        };

        match self.forwarder.forward(&target, request).await {
            Ok(outcome) => {
                tracing::debug!(
                    url = %target.url(),
                    status = %outcome.status,
                    drained_bytes = outcome.drained_bytes,
                    "Mirror completed"
                );
                metrics::record_mirror(MirrorOutcome::Completed);
            }
            Err(e) => {
                tracing::warn!(url = %target.url(), error = %e, "Mirror request failed");
                metrics::record_mirror(MirrorOutcome::Failed);
            }
        }
    }
}

/// Body yielding `frames` already read, then whatever `rest` produces.
fn replay<S>(frames: Vec<Frame<Bytes>>, rest: S) -> Body
where
    S: Stream<Item = Result<Frame<Bytes>, axum::Error>> + Send + 'static,
{
    Body::new(StreamBody::new(stream::iter(frames.into_iter().map(Ok)).chain(rest)))
}
