//! Request tracing middleware.
//!
//! Opens an `http_request` span per request and logs the outcome once the
//! response is ready. Dispatch spans nest under it.

use axum::{
    body::Body,
    http::{Request, Response},
};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info_span, Instrument, Span};

/// Header whose value is attached to the span when present
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S, ResBody> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let span = request_span(&req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = inner.call(req).await;

                if let Ok(response) = &result {
                    let status = response.status();
                    Span::current().record("http.status", status.as_u16());
                    debug!(
                        status = status.as_u16(),
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Request finished"
                    );
                }

                result
            }
            .instrument(span),
        )
    }
}

fn request_span<B>(req: &Request<B>) -> Span {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    info_span!(
        "http_request",
        http.method = %req.method(),
        http.target = %req.uri().path(),
        request_id,
        http.status = tracing::field::Empty,
    )
}
