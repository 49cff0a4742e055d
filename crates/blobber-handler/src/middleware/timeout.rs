//! Per-operation timeout.
//!
//! Each operation route gets its own layer with the duration of its timeout
//! class. When the deadline passes the inner future is dropped, which
//! releases any open transaction scope through its `Drop` rollback, and the
//! client receives a 504 error envelope.

use crate::dispatch::envelope::error_response;
use crate::domain::config::TimeoutConfig;
use crate::domain::error::HandlerError;
use crate::domain::operations::Operation;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

/// Timeout layer for one operation
#[derive(Clone, Copy)]
pub struct TimeoutLayer {
    operation: Operation,
    duration: Duration,
}

impl TimeoutLayer {
    pub fn new(operation: Operation, duration: Duration) -> Self {
        Self {
            operation,
            duration,
        }
    }

    /// Layer using the operation's configured timeout class
    pub fn for_operation(operation: Operation, config: &TimeoutConfig) -> Self {
        Self::new(operation, operation.timeout(config))
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            operation: self.operation,
            duration: self.duration,
        }
    }
}

/// Timeout service
#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    operation: Operation,
    duration: Duration,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let operation = self.operation;
        let duration = self.duration;

        Box::pin(async move {
            match timeout(duration, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        operation = operation.name(),
                        timeout_ms = duration.as_millis() as u64,
                        "Request timed out"
                    );
                    Ok(timeout_response(operation))
                }
            }
        })
    }
}

fn timeout_response(operation: Operation) -> Response {
    error_response(
        StatusCode::GATEWAY_TIMEOUT,
        &HandlerError::timeout(operation.name()),
    )
}
