//! Turns a panicking request into a 500 error envelope.
//!
//! The panic unwinds through the request's transaction scope first, so the
//! transaction is already rolled back when this runs.

use crate::dispatch::envelope::error_response;
use crate::domain::error::HandlerError;
use axum::http::StatusCode;
use axum::response::Response;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

/// Catch-panic layer producing the error envelope
pub fn create_panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(panic = %details, "Handler panicked");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &HandlerError::internal("request handler panicked"),
    )
}
