//! Response envelope: turns an operation result into an HTTP response.
//!
//! | Result                 | Status | Body                                 |
//! |------------------------|--------|--------------------------------------|
//! | `Ok(Value::Null)`      | 200    | empty                                |
//! | `Ok(payload)`          | 200    | payload as JSON                      |
//! | `Err(e)`               | 400    | `{"code": e.code, "error": e.message}` |
//!
//! Timeouts, panics and oversized bodies are produced by the middleware
//! stack with their own status codes but the same error body shape.

use crate::domain::error::{HandlerError, OperationResult};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Render an operation result
pub fn into_response(result: OperationResult) -> Response {
    match result {
        Ok(serde_json::Value::Null) => StatusCode::OK.into_response(),
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err),
    }
}

/// Render an error with an explicit status
pub fn error_response(status: StatusCode, err: &HandlerError) -> Response {
    (status, Json(err)).into_response()
}
