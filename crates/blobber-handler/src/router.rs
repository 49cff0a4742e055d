//! HTTP route table.
//!
//! Every operation route is method-agnostic and wrapped in its own timeout
//! layer. Diagnostic routes bypass the dispatcher entirely.

use crate::diagnostics::{config_dump, debug_dump, health_check, stats_dump};
use crate::dispatch::{envelope, Dispatcher, InboundRequest};
use crate::domain::config::HandlerConfig;
use crate::domain::context::OperationRequest;
use crate::domain::error::HandlerError;
use crate::domain::operations::Operation;
use crate::middleware::TimeoutLayer;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    response::Response,
    routing::{any, MethodRouter},
    Router,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Name of the route parameter carrying the allocation id
pub const ALLOCATION_PARAM: &str = "allocation";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<HandlerConfig>,
    pub started: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, config: Arc<HandlerConfig>) -> Self {
        Self {
            dispatcher,
            config,
            started: Instant::now(),
        }
    }
}

/// Build the route table: one route per operation plus diagnostics
pub fn build_routes(state: AppState) -> Router {
    let mut router = Router::new();
    for operation in Operation::ALL {
        router = router.route(
            operation.route(),
            operation_route(operation, &state.config),
        );
    }

    router
        .route("/_debug", any(debug_dump))
        .route("/_config", any(config_dump))
        .route("/_stats", any(stats_dump))
        .route("/health", any(health_check))
        .with_state(state)
}

fn operation_route(operation: Operation, config: &HandlerConfig) -> MethodRouter<AppState> {
    any(
        move |State(state): State<AppState>,
              path: Result<Path<HashMap<String, String>>, PathRejection>,
              query: Result<Query<HashMap<String, String>>, QueryRejection>,
              method: Method,
              headers: HeaderMap,
              body: Bytes| async move {
            handle_operation(state, operation, path, query, method, headers, body).await
        },
    )
    .layer(TimeoutLayer::for_operation(operation, &config.timeouts))
}

async fn handle_operation(
    state: AppState,
    operation: Operation,
    path: Result<Path<HashMap<String, String>>, PathRejection>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // A rejected path leaves the allocation unset; the context builder
    // reports it if the operation needs one.
    let allocation = match path {
        Ok(Path(mut params)) => params.remove(ALLOCATION_PARAM),
        Err(e) => {
            debug!(error = %e, "Path parameters rejected");
            None
        }
    };

    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => {
            state.dispatcher.stats().record_setup_failure();
            return envelope::into_response(Err(HandlerError::invalid_parameters(format!(
                "malformed query string: {}",
                e
            ))));
        }
    };

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let inbound = InboundRequest {
        allocation,
        headers,
        request: OperationRequest {
            method,
            query,
            content_type,
            body,
        },
    };

    envelope::into_response(state.dispatcher.dispatch(operation, inbound).await)
}
