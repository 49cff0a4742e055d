//! # Operation Dispatcher
//!
//! Runs one request through its lifecycle:
//!
//! ```text
//! identity -> open scope -> storage handler -> commit / rollback -> result
//! ```
//!
//! Identity errors and store-open failures are returned before the storage
//! handler is called and before any transaction exists. Once a scope is
//! open it is terminated exactly once, on every path.

pub mod context;
pub mod envelope;
pub mod scope;

pub use context::ContextBuilder;
pub use scope::{run_scoped, ScopeState, TransactionScope};

use crate::domain::config::HeaderConfig;
use crate::domain::context::{OperationRequest, RequestContext};
use crate::domain::error::{ConfigError, HandlerError, OperationResult};
use crate::domain::operations::Operation;
use crate::middleware::metrics::{HandlerStats, RequestTimer};
use crate::ports::outbound::{MetaStore, StorageHandler};
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

/// Everything the dispatcher reads from an inbound request
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Value of the `allocation` route parameter, if the route has one
    pub allocation: Option<String>,
    pub headers: HeaderMap,
    pub request: OperationRequest,
}

/// Binds each operation to its storage-handler method inside a scope
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn MetaStore>,
    storage: Arc<dyn StorageHandler>,
    contexts: ContextBuilder,
    stats: Arc<HandlerStats>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MetaStore>,
        storage: Arc<dyn StorageHandler>,
        headers: &HeaderConfig,
        stats: Arc<HandlerStats>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            storage,
            contexts: ContextBuilder::new(headers)?,
            stats,
        })
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<HandlerStats> {
        &self.stats
    }

    /// Dispatch one request for `operation`
    pub async fn dispatch(&self, operation: Operation, inbound: InboundRequest) -> OperationResult {
        let span = info_span!(
            "dispatch",
            operation = operation.name(),
            allocation = inbound.allocation.as_deref().unwrap_or(""),
        );

        let timer = RequestTimer::new(Arc::clone(&self.stats), operation);
        let result = self.run(operation, inbound).instrument(span).await;
        timer.finish(result.is_ok());
        result
    }

    async fn run(&self, operation: Operation, inbound: InboundRequest) -> OperationResult {
        let identity = match self.contexts.identity(
            operation,
            inbound.allocation.as_deref(),
            &inbound.headers,
        ) {
            Ok(identity) => identity,
            Err(e) => {
                debug!(error = %e, "Rejected request context");
                self.stats.record_setup_failure();
                return Err(e);
            }
        };

        let scope = match TransactionScope::open(self.store.as_ref(), Arc::clone(&self.stats)) {
            Ok(scope) => scope,
            Err(e) => {
                error!(error = %e, "Failed to open transaction");
                self.stats.record_setup_failure();
                return Err(HandlerError::internal("unable to open transaction"));
            }
        };

        if operation == Operation::FileUpload {
            info!(client_id = %identity.client_id, "Upload request");
        }

        let storage = self.storage.as_ref();
        let request = &inbound.request;

        run_scoped(scope, operation.scope_policy(), |tx| async move {
            let ctx = RequestContext::new(identity, tx);
            invoke(storage, operation, &ctx, request).await
        })
        .await
    }
}

/// Route table: operation to storage-handler method
async fn invoke(
    storage: &dyn StorageHandler,
    operation: Operation,
    ctx: &RequestContext,
    request: &OperationRequest,
) -> OperationResult {
    match operation {
        Operation::AllocationLookup => storage.get_allocation_details(ctx, request).await,
        Operation::FileMetadata => storage.get_file_meta(ctx, request).await,
        Operation::FileDownload => storage.download_file(ctx, request).await,
        Operation::FileList => storage.list_entities(ctx, request).await,
        Operation::ReferencePathLookup => storage.get_reference_path(ctx, request).await,
        Operation::FileUpload => storage.write_file(ctx, request).await,
        Operation::WriteCommit => storage.commit_write(ctx, request).await,
    }
}
