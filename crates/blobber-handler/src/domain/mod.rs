//! Domain types for the storage handler layer.
//!
//! Configuration, errors, the operation registry and the request context.

pub mod config;
pub mod context;
pub mod error;
pub mod operations;

// Re-exports for convenience
pub use config::HandlerConfig;
pub use context::{OperationRequest, RequestContext, RequestIdentity, TransactionHandle};
pub use error::{HandlerError, OperationResult, StoreError};
pub use operations::{Operation, ScopePolicy};
