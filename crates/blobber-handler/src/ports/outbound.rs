//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the dispatcher requires the host application to provide:
//! a metadata store that hands out transactions, and the storage handler
//! that implements the file and allocation semantics.

use crate::domain::context::{OperationRequest, RequestContext};
use crate::domain::error::{OperationResult, StoreError};
use async_trait::async_trait;
use std::sync::Arc;

/// Key-value pairs returned by a prefix scan, ordered by key.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Transaction factory shared by all requests.
///
/// Production: any engine with create/commit/rollback primitives.
/// Testing and the reference node: `InMemoryMetaStore`.
///
/// Implementations must allow concurrent `create_transaction` calls; each
/// returned transaction is independent.
pub trait MetaStore: Send + Sync {
    /// Open a new transaction.
    fn create_transaction(&self) -> Result<Arc<dyn Transaction>, StoreError>;

    /// Release the store. Later `create_transaction` and `commit` calls fail
    /// with [`StoreError::Closed`].
    fn close(&self);

    /// Whether `close` has run.
    fn is_closed(&self) -> bool;
}

/// One open datastore transaction.
///
/// Methods take `&self` so a transaction can be shared between the scope
/// that terminates it and the handle passed to business code; implementations
/// use interior mutability.
pub trait Transaction: Send + Sync {
    /// Read a key, seeing this transaction's own staged writes.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stage a put.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Stage a delete.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Iterate over keys with a prefix, including staged writes.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, StoreError>;

    /// Make every staged write durable, atomically.
    ///
    /// Either ALL staged operations are applied, or NONE are.
    fn commit(&self) -> Result<(), StoreError>;

    /// Discard every staged write.
    fn rollback(&self) -> Result<(), StoreError>;
}

/// Business-logic collaborator implementing the storage operations.
///
/// Every method receives the request context (identity, allocation and the
/// transaction handle) and the request data. Returning `Err` makes the
/// dispatcher roll the transaction back.
#[async_trait]
pub trait StorageHandler: Send + Sync {
    async fn get_allocation_details(
        &self,
        ctx: &RequestContext,
        request: &OperationRequest,
    ) -> OperationResult;

    async fn get_file_meta(&self, ctx: &RequestContext, request: &OperationRequest)
        -> OperationResult;

    async fn download_file(&self, ctx: &RequestContext, request: &OperationRequest)
        -> OperationResult;

    async fn list_entities(&self, ctx: &RequestContext, request: &OperationRequest)
        -> OperationResult;

    async fn commit_write(&self, ctx: &RequestContext, request: &OperationRequest)
        -> OperationResult;

    async fn get_reference_path(
        &self,
        ctx: &RequestContext,
        request: &OperationRequest,
    ) -> OperationResult;

    async fn write_file(&self, ctx: &RequestContext, request: &OperationRequest)
        -> OperationResult;
}
