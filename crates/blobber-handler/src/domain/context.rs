//! Request-scoped context passed explicitly to every storage operation.
//!
//! A [`RequestContext`] is built once per request and never mutated. The
//! identity part is a pure function of the route's allocation parameter and
//! the two identity headers; the transaction handle ties it to the request's
//! open scope.

use crate::domain::error::{HandlerError, StoreError};
use crate::ports::outbound::{ScanResult, Transaction};
use axum::http::Method;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Caller identity and target allocation, exactly as the request supplied them.
///
/// Empty strings mean "not supplied"; whether that is acceptable is decided by
/// the storage handler per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RequestIdentity {
    pub allocation_id: String,
    pub client_id: String,
    pub client_public_key: String,
}

impl RequestIdentity {
    pub fn new(
        allocation_id: impl Into<String>,
        client_id: impl Into<String>,
        client_public_key: impl Into<String>,
    ) -> Self {
        Self {
            allocation_id: allocation_id.into(),
            client_id: client_id.into(),
            client_public_key: client_public_key.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.client_id.is_empty()
    }
}

/// Data-only view of the request's open transaction.
///
/// Commit and rollback are not exposed: only the transaction scope that owns
/// the request terminates the transaction.
#[derive(Clone)]
pub struct TransactionHandle {
    inner: Arc<dyn Transaction>,
}

impl TransactionHandle {
    pub(crate) fn new(inner: Arc<dyn Transaction>) -> Self {
        Self { inner }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.inner.put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    pub fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        self.inner.prefix_scan(prefix)
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransactionHandle(..)")
    }
}

/// Immutable per-request bundle handed to the storage handler
#[derive(Debug, Clone)]
pub struct RequestContext {
    identity: RequestIdentity,
    transaction: TransactionHandle,
}

impl RequestContext {
    pub fn new(identity: RequestIdentity, transaction: TransactionHandle) -> Self {
        Self {
            identity,
            transaction,
        }
    }

    pub fn identity(&self) -> &RequestIdentity {
        &self.identity
    }

    pub fn allocation_id(&self) -> &str {
        &self.identity.allocation_id
    }

    pub fn client_id(&self) -> &str {
        &self.identity.client_id
    }

    pub fn client_public_key(&self) -> &str {
        &self.identity.client_public_key
    }

    pub fn transaction(&self) -> &TransactionHandle {
        &self.transaction
    }
}

/// The parts of an inbound HTTP request the storage handler may read
#[derive(Debug, Clone, Default)]
pub struct OperationRequest {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl OperationRequest {
    /// Query parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Required query parameter; missing or empty is `invalid_parameters`
    pub fn required_param(&self, name: &str) -> Result<&str, HandlerError> {
        match self.param(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(HandlerError::invalid_parameters(format!(
                "missing required parameter: {}",
                name
            ))),
        }
    }

    /// Decode the body as JSON
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
