//! Shared fixtures for the HTTP-level tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use blobber_handler::{
    BlobberService, HandlerConfig, HandlerError, HandlerStats, InMemoryMetaStore, MetaStore,
    OperationRequest, OperationResult, RequestContext, RequestIdentity, ScanResult,
    StorageHandler, StoreError, Transaction,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// What a [`ScriptedHandler`] does after staging its writes
#[derive(Clone)]
pub enum Behavior {
    Succeed(serde_json::Value),
    Fail(HandlerError),
    Panic,
    Sleep(Duration),
    /// Commit a competing write to the same keys through `store` first
    Conflict(InMemoryMetaStore),
}

/// Storage handler double: stages fixed writes, records every call
pub struct ScriptedHandler {
    pub writes: Vec<(Vec<u8>, Vec<u8>)>,
    pub behavior: Behavior,
    pub calls: Mutex<Vec<(&'static str, RequestIdentity)>>,
}

impl ScriptedHandler {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            writes: vec![(b"touched".to_vec(), b"yes".to_vec())],
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_writes(mut self, writes: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        self.writes = writes;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn run(&self, method: &'static str, ctx: &RequestContext) -> OperationResult {
        self.calls.lock().push((method, ctx.identity().clone()));
        for (key, value) in &self.writes {
            ctx.transaction().put(key, value)?;
        }

        match &self.behavior {
            Behavior::Succeed(payload) => Ok(payload.clone()),
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Panic => panic!("scripted handler panic"),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(serde_json::Value::Null)
            }
            Behavior::Conflict(store) => {
                let competing = store.create_transaction()?;
                for (key, _) in &self.writes {
                    competing.put(key, b"competing")?;
                }
                competing.commit()?;
                Ok(serde_json::json!({ "written": true }))
            }
        }
    }
}

#[async_trait]
impl StorageHandler for ScriptedHandler {
    async fn get_allocation_details(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("get_allocation_details", ctx).await
    }
    async fn get_file_meta(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("get_file_meta", ctx).await
    }
    async fn download_file(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("download_file", ctx).await
    }
    async fn list_entities(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("list_entities", ctx).await
    }
    async fn commit_write(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("commit_write", ctx).await
    }
    async fn get_reference_path(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("get_reference_path", ctx).await
    }
    async fn write_file(&self, ctx: &RequestContext, _: &OperationRequest) -> OperationResult {
        self.run("write_file", ctx).await
    }
}

/// Wraps a store, counting transactions and optionally failing every commit
pub struct InstrumentedStore {
    pub inner: InMemoryMetaStore,
    pub fail_commits: bool,
    pub opened: Arc<AtomicU64>,
}

impl InstrumentedStore {
    pub fn new(inner: InMemoryMetaStore) -> Self {
        Self {
            inner,
            fail_commits: false,
            opened: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn failing_commits(inner: InMemoryMetaStore) -> Self {
        Self {
            fail_commits: true,
            ..Self::new(inner)
        }
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }
}

struct InstrumentedTx {
    inner: Arc<dyn Transaction>,
    fail_commit: bool,
}

impl Transaction for InstrumentedTx {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key)
    }
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.inner.put(key, value)
    }
    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        self.inner.prefix_scan(prefix)
    }
    fn commit(&self) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        self.inner.commit()
    }
    fn rollback(&self) -> Result<(), StoreError> {
        self.inner.rollback()
    }
}

impl MetaStore for InstrumentedStore {
    fn create_transaction(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        let inner = self.inner.create_transaction()?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InstrumentedTx {
            inner,
            fail_commit: self.fail_commits,
        }))
    }
    fn close(&self) {
        self.inner.close()
    }
    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Router with the full middleware stack plus its stats
pub fn app(
    config: HandlerConfig,
    store: Arc<dyn MetaStore>,
    storage: Arc<dyn StorageHandler>,
) -> (Router, Arc<HandlerStats>) {
    let service = BlobberService::new(config, store, storage).unwrap();
    (service.router(), service.stats())
}

pub fn request(method: &str, uri: &str, client: Option<&str>, body: &'static [u8]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(client) = client {
        builder = builder.header("X-App-Client-ID", client);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Send one request and decode the reply (`Null` for an empty body, a
/// string for a non-JSON body)
pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}
