//! Reference storage handler backed by the request transaction.
//!
//! Key layout (UTF-8, `:` separated):
//!
//! | Key                                   | Value                  |
//! |---------------------------------------|------------------------|
//! | `allocation:{alloc}`                  | [`AllocationRecord`]   |
//! | `pending:{alloc}:{connection}:{path}` | uploaded bytes         |
//! | `file:{alloc}:{path}`                 | [`FileRecord`]         |
//! | `data:{alloc}:{path}`                 | committed bytes        |
//! | `reads:{alloc}:{path}`                | download count (u64 BE)|
//!
//! Uploads are staged under a connection id and only become files once
//! `commit_write` moves them. Downloads bump a read counter, which is why
//! they run with a read-write scope.

use crate::domain::context::{OperationRequest, RequestContext};
use crate::domain::error::{HandlerError, OperationResult};
use crate::ports::outbound::StorageHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

/// Allocation ownership and usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: String,
    pub owner_id: String,
    pub owner_public_key: String,
    pub used_size: u64,
    pub file_count: u64,
}

/// Metadata of one committed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub connection_id: String,
}

/// Storage handler that keeps everything in the metadata store
#[derive(Debug, Clone, Default)]
pub struct MetaStoreStorageHandler;

impl MetaStoreStorageHandler {
    pub fn new() -> Self {
        Self
    }
}

fn allocation_key(allocation: &str) -> Vec<u8> {
    format!("allocation:{}", allocation).into_bytes()
}

fn pending_prefix(allocation: &str, connection: &str) -> String {
    format!("pending:{}:{}:", allocation, connection)
}

fn file_key(allocation: &str, path: &str) -> Vec<u8> {
    format!("file:{}:{}", allocation, path).into_bytes()
}

fn data_key(allocation: &str, path: &str) -> Vec<u8> {
    format!("data:{}:{}", allocation, path).into_bytes()
}

fn reads_key(allocation: &str, path: &str) -> Vec<u8> {
    format!("reads:{}:{}", allocation, path).into_bytes()
}

/// `path` query parameter; must be absolute
fn path_param(request: &OperationRequest) -> Result<&str, HandlerError> {
    let path = request.required_param("path")?;
    if !path.starts_with('/') {
        return Err(HandlerError::invalid_parameters(format!(
            "path must be absolute: {}",
            path
        )));
    }
    Ok(path)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Directories from `/` down to the parent of `path`
fn ancestors(path: &str) -> Vec<String> {
    let mut dirs = vec!["/".to_string()];
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut current = String::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(segment);
        dirs.push(current.clone());
    }
    dirs
}

/// Prefix that matches everything below `dir` and nothing beside it
fn dir_scope(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{}/", dir)
    }
}

fn require_client(ctx: &RequestContext) -> Result<(), HandlerError> {
    if ctx.client_id().is_empty() {
        return Err(HandlerError::invalid_operation(
            "Operation needs to be performed by the owner of the allocation",
        ));
    }
    Ok(())
}

fn load_allocation(ctx: &RequestContext, allocation: &str) -> Result<Option<AllocationRecord>, HandlerError> {
    match ctx.transaction().get(&allocation_key(allocation))? {
        Some(raw) => Ok(Some(decode(&raw)?)),
        None => Ok(None),
    }
}

fn require_owner(ctx: &RequestContext) -> Result<AllocationRecord, HandlerError> {
    require_client(ctx)?;
    let record = load_allocation(ctx, ctx.allocation_id())?
        .ok_or_else(|| HandlerError::not_found(format!("allocation {}", ctx.allocation_id())))?;
    if record.owner_id != ctx.client_id() {
        return Err(HandlerError::invalid_operation(
            "Operation needs to be performed by the owner of the allocation",
        ));
    }
    Ok(record)
}

fn load_file(ctx: &RequestContext, path: &str) -> Result<FileRecord, HandlerError> {
    let raw = ctx
        .transaction()
        .get(&file_key(ctx.allocation_id(), path))?
        .ok_or_else(|| HandlerError::not_found(path.to_string()))?;
    decode(&raw)
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &[u8]) -> Result<T, HandlerError> {
    serde_json::from_slice(raw).map_err(|e| HandlerError::internal(format!("corrupt record: {}", e)))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, HandlerError> {
    serde_json::to_vec(value).map_err(|e| HandlerError::internal(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> OperationResult {
    serde_json::to_value(value).map_err(|e| HandlerError::internal(e.to_string()))
}

#[async_trait]
impl StorageHandler for MetaStoreStorageHandler {
    async fn get_allocation_details(
        &self,
        ctx: &RequestContext,
        request: &OperationRequest,
    ) -> OperationResult {
        let id = request.required_param("id")?;
        let record = load_allocation(ctx, id)?
            .ok_or_else(|| HandlerError::not_found(format!("allocation {}", id)))?;
        to_value(&record)
    }

    async fn get_file_meta(&self, ctx: &RequestContext, request: &OperationRequest) -> OperationResult {
        let path = path_param(request)?;
        let record = load_file(ctx, path)?;
        to_value(&record)
    }

    async fn download_file(&self, ctx: &RequestContext, request: &OperationRequest) -> OperationResult {
        let path = path_param(request)?;
        let record = load_file(ctx, path)?;
        let tx = ctx.transaction();

        let data = tx
            .get(&data_key(ctx.allocation_id(), path))?
            .ok_or_else(|| HandlerError::internal(format!("missing content for {}", path)))?;

        let counter_key = reads_key(ctx.allocation_id(), path);
        let reads = match tx.get(&counter_key)? {
            Some(raw) => {
                let bytes: [u8; 8] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| HandlerError::internal("corrupt read counter"))?;
                u64::from_be_bytes(bytes)
            }
            None => 0,
        } + 1;
        tx.put(&counter_key, &reads.to_be_bytes())?;

        Ok(json!({
            "path": record.path,
            "size": record.size,
            "content": String::from_utf8_lossy(&data),
            "read_count": reads,
        }))
    }

    async fn list_entities(&self, ctx: &RequestContext, request: &OperationRequest) -> OperationResult {
        let dir = request.param("path").filter(|p| !p.is_empty()).unwrap_or("/");
        let prefix = format!("file:{}:", ctx.allocation_id());

        let scope = dir_scope(dir);
        let mut entities = Vec::new();
        for (_, raw) in ctx.transaction().prefix_scan(prefix.as_bytes())? {
            let record: FileRecord = decode(&raw)?;
            if record.path.starts_with(&scope) {
                entities.push(record);
            }
        }

        Ok(json!({
            "allocation_id": ctx.allocation_id(),
            "path": dir,
            "entities": entities,
        }))
    }

    #[instrument(skip_all, fields(allocation = %ctx.allocation_id()))]
    async fn commit_write(&self, ctx: &RequestContext, request: &OperationRequest) -> OperationResult {
        let mut allocation = require_owner(ctx)?;
        let connection = request.required_param("connection_id")?;
        let tx = ctx.transaction();

        let prefix = pending_prefix(ctx.allocation_id(), connection);
        let pending = tx.prefix_scan(prefix.as_bytes())?;
        if pending.is_empty() {
            return Err(HandlerError::not_found(format!("connection {}", connection)));
        }

        let mut committed = Vec::with_capacity(pending.len());
        for (key, data) in pending {
            let path = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();

            let previous = tx.get(&file_key(ctx.allocation_id(), &path))?;
            if let Some(raw) = previous {
                let old: FileRecord = decode(&raw)?;
                allocation.used_size = allocation.used_size.saturating_sub(old.size);
            } else {
                allocation.file_count += 1;
            }

            let record = FileRecord {
                name: file_name(&path).to_string(),
                size: data.len() as u64,
                connection_id: connection.to_string(),
                path: path.clone(),
            };
            allocation.used_size += record.size;

            tx.put(&file_key(ctx.allocation_id(), &path), &encode(&record)?)?;
            tx.put(&data_key(ctx.allocation_id(), &path), &data)?;
            tx.delete(&key)?;
            committed.push(path);
        }

        tx.put(&allocation_key(ctx.allocation_id()), &encode(&allocation)?)?;
        debug!(connection, files = committed.len(), "Write committed");

        Ok(json!({
            "connection_id": connection,
            "committed": committed,
            "allocation": allocation,
        }))
    }

    async fn get_reference_path(
        &self,
        ctx: &RequestContext,
        request: &OperationRequest,
    ) -> OperationResult {
        let path = path_param(request)?;
        let file = load_file(ctx, path)?;
        let prefix = format!("file:{}:", ctx.allocation_id());
        let files: Vec<FileRecord> = ctx
            .transaction()
            .prefix_scan(prefix.as_bytes())?
            .iter()
            .map(|(_, raw)| decode(raw))
            .collect::<Result<_, _>>()?;

        let mut refs: Vec<serde_json::Value> = ancestors(path)
            .into_iter()
            .map(|dir| {
                let scope = dir_scope(&dir);
                let size: u64 = files
                    .iter()
                    .filter(|f| f.path.starts_with(&scope))
                    .map(|f| f.size)
                    .sum();
                json!({ "path": dir, "type": "d", "size": size })
            })
            .collect();
        refs.push(json!({ "path": file.path, "type": "f", "size": file.size }));

        Ok(json!({ "path": path, "refs": refs }))
    }

    async fn write_file(&self, ctx: &RequestContext, request: &OperationRequest) -> OperationResult {
        require_client(ctx)?;
        let path = path_param(request)?;
        let connection = request.required_param("connection_id")?;
        let tx = ctx.transaction();

        match load_allocation(ctx, ctx.allocation_id())? {
            Some(record) if record.owner_id != ctx.client_id() => {
                return Err(HandlerError::invalid_operation(
                    "Operation needs to be performed by the owner of the allocation",
                ));
            }
            Some(_) => {}
            None => {
                let record = AllocationRecord {
                    id: ctx.allocation_id().to_string(),
                    owner_id: ctx.client_id().to_string(),
                    owner_public_key: ctx.client_public_key().to_string(),
                    used_size: 0,
                    file_count: 0,
                };
                tx.put(&allocation_key(ctx.allocation_id()), &encode(&record)?)?;
            }
        }

        let key = format!("{}{}", pending_prefix(ctx.allocation_id(), connection), path);
        tx.put(key.as_bytes(), &request.body)?;

        Ok(json!({
            "filename": file_name(path),
            "size": request.body.len(),
            "connection_id": connection,
        }))
    }
}
