//! Blobber handler - request dispatch and transaction lifecycle for a
//! storage-node HTTP API.
//!
//! Every storage operation runs inside exactly one metadata-store
//! transaction. The dispatcher builds a read-only [`RequestContext`] from the
//! route and identity headers, opens a [`TransactionScope`], calls the
//! injected [`StorageHandler`], and commits or rolls back from the result.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       BLOBBER HANDLER                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Tracing → CORS → CatchPanic → BodyLimit → Timeout (per op)  │
//! │                            │                                 │
//! │  ┌─────────────────────────┴──────────────────────────────┐  │
//! │  │ Dispatcher                                             │  │
//! │  │   ContextBuilder → TransactionScope → StorageHandler   │  │
//! │  │                  ← commit / rollback ←                 │  │
//! │  └─────────────────────────┬──────────────────────────────┘  │
//! │                            │                                 │
//! │  Envelope: 200 payload | 400 {"code","error"}                │
//! └────────────────────────────┼─────────────────────────────────┘
//!                              │
//!                         MetaStore
//! ```
//!
//! # Scope policies
//!
//! - **Read-only** (meta, list, reference path): always rolled back.
//! - **Read-write** (upload, commit, download, allocation lookup): rolled
//!   back on handler error, committed on success. A failed commit answers
//!   `commit_error` and discards the payload.
//!
//! # Usage
//!
//! ```ignore
//! use blobber_handler::{BlobberService, HandlerConfig, InMemoryMetaStore, MetaStoreStorageHandler};
//!
//! let service = BlobberService::new(
//!     HandlerConfig::default(),
//!     Arc::new(InMemoryMetaStore::new()),
//!     Arc::new(MetaStoreStorageHandler::new()),
//! )?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod diagnostics;
pub mod dispatch;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;

pub use adapters::{InMemoryMetaStore, MetaStoreStorageHandler};
pub use dispatch::{Dispatcher, InboundRequest, ScopeState, TransactionScope};
pub use domain::config::{HandlerConfig, HeaderConfig, TimeoutConfig};
pub use domain::context::{OperationRequest, RequestContext, RequestIdentity, TransactionHandle};
pub use domain::error::{
    codes, ConfigError, HandlerError, OperationResult, ServiceError, StoreError,
};
pub use domain::operations::{Operation, ScopePolicy};
pub use middleware::HandlerStats;
pub use ports::outbound::{MetaStore, ScanResult, StorageHandler, Transaction};
pub use service::{spawn_shutdown_watcher, BlobberService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
