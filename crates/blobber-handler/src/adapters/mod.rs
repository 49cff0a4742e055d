//! Adapters for the handler layer.
//!
//! The in-memory metadata store and the reference storage handler used by
//! the node binary and the tests.

mod error_conversions;
pub mod memory_store;
pub mod storage_handler;

pub use memory_store::{InMemoryMetaStore, MemoryTransaction};
pub use storage_handler::{AllocationRecord, FileRecord, MetaStoreStorageHandler};
