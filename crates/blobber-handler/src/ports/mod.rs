//! Ports for the storage handler layer.

pub mod outbound;

pub use outbound::{MetaStore, ScanResult, StorageHandler, Transaction};
