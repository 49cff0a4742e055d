//! # Blobber Node
//!
//! Configuration loading and runtime wiring for the `blobber-node` binary.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration: optional JSON file named by `BLOBBER_CONFIG`,
//!    then `BLOBBER_HTTP_HOST` / `BLOBBER_HTTP_PORT` overrides
//! 3. Wire the metadata store and storage handler into the service
//! 4. Serve until Ctrl+C, then release the store

pub mod config;
pub mod runtime;

pub use config::{load_config, load_config_with, NodeConfigError};
pub use runtime::NodeRuntime;
