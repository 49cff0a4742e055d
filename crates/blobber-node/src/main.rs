//! # Blobber Node
//!
//! Entry point for the storage-node HTTP API.

use anyhow::Result;
use blobber_node::{load_config, NodeRuntime};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;
    info!(addr = %config.http_addr(), "Configuration loaded");

    let mut runtime = NodeRuntime::new(config)?;
    runtime.start();

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
        }
        _ = runtime.wait() => {}
    }

    runtime.shutdown().await;
    Ok(())
}
