//! Node runtime: owns the service and drives startup and shutdown.

use anyhow::{Context, Result};
use blobber_handler::{
    BlobberService, HandlerConfig, InMemoryMetaStore, MetaStore, MetaStoreStorageHandler,
    StorageHandler,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The running storage node
pub struct NodeRuntime {
    service: Arc<BlobberService>,
    server: Option<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Node with the in-memory store and the reference storage handler
    pub fn new(config: HandlerConfig) -> Result<Self> {
        Self::with_components(
            config,
            Arc::new(InMemoryMetaStore::new()),
            Arc::new(MetaStoreStorageHandler::new()),
        )
    }

    pub fn with_components(
        config: HandlerConfig,
        store: Arc<dyn MetaStore>,
        storage: Arc<dyn StorageHandler>,
    ) -> Result<Self> {
        let service = BlobberService::new(config, store, storage)
            .context("failed to create blobber service")?;

        Ok(Self {
            service: Arc::new(service),
            server: None,
        })
    }

    /// Spawn the HTTP server
    pub fn start(&mut self) {
        info!("===========================================");
        info!("  Blobber Node v{}", blobber_handler::VERSION);
        info!("===========================================");

        let service = Arc::clone(&self.service);
        self.server = Some(tokio::spawn(async move {
            if let Err(e) = service.start().await {
                error!(error = %e, "Server terminated");
            }
        }));
    }

    /// Wait until the server task ends on its own
    pub async fn wait(&mut self) {
        if let Some(server) = self.server.as_mut() {
            if let Err(e) = server.await {
                error!(error = %e, "Server task failed");
            }
            self.server = None;
        }
    }

    /// Signal shutdown and wait for in-flight requests to drain
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        self.service.shutdown();
        self.wait().await;
        info!("Node shutdown complete");
    }

    pub fn service(&self) -> &Arc<BlobberService> {
        &self.service
    }
}
