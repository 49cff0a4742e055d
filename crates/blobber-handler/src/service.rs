//! Handler service: router assembly, HTTP server and shutdown watcher.

use crate::dispatch::Dispatcher;
use crate::domain::config::HandlerConfig;
use crate::domain::error::ServiceError;
use crate::middleware::{create_cors_layer, create_panic_layer, HandlerStats, TracingLayer};
use crate::ports::outbound::{MetaStore, StorageHandler};
use crate::router::{build_routes, AppState};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

/// Storage-node HTTP handler service
pub struct BlobberService {
    config: Arc<HandlerConfig>,
    store: Arc<dyn MetaStore>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<HandlerStats>,
    shutdown_tx: watch::Sender<bool>,
}

impl BlobberService {
    /// Create a new service. The configuration is validated here.
    pub fn new(
        config: HandlerConfig,
        store: Arc<dyn MetaStore>,
        storage: Arc<dyn StorageHandler>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let stats = Arc::new(HandlerStats::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            storage,
            &config.headers,
            Arc::clone(&stats),
        )?);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            store,
            dispatcher,
            stats,
            shutdown_tx,
        })
    }

    /// Build the HTTP router with the full middleware stack
    pub fn router(&self) -> Router {
        let state = AppState::new(Arc::clone(&self.dispatcher), Arc::clone(&self.config));

        let body_limit = ServiceBuilder::new()
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_request_size));

        // Each `layer` call wraps the previous ones: tracing ends up outermost
        build_routes(state)
            .layer(body_limit)
            .layer(create_panic_layer())
            .layer(create_cors_layer(&self.config.cors, &self.config.headers))
            .layer(TracingLayer::new())
    }

    /// Bind and serve until [`shutdown`](Self::shutdown) is called.
    ///
    /// In-flight requests finish before this returns. The metadata store is
    /// released by the shutdown watcher once the signal fires.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Bind(format!("{}: {}", addr, e)))?;
        info!(addr = %addr, "Starting HTTP server");

        let watcher = spawn_shutdown_watcher(self.shutdown_tx.subscribe(), Arc::clone(&self.store));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                wait_for_shutdown(&mut shutdown_rx).await;
            })
            .await;

        if let Err(e) = &result {
            error!(error = %e, "HTTP server error");
        }
        // Make sure the watcher releases the store even if the server failed
        self.shutdown();
        if let Err(e) = watcher.await {
            error!(error = %e, "Shutdown watcher failed");
        }

        info!("HTTP server stopped");
        result.map_err(|e| ServiceError::Serve(e.to_string()))
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// A receiver that observes the shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn stats(&self) -> Arc<HandlerStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }
}

/// Wait until the watched flag turns true, or every sender is gone
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    // Err means the sender was dropped, which also ends the process
    let _ = rx.wait_for(|stopped| *stopped).await;
}

/// Release `store` once shutdown is signalled
pub fn spawn_shutdown_watcher(
    mut shutdown: watch::Receiver<bool>,
    store: Arc<dyn MetaStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown(&mut shutdown).await;
        info!("Shutting down server");
        store.close();
    })
}
