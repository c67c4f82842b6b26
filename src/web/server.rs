//! Web server for the gallery.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{ServerConfig, StorageConfig};
use crate::photo::PhotoService;
use crate::Result;

use super::handlers::AppState;
use super::router::{create_health_router, create_router};

/// Web server for the API and stored images.
pub struct WebServer {
    /// Bind address as `host:port`.
    addr: String,
    /// Application state.
    app_state: Arc<AppState>,
    /// Storage layout, for body limits and static serving.
    storage: StorageConfig,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, storage: &StorageConfig, photos: PhotoService) -> Self {
        Self {
            addr: format!("{}:{}", config.host, config.port),
            app_state: Arc::new(AppState::new(photos)),
            storage: storage.clone(),
        }
    }

    /// Get the configured bind address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Build the full router.
    pub fn router(&self) -> Router {
        create_router(self.app_state.clone(), &self.storage).merge(create_health_router())
    }

    /// Run the web server until SIGINT or SIGTERM.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn run(self) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}

/// Resolve on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
