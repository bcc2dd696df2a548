use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use vigil_types::{VigilError, VigilResult};

use super::handlers::{self, ApiState};
use crate::config::ApiConfig;
use crate::storage::SupervisorStorage;
use crate::supervisor::{CancellationToken, SupervisorHandle};

/// Local operator and evidence-ingest API.
pub struct ApiServer {
    addr: SocketAddr,
    request_timeout: Duration,
    state: ApiState,
}

impl ApiServer {
    pub fn new(
        config: &ApiConfig,
        storage: Arc<SupervisorStorage>,
        supervisor: SupervisorHandle,
    ) -> Self {
        if !config.is_localhost_only() {
            warn!(
                "API bound to {} is reachable beyond localhost and has no authentication",
                config.bind_address
            );
        }

        Self {
            addr: config.socket_addr(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            state: ApiState {
                storage,
                supervisor,
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(handlers::status))
            .route("/api/health", get(handlers::health))
            .route("/api/events", get(handlers::events))
            .route("/api/evidence", post(handlers::record_evidence))
            .route("/api/dependencies", post(handlers::record_dependency))
            .route("/api/restarts/reset", post(handlers::reset_restarts))
            .fallback(handlers::not_found)
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn bind(&self) -> VigilResult<TcpListener> {
        TcpListener::bind(self.addr)
            .await
            .map_err(|e| VigilError::Api(format!("Failed to bind API server on {}: {}", self.addr, e)))
    }

    pub async fn serve(self, shutdown: CancellationToken) -> VigilResult<()> {
        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn serve_on(self, listener: TcpListener, mut shutdown: CancellationToken) -> VigilResult<()> {
        let local = listener
            .local_addr()
            .map_err(|e| VigilError::Api(format!("Failed to read API address: {}", e)))?;
        info!("API server listening on http://{}", local);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| VigilError::Api(format!("API server error: {}", e)))?;

        info!("API server stopped");
        Ok(())
    }
}
