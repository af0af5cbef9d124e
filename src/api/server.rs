//! API Server
//!
//! Serves the introspection router until the shutdown token fires.

use super::rest::RestRouter;
use crate::controller::Registries;
use crate::domain::ClusterGatewayRef;
use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}

/// Introspection API server
pub struct ApiServer {
    config: ApiServerConfig,
    registries: Arc<Registries>,
    gateway: ClusterGatewayRef,
}

impl ApiServer {
    pub fn new(
        config: ApiServerConfig,
        registries: Arc<Registries>,
        gateway: ClusterGatewayRef,
    ) -> Self {
        Self {
            config,
            registries,
            gateway,
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.config.rest_addr;
        let app = RestRouter::new(self.registries, self.gateway).build();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;
        info!("REST API listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }
}
