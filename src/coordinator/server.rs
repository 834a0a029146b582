//! Coordinator server

use crate::common::{CoordinatorConfig, Result};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::node_client::HttpConnector;
use crate::coordinator::operations::Coordinator;
use std::sync::Arc;

pub struct CoordinatorServer {
    config: CoordinatorConfig,
}

impl CoordinatorServer {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting coordinator");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Nodes: {}", self.config.num_nodes);
        for id in 0..self.config.num_nodes {
            tracing::info!("    node {}: {}", id, self.config.node_address(id)?);
        }

        let connector = Arc::new(HttpConnector::new(self.config.clone())?);
        let coordinator = Arc::new(Coordinator::connect(self.config.num_nodes, connector).await);

        let live = coordinator
            .node_status()
            .await
            .iter()
            .filter(|n| n.live)
            .count();

        let router = create_router(
            CoordState {
                coordinator: coordinator.clone(),
            },
            self.config.max_upload_bytes,
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            "✓ Coordinator ready ({}/{} nodes live)",
            live,
            self.config.num_nodes
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Coordinator stopped");
        Ok(())
    }
}

pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
