//! Storage node server

use crate::common::{NodeConfig, Result};
use crate::coordinator::server::shutdown_signal;
use crate::node::http::{create_router, NodeState};
use crate::node::store::FileStore;
use std::sync::Arc;

pub struct NodeServer {
    config: NodeConfig,
}

impl NodeServer {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        let bind_addr = self.config.resolved_bind_addr()?;
        let data_dir = self.config.resolved_data_dir();

        tracing::info!("Starting storage node: {}", self.config.id);
        tracing::info!("  HTTP API: {}", bind_addr);
        tracing::info!("  Data path: {}", data_dir.display());

        let store = Arc::new(FileStore::open(&data_dir).await?);
        let router = create_router(
            NodeState {
                store,
                node_id: self.config.id,
            },
            self.config.max_upload_bytes,
        );

        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        tracing::info!("✓ Storage node ready");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Storage node stopped");
        Ok(())
    }
}
