//! Storage node clients
//!
//! [`NodeHandle`] is the capability the coordinator needs from one storage
//! node. [`NodeConnector`] turns a node id into a handle, or reports that the
//! node cannot be reached right now. The HTTP implementations speak the
//! node API served by [`crate::node::http`].

use crate::common::{encode_name, CoordinatorConfig, Error, Result};
use crate::node::http::{DeleteResponse, ExistsResponse, ListResponse, StoreResponse};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Calls the coordinator can make on one storage node.
///
/// Every call either succeeds, or fails with [`Error::Communication`] when
/// the node could not be talked to. A missing file is a normal result
/// (`None`, `false`, `0`), never an error.
#[async_trait]
pub trait NodeHandle: Send + Sync {
    /// Store `data` under `name`. `false` means the node refused or failed the write.
    async fn upload(&self, name: &str, data: Bytes) -> Result<bool>;

    async fn download(&self, name: &str) -> Result<Option<Bytes>>;

    /// Number of files removed (0 or 1).
    async fn delete(&self, name: &str) -> Result<u32>;

    async fn list(&self) -> Result<Vec<String>>;

    async fn exists(&self, name: &str) -> Result<bool>;
}

/// Resolves a node id to a callable handle.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Fails with [`Error::NodeUnavailable`] when the node cannot be reached.
    async fn connect(&self, id: usize) -> Result<Arc<dyn NodeHandle>>;
}

/// Node handle over the HTTP node API
pub struct HttpNode {
    id: usize,
    base_url: String,
    client: Client,
}

impl HttpNode {
    pub fn new(id: usize, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            id,
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url, encode_name(name))
    }

    fn communication(&self, reason: impl std::fmt::Display) -> Error {
        Error::Communication {
            node: self.id,
            reason: reason.to_string(),
        }
    }

    fn unexpected(&self, status: StatusCode) -> Error {
        self.communication(format!("unexpected status {}", status))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request.send().await.map_err(|e| self.communication(e))
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(self.unexpected(response.status()));
        }
        response.json::<T>().await.map_err(|e| self.communication(e))
    }

    /// Check that the node answers its health endpoint within `timeout`.
    pub async fn probe(&self, timeout: Duration) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.send(self.client.get(url).timeout(timeout)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.unexpected(response.status()))
        }
    }
}

#[async_trait]
impl NodeHandle for HttpNode {
    async fn upload(&self, name: &str, data: Bytes) -> Result<bool> {
        let request = self
            .client
            .put(self.file_url(name))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        let response = self.send(request).await?;
        let body: StoreResponse = self.json(response).await?;
        Ok(body.stored)
    }

    async fn download(&self, name: &str) -> Result<Option<Bytes>> {
        let response = self.send(self.client.get(self.file_url(name))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let data = response.bytes().await.map_err(|e| self.communication(e))?;
                Ok(Some(data))
            }
            status => Err(self.unexpected(status)),
        }
    }

    async fn delete(&self, name: &str) -> Result<u32> {
        let response = self.send(self.client.delete(self.file_url(name))).await?;
        let body: DeleteResponse = self.json(response).await?;
        Ok(body.deleted)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let url = format!("{}/files", self.base_url);
        let response = self.send(self.client.get(url)).await?;
        let body: ListResponse = self.json(response).await?;
        Ok(body.files)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let url = format!("{}/exists/{}", self.base_url, encode_name(name));
        let response = self.send(self.client.get(url)).await?;
        let body: ExistsResponse = self.json(response).await?;
        Ok(body.exists)
    }
}

/// Connects to nodes at the addresses resolved from [`CoordinatorConfig`].
///
/// A node counts as reachable once it answers `GET /health`.
pub struct HttpConnector {
    config: CoordinatorConfig,
    client: Client,
}

impl HttpConnector {
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl NodeConnector for HttpConnector {
    async fn connect(&self, id: usize) -> Result<Arc<dyn NodeHandle>> {
        let address = self.config.node_address(id)?;
        let node = HttpNode::new(id, address, self.client.clone());

        if let Err(e) = node.probe(self.config.connect_timeout()).await {
            tracing::debug!("Could not reach node {} at {}: {}", id, node.base_url(), e);
            return Err(Error::NodeUnavailable(id));
        }

        tracing::debug!("Connected to node {} at {}", id, node.base_url());
        Ok(Arc::new(node))
    }
}
