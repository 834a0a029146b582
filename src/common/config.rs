//! Configuration for minifs components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coordinator-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Storage node config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load from `minifs.toml` (optional) and `MINIFS_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `MINIFS_COORDINATOR__NUM_NODES=5`.
    pub fn load() -> Result<Self> {
        Self::load_from("minifs")
    }

    /// Same as [`Config::load`] with an explicit file stem.
    pub fn load_from(file: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("MINIFS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.log_level.is_empty() {
            config.log_level = default_log_level();
        }
        Ok(config)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Number of storage nodes (fixed for the coordinator's lifetime)
    #[serde(default = "default_num_nodes")]
    pub num_nodes: usize,

    /// Explicit node addresses, indexed by node id. Empty means "use discovery".
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Discovery host used to resolve node addresses
    #[serde(default = "default_discovery_host")]
    pub discovery_host: String,

    /// Discovery base port; node `i` listens on `discovery_port + 1 + i`
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// Connect timeout for node calls
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout for node calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}
fn default_num_nodes() -> usize {
    3
}
fn default_discovery_host() -> String {
    "localhost".to_string()
}
fn default_discovery_port() -> u16 {
    6000
}
fn default_connect_timeout() -> u64 {
    2_000
}
fn default_request_timeout() -> u64 {
    30_000
}
fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            num_nodes: default_num_nodes(),
            nodes: Vec::new(),
            discovery_host: default_discovery_host(),
            discovery_port: default_discovery_port(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_nodes == 0 {
            return Err(Error::InvalidConfig(
                "at least one storage node is required".into(),
            ));
        }

        if !self.nodes.is_empty() && self.nodes.len() != self.num_nodes {
            return Err(Error::InvalidConfig(format!(
                "{} node addresses given for {} nodes",
                self.nodes.len(),
                self.num_nodes
            )));
        }

        if self.nodes.is_empty()
            && discovery_port_of(self.discovery_port, self.num_nodes - 1).is_err()
        {
            return Err(Error::InvalidConfig(format!(
                "discovery port {} leaves no room for {} nodes",
                self.discovery_port, self.num_nodes
            )));
        }

        Ok(())
    }

    /// Resolve the base URL of node `id`.
    pub fn node_address(&self, id: usize) -> Result<String> {
        if id >= self.num_nodes {
            return Err(Error::InvalidConfig(format!(
                "node id {} out of range (0..{})",
                id, self.num_nodes
            )));
        }

        let addr = match self.nodes.get(id) {
            Some(addr) => addr.trim_end_matches('/').to_string(),
            None => format!(
                "{}:{}",
                self.discovery_host,
                discovery_port_of(self.discovery_port, id)?
            ),
        };

        if addr.starts_with("http://") || addr.starts_with("https://") {
            Ok(addr)
        } else {
            Ok(format!("http://{}", addr))
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Port node `id` listens on under discovery: `base + 1 + id`
fn discovery_port_of(base: u16, id: usize) -> Result<u16> {
    u32::try_from(id)
        .ok()
        .and_then(|id| u32::from(base).checked_add(1)?.checked_add(id))
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| Error::InvalidConfig(format!("node {} has no valid port", id)))
}

/// Storage node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node id (matches the coordinator's slot id)
    #[serde(default)]
    pub id: usize,

    /// Bind address; derived from the id when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<SocketAddr>,

    /// Directory holding this node's files; derived from the id when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Discovery base port, shared with the coordinator
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// Maximum accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: 0,
            bind_addr: None,
            data_dir: None,
            discovery_port: default_discovery_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl NodeConfig {
    pub fn resolved_bind_addr(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.bind_addr {
            return Ok(addr);
        }
        let port = discovery_port_of(self.discovery_port, self.id)?;
        Ok(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("./data/node-{}", self.id)))
    }
}
