//! Coordinator operations
//!
//! Every operation works on whatever nodes are reachable at the time:
//! - dead slots are reconnected on access, and skipped if that fails
//! - a node call that fails in transit marks its slot dead and the node is
//!   left out of the answer
//! - callers only ever see the aggregate outcome

use crate::common::{format_bytes, validate_filename, Result, METRICS};
use crate::coordinator::node_client::NodeConnector;
use crate::coordinator::placement::{rank_by_load, random_start, ring_order, NodeLoad};
use crate::coordinator::pool::{NodeLease, NodePool, SlotStatus};
use bytes::Bytes;
use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of an upload, rendered for callers through `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Stored on the least-loaded node that accepted it
    Stored {
        node: usize,
        bytes: usize,
        elapsed: Duration,
    },
    /// Replicated to `nodes` out of `total` configured nodes
    Replicated {
        nodes: usize,
        total: usize,
        bytes: usize,
        elapsed: Duration,
    },
    /// No node was reachable
    SystemUnavailable { replicate: bool },
    /// Nodes were reachable but every attempt failed
    AllAttemptsFailed { attempted: usize, replicate: bool },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            UploadOutcome::Stored { .. } | UploadOutcome::Replicated { .. }
        )
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Stored { bytes, elapsed, .. } => write!(
                f,
                "Uploaded file. {} bytes ({}) uploaded in {:.2}s",
                bytes,
                format_bytes(*bytes as u64),
                elapsed.as_secs_f64()
            ),
            UploadOutcome::Replicated {
                nodes,
                total,
                bytes,
                elapsed,
            } => write!(
                f,
                "Uploaded file with high reliability to {}/{} nodes. {} bytes ({}) processed in {:.2}s",
                nodes,
                total,
                bytes,
                format_bytes(*bytes as u64),
                elapsed.as_secs_f64()
            ),
            UploadOutcome::SystemUnavailable { .. } => {
                write!(f, "File could not be uploaded. System is offline (no nodes)")
            }
            UploadOutcome::AllAttemptsFailed {
                replicate: true, ..
            } => write!(f, "Could not upload file to any nodes"),
            UploadOutcome::AllAttemptsFailed { .. } => write!(f, "Could not upload file"),
        }
    }
}

/// Result of a delete across all nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Nodes that removed the file
    pub deleted: usize,
    /// Nodes that answered
    pub reachable: usize,
    /// Configured nodes
    pub total: usize,
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        self.deleted > 0
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deleted == 0 {
            write!(f, "Could not delete file")
        } else {
            write!(f, "File deleted from {}/{} nodes", self.deleted, self.total)
        }
    }
}

/// How one node took part in a fan-out write or delete
enum Attempt<T> {
    Unreachable,
    Failed,
    Done(T),
}

/// Front end over a fixed set of storage nodes
pub struct Coordinator {
    pool: NodePool,
}

impl Coordinator {
    pub fn new(pool: NodePool) -> Self {
        Self { pool }
    }

    /// Build the pool for `num_nodes` nodes and try to acquire each once.
    pub async fn connect(num_nodes: usize, connector: Arc<dyn NodeConnector>) -> Self {
        Self::new(NodePool::connect(num_nodes, connector).await)
    }

    pub fn num_nodes(&self) -> usize {
        self.pool.len()
    }

    pub async fn node_status(&self) -> Vec<SlotStatus> {
        self.pool.status().await
    }

    /// Keep the value of a node call, or mark the node dead if it failed in transit.
    async fn settle<T>(&self, lease: &NodeLease, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) if e.is_communication() => {
                self.pool.mark_dead(lease, &e).await;
                None
            }
            Err(e) => {
                tracing::warn!("Node {} call failed: {}", lease.id(), e);
                None
            }
        }
    }

    /// Sorted, de-duplicated union of every reachable node's listing.
    pub async fn list(&self) -> Vec<String> {
        let started = Instant::now();

        let listings = join_all((0..self.pool.len()).map(|id| async move {
            let lease = self.pool.get_or_reconnect(id).await?;
            let files = lease.list().await;
            self.settle(&lease, files).await
        }))
        .await;

        let used = listings.iter().filter(|l| l.is_some()).count();
        let merged: BTreeSet<String> = listings.into_iter().flatten().flatten().collect();

        tracing::info!(
            "Listings retrieved from {} nodes ({} files)",
            used,
            merged.len()
        );
        METRICS.record_operation("list", started.elapsed(), true);
        merged.into_iter().collect()
    }

    /// True if any reachable node holds `name`. Asks nodes in id order.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        validate_filename(name)?;
        let started = Instant::now();

        let mut found = false;
        for id in 0..self.pool.len() {
            let Some(lease) = self.pool.get_or_reconnect(id).await else {
                continue;
            };
            let result = lease.exists(name).await;
            if self.settle(&lease, result).await == Some(true) {
                found = true;
                break;
            }
        }

        METRICS.record_operation("exists", started.elapsed(), true);
        Ok(found)
    }

    /// Fetch `name` from the first node holding it, scanning the ring from a
    /// random start. `None` means no reachable node has it.
    pub async fn download(&self, name: &str) -> Result<Option<Bytes>> {
        if self.pool.is_empty() {
            validate_filename(name)?;
            return Ok(None);
        }
        let start = random_start(self.pool.len());
        self.download_from(name, start).await
    }

    /// [`Coordinator::download`] with a fixed ring start.
    pub async fn download_from(&self, name: &str, start: usize) -> Result<Option<Bytes>> {
        validate_filename(name)?;
        let started = Instant::now();
        tracing::info!("Downloading '{}' starting at node {}", name, start);

        let mut data = None;
        for id in ring_order(start, self.pool.len()) {
            let Some(lease) = self.pool.get_or_reconnect(id).await else {
                continue;
            };
            tracing::debug!("Downloading '{}' from node {}", name, id);
            let result = lease.download(name).await;
            match self.settle(&lease, result).await {
                Some(Some(bytes)) => {
                    data = Some(bytes);
                    break;
                }
                Some(None) => tracing::debug!("Node {} does not hold '{}'", id, name),
                None => {}
            }
        }

        match &data {
            Some(bytes) => METRICS.bytes_read.add(bytes.len() as u64),
            None => tracing::info!("'{}' not found on any node", name),
        }
        METRICS.record_operation("download", started.elapsed(), data.is_some());
        Ok(data)
    }

    /// Store `name`: on every node when `replicate` is set, otherwise on the
    /// least-loaded node that accepts it.
    pub async fn upload(&self, name: &str, data: Bytes, replicate: bool) -> Result<UploadOutcome> {
        validate_filename(name)?;
        let started = Instant::now();

        let outcome = if replicate {
            self.upload_all(name, data, started).await
        } else {
            self.upload_least_loaded(name, data, started).await
        };

        if let UploadOutcome::Stored { bytes, .. } | UploadOutcome::Replicated { bytes, .. } =
            &outcome
        {
            METRICS.bytes_written.add(*bytes as u64);
        }
        tracing::info!("Upload of '{}': {}", name, outcome);
        METRICS.record_operation("upload", started.elapsed(), outcome.is_success());
        Ok(outcome)
    }

    async fn upload_all(&self, name: &str, data: Bytes, started: Instant) -> UploadOutcome {
        let data = &data;
        let attempts = join_all((0..self.pool.len()).map(|id| async move {
            let Some(lease) = self.pool.get_or_reconnect(id).await else {
                return Attempt::Unreachable;
            };
            let result = lease.upload(name, data.clone()).await;
            match self.settle(&lease, result).await {
                Some(true) => Attempt::Done(()),
                Some(false) => {
                    tracing::warn!("Node {} refused '{}'", id, name);
                    Attempt::Failed
                }
                None => Attempt::Failed,
            }
        }))
        .await;

        let stored = attempts
            .iter()
            .filter(|a| matches!(a, Attempt::Done(_)))
            .count();
        let reachable = attempts
            .iter()
            .filter(|a| !matches!(a, Attempt::Unreachable))
            .count();

        if stored > 0 {
            UploadOutcome::Replicated {
                nodes: stored,
                total: self.pool.len(),
                bytes: data.len(),
                elapsed: started.elapsed(),
            }
        } else if reachable == 0 {
            UploadOutcome::SystemUnavailable { replicate: true }
        } else {
            UploadOutcome::AllAttemptsFailed {
                attempted: reachable,
                replicate: true,
            }
        }
    }

    async fn upload_least_loaded(
        &self,
        name: &str,
        data: Bytes,
        started: Instant,
    ) -> UploadOutcome {
        let loads = join_all((0..self.pool.len()).map(|id| async move {
            let lease = self.pool.get_or_reconnect(id).await?;
            let files = lease.list().await;
            let files = self.settle(&lease, files).await?;
            Some(NodeLoad {
                node_id: id,
                file_count: files.len(),
            })
        }))
        .await;

        let ranking = rank_by_load(loads.into_iter().flatten().collect());
        if ranking.is_empty() {
            return UploadOutcome::SystemUnavailable { replicate: false };
        }

        tracing::info!(
            "Upload order (# of files): {}",
            ranking
                .iter()
                .map(|l| format!("{} ({})", l.node_id, l.file_count))
                .collect::<Vec<_>>()
                .join(", ")
        );

        for load in &ranking {
            let Some(lease) = self.pool.get_or_reconnect(load.node_id).await else {
                continue;
            };
            tracing::debug!("Uploading '{}' to node {}", name, load.node_id);
            let result = lease.upload(name, data.clone()).await;
            match self.settle(&lease, result).await {
                Some(true) => {
                    return UploadOutcome::Stored {
                        node: load.node_id,
                        bytes: data.len(),
                        elapsed: started.elapsed(),
                    }
                }
                Some(false) => tracing::warn!("Node {} refused '{}'", load.node_id, name),
                None => tracing::warn!("Error uploading '{}' to node {}", name, load.node_id),
            }
        }

        UploadOutcome::AllAttemptsFailed {
            attempted: ranking.len(),
            replicate: false,
        }
    }

    /// Remove `name` from every reachable node.
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome> {
        validate_filename(name)?;
        let started = Instant::now();

        let attempts = join_all((0..self.pool.len()).map(|id| async move {
            let Some(lease) = self.pool.get_or_reconnect(id).await else {
                return Attempt::Unreachable;
            };
            let result = lease.delete(name).await;
            match self.settle(&lease, result).await {
                Some(count) => Attempt::Done(count),
                None => Attempt::Failed,
            }
        }))
        .await;

        let outcome = DeleteOutcome {
            deleted: attempts
                .iter()
                .filter(|a| matches!(a, Attempt::Done(1)))
                .count(),
            reachable: attempts
                .iter()
                .filter(|a| matches!(a, Attempt::Done(_)))
                .count(),
            total: self.pool.len(),
        };

        if outcome.deleted == 0 {
            tracing::info!("Could not delete '{}' from any node", name);
        } else {
            tracing::info!(
                "Deleted '{}' from {}/{} nodes",
                name,
                outcome.deleted,
                outcome.total
            );
        }
        METRICS.record_operation("delete", started.elapsed(), outcome.is_success());
        Ok(outcome)
    }
}
