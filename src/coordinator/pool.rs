//! Node pool: one slot per configured storage node
//!
//! Each slot is either [`NodeLink::Reachable`] (live) or [`NodeLink::Absent`]
//! (dead). A dead slot is retried on every access; there is no backoff.
//! Slots are locked individually, so operations on different nodes never
//! wait on each other.

use crate::common::{Error, METRICS};
use crate::coordinator::node_client::{NodeConnector, NodeHandle};
use futures_util::future::join_all;
use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What a slot currently holds.
#[derive(Clone)]
pub enum NodeLink {
    Reachable(Arc<dyn NodeHandle>),
    Absent,
}

impl NodeLink {
    pub fn is_reachable(&self) -> bool {
        matches!(self, NodeLink::Reachable(_))
    }
}

struct SlotState {
    link: NodeLink,
    /// Bumped on every successful acquisition
    epoch: u64,
}

struct Slot {
    id: usize,
    state: Mutex<SlotState>,
    /// Completed reconnect attempts; only bumped under the state lock
    attempts: AtomicU64,
}

/// A live handle checked out of a slot.
///
/// Calls go through the lease without holding the slot lock. The epoch lets
/// [`NodePool::mark_dead`] ignore failures of a handle that was already
/// replaced by a reconnect.
#[derive(Clone)]
pub struct NodeLease {
    id: usize,
    epoch: u64,
    handle: Arc<dyn NodeHandle>,
}

impl NodeLease {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Deref for NodeLease {
    type Target = dyn NodeHandle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref()
    }
}

/// Point-in-time view of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub id: usize,
    pub live: bool,
}

pub struct NodePool {
    slots: Vec<Slot>,
    connector: Arc<dyn NodeConnector>,
}

impl NodePool {
    /// Create `size` slots, trying to acquire every node once.
    ///
    /// Unreachable nodes start dead; that is not an error.
    pub async fn connect(size: usize, connector: Arc<dyn NodeConnector>) -> Self {
        let links = join_all((0..size).map(|id| {
            let connector = connector.clone();
            async move {
                tracing::info!("Acquiring node {}", id);
                match connector.connect(id).await {
                    Ok(handle) => {
                        tracing::info!("Acquired node {}", id);
                        NodeLink::Reachable(handle)
                    }
                    Err(e) => {
                        tracing::warn!("Could not acquire node {}: {}", id, e);
                        NodeLink::Absent
                    }
                }
            }
        }))
        .await;

        let slots = links
            .into_iter()
            .enumerate()
            .map(|(id, link)| Slot {
                id,
                state: Mutex::new(SlotState {
                    epoch: u64::from(link.is_reachable()),
                    link,
                }),
                attempts: AtomicU64::new(0),
            })
            .collect();

        Self { slots, connector }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live handle for slot `id`, reconnecting once if the slot is dead.
    ///
    /// Callers that queue behind a reconnect already in flight take its
    /// result instead of making their own attempt.
    ///
    /// Returns `None` when the slot stays dead (or `id` is out of range).
    pub async fn get_or_reconnect(&self, id: usize) -> Option<NodeLease> {
        let slot = self.slots.get(id)?;
        let seen = slot.attempts.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let NodeLink::Reachable(handle) = &state.link {
            return Some(NodeLease {
                id: slot.id,
                epoch: state.epoch,
                handle: handle.clone(),
            });
        }

        if slot.attempts.load(Ordering::Acquire) != seen {
            tracing::debug!("Node {} failed a reconnect attempt made while waiting", slot.id);
            return None;
        }

        METRICS.reconnect_attempts.inc();
        tracing::debug!("Node {} is not connected, attempting to reconnect", slot.id);

        let connected = self.connector.connect(slot.id).await;
        slot.attempts.fetch_add(1, Ordering::Release);

        match connected {
            Ok(handle) => {
                state.epoch += 1;
                state.link = NodeLink::Reachable(handle.clone());
                METRICS.reconnect_successes.inc();
                tracing::info!("Reconnected node {}", slot.id);
                Some(NodeLease {
                    id: slot.id,
                    epoch: state.epoch,
                    handle,
                })
            }
            Err(e) => {
                tracing::debug!("Node {} still unavailable: {}", slot.id, e);
                None
            }
        }
    }

    /// Drop the lease's handle after a communication failure.
    ///
    /// No-op if the slot has reconnected since the lease was taken.
    /// Returns whether the slot went from live to dead.
    pub async fn mark_dead(&self, lease: &NodeLease, cause: &Error) -> bool {
        let Some(slot) = self.slots.get(lease.id) else {
            return false;
        };
        let mut state = slot.state.lock().await;

        if state.epoch != lease.epoch || !state.link.is_reachable() {
            tracing::debug!(
                "Ignoring stale failure for node {}: {}",
                lease.id,
                cause
            );
            return false;
        }

        state.link = NodeLink::Absent;
        METRICS.node_failures.inc();
        tracing::warn!(node = lease.id, error = %cause, "Disconnected node");
        true
    }

    /// Snapshot of every slot. Never reconnects.
    pub async fn status(&self) -> Vec<SlotStatus> {
        let mut out = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let state = slot.state.lock().await;
            out.push(SlotStatus {
                id: slot.id,
                live: state.link.is_reachable(),
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Result;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct EmptyNode;

    #[async_trait]
    impl NodeHandle for EmptyNode {
        async fn upload(&self, _name: &str, _data: Bytes) -> Result<bool> {
            Ok(true)
        }
        async fn download(&self, _name: &str) -> Result<Option<Bytes>> {
            Ok(None)
        }
        async fn delete(&self, _name: &str) -> Result<u32> {
            Ok(0)
        }
        async fn list(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn exists(&self, _name: &str) -> Result<bool> {
            Ok(false)
        }
    }

    /// Nodes are reachable only while `up` is set.
    struct SwitchConnector {
        up: AtomicBool,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl NodeConnector for SwitchConnector {
        async fn connect(&self, id: usize) -> Result<Arc<dyn NodeHandle>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.up.load(Ordering::SeqCst) {
                Ok(Arc::new(EmptyNode))
            } else {
                Err(Error::NodeUnavailable(id))
            }
        }
    }

    fn connector(up: bool) -> Arc<SwitchConnector> {
        Arc::new(SwitchConnector {
            up: AtomicBool::new(up),
            attempts: AtomicUsize::new(0),
        })
    }

    fn comm_error() -> Error {
        Error::Communication {
            node: 0,
            reason: "reset".into(),
        }
    }

    #[tokio::test]
    async fn test_dead_at_startup_is_retried_on_every_access() {
        let conn = connector(false);
        let pool = NodePool::connect(1, conn.clone()).await;
        assert_eq!(pool.status().await, vec![SlotStatus { id: 0, live: false }]);

        assert!(pool.get_or_reconnect(0).await.is_none());
        assert!(pool.get_or_reconnect(0).await.is_none());
        // startup + one attempt per access
        assert_eq!(conn.attempts.load(Ordering::SeqCst), 3);

        conn.up.store(true, Ordering::SeqCst);
        assert!(pool.get_or_reconnect(0).await.is_some());
        assert!(pool.status().await[0].live);
    }

    #[tokio::test]
    async fn test_live_slot_does_not_reconnect() {
        let conn = connector(true);
        let pool = NodePool::connect(1, conn.clone()).await;

        pool.get_or_reconnect(0).await.unwrap();
        pool.get_or_reconnect(0).await.unwrap();
        assert_eq!(conn.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mark_dead_then_reconnect() {
        let conn = connector(true);
        let pool = NodePool::connect(1, conn.clone()).await;

        let lease = pool.get_or_reconnect(0).await.unwrap();
        pool.mark_dead(&lease, &comm_error()).await;
        assert!(!pool.status().await[0].live);

        let fresh = pool.get_or_reconnect(0).await.unwrap();
        assert_eq!(fresh.id(), 0);
        assert!(pool.status().await[0].live);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_kill_new_handle() {
        let conn = connector(true);
        let pool = NodePool::connect(1, conn.clone()).await;

        let old = pool.get_or_reconnect(0).await.unwrap();
        pool.mark_dead(&old, &comm_error()).await;
        let _new = pool.get_or_reconnect(0).await.unwrap();

        // A second failure reported against the old handle arrives late
        pool.mark_dead(&old, &comm_error()).await;
        assert!(pool.status().await[0].live);
    }

    /// Takes `delay` to answer, succeeding only while `up` is set.
    struct SlowConnector {
        up: AtomicBool,
        attempts: AtomicUsize,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl NodeConnector for SlowConnector {
        async fn connect(&self, id: usize) -> Result<Arc<dyn NodeHandle>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.up.load(Ordering::SeqCst) {
                Ok(Arc::new(EmptyNode))
            } else {
                Err(Error::NodeUnavailable(id))
            }
        }
    }

    fn slow_connector(delay_ms: u64) -> Arc<SlowConnector> {
        Arc::new(SlowConnector {
            up: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            delay: std::time::Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failed_reconnect() {
        let conn = slow_connector(200);
        let pool = NodePool::connect(1, conn.clone()).await;
        assert_eq!(conn.attempts.load(Ordering::SeqCst), 1);

        let started = std::time::Instant::now();
        let leases = join_all((0..4).map(|_| pool.get_or_reconnect(0))).await;

        assert!(leases.iter().all(|l| l.is_none()));
        // one attempt for all four callers
        assert_eq!(conn.attempts.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < std::time::Duration::from_millis(600));

        // a later access makes its own attempt
        assert!(pool.get_or_reconnect(0).await.is_none());
        assert_eq!(conn.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_successful_reconnect() {
        let conn = slow_connector(50);
        let pool = NodePool::connect(1, conn.clone()).await;
        conn.up.store(true, Ordering::SeqCst);

        let leases = join_all((0..4).map(|_| pool.get_or_reconnect(0))).await;

        assert!(leases.iter().all(|l| l.is_some()));
        assert_eq!(conn.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_only_live_transitions_count_as_failures() {
        let conn = connector(true);
        let pool = NodePool::connect(1, conn.clone()).await;

        let old = pool.get_or_reconnect(0).await.unwrap();
        assert!(pool.mark_dead(&old, &comm_error()).await);
        // already dead
        assert!(!pool.mark_dead(&old, &comm_error()).await);

        let _new = pool.get_or_reconnect(0).await.unwrap();
        assert!(!pool.mark_dead(&old, &comm_error()).await);
        assert!(pool.status().await[0].live);
    }

    #[tokio::test]
    async fn test_out_of_range_slot() {
        let pool = NodePool::connect(2, connector(true)).await;
        assert_eq!(pool.len(), 2);
        assert!(pool.get_or_reconnect(2).await.is_none());
    }
}
