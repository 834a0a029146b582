//! In-memory storage nodes for coordinator tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use minifs::coordinator::{Coordinator, NodeConnector, NodeHandle, NodePool};
use minifs::{Error, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A storage node that keeps files in memory and can be taken down.
#[derive(Default)]
pub struct FakeNode {
    pub id: usize,
    files: Mutex<BTreeMap<String, Bytes>>,
    /// Unreachable: connects fail and calls fail in transit
    pub down: AtomicBool,
    /// Uploads answer `false`
    pub refuse_uploads: AtomicBool,
    /// Uploads fail in transit, everything else works
    pub break_uploads: AtomicBool,
    /// Listings fail in transit
    pub break_lists: AtomicBool,
    /// Existence checks fail in transit
    pub break_exists: AtomicBool,
    /// Connects never complete
    pub stall_connect: AtomicBool,
    pub connects: AtomicUsize,
    pub uploads: AtomicUsize,
    pub downloads: AtomicUsize,
    pub deletes: AtomicUsize,
    pub lists: AtomicUsize,
    pub exists_calls: AtomicUsize,
}

impl FakeNode {
    pub fn new(id: usize, files: &[(&str, &str)]) -> Arc<Self> {
        let node = Self {
            id,
            ..Default::default()
        };
        {
            let mut map = node.files.lock().unwrap();
            for (name, content) in files {
                map.insert(name.to_string(), Bytes::from(content.to_string()));
            }
        }
        Arc::new(node)
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn holds(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }

    pub fn content(&self, name: &str) -> Option<Bytes> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        self.check_switch(&self.down)
    }

    fn check_switch(&self, broken: &AtomicBool) -> Result<()> {
        if broken.load(Ordering::SeqCst) {
            return Err(Error::Communication {
                node: self.id,
                reason: "connection reset".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NodeHandle for FakeNode {
    async fn upload(&self, name: &str, data: Bytes) -> Result<bool> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.break_uploads.load(Ordering::SeqCst) {
            return Err(Error::Communication {
                node: self.id,
                reason: "broken pipe".into(),
            });
        }
        if self.refuse_uploads.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.files.lock().unwrap().insert(name.to_string(), data);
        Ok(true)
    }

    async fn download(&self, name: &str) -> Result<Option<Bytes>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.content(name))
    }

    async fn delete(&self, name: &str) -> Result<u32> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(u32::from(self.files.lock().unwrap().remove(name).is_some()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.check_switch(&self.break_lists)?;
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.check_switch(&self.break_exists)?;
        Ok(self.holds(name))
    }
}

/// Hands out the fake nodes by id.
pub struct FakeConnector {
    pub nodes: Vec<Arc<FakeNode>>,
}

#[async_trait]
impl NodeConnector for FakeConnector {
    async fn connect(&self, id: usize) -> Result<Arc<dyn NodeHandle>> {
        let node = self.nodes.get(id).ok_or(Error::NodeUnavailable(id))?;
        node.connects.fetch_add(1, Ordering::SeqCst);
        if node.stall_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if node.down.load(Ordering::SeqCst) {
            return Err(Error::NodeUnavailable(id));
        }
        Ok(node.clone() as Arc<dyn NodeHandle>)
    }
}

pub async fn pool(nodes: &[Arc<FakeNode>]) -> NodePool {
    let connector = Arc::new(FakeConnector {
        nodes: nodes.to_vec(),
    });
    NodePool::connect(nodes.len(), connector).await
}

pub async fn coordinator(nodes: &[Arc<FakeNode>]) -> Coordinator {
    Coordinator::new(pool(nodes).await)
}

/// Three empty nodes
pub fn three_nodes() -> Vec<Arc<FakeNode>> {
    (0..3).map(|id| FakeNode::new(id, &[])).collect()
}
