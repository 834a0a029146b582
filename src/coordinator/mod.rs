//! Coordinator implementation
//!
//! The coordinator is responsible for:
//! - Tracking which storage nodes are reachable (node pool)
//! - Choosing nodes per operation (random ring scan, least-loaded writes)
//! - Fanning calls out to nodes and merging their answers
//! - Serving the public HTTP API

pub mod http;
pub mod node_client;
pub mod operations;
pub mod placement;
pub mod pool;
pub mod server;

pub use node_client::{HttpConnector, HttpNode, NodeConnector, NodeHandle};
pub use operations::{Coordinator, DeleteOutcome, UploadOutcome};
pub use pool::{NodeLease, NodeLink, NodePool, SlotStatus};
pub use server::CoordinatorServer;
