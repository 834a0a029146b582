//! # minifs
//!
//! A file store that spreads files across a fixed set of storage nodes:
//! - Merged listing across every reachable node
//! - Downloads from the first node holding the file, starting at a random node
//! - Uploads to the least-loaded node, or replicated to all of them
//! - Dead nodes are reconnected on the next access, without a restart
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!            ┌──────────────────────────┐
//!  clients ─▶│       Coordinator        │
//!   (HTTP)   │  node pool + policies    │
//!            └────────────┬─────────────┘
//!                         │ HTTP
//!   ┌─────────────────────┼──────────────────┐
//!   │                     │                  │
//! ┌─▼──────────┐   ┌──────▼─────┐   ┌────────▼───┐
//! │ Node 0     │   │ Node 1     │   │ Node 2     │
//! │ :6001      │   │ :6002      │   │ :6003      │
//! └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start storage nodes
//! ```bash
//! minifs-node serve --id 0
//! minifs-node serve --id 1 --data-dir ./node-1
//! ```
//!
//! ### Start the coordinator
//! ```bash
//! minifs-coord serve --num-nodes 3 --bind 0.0.0.0:5000
//! ```
//!
//! ### Use the CLI
//! ```bash
//! # Upload, replicated to every node
//! minifs upload ./report.pdf --replicate
//!
//! # Download
//! minifs download report.pdf --output ./out.pdf
//!
//! # List, check, delete
//! minifs list
//! minifs exists report.pdf
//! minifs delete report.pdf
//! ```

pub mod common;
pub mod coordinator;
pub mod node;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::{Coordinator, CoordinatorServer};
pub use node::NodeServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
