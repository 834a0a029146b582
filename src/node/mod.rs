//! Storage node implementation
//!
//! A node is a plain name-to-blob store on local disk:
//! - Files persisted under a data directory
//! - Listing, existence check and delete
//! - HTTP API consumed by the coordinator

pub mod http;
pub mod server;
pub mod store;

pub use server::NodeServer;
pub use store::FileStore;
