//! Distributed mode implementation
//!
//! This module spreads one search across multiple nodes.
//!
//! # Architecture
//!
//! primegather distributed mode uses a coordinator-node architecture:
//!
//! - **Coordinator**: Partitions the search, assigns ranges to nodes, gathers results
//! - **Node Service**: Runs on nodes, scans assigned ranges on a local executor
//!
//! # Modules
//!
//! - `protocol`: Message definitions and serialization
//! - `node_service`: Node service implementation
//! - `coordinator`: Distributed coordinator implementation

pub mod protocol;
pub mod node_service;
pub mod coordinator;

// Re-export key types
pub use protocol::{
    Message,
    AssignMessage,
    AcceptedMessage,
    DoneMessage,
    ErrorMessage,
    PROTOCOL_VERSION,
};

pub use node_service::NodeService;
pub use coordinator::{assign_tasks, DistributedCoordinator};
