//! Network topology module.
//!
//! This module contains the connection registry, the connection record
//! itself and the path search that runs over the physical wiring.

pub mod types;
pub mod connections;
pub mod path;

// Re-export key types and functions for easier access
pub use connections::Topology;
pub use path::{path_has_interior_switch, PathCache};
pub use types::{
    ConnectOptions, ConnectOutcome, Connection, ConnectionId, ConnectionKind, ConnectionState,
    TopologySettings, DEFAULT_MAX_ROUTER_CONNECTIONS,
};
