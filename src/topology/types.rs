//! Topology type definitions.
//!
//! This file contains the connection record, its lifecycle states and the
//! options accepted when wiring two devices together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device::{DeviceId, InterfaceName};

/// Default cap on router connections. Earlier revisions of the lab used 3, 4
/// or "one per interface"; 3 matches the three router ports.
pub const DEFAULT_MAX_ROUTER_CONNECTIONS: usize = 3;

/// Registry-assigned connection identifier. Ids grow monotonically, so
/// ordering by id is ordering by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How the two ends of a link reach each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Direct,
    Routed,
}

/// Connection lifecycle: `Unbound` -> `InterfaceAssigned` -> `Retired`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, no router port resolved yet
    Unbound,
    /// At least one router endpoint carries a port name
    InterfaceAssigned,
    /// Removed from the registry; terminal
    Retired,
}

/// An undirected link between two devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub device_a: DeviceId,
    pub device_b: DeviceId,
    /// Only set when `device_a` is a router
    pub interface_a: Option<InterfaceName>,
    /// Only set when `device_b` is a router
    pub interface_b: Option<InterfaceName>,
    pub kind: ConnectionKind,
    pub can_communicate: bool,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, device_a: DeviceId, device_b: DeviceId) -> Self {
        Self {
            id,
            device_a,
            device_b,
            interface_a: None,
            interface_b: None,
            kind: ConnectionKind::Direct,
            can_communicate: false,
            state: ConnectionState::Unbound,
            created_at: Utc::now(),
        }
    }

    /// Whether this link joins `a` and `b`, in either order
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.device_a == a && self.device_b == b) || (self.device_a == b && self.device_b == a)
    }

    /// The endpoint opposite `device`, if `device` is an endpoint at all
    pub fn other_end(&self, device: &str) -> Option<&str> {
        if self.device_a == device {
            Some(&self.device_b)
        } else if self.device_b == device {
            Some(&self.device_a)
        } else {
            None
        }
    }

    /// Port name recorded for `device`'s side of the link
    pub fn interface_of(&self, device: &str) -> Option<InterfaceName> {
        if self.device_a == device {
            self.interface_a
        } else if self.device_b == device {
            self.interface_b
        } else {
            None
        }
    }

    pub(crate) fn assign_interface(&mut self, device: &str, interface: InterfaceName) {
        if self.device_a == device {
            self.interface_a = Some(interface);
        } else if self.device_b == device {
            self.interface_b = Some(interface);
        } else {
            return;
        }
        if self.state == ConnectionState::Unbound {
            self.state = ConnectionState::InterfaceAssigned;
        }
    }
}

/// Explicit port requests for a new connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub interface_a: Option<InterfaceName>,
    pub interface_b: Option<InterfaceName>,
}

impl ConnectOptions {
    pub fn interfaces(interface_a: Option<InterfaceName>, interface_b: Option<InterfaceName>) -> Self {
        Self {
            interface_a,
            interface_b,
        }
    }
}

/// Result of a connect request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Created(ConnectionId),
    /// The pair was already linked; carries the existing connection
    AlreadyConnected(ConnectionId),
}

impl ConnectOutcome {
    pub fn id(&self) -> ConnectionId {
        match self {
            ConnectOutcome::Created(id) | ConnectOutcome::AlreadyConnected(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ConnectOutcome::Created(_))
    }
}

/// Registry-wide knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySettings {
    pub max_router_connections: usize,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            max_router_connections: DEFAULT_MAX_ROUTER_CONNECTIONS,
        }
    }
}
