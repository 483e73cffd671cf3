//! Reachability verdicts.

use serde::Serialize;

use crate::device::DeviceId;
use crate::topology::ConnectionKind;

/// Outcome of asking whether one device can reach another.
///
/// Only `can_communicate` is guaranteed meaningful; the other flags are set
/// by whichever rule produced the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reachability {
    pub can_communicate: bool,
    /// At least one router hop was needed
    pub via_gateway: bool,
    /// The router itself is cabled to the external target
    pub direct_connection: bool,
    pub external_target: bool,
    pub requires_nat: bool,
    pub internet_access: bool,
    pub has_default_route: bool,
    /// Router-to-router link whose WAN/LAN addressing does not line up
    pub mismatched_interfaces: bool,
    /// The gateway device that carried the traffic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_via: Option<DeviceId>,
    /// Physical path, filled in for reachable pairs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<DeviceId>>,
}

impl Reachability {
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Same segment, no router involved
    pub fn direct() -> Self {
        Self {
            can_communicate: true,
            ..Self::default()
        }
    }

    /// Reachable through at least one router
    pub fn routed() -> Self {
        Self {
            can_communicate: true,
            via_gateway: true,
            ..Self::default()
        }
    }

    /// Connection kind implied by this verdict
    pub fn connection_kind(&self) -> ConnectionKind {
        if self.via_gateway {
            ConnectionKind::Routed
        } else {
            ConnectionKind::Direct
        }
    }
}
