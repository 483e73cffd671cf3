//! Router port resolution.

use crate::device::{Device, InterfaceName};
use crate::ip::address::network_of;
use crate::topology::Topology;

/// Which of `router`'s ports faces `peer`.
///
/// Priority order:
/// 1) The port bound to the connection between the two, if any
/// 2) The first enabled, numbered port (WAN, LAN, LAN2) sharing a network
///    with one of the peer's addresses
/// 3) LAN
///
/// Non-routers always resolve to LAN.
pub fn resolve_interface(topology: &Topology, router: &Device, peer: &Device) -> InterfaceName {
    let Some(r) = router.as_router() else {
        return InterfaceName::Lan;
    };

    // Priority 1: explicit binding
    if let Some(conn) = topology.connection_between(router.id(), peer.id()) {
        if let Some(name) = r.connection_interfaces.get(&conn.id) {
            return *name;
        }
    }

    // Priority 2: addressing
    let peer_networks: Vec<_> = peer
        .addresses()
        .into_iter()
        .map(|(ip, mask)| network_of(ip, mask))
        .collect();

    for (name, record) in r.interfaces.enabled() {
        if let Some(network) = record.network() {
            if peer_networks.contains(&network) {
                log::debug!("{} faces {} on {} by addressing", router.name, peer.name, name);
                return name;
            }
        }
    }

    // Priority 3: default
    InterfaceName::Lan
}

/// Ports a new connection may still use: LAN when numbered, LAN2 when
/// numbered and enabled, WAN always, minus ports already bound.
pub fn free_interfaces(router: &Device) -> Vec<InterfaceName> {
    let Some(r) = router.as_router() else {
        return Vec::new();
    };

    let mut offered = Vec::with_capacity(3);
    if r.interfaces.lan.ip.is_some() {
        offered.push(InterfaceName::Lan);
    }
    if r.interfaces.is_enabled(InterfaceName::Lan2)
        && r.interfaces.get(InterfaceName::Lan2).and_then(|record| record.ip).is_some()
    {
        offered.push(InterfaceName::Lan2);
    }
    offered.push(InterfaceName::Wan);

    offered.retain(|name| !r.bound_interfaces().any(|bound| bound == *name));
    offered
}
