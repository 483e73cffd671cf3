//! IP address allocation logic.
//!
//! Two allocations happen when a router port is wired up:
//! 1) An unnumbered WAN port takes a free host address from the network of
//!    whatever sits upstream, with the upstream address as its gateway
//! 2) An unnumbered host plugged into a router port leases an address from
//!    that port's network

use std::net::Ipv4Addr;

use serde::Serialize;

use super::address::{hosts_from, SubnetMask};
use crate::device::lookup::DeviceLookup;
use crate::device::{AddressRecord, Device, InterfaceName};

/// WAN address used when the upstream network has no free host left
pub const WAN_FALLBACK_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 6);
pub const WAN_FALLBACK_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// First host offset tried on the upstream network (`.1` is usually the gateway)
const WAN_SCAN_OFFSET: u32 = 2;

/// First host offset leased to hosts behind a router port
const LEASE_OFFSET: u32 = 10;

/// Where a WAN address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationSource {
    /// Free host found on the upstream network
    Scanned,
    /// Upstream network exhausted
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WanAssignment {
    pub ip: Ipv4Addr,
    pub subnet_mask: SubnetMask,
    pub gateway: Ipv4Addr,
    pub source: AllocationSource,
}

/// Host lease handed to a device behind a router port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostLease {
    pub ip: Ipv4Addr,
    pub subnet_mask: SubnetMask,
    pub gateway: Option<Ipv4Addr>,
}

/// Upstream record a WAN port numbers itself from.
///
/// A router peer contributes the port it bound to this link (its LAN when
/// unbound); anything else contributes its primary record.
fn upstream_record<'a>(peer: &'a Device, peer_interface: Option<InterfaceName>) -> Option<&'a AddressRecord> {
    match (peer.as_router(), peer_interface) {
        (Some(router), Some(name)) => router.interfaces.get(name),
        (Some(router), None) => Some(&router.interfaces.lan),
        (None, _) => peer.primary_record(),
    }
}

/// Number `router`'s WAN port from `peer`'s network.
///
/// Returns `None` when the WAN port is already numbered or the peer has no
/// address to derive a network from.
pub fn allocate_wan_address(
    lookup: &impl DeviceLookup,
    router: &Device,
    peer: &Device,
    peer_interface: Option<InterfaceName>,
) -> Option<WanAssignment> {
    let wan = &router.as_router()?.interfaces.wan;
    if wan.ip.is_some() {
        return None;
    }

    let Some(upstream) = upstream_record(peer, peer_interface) else {
        log::debug!("{} has no address, leaving WAN of {} unset", peer.name, router.name);
        return None;
    };
    let Some(upstream_ip) = upstream.ip else {
        log::debug!("{} has no address, leaving WAN of {} unset", peer.name, router.name);
        return None;
    };

    let free = hosts_from(upstream_ip, upstream.subnet_mask, WAN_SCAN_OFFSET)
        .find(|candidate| !lookup.address_taken(*candidate, Some(router.id())));

    match free {
        Some(ip) => {
            log::info!(
                "Assigned WAN address {}/{} to {} (gateway {})",
                ip,
                upstream.subnet_mask.prefix_len(),
                router.name,
                upstream_ip
            );
            Some(WanAssignment {
                ip,
                subnet_mask: upstream.subnet_mask,
                gateway: upstream_ip,
                source: AllocationSource::Scanned,
            })
        }
        None => {
            log::warn!(
                "No free address on {}'s network for {}. Using fallback WAN {}",
                peer.name,
                router.name,
                WAN_FALLBACK_IP
            );
            Some(WanAssignment {
                ip: WAN_FALLBACK_IP,
                subnet_mask: SubnetMask::CLASS_C,
                gateway: WAN_FALLBACK_GATEWAY,
                source: AllocationSource::Fallback,
            })
        }
    }
}

/// Lease the first free host address (from `.10`) on `router`'s `interface`.
///
/// LAN-side leases use the port address as gateway. A WAN-side lease uses
/// the WAN gateway, since the WAN address itself is not a router for that
/// network.
pub fn lease_host_address(
    lookup: &impl DeviceLookup,
    router: &Device,
    interface: InterfaceName,
) -> Option<HostLease> {
    let record = router.as_router()?.interfaces.get(interface)?;
    let port_ip = record.ip?;

    let ip = hosts_from(port_ip, record.subnet_mask, LEASE_OFFSET)
        .find(|candidate| !lookup.address_taken(*candidate, None));

    let Some(ip) = ip else {
        log::warn!("No free host address left on {} of {}", interface, router.name);
        return None;
    };

    let gateway = if interface.is_lan_side() {
        Some(port_ip)
    } else {
        record.gateway
    };

    Some(HostLease {
        ip,
        subnet_mask: record.subnet_mask,
        gateway,
    })
}
