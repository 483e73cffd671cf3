//! DNS capability checks.
//!
//! Name resolution itself lives outside the engine. What the engine needs is
//! to know which devices can answer queries and which device a given host
//! would send its queries to.

use log::{debug, warn};

use crate::device::lookup::DeviceLookup;
use crate::device::{Device, DeviceKind};
use crate::error::Result;
use crate::reachability::Reachability;
use crate::topology::Topology;

/// Decides whether a device can answer DNS queries
pub trait DnsCapability {
    fn can_resolve_dns(&self, device: &Device) -> bool;
}

/// DNS servers and routers resolve; nothing else does
#[derive(Debug, Clone, Copy, Default)]
pub struct ByDeviceType;

impl DnsCapability for ByDeviceType {
    fn can_resolve_dns(&self, device: &Device) -> bool {
        can_resolve_dns(device)
    }
}

pub fn can_resolve_dns(device: &Device) -> bool {
    matches!(device.kind, DeviceKind::DnsServer(_) | DeviceKind::Router(_))
}

/// The device `device` sends its queries to.
///
/// Only the first configured DNS address is consulted. Returns `None` when
/// no DNS address is configured, the address belongs to no known device
/// (an external resolver such as 8.8.8.8), or the device found cannot
/// resolve.
pub fn configured_resolver<'a, L, C>(lookup: &'a L, device: &Device, capability: &C) -> Option<&'a Device>
where
    L: DeviceLookup,
    C: DnsCapability,
{
    let Some(address) = device.dns_servers().first().copied() else {
        warn!("{} has no DNS server configured", device.name);
        return None;
    };

    let Some(resolver) = lookup.device_by_ip(address) else {
        debug!("DNS server {} of {} is external", address, device.name);
        return None;
    };

    if capability.can_resolve_dns(resolver) {
        Some(resolver)
    } else {
        warn!("{} ({}) is not a DNS server", resolver.name, address);
        None
    }
}

/// Whether `device_id` can reach its configured resolver. `None` when it
/// has no usable resolver inside the topology.
pub fn resolver_reachability(topology: &Topology, device_id: &str) -> Result<Option<Reachability>> {
    let device = topology.device_or_err(device_id)?;
    match configured_resolver(topology, device, &ByDeviceType) {
        Some(resolver) => topology.evaluate(device_id, resolver.id()).map(Some),
        None => Ok(None),
    }
}
