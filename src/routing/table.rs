//! Routing table generation.
//!
//! Tables only ever grow through these functions, and every insert is
//! keyed on (network, mask, gateway), so running them repeatedly is safe.

use std::net::Ipv4Addr;

use log::{debug, info, warn};

use super::interface::resolve_interface;
use crate::device::{Device, InterfaceName, Route};
use crate::error::{Result, TopologyError};
use crate::ip::address::{network_of, SubnetMask};
use crate::topology::Topology;

/// Metric for directly attached networks
pub const DIRECT_METRIC: u32 = 0;
/// Metric for networks one hop away
pub const NEIGHBOR_METRIC: u32 = 1;
/// Metric for the default route
pub const DEFAULT_METRIC: u32 = 10;

/// Address a neighbour is reached at from `router`. A neighbouring router
/// answers on whichever port it bound to the shared link.
fn neighbor_address(topology: &Topology, router: &Device, neighbor: &Device) -> Option<(Ipv4Addr, SubnetMask)> {
    if let Some(r) = neighbor.as_router() {
        let conn = topology.connection_between(router.id(), neighbor.id())?;
        let name = r.connection_interfaces.get(&conn.id)?;
        let record = r.interfaces.get(*name)?;
        return record.ip.map(|ip| (ip, record.subnet_mask));
    }
    neighbor
        .primary_record()
        .and_then(|record| record.ip.map(|ip| (ip, record.subnet_mask)))
}

fn candidate_routes(topology: &Topology, device: &Device) -> Result<Vec<Route>> {
    let router = device
        .as_router()
        .ok_or_else(|| TopologyError::NotARouter(device.id().to_string()))?;
    let mut routes = Vec::new();

    // Directly attached networks
    for (name, record) in router.interfaces.enabled() {
        if let Some(ip) = record.ip {
            routes.push(Route {
                destination: network_of(ip, record.subnet_mask),
                mask: record.subnet_mask,
                gateway: Ipv4Addr::UNSPECIFIED,
                via_interface: name,
                metric: DIRECT_METRIC,
            });
        }
    }

    // One hop away
    for neighbor in topology.neighbors_of(device.id()) {
        match neighbor_address(topology, device, neighbor) {
            Some((ip, mask)) => routes.push(Route {
                destination: network_of(ip, mask),
                mask,
                gateway: ip,
                via_interface: resolve_interface(topology, device, neighbor),
                metric: NEIGHBOR_METRIC,
            }),
            None => debug!("Skipping route to {}: no address", neighbor.name),
        }
    }

    if let Some(gateway) = router.interfaces.wan.gateway {
        routes.push(Route {
            destination: Ipv4Addr::UNSPECIFIED,
            mask: SubnetMask::ANY,
            gateway,
            via_interface: InterfaceName::Wan,
            metric: DEFAULT_METRIC,
        });
    }

    Ok(routes)
}

/// Fill `router_id`'s table with direct, neighbour and default routes.
///
/// Returns the routes that were actually added.
pub fn auto_generate_routes(topology: &mut Topology, router_id: &str) -> Result<Vec<Route>> {
    let candidates = candidate_routes(topology, topology.device_or_err(router_id)?)?;

    let mut added = Vec::new();
    for route in candidates {
        if topology.add_route(router_id, route.clone())? {
            added.push(route);
        }
    }

    info!("Generated {} routes for {}", added.len(), router_id);
    Ok(added)
}

/// Static route for a LAN-to-WAN router link.
///
/// When one router's LAN-side port is wired to the other's WAN port, the
/// WAN-side router learns the LAN-side network with its own WAN address as
/// next hop. Any other pairing, or a missing address, adds nothing.
pub fn link_router_routes(
    topology: &mut Topology,
    router_a: &str,
    router_b: &str,
    interface_a: InterfaceName,
    interface_b: InterfaceName,
) -> Result<Option<Route>> {
    let (wan_side, lan_side, lan_interface) = match (interface_a, interface_b) {
        (lan, InterfaceName::Wan) if lan.is_lan_side() => (router_b, router_a, lan),
        (InterfaceName::Wan, lan) if lan.is_lan_side() => (router_a, router_b, lan),
        _ => return Ok(None),
    };

    let route = {
        let lan_device = topology.device_or_err(lan_side)?;
        let wan_device = topology.device_or_err(wan_side)?;
        let lan_record = lan_device
            .as_router()
            .and_then(|r| r.interfaces.get(lan_interface))
            .ok_or_else(|| TopologyError::MissingInterface {
                device: lan_side.to_string(),
                interface: lan_interface,
            })?;
        let wan_ip = wan_device
            .as_router()
            .ok_or_else(|| TopologyError::NotARouter(wan_side.to_string()))?
            .interfaces
            .wan
            .ip;

        match (lan_record.ip, wan_ip) {
            (Some(lan_ip), Some(wan_ip)) => Route {
                destination: network_of(lan_ip, lan_record.subnet_mask),
                mask: lan_record.subnet_mask,
                gateway: wan_ip,
                via_interface: InterfaceName::Wan,
                metric: NEIGHBOR_METRIC,
            },
            _ => {
                warn!(
                    "Cannot route {} -> {}: {} of {} or WAN of {} has no address",
                    wan_side, lan_side, lan_interface, lan_side, wan_side
                );
                return Ok(None);
            }
        }
    };

    if topology.add_route(wan_side, route.clone())? {
        info!("Added route {} on {}", route, wan_side);
        Ok(Some(route))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{factory, AddressRecord};
    use crate::selector::FirstAvailable;
    use crate::topology::ConnectOptions;

    fn edge_router() -> Device {
        let mut router = factory::router("r1", "R1");
        let wan = &mut router.as_router_mut().unwrap().interfaces.wan;
        wan.ip = Some(Ipv4Addr::new(203, 0, 113, 5));
        wan.gateway = Some(Ipv4Addr::new(203, 0, 113, 1));
        router
    }

    #[test]
    fn test_generated_routes() {
        let mut topology = Topology::new();
        topology.add_device(edge_router()).unwrap();
        topology
            .add_device(factory::host(
                "pc",
                "PC",
                AddressRecord::new(Ipv4Addr::new(192, 168, 1, 10), SubnetMask::CLASS_C),
            ))
            .unwrap();
        topology.add_device(factory::switch("sw", "SW")).unwrap();
        topology
            .create_connection("r1", "pc", ConnectOptions::default(), &mut FirstAvailable)
            .unwrap();
        topology
            .create_connection("r1", "sw", ConnectOptions::default(), &mut FirstAvailable)
            .unwrap();

        let added = auto_generate_routes(&mut topology, "r1").unwrap();
        // wan, lan, lan2 direct + pc neighbour + default; the switch has no address
        assert_eq!(added.len(), 5);
        assert!(added.iter().any(|r| r.is_default() && r.metric == DEFAULT_METRIC));
        assert!(added
            .iter()
            .any(|r| r.gateway == Ipv4Addr::new(192, 168, 1, 10) && r.metric == NEIGHBOR_METRIC));

        // Idempotent
        assert!(auto_generate_routes(&mut topology, "r1").unwrap().is_empty());
        assert_eq!(topology.routing_table("r1").unwrap().len(), 5);
    }

    #[test]
    fn test_routes_only_for_routers() {
        let mut topology = Topology::new();
        topology.add_device(factory::switch("sw", "SW")).unwrap();
        assert_eq!(
            auto_generate_routes(&mut topology, "sw"),
            Err(TopologyError::NotARouter("sw".to_string()))
        );
    }

    #[test]
    fn test_link_route_on_wan_side() {
        let mut topology = Topology::new();
        topology.add_device(factory::router("core", "Core")).unwrap();
        topology.add_device(factory::router("edge", "Edge")).unwrap();

        // Wiring edge WAN to core LAN numbers edge's WAN and installs the route
        topology
            .create_connection(
                "core",
                "edge",
                ConnectOptions::interfaces(Some(InterfaceName::Lan), Some(InterfaceName::Wan)),
                &mut FirstAvailable,
            )
            .unwrap();

        let table = topology.routing_table("edge").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].destination, Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(table[0].gateway, Ipv4Addr::new(192, 168, 1, 2));
        assert!(topology.routing_table("core").unwrap().is_empty());

        // Second run adds nothing
        let again = link_router_routes(
            &mut topology,
            "core",
            "edge",
            InterfaceName::Lan,
            InterfaceName::Wan,
        )
        .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_link_route_ignores_lan_pairs() {
        let mut topology = Topology::new();
        topology.add_device(factory::router("a", "A")).unwrap();
        topology.add_device(factory::router("b", "B")).unwrap();
        let route =
            link_router_routes(&mut topology, "a", "b", InterfaceName::Lan, InterfaceName::Lan2).unwrap();
        assert!(route.is_none());
    }
}
