//! Reachability evaluation.
//!
//! A query is decided by a fixed sequence of checks: identity, switched
//! segments, physical connectivity, the external-address boundary, and
//! finally either the router rule or the host rule. The host rule may hand
//! the question on to a gateway ("can the gateway reach the other side?").
//! Those relays run as a breadth-first worklist over ordered device pairs
//! with a visited set, so cyclic gateway configurations terminate.

use std::collections::{HashSet, VecDeque};

use log::debug;

use super::types::Reachability;
use crate::device::{Device, InterfaceName};
use crate::error::{Result, TopologyError};
use crate::ip::address::{is_external, same_network};
use crate::routing::interface::resolve_interface;
use crate::topology::{path_has_interior_switch, Topology};

/// Result of checking a single pair
enum Verdict<'a> {
    Decided(Reachability),
    /// Undecided here; reachable if any of these pairs is
    Relay(Vec<Hop<'a>>),
}

/// A relayed question: can `from` reach `to`, with `gateway` doing the relaying
struct Hop<'a> {
    from: &'a Device,
    to: &'a Device,
    gateway: &'a Device,
}

/// Reachability queries against a borrowed topology snapshot
pub struct Evaluator<'a> {
    topology: &'a Topology,
}

impl<'a> Evaluator<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self { topology }
    }

    /// Decide whether `a` can reach `b`.
    ///
    /// Errors only for unknown ids. Reachable verdicts carry the physical
    /// path between the two.
    pub fn evaluate(&self, a: &str, b: &str) -> Result<Reachability> {
        let from = self.topology.device_or_err(a)?;
        let to = self.topology.device_or_err(b)?;

        let mut result = self.search(from, to);
        if result.can_communicate {
            result.path = self.topology.find_path_ids(a, b);
        }

        debug!(
            "{} -> {}: {}",
            from.name,
            to.name,
            match (result.can_communicate, result.via_gateway) {
                (false, _) => "unreachable",
                (true, false) => "direct",
                (true, true) => "via gateway",
            }
        );
        Ok(result)
    }

    fn search(&self, from: &'a Device, to: &'a Device) -> Reachability {
        let mut visited: HashSet<(&str, &str)> = HashSet::from([(from.id(), to.id())]);
        let mut pending: VecDeque<(&Device, &Device, Option<&Device>)> = VecDeque::from([(from, to, None)]);

        while let Some((x, y, relay)) = pending.pop_front() {
            match self.assess(x, y) {
                Verdict::Decided(mut result) => {
                    if !result.can_communicate {
                        continue;
                    }
                    if let Some(gateway) = relay {
                        result.via_gateway = true;
                        result.connected_via.get_or_insert_with(|| gateway.id().to_string());
                    }
                    return result;
                }
                Verdict::Relay(hops) => {
                    for hop in hops {
                        if visited.insert((hop.from.id(), hop.to.id())) {
                            debug!("Relaying {} -> {} through {}", hop.from.name, hop.to.name, hop.gateway.name);
                            pending.push_back((hop.from, hop.to, relay.or(Some(hop.gateway))));
                        } else {
                            debug!("Already tried {} -> {}", hop.from.name, hop.to.name);
                        }
                    }
                }
            }
        }

        Reachability::unreachable()
    }

    /// One pass of the decision sequence for an ordered pair
    fn assess(&self, x: &'a Device, y: &'a Device) -> Verdict<'a> {
        if x.id() == y.id() {
            return Verdict::Decided(Reachability::direct());
        }

        let Some(path) = self.topology.find_path(x.id(), y.id()) else {
            return Verdict::Decided(Reachability::unreachable());
        };

        if path_has_interior_switch(&path) {
            let both_switches = x.is_switch() && y.is_switch();
            if both_switches || x.is_addressless_switch() || y.is_addressless_switch() {
                return Verdict::Decided(Reachability::direct());
            }
            return self.host_rule(x, y);
        }

        let external = |device: &Device| device.primary_ip().map(is_external).unwrap_or(false);
        if (external(y) && !x.is_router()) || (external(x) && !y.is_router()) {
            debug!("{} <-> {} crosses the external boundary without a router", x.name, y.name);
            return Verdict::Decided(Reachability::unreachable());
        }

        if x.is_router() {
            Verdict::Decided(self.router_rule(x, y))
        } else if y.is_router() {
            Verdict::Decided(self.router_rule(y, x))
        } else {
            self.host_rule(x, y)
        }
    }

    /// Host rule: same subnet, or relay through a gateway the host is attached to
    fn host_rule(&self, x: &'a Device, y: &'a Device) -> Verdict<'a> {
        let (Some(ip_x), Some(ip_y)) = (x.primary_ip(), y.primary_ip()) else {
            return Verdict::Decided(Reachability::unreachable());
        };

        if same_network(ip_x, x.subnet_mask(), ip_y, y.subnet_mask()) {
            return Verdict::Decided(Reachability::direct());
        }

        let mut hops = Vec::new();
        if let Some(gateway) = self.attached_gateway(x) {
            hops.push(Hop {
                from: gateway,
                to: y,
                gateway,
            });
        }
        if let Some(gateway) = self.attached_gateway(y) {
            hops.push(Hop {
                from: x,
                to: gateway,
                gateway,
            });
        }

        if hops.is_empty() {
            Verdict::Decided(Reachability::unreachable())
        } else {
            Verdict::Relay(hops)
        }
    }

    /// `device`'s configured gateway, if it exists and `device` is cabled
    /// to it (directly or through switches)
    fn attached_gateway(&self, device: &'a Device) -> Option<&'a Device> {
        let address = device.gateway()?;
        let Some(gateway) = self.topology.device_by_ip(address) else {
            debug!("Gateway {} of {} is not a known device", address, device.name);
            return None;
        };
        if gateway.id() == device.id() {
            return None;
        }

        let attached = self.topology.are_connected(device.id(), gateway.id())
            || self.topology.connected_via_switch(device.id(), gateway.id());
        if attached {
            Some(gateway)
        } else {
            debug!("{} is not attached to its gateway {}", device.name, gateway.name);
            None
        }
    }

    /// Router rule, router `r` against peer `p`
    fn router_rule(&self, r: &'a Device, p: &'a Device) -> Reachability {
        let Some(router) = r.as_router() else {
            return Reachability::unreachable();
        };
        let wired = self.topology.are_connected(r.id(), p.id());

        if wired && p.is_addressless_switch() {
            return Reachability::direct();
        }

        if wired && (p.is_cloud() || p.is_router()) {
            let mut result = Reachability::direct();
            if p.is_router() {
                result.mismatched_interfaces = self.interfaces_mismatched(r, p);
            }
            if p.is_cloud() && p.primary_ip().map(is_external).unwrap_or(false) {
                result.external_target = true;
                result.direct_connection = true;
                if router.has_internet_access() {
                    result.internet_access = true;
                    result.requires_nat = true;
                }
            }
            return result;
        }

        if router.interfaces.lan_side().next().is_none() {
            debug!("{} has no LAN address", r.name);
            return Reachability::unreachable();
        }

        let Some(peer_ip) = p.primary_ip() else {
            return Reachability::unreachable();
        };

        if router.lan_contains(peer_ip) {
            return Reachability::direct();
        }

        if is_external(peer_ip) {
            return self.external_rule(r, p);
        }

        if let Some(gateway) = p.gateway() {
            if router.is_lan_address(gateway) {
                if router.routing_table.iter().any(|route| route.covers(peer_ip)) {
                    return Reachability::routed();
                }
                debug!("{} uses {} as gateway but {} has no route to it", p.name, r.name, r.name);
                return Reachability::unreachable();
            }
        }

        // Upstream device on the WAN segment
        if (p.is_cloud() || p.is_router()) && router.interfaces.wan.contains(peer_ip) {
            return Reachability::direct();
        }

        Reachability::unreachable()
    }

    /// Router `r` reaching external peer `p`.
    ///
    /// Only routers wired to `p` can carry the traffic. A path from `r` to
    /// an external device runs through switches, which the host rule has
    /// already decided, or through routers, the last of which is wired to
    /// `p`. So when no wired router turns up, `p` is out of reach; what `r`
    /// could reach on its own uplink is answered by [`Evaluator::uplink`].
    fn external_rule(&self, r: &'a Device, p: &'a Device) -> Reachability {
        let external = Reachability {
            can_communicate: true,
            external_target: true,
            ..Reachability::default()
        };

        for candidate in self.topology.devices().filter(|device| device.is_router()) {
            if !self.topology.are_connected(candidate.id(), p.id()) {
                continue;
            }
            if candidate.id() == r.id() {
                return Reachability {
                    direct_connection: true,
                    ..external
                };
            }
            if self.topology.find_path(r.id(), candidate.id()).is_some() {
                return Reachability {
                    via_gateway: true,
                    connected_via: Some(candidate.id().to_string()),
                    ..external
                };
            }
        }

        debug!("No router carries {} -> {}", r.name, p.name);
        Reachability::unreachable()
    }

    /// Whether `router_id` can send Internet-bound traffic through its own
    /// configuration: a WAN address with a gateway (NAT), or failing that a
    /// default route.
    pub fn uplink(&self, router_id: &str) -> Result<Reachability> {
        let device = self.topology.device_or_err(router_id)?;
        let router = device
            .as_router()
            .ok_or_else(|| TopologyError::NotARouter(router_id.to_string()))?;

        let upstream = Reachability {
            can_communicate: true,
            via_gateway: true,
            requires_nat: true,
            external_target: true,
            ..Reachability::default()
        };

        let result = if router.has_internet_access() {
            Reachability {
                internet_access: true,
                ..upstream
            }
        } else if router.has_default_route() {
            Reachability {
                has_default_route: true,
                ..upstream
            }
        } else {
            debug!("{} has no WAN gateway and no default route", device.name);
            Reachability::unreachable()
        };
        Ok(result)
    }

    /// For a LAN-to-WAN router link, whether the WAN side sits outside the
    /// LAN side's network. Physical wiring still counts as reachable.
    fn interfaces_mismatched(&self, r1: &Device, r2: &Device) -> bool {
        let side1 = resolve_interface(self.topology, r1, r2);
        let side2 = resolve_interface(self.topology, r2, r1);

        let (wan_router, lan_router, lan_interface) = match (side1, side2) {
            (InterfaceName::Wan, lan) if lan.is_lan_side() => (r1, r2, lan),
            (lan, InterfaceName::Wan) if lan.is_lan_side() => (r2, r1, lan),
            _ => return false,
        };

        let wan = wan_router.as_router().map(|r| &r.interfaces.wan);
        let lan = lan_router.as_router().and_then(|r| r.interfaces.get(lan_interface));
        let matched = match (wan.and_then(|w| w.network()), lan.and_then(|l| l.network())) {
            (Some(wan_net), Some(lan_net)) => wan_net == lan_net,
            _ => false,
        };

        if !matched {
            debug!(
                "WAN of {} is not on {} network of {}",
                wan_router.name, lan_interface, lan_router.name
            );
        }
        !matched
    }
}
