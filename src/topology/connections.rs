//! Connection registry.
//!
//! The [`Topology`] owns every device and every connection for the session.
//! All mutations go through it, which keeps the per-device connection lists
//! and router port bindings in step with the connection table.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use log::{debug, info, warn};

use super::types::{
    ConnectOptions, ConnectOutcome, Connection, ConnectionId, TopologySettings,
};
use crate::device::lookup::DeviceLookup;
use crate::device::{AddressRecord, Device, DeviceId, DeviceKind, InterfaceName, Route, Router};
use crate::error::{Result, TopologyError};
use crate::ip::{allocator, AllocationSource};
use crate::reachability::{Evaluator, Reachability};
use crate::routing::{interface, table};
use crate::selector::InterfaceSelector;

/// The authoritative device and connection store
#[derive(Debug, Clone, Default)]
pub struct Topology {
    settings: TopologySettings,
    devices: HashMap<DeviceId, Device>,
    /// Insertion order of devices, used wherever the engine scans "all devices"
    order: Vec<DeviceId>,
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection: u64,
    /// Bumped on every mutation that can change paths or verdicts
    revision: u64,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: TopologySettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &TopologySettings {
        &self.settings
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Register a device built by the device factory. Any connection state
    /// the device carries is discarded; links are only made through
    /// [`Topology::create_connection`].
    pub fn add_device(&mut self, mut device: Device) -> Result<()> {
        if self.devices.contains_key(device.id()) {
            return Err(TopologyError::DuplicateDevice(device.id().to_string()));
        }

        for id in device.connections().to_vec() {
            device.detach(id);
        }
        if let Some(router) = device.as_router_mut() {
            router.connection_interfaces.clear();
        }

        debug!("Registered device {}", device);
        self.order.push(device.id().to_string());
        self.devices.insert(device.id().to_string(), device);
        self.revision += 1;
        Ok(())
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn device_or_err(&self, id: &str) -> Result<&Device> {
        self.devices
            .get(id)
            .ok_or_else(|| TopologyError::UnknownDevice(id.to_string()))
    }

    fn device_mut(&mut self, id: &str) -> Result<&mut Device> {
        self.devices
            .get_mut(id)
            .ok_or_else(|| TopologyError::UnknownDevice(id.to_string()))
    }

    pub(crate) fn router_mut(&mut self, id: &str) -> Result<&mut Router> {
        self.device_mut(id)?
            .as_router_mut()
            .ok_or_else(|| TopologyError::NotARouter(id.to_string()))
    }

    /// Devices in registration order
    pub fn devices(&self) -> impl Iterator<Item = &Device> + '_ {
        self.order.iter().filter_map(|id| self.devices.get(id))
    }

    pub fn device_count(&self) -> usize {
        self.order.len()
    }

    /// First device (in registration order) holding `ip` on any port
    pub fn device_by_ip(&self, ip: Ipv4Addr) -> Option<&Device> {
        self.devices().find(|device| device.owns_address(ip))
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Live connections in creation order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values()
    }

    pub fn connection_between(&self, a: &str, b: &str) -> Option<&Connection> {
        self.connections.values().find(|conn| conn.joins(a, b))
    }

    /// Whether `a` and `b` share a wire
    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        self.connection_between(a, b).is_some()
    }

    /// Devices at the far end of each of `id`'s connections, in the order
    /// the connections were attached. Dangling ids are skipped.
    pub fn neighbors_of(&self, id: &str) -> Vec<&Device> {
        let Some(device) = self.devices.get(id) else {
            return Vec::new();
        };

        device
            .connections()
            .iter()
            .filter_map(|conn_id| self.connections.get(conn_id))
            .filter_map(|conn| conn.other_end(id))
            .filter_map(|other| self.devices.get(other))
            .collect()
    }

    /// Capacity check for a new connection on `id`.
    ///
    /// Switches always accept. Routers accept while below the configured
    /// maximum and, when `requested` is given, only if that port is free.
    /// Everything else takes a single connection.
    pub fn can_accept_connection(&self, id: &str, requested: Option<InterfaceName>) -> Result<bool> {
        let device = self.device_or_err(id)?;
        let count = device.connections().len();

        let accepted = match &device.kind {
            DeviceKind::Switch(_) => true,
            DeviceKind::Router(_) => {
                if count >= self.settings.max_router_connections {
                    debug!(
                        "{} already has {}/{} connections",
                        device.name, count, self.settings.max_router_connections
                    );
                    false
                } else if let Some(name) = requested {
                    interface::free_interfaces(device).contains(&name)
                } else {
                    true
                }
            }
            _ => count == 0,
        };

        Ok(accepted)
    }

    /// Free ports of a router
    pub fn free_interfaces(&self, id: &str) -> Result<Vec<InterfaceName>> {
        let device = self.device_or_err(id)?;
        if !device.is_router() {
            return Err(TopologyError::NotARouter(id.to_string()));
        }
        Ok(interface::free_interfaces(device))
    }

    /// Wire `a` to `b`.
    ///
    /// Router endpoints get a port: the one named in `options`, the only free
    /// one, or whichever `selector` picks. A WAN port without an address is
    /// numbered from the peer's network, unaddressed hosts on a router port
    /// lease an address from it, and LAN-to-WAN router links get a static
    /// route. The new connection's kind comes from a reachability check.
    pub fn create_connection(
        &mut self,
        a: &str,
        b: &str,
        options: ConnectOptions,
        selector: &mut dyn InterfaceSelector,
    ) -> Result<ConnectOutcome> {
        self.device_or_err(a)?;
        self.device_or_err(b)?;
        if a == b {
            return Err(TopologyError::SelfConnection(a.to_string()));
        }

        if !self.can_accept_connection(a, options.interface_a)? {
            return Err(TopologyError::PortExhausted(a.to_string()));
        }
        if !self.can_accept_connection(b, options.interface_b)? {
            return Err(TopologyError::PortExhausted(b.to_string()));
        }

        if let Some(existing) = self.connection_between(a, b) {
            warn!("{} and {} are already connected ({})", a, b, existing.id);
            return Ok(ConnectOutcome::AlreadyConnected(existing.id));
        }

        // Resolve ports before touching any state so a failure leaves nothing behind
        let interface_a = self.pick_interface(a, options.interface_a, selector)?;
        let interface_b = self.pick_interface(b, options.interface_b, selector)?;

        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;

        let mut connection = Connection::new(id, a.to_string(), b.to_string());
        for (end, chosen) in [(a, interface_a), (b, interface_b)] {
            let device = self.device_mut(end)?;
            device.attach(id);
            if let (Some(name), Some(router)) = (chosen, device.as_router_mut()) {
                router.connection_interfaces.insert(id, name);
                connection.assign_interface(end, name);
            }
        }
        self.connections.insert(id, connection);
        self.revision += 1;

        if let Some(name) = interface_a {
            self.configure_router_port(id, a, b, name);
        }
        if let Some(name) = interface_b {
            self.configure_router_port(id, b, a, name);
        }
        if let (Some(name_a), Some(name_b)) = (interface_a, interface_b) {
            table::link_router_routes(self, a, b, name_a, name_b)?;
        }

        let verdict = Evaluator::new(self).evaluate(a, b)?;
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.can_communicate = verdict.can_communicate;
            conn.kind = verdict.connection_kind();
        }

        info!(
            "Created connection {}: {}{} <-> {}{} ({})",
            id,
            a,
            interface_a.map(|n| format!(" ({})", n)).unwrap_or_default(),
            b,
            interface_b.map(|n| format!(" ({})", n)).unwrap_or_default(),
            if verdict.can_communicate { "can communicate" } else { "no communication" }
        );

        Ok(ConnectOutcome::Created(id))
    }

    /// Port for a new connection on `id`, or `None` for non-routers
    fn pick_interface(
        &self,
        id: &str,
        requested: Option<InterfaceName>,
        selector: &mut dyn InterfaceSelector,
    ) -> Result<Option<InterfaceName>> {
        let device = self.device_or_err(id)?;
        if !device.is_router() {
            return Ok(None);
        }
        if requested.is_some() {
            return Ok(requested);
        }

        let candidates = interface::free_interfaces(device);
        match candidates.as_slice() {
            [] => Err(TopologyError::NoFreeInterface(id.to_string())),
            [only] => Ok(Some(*only)),
            _ => {
                let chosen = selector.choose_interface(device, &candidates);
                if candidates.contains(&chosen) {
                    return Ok(Some(chosen));
                }
                let fallback = candidates.first().copied();
                if let Some(first) = fallback {
                    warn!("Interface {} is not free on {}, using {}", chosen, device.name, first);
                }
                Ok(fallback)
            }
        }
    }

    /// Address follow-up after `router` was bound to `peer` on `name`
    fn configure_router_port(&mut self, id: ConnectionId, router: &str, peer: &str, name: InterfaceName) {
        if name == InterfaceName::Wan {
            let assignment = match (self.devices.get(router), self.devices.get(peer)) {
                (Some(r), Some(p)) => {
                    let peer_port = self.connections.get(&id).and_then(|conn| conn.interface_of(peer));
                    allocator::allocate_wan_address(&*self, r, p, peer_port)
                }
                _ => None,
            };
            if let Some(assignment) = assignment {
                let origin = match assignment.source {
                    AllocationSource::Scanned => format!("{}'s network", peer),
                    AllocationSource::Fallback => "the fallback pool".to_string(),
                };
                info!(
                    "Assigned WAN {}/{} to {} from {}",
                    assignment.ip,
                    assignment.subnet_mask.prefix_len(),
                    router,
                    origin
                );
                if let Ok(r) = self.router_mut(router) {
                    let wan = &mut r.interfaces.wan;
                    wan.ip = Some(assignment.ip);
                    wan.subnet_mask = assignment.subnet_mask;
                    wan.gateway = Some(assignment.gateway);
                }
            }
        }

        let lease = match (self.devices.get(router), self.devices.get(peer)) {
            (Some(r), Some(p)) if needs_lease(p) => allocator::lease_host_address(&*self, r, name),
            _ => None,
        };
        if let Some(lease) = lease {
            if let Some(DeviceKind::Host(record) | DeviceKind::DnsServer(record)) =
                self.devices.get_mut(peer).map(|device| &mut device.kind)
            {
                info!("Leased {} to {} from {} ({})", lease.ip, peer, router, name);
                record.ip = Some(lease.ip);
                record.subnet_mask = lease.subnet_mask;
                record.gateway = lease.gateway;
            }
        }
    }

    /// Remove a connection. Returns the retired record, or `None` when the
    /// id is not (or no longer) registered.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let Some(mut connection) = self.connections.remove(&id) else {
            debug!("Connection {} is not registered, nothing to remove", id);
            return None;
        };

        for end in [&connection.device_a, &connection.device_b] {
            if let Some(device) = self.devices.get_mut(end.as_str()) {
                device.detach(id);
            }
        }

        connection.state = super::types::ConnectionState::Retired;
        self.revision += 1;
        info!(
            "Removed connection {}: {} <-> {}",
            id, connection.device_a, connection.device_b
        );
        Some(connection)
    }

    /// Remove a device together with every connection it participates in
    pub fn remove_device(&mut self, id: &str) -> Result<Device> {
        let attached = self.device_or_err(id)?.connections().to_vec();
        for conn in attached {
            self.remove_connection(conn);
        }

        self.order.retain(|other| other != id);
        let device = self
            .devices
            .remove(id)
            .ok_or_else(|| TopologyError::UnknownDevice(id.to_string()))?;
        self.revision += 1;
        info!("Removed device {}", device);
        Ok(device)
    }

    /// Re-run the reachability check for every connection
    pub fn refresh_connection_kinds(&mut self) {
        let verdicts: Vec<(ConnectionId, Reachability)> = {
            let evaluator = Evaluator::new(self);
            self.connections
                .values()
                .filter_map(|conn| {
                    evaluator
                        .evaluate(&conn.device_a, &conn.device_b)
                        .ok()
                        .map(|verdict| (conn.id, verdict))
                })
                .collect()
        };

        for (id, verdict) in verdicts {
            if let Some(conn) = self.connections.get_mut(&id) {
                conn.can_communicate = verdict.can_communicate;
                conn.kind = verdict.connection_kind();
            }
        }
    }

    /// Replace an address record.
    ///
    /// Routers need `interface` (LAN when omitted); other devices must not
    /// pass one. A switch given a record without an address becomes
    /// unmanaged again.
    pub fn set_address(
        &mut self,
        id: &str,
        interface: Option<InterfaceName>,
        record: AddressRecord,
    ) -> Result<()> {
        let device = self.device_mut(id)?;
        match (&mut device.kind, interface) {
            (DeviceKind::Router(router), name) => {
                let name = name.unwrap_or(InterfaceName::Lan);
                let slot = router
                    .interfaces
                    .get_mut(name)
                    .ok_or_else(|| TopologyError::MissingInterface {
                        device: id.to_string(),
                        interface: name,
                    })?;
                *slot = record;
            }
            (_, Some(_)) => return Err(TopologyError::NotARouter(id.to_string())),
            (DeviceKind::Switch(slot), None) => {
                *slot = if record.ip.is_some() { Some(record) } else { None };
            }
            (DeviceKind::Host(slot) | DeviceKind::Cloud(slot) | DeviceKind::DnsServer(slot), None) => {
                *slot = record;
            }
        }

        self.revision += 1;
        self.refresh_connection_kinds();
        Ok(())
    }

    /// Switch a router's second LAN port on or off
    pub fn set_lan2_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let router = self.router_mut(id)?;
        let lan2 = router
            .interfaces
            .lan2
            .as_mut()
            .ok_or_else(|| TopologyError::MissingInterface {
                device: id.to_string(),
                interface: InterfaceName::Lan2,
            })?;
        lan2.enabled = enabled;

        self.revision += 1;
        self.refresh_connection_kinds();
        Ok(())
    }

    /// Append a static route unless one with the same key exists.
    /// Returns whether the table changed.
    pub fn add_route(&mut self, router: &str, route: Route) -> Result<bool> {
        let table = &mut self.router_mut(router)?.routing_table;
        if table.iter().any(|existing| existing.key() == route.key()) {
            return Ok(false);
        }
        debug!("Adding route {} on {}", route, router);
        table.push(route);
        self.revision += 1;
        Ok(true)
    }

    pub fn routing_table(&self, router: &str) -> Result<&[Route]> {
        self.device_or_err(router)?
            .as_router()
            .map(|r| r.routing_table.as_slice())
            .ok_or_else(|| TopologyError::NotARouter(router.to_string()))
    }

    /// Reachability between two registered devices
    pub fn evaluate(&self, a: &str, b: &str) -> Result<Reachability> {
        Evaluator::new(self).evaluate(a, b)
    }
}

/// Hosts and DNS servers without an address pick one up from the router port
fn needs_lease(device: &Device) -> bool {
    match &device.kind {
        DeviceKind::Host(record) | DeviceKind::DnsServer(record) => record.ip.is_none(),
        _ => false,
    }
}

impl DeviceLookup for Topology {
    fn device(&self, id: &str) -> Option<&Device> {
        Topology::device(self, id)
    }

    fn device_by_ip(&self, ip: Ipv4Addr) -> Option<&Device> {
        Topology::device_by_ip(self, ip)
    }
}
