//! Device model type definitions.
//!
//! A device is one of five variants. Only the router carries more than one
//! address record; everything else exposes a single record (or, for an
//! unmanaged switch, none at all).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::ip::address::{network_contains, network_of, SubnetMask};
use crate::topology::types::ConnectionId;

/// Unique device identifier assigned by the device factory
pub type DeviceId = String;

/// Variant tag, used for logging and the lab file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[serde(alias = "computer", alias = "server", alias = "printer", alias = "laptop")]
    Host,
    Switch,
    Router,
    Cloud,
    #[serde(alias = "dns")]
    DnsServer,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Host => "host",
            DeviceType::Switch => "switch",
            DeviceType::Router => "router",
            DeviceType::Cloud => "cloud",
            DeviceType::DnsServer => "dns_server",
        };
        f.write_str(name)
    }
}

/// Named router port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceName {
    Wan,
    Lan,
    Lan2,
}

impl InterfaceName {
    /// Fixed order used when inferring an interface from addressing
    pub const RESOLUTION_ORDER: [InterfaceName; 3] =
        [InterfaceName::Wan, InterfaceName::Lan, InterfaceName::Lan2];

    /// LAN-side ports (everything except the uplink)
    pub fn is_lan_side(&self) -> bool {
        !matches!(self, InterfaceName::Wan)
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterfaceName::Wan => "wan",
            InterfaceName::Lan => "lan",
            InterfaceName::Lan2 => "lan2",
        };
        f.write_str(name)
    }
}

impl FromStr for InterfaceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wan" => Ok(InterfaceName::Wan),
            "lan" | "lan1" => Ok(InterfaceName::Lan),
            "lan2" => Ok(InterfaceName::Lan2),
            other => Err(format!("Unknown router interface '{}'", other)),
        }
    }
}

/// Layer-3 configuration of a single port or single-homed device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub ip: Option<Ipv4Addr>,
    pub subnet_mask: SubnetMask,
    pub gateway: Option<Ipv4Addr>,
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

impl AddressRecord {
    pub fn new(ip: Ipv4Addr, subnet_mask: SubnetMask) -> Self {
        Self {
            ip: Some(ip),
            subnet_mask,
            ..Default::default()
        }
    }

    pub fn with_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_dns(mut self, dns: Vec<Ipv4Addr>) -> Self {
        self.dns = dns;
        self
    }

    /// Network address, if an address is configured
    pub fn network(&self) -> Option<Ipv4Addr> {
        self.ip.map(|ip| network_of(ip, self.subnet_mask))
    }

    /// Whether `ip` falls inside this record's network
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.ip
            .map(|own| network_contains(own, self.subnet_mask, ip))
            .unwrap_or(false)
    }
}

/// The optional second LAN port, which can be switched off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryLan {
    #[serde(flatten)]
    pub address: AddressRecord,
    pub enabled: bool,
}

/// Per-port configuration of a router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInterfaces {
    pub wan: AddressRecord,
    pub lan: AddressRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lan2: Option<SecondaryLan>,
}

impl RouterInterfaces {
    /// Address record of a port, regardless of whether it is enabled
    pub fn get(&self, name: InterfaceName) -> Option<&AddressRecord> {
        match name {
            InterfaceName::Wan => Some(&self.wan),
            InterfaceName::Lan => Some(&self.lan),
            InterfaceName::Lan2 => self.lan2.as_ref().map(|lan2| &lan2.address),
        }
    }

    pub fn get_mut(&mut self, name: InterfaceName) -> Option<&mut AddressRecord> {
        match name {
            InterfaceName::Wan => Some(&mut self.wan),
            InterfaceName::Lan => Some(&mut self.lan),
            InterfaceName::Lan2 => self.lan2.as_mut().map(|lan2| &mut lan2.address),
        }
    }

    /// Only lan2 can be disabled
    pub fn is_enabled(&self, name: InterfaceName) -> bool {
        match name {
            InterfaceName::Wan | InterfaceName::Lan => true,
            InterfaceName::Lan2 => self.lan2.as_ref().map(|lan2| lan2.enabled).unwrap_or(false),
        }
    }

    /// Enabled ports in resolution order
    pub fn enabled(&self) -> impl Iterator<Item = (InterfaceName, &AddressRecord)> + '_ {
        InterfaceName::RESOLUTION_ORDER
            .into_iter()
            .filter(|name| self.is_enabled(*name))
            .filter_map(|name| self.get(name).map(|record| (name, record)))
    }

    /// Enabled LAN-side ports that carry an address
    pub fn lan_side(&self) -> impl Iterator<Item = (InterfaceName, &AddressRecord)> + '_ {
        self.enabled()
            .filter(|(name, record)| name.is_lan_side() && record.ip.is_some())
    }
}

/// Static routing table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: Ipv4Addr,
    pub mask: SubnetMask,
    /// `0.0.0.0` for directly connected networks
    pub gateway: Ipv4Addr,
    pub via_interface: InterfaceName,
    pub metric: u32,
}

impl Route {
    /// Entries are unique by (network, mask, gateway)
    pub fn key(&self) -> (Ipv4Addr, SubnetMask, Ipv4Addr) {
        (self.destination, self.mask, self.gateway)
    }

    pub fn is_default(&self) -> bool {
        self.destination.is_unspecified() && self.mask.is_any()
    }

    /// Whether this route's destination covers `ip`
    pub fn covers(&self, ip: Ipv4Addr) -> bool {
        network_contains(self.destination, self.mask, ip)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} via {} dev {} metric {}",
            self.destination,
            self.mask.prefix_len(),
            self.gateway,
            self.via_interface,
            self.metric
        )
    }
}

/// Router-specific state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub interfaces: RouterInterfaces,
    /// Which port each attached connection is plugged into. Keys are always
    /// a subset of the owning device's connection list.
    #[serde(default)]
    pub connection_interfaces: BTreeMap<ConnectionId, InterfaceName>,
    #[serde(default)]
    pub routing_table: Vec<Route>,
}

impl Router {
    pub fn new(interfaces: RouterInterfaces) -> Self {
        Self {
            interfaces,
            connection_interfaces: BTreeMap::new(),
            routing_table: Vec::new(),
        }
    }

    /// WAN address and WAN gateway are both configured
    pub fn has_internet_access(&self) -> bool {
        self.interfaces.wan.ip.is_some() && self.interfaces.wan.gateway.is_some()
    }

    pub fn has_default_route(&self) -> bool {
        self.routing_table.iter().any(Route::is_default)
    }

    /// Whether `ip` is one of this router's LAN-side addresses
    pub fn is_lan_address(&self, ip: Ipv4Addr) -> bool {
        self.interfaces.lan_side().any(|(_, record)| record.ip == Some(ip))
    }

    /// Whether `ip` lies inside any enabled LAN-side network
    pub fn lan_contains(&self, ip: Ipv4Addr) -> bool {
        self.interfaces.lan_side().any(|(_, record)| record.contains(ip))
    }

    pub fn bound_interfaces(&self) -> impl Iterator<Item = InterfaceName> + '_ {
        self.connection_interfaces.values().copied()
    }
}

/// Variant payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Host(AddressRecord),
    /// Unmanaged switches carry no address
    Switch(Option<AddressRecord>),
    Router(Router),
    Cloud(AddressRecord),
    DnsServer(AddressRecord),
}

/// A simulated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    /// Maintained by the topology registry
    #[serde(default)]
    connections: Vec<ConnectionId>,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            connections: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_type(&self) -> DeviceType {
        match &self.kind {
            DeviceKind::Host(_) => DeviceType::Host,
            DeviceKind::Switch(_) => DeviceType::Switch,
            DeviceKind::Router(_) => DeviceType::Router,
            DeviceKind::Cloud(_) => DeviceType::Cloud,
            DeviceKind::DnsServer(_) => DeviceType::DnsServer,
        }
    }

    /// Connection ids in attachment order
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub(crate) fn attach(&mut self, connection: ConnectionId) {
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
    }

    /// Drop a connection from this device, including any router port binding
    pub(crate) fn detach(&mut self, connection: ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|id| *id != connection);
        if let DeviceKind::Router(router) = &mut self.kind {
            router.connection_interfaces.remove(&connection);
        }
        before != self.connections.len()
    }

    pub fn is_router(&self) -> bool {
        matches!(self.kind, DeviceKind::Router(_))
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, DeviceKind::Switch(_))
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self.kind, DeviceKind::Cloud(_))
    }

    pub fn as_router(&self) -> Option<&Router> {
        match &self.kind {
            DeviceKind::Router(router) => Some(router),
            _ => None,
        }
    }

    pub fn as_router_mut(&mut self) -> Option<&mut Router> {
        match &mut self.kind {
            DeviceKind::Router(router) => Some(router),
            _ => None,
        }
    }

    /// A switch with no management address
    pub fn is_addressless_switch(&self) -> bool {
        match &self.kind {
            DeviceKind::Switch(record) => record.as_ref().and_then(|r| r.ip).is_none(),
            _ => false,
        }
    }

    /// The record that stands for this device when it is addressed as a
    /// whole. For a router that is the port of its earliest bound
    /// connection, or its LAN port when nothing is bound yet.
    pub fn primary_record(&self) -> Option<&AddressRecord> {
        match &self.kind {
            DeviceKind::Host(record) | DeviceKind::Cloud(record) | DeviceKind::DnsServer(record) => {
                Some(record)
            }
            DeviceKind::Switch(record) => record.as_ref(),
            DeviceKind::Router(router) => {
                let bound = router
                    .connection_interfaces
                    .values()
                    .find_map(|name| router.interfaces.get(*name));
                bound.or(Some(&router.interfaces.lan))
            }
        }
    }

    /// Resolved address of the device
    pub fn primary_ip(&self) -> Option<Ipv4Addr> {
        self.primary_record().and_then(|record| record.ip)
    }

    /// Mask used alongside the resolved address. Routers report their LAN
    /// mask, everything else its own mask.
    pub fn subnet_mask(&self) -> SubnetMask {
        match &self.kind {
            DeviceKind::Router(router) => router.interfaces.lan.subnet_mask,
            _ => self
                .primary_record()
                .map(|record| record.subnet_mask)
                .unwrap_or_default(),
        }
    }

    /// Configured default gateway. Routers use their WAN gateway.
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        match &self.kind {
            DeviceKind::Router(router) => router.interfaces.wan.gateway,
            _ => self.primary_record().and_then(|record| record.gateway),
        }
    }

    /// Configured DNS servers. Routers prefer their LAN list.
    pub fn dns_servers(&self) -> &[Ipv4Addr] {
        match &self.kind {
            DeviceKind::Router(router) => {
                if router.interfaces.lan.dns.is_empty() {
                    &router.interfaces.wan.dns
                } else {
                    &router.interfaces.lan.dns
                }
            }
            _ => self
                .primary_record()
                .map(|record| record.dns.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Every configured (address, mask) pair on the device
    pub fn addresses(&self) -> Vec<(Ipv4Addr, SubnetMask)> {
        match &self.kind {
            DeviceKind::Router(router) => router
                .interfaces
                .enabled()
                .filter_map(|(_, record)| record.ip.map(|ip| (ip, record.subnet_mask)))
                .collect(),
            _ => self
                .primary_record()
                .and_then(|record| record.ip.map(|ip| (ip, record.subnet_mask)))
                .into_iter()
                .collect(),
        }
    }

    /// Whether any port of this device holds `ip`
    pub fn owns_address(&self, ip: Ipv4Addr) -> bool {
        match &self.kind {
            DeviceKind::Router(router) => InterfaceName::RESOLUTION_ORDER
                .into_iter()
                .filter_map(|name| router.interfaces.get(name))
                .any(|record| record.ip == Some(ip)),
            _ => self.primary_ip() == Some(ip),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.device_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::factory;

    #[test]
    fn test_interface_name_parsing() {
        assert_eq!("WAN".parse::<InterfaceName>(), Ok(InterfaceName::Wan));
        assert_eq!("lan1".parse::<InterfaceName>(), Ok(InterfaceName::Lan));
        assert_eq!("lan2".parse::<InterfaceName>(), Ok(InterfaceName::Lan2));
        assert!("eth0".parse::<InterfaceName>().is_err());
    }

    #[test]
    fn test_router_primary_record_follows_bindings() {
        let mut router = factory::router("r1", "Router 1");
        assert_eq!(router.primary_ip(), Some(Ipv4Addr::new(192, 168, 1, 1)));

        router
            .as_router_mut()
            .unwrap()
            .connection_interfaces
            .insert(ConnectionId(7), InterfaceName::Lan2);
        assert_eq!(router.primary_ip(), Some(Ipv4Addr::new(192, 168, 2, 1)));
    }

    #[test]
    fn test_addressless_switch() {
        let unmanaged = factory::switch("sw1", "Switch 1");
        assert!(unmanaged.is_addressless_switch());

        let managed = Device::new(
            "sw2",
            "Switch 2",
            DeviceKind::Switch(Some(AddressRecord::new(Ipv4Addr::new(192, 168, 1, 2), SubnetMask::CLASS_C))),
        );
        assert!(!managed.is_addressless_switch());
        assert!(!factory::cloud("c", "Cloud").is_addressless_switch());
    }

    #[test]
    fn test_detach_drops_router_binding() {
        let mut router = factory::router("r1", "Router 1");
        router.attach(ConnectionId(1));
        router
            .as_router_mut()
            .unwrap()
            .connection_interfaces
            .insert(ConnectionId(1), InterfaceName::Lan);

        assert!(router.detach(ConnectionId(1)));
        assert!(router.connections().is_empty());
        assert!(router.as_router().unwrap().connection_interfaces.is_empty());
        assert!(!router.detach(ConnectionId(1)));
    }

    #[test]
    fn test_disabled_lan2_is_not_lan_side() {
        let mut router = factory::router("r1", "Router 1");
        let r = router.as_router_mut().unwrap();
        r.interfaces.lan2.as_mut().unwrap().enabled = false;

        assert!(!r.lan_contains(Ipv4Addr::new(192, 168, 2, 50)));
        assert!(r.lan_contains(Ipv4Addr::new(192, 168, 1, 50)));
        assert!(!r.is_lan_address(Ipv4Addr::new(192, 168, 2, 1)));
    }

    #[test]
    fn test_route_default_and_cover() {
        let default = Route {
            destination: Ipv4Addr::UNSPECIFIED,
            mask: SubnetMask::ANY,
            gateway: Ipv4Addr::new(203, 0, 113, 1),
            via_interface: InterfaceName::Wan,
            metric: 10,
        };
        assert!(default.is_default());
        assert!(default.covers(Ipv4Addr::new(8, 8, 8, 8)));

        let lan = Route {
            destination: Ipv4Addr::new(192, 168, 1, 0),
            mask: SubnetMask::CLASS_C,
            gateway: Ipv4Addr::UNSPECIFIED,
            via_interface: InterfaceName::Lan,
            metric: 0,
        };
        assert!(!lan.is_default());
        assert!(lan.covers(Ipv4Addr::new(192, 168, 1, 77)));
        assert!(!lan.covers(Ipv4Addr::new(192, 168, 2, 77)));
    }
}
