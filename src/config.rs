//! Lab scenario configuration.
//!
//! A lab file lists devices, the cables between them and the reachability
//! questions to ask. Address fields are plain strings so the usual lab
//! sentinels (`N/A`, `0.0.0.0`) can be written as-is; anything left out
//! falls back to the preset the device would get when placed in the lab UI.

use color_eyre::eyre::{eyre, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::device::{
    factory, AddressRecord, Device, DeviceKind, DeviceType, InterfaceName, Route, Router, SecondaryLan,
};
use crate::ip::address::{network_of, parse_address, AddressError, SubnetMask};
use crate::topology::TopologySettings;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Top-level lab file
#[derive(Debug, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub queries: Vec<QueryConfig>,
}

impl LabConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Validate general settings
        if let Some(level) = &self.general.log_level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ValidationError::InvalidGeneral(format!(
                    "log_level must be one of {:?}, got '{}'",
                    LOG_LEVELS, level
                )));
            }
        }
        if self.general.max_router_connections == Some(0) {
            return Err(ValidationError::InvalidGeneral(
                "max_router_connections must be at least 1".to_string(),
            ));
        }

        // Validate devices
        if self.devices.is_empty() {
            return Err(ValidationError::InvalidDevice("at least one device is required".to_string()));
        }
        let mut ids = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(ValidationError::InvalidDevice("device id cannot be empty".to_string()));
            }
            if !ids.insert(device.id.as_str()) {
                return Err(ValidationError::InvalidDevice(format!("duplicate device id '{}'", device.id)));
            }
            if device.device_type != DeviceType::Router
                && (device.interfaces.is_some() || !device.routes.is_empty())
            {
                return Err(ValidationError::InvalidDevice(format!(
                    "'{}' is a {} and cannot have router interfaces or routes",
                    device.id, device.device_type
                )));
            }
            for route in &device.routes {
                check_interface(&route.interface)
                    .map_err(|e| ValidationError::InvalidDevice(format!("route on '{}': {}", device.id, e)))?;
            }
        }

        // Validate links
        for link in &self.links {
            for end in [&link.a, &link.b] {
                if !ids.contains(end.as_str()) {
                    return Err(ValidationError::InvalidLink(format!("unknown device '{}'", end)));
                }
            }
            if link.a == link.b {
                return Err(ValidationError::InvalidLink(format!("'{}' cannot be linked to itself", link.a)));
            }
            for name in [&link.interface_a, &link.interface_b].into_iter().flatten() {
                check_interface(name)
                    .map_err(|e| ValidationError::InvalidLink(format!("{} <-> {}: {}", link.a, link.b, e)))?;
            }
        }

        // Validate queries
        for query in &self.queries {
            for end in [&query.from, &query.to] {
                if !ids.contains(end.as_str()) {
                    return Err(ValidationError::InvalidQuery(format!("unknown device '{}'", end)));
                }
            }
        }

        Ok(())
    }

    /// Registry settings derived from `general`
    pub fn topology_settings(&self) -> TopologySettings {
        let mut settings = TopologySettings::default();
        if let Some(max) = self.general.max_router_connections {
            settings.max_router_connections = max;
        }
        settings
    }
}

fn check_interface(name: &str) -> Result<(), String> {
    name.parse::<InterfaceName>().map(|_| ())
}

/// Shared general configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_router_connections: Option<usize>,
    /// Generate routing tables for every router once all links are made
    #[serde(default)]
    pub auto_routes: bool,
}

/// Address fields as written in the lab file
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AddressConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    /// Only meaningful for a router's `lan2`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl AddressConfig {
    /// Overlay the fields that are present onto `preset`
    pub fn apply(&self, preset: AddressRecord) -> Result<AddressRecord, AddressError> {
        let mut record = preset;
        if let Some(ip) = &self.ip {
            record.ip = parse_address(ip)?;
        }
        if let Some(mask) = &self.subnet_mask {
            record.subnet_mask = SubnetMask::parse(mask)?;
        }
        if let Some(gateway) = &self.gateway {
            record.gateway = parse_address(gateway)?;
        }
        if let Some(dns) = &self.dns {
            let mut servers = Vec::with_capacity(dns.len());
            for server in dns {
                if let Some(addr) = parse_address(server)? {
                    servers.push(addr);
                }
            }
            record.dns = servers;
        }
        if let Some(domain) = &self.domain_name {
            record.domain_name = Some(domain.clone());
        }
        Ok(record)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RouterInterfacesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wan: Option<AddressConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lan: Option<AddressConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lan2: Option<AddressConfig>,
}

/// Static route as written in the lab file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteConfig {
    pub destination: String,
    pub mask: String,
    pub gateway: String,
    pub interface: String,
    #[serde(default = "default_route_metric")]
    pub metric: u32,
}

fn default_route_metric() -> u32 {
    1
}

impl RouteConfig {
    pub fn to_route(&self) -> color_eyre::Result<Route> {
        let destination = parse_address(&self.destination)?.unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
        // 0.0.0.0 is legal here: it is the default route
        let mask = if parse_address(&self.mask)?.is_none() {
            SubnetMask::ANY
        } else {
            SubnetMask::parse(&self.mask)?
        };
        let gateway = parse_address(&self.gateway)?.unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
        let via_interface = self.interface.parse::<InterfaceName>().map_err(|e| eyre!(e))?;

        Ok(Route {
            destination: network_of(destination, mask),
            mask,
            gateway,
            via_interface,
            metric: self.metric,
        })
    }
}

/// One device entry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(flatten)]
    pub address: AddressConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<RouterInterfacesConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

impl DeviceConfig {
    /// Build the device, starting from its preset
    pub fn to_device(&self) -> color_eyre::Result<Device> {
        let name = self.name.clone().unwrap_or_else(|| self.id.clone());
        let context = || format!("Invalid addressing for device '{}'", self.id);

        let kind = match self.device_type {
            DeviceType::Host => DeviceKind::Host(self.address.apply(AddressRecord::default()).wrap_err_with(context)?),
            DeviceType::Switch => {
                let record = self.address.apply(AddressRecord::default()).wrap_err_with(context)?;
                DeviceKind::Switch(if record.ip.is_some() { Some(record) } else { None })
            }
            DeviceType::Cloud => {
                let preset = preset_record(factory::cloud(&self.id, &name));
                DeviceKind::Cloud(self.address.apply(preset).wrap_err_with(context)?)
            }
            DeviceType::DnsServer => {
                let preset = preset_record(factory::dns_server(&self.id, &name));
                DeviceKind::DnsServer(self.address.apply(preset).wrap_err_with(context)?)
            }
            DeviceType::Router => DeviceKind::Router(self.to_router().wrap_err_with(context)?),
        };

        Ok(Device::new(self.id.clone(), name, kind))
    }

    fn to_router(&self) -> color_eyre::Result<Router> {
        let mut interfaces = factory::router_interfaces();
        if let Some(config) = &self.interfaces {
            if let Some(wan) = &config.wan {
                interfaces.wan = wan.apply(interfaces.wan)?;
            }
            if let Some(lan) = &config.lan {
                interfaces.lan = lan.apply(interfaces.lan)?;
            }
            if let Some(lan2) = &config.lan2 {
                let preset = interfaces.lan2.take().unwrap_or(SecondaryLan {
                    address: AddressRecord::default(),
                    enabled: true,
                });
                interfaces.lan2 = Some(SecondaryLan {
                    address: lan2.apply(preset.address)?,
                    enabled: lan2.enabled.unwrap_or(preset.enabled),
                });
            }
        }

        let mut router = Router::new(interfaces);
        for route in &self.routes {
            router.routing_table.push(route.to_route()?);
        }
        Ok(router)
    }
}

fn preset_record(device: Device) -> AddressRecord {
    device.primary_record().cloned().unwrap_or_default()
}

/// A cable between two devices
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_b: Option<String>,
}

/// A reachability question
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryConfig {
    pub from: String,
    pub to: String,
}

/// Validation errors for configuration
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid device configuration: {0}")]
    InvalidDevice(String),
    #[error("Invalid link configuration: {0}")]
    InvalidLink(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LAB: &str = r#"
general:
  log_level: debug
  max_router_connections: 4
  auto_routes: true
devices:
  - id: r1
    type: router
    interfaces:
      wan:
        ip: 203.0.113.5
        gateway: 203.0.113.1
      lan2:
        enabled: false
    routes:
      - destination: 10.0.0.0
        mask: 255.0.0.0
        gateway: 192.168.1.254
        interface: lan
  - id: pc1
    name: Office PC
    type: computer
    ip: 192.168.1.10
    gateway: 192.168.1.1
    dns: [192.168.1.1]
  - id: sw
    type: switch
  - id: net
    type: cloud
  - id: dns1
    type: dns
links:
  - a: r1
    b: sw
    interface_a: lan
  - a: sw
    b: pc1
queries:
  - from: pc1
    to: r1
"#;

    #[test]
    fn test_lab_parsing() {
        let config: LabConfig = serde_yaml::from_str(LAB).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.devices.len(), 5);
        assert_eq!(config.devices[1].device_type, DeviceType::Host);
        assert_eq!(config.devices[4].device_type, DeviceType::DnsServer);
        assert_eq!(config.topology_settings().max_router_connections, 4);
        assert!(config.general.auto_routes);
    }

    #[test]
    fn test_presets_and_overrides() {
        let config: LabConfig = serde_yaml::from_str(LAB).unwrap();

        let router = config.devices[0].to_device().unwrap();
        let r = router.as_router().unwrap();
        assert_eq!(r.interfaces.wan.ip, Some(Ipv4Addr::new(203, 0, 113, 5)));
        assert_eq!(r.interfaces.lan.ip, Some(factory::ROUTER_LAN));
        assert!(!r.interfaces.is_enabled(InterfaceName::Lan2));
        assert_eq!(r.routing_table.len(), 1);
        assert_eq!(r.routing_table[0].mask.prefix_len(), 8);

        let pc = config.devices[1].to_device().unwrap();
        assert_eq!(pc.name, "Office PC");
        assert_eq!(pc.gateway(), Some(Ipv4Addr::new(192, 168, 1, 1)));

        assert!(config.devices[2].to_device().unwrap().is_addressless_switch());
        assert_eq!(config.devices[3].to_device().unwrap().primary_ip(), Some(factory::PUBLIC_DNS));
        assert_eq!(config.devices[4].to_device().unwrap().primary_ip(), Some(factory::DNS_SERVER));
    }

    #[test]
    fn test_bad_addresses_are_reported() {
        let yaml = r#"
devices:
  - id: pc
    type: host
    ip: 192.168.1.300
"#;
        let config: LabConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.devices[0].to_device().unwrap_err();
        assert!(err.downcast_ref::<AddressError>().is_some());

        let yaml = r#"
devices:
  - id: pc
    type: host
    ip: 192.168.1.3
    subnet_mask: 255.0.255.0
"#;
        let config: LabConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.devices[0].to_device().unwrap_err();
        assert_eq!(
            err.downcast_ref::<AddressError>(),
            Some(&AddressError::InvalidSubnetMask("255.0.255.0".to_string()))
        );
    }

    #[test]
    fn test_validation_errors() {
        let duplicate = r#"
devices:
  - id: a
    type: host
  - id: a
    type: switch
"#;
        let config: LabConfig = serde_yaml::from_str(duplicate).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidDevice(_))));

        let dangling = r#"
devices:
  - id: a
    type: host
links:
  - a: a
    b: ghost
"#;
        let config: LabConfig = serde_yaml::from_str(dangling).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidLink(_))));

        let bad_port = r#"
devices:
  - id: r
    type: router
  - id: a
    type: host
links:
  - a: r
    b: a
    interface_a: eth0
"#;
        let config: LabConfig = serde_yaml::from_str(bad_port).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidLink(_))));

        let host_routes = r#"
devices:
  - id: a
    type: host
    routes:
      - destination: 10.0.0.0
        mask: 255.0.0.0
        gateway: 192.168.1.1
        interface: lan
"#;
        let config: LabConfig = serde_yaml::from_str(host_routes).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidDevice(_))));

        let bad_level = r#"
general:
  log_level: loud
devices:
  - id: a
    type: host
"#;
        let config: LabConfig = serde_yaml::from_str(bad_level).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidGeneral(_))));
    }
}
