//! Preset devices.
//!
//! These mirror the defaults a freshly placed device gets in the lab UI, so
//! scenarios only need to spell out what they change.

use std::net::Ipv4Addr;

use super::types::{
    AddressRecord, Device, DeviceKind, Router, RouterInterfaces, SecondaryLan,
};
use crate::ip::address::SubnetMask;

pub const ROUTER_LAN: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const ROUTER_LAN2: Ipv4Addr = Ipv4Addr::new(192, 168, 2, 1);
pub const PUBLIC_DNS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
pub const DNS_SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 53);

/// Default router ports: WAN unset, LAN 192.168.1.1/24, LAN2 192.168.2.1/24
pub fn router_interfaces() -> RouterInterfaces {
    RouterInterfaces {
        wan: AddressRecord {
            dns: vec![PUBLIC_DNS],
            ..Default::default()
        },
        lan: AddressRecord::new(ROUTER_LAN, SubnetMask::CLASS_C).with_dns(vec![ROUTER_LAN]),
        lan2: Some(SecondaryLan {
            address: AddressRecord::new(ROUTER_LAN2, SubnetMask::CLASS_C).with_dns(vec![ROUTER_LAN2]),
            enabled: true,
        }),
    }
}

pub fn router(id: &str, name: &str) -> Device {
    Device::new(id, name, DeviceKind::Router(Router::new(router_interfaces())))
}

/// Unmanaged switch
pub fn switch(id: &str, name: &str) -> Device {
    Device::new(id, name, DeviceKind::Switch(None))
}

pub fn cloud(id: &str, name: &str) -> Device {
    Device::new(
        id,
        name,
        DeviceKind::Cloud(AddressRecord::new(PUBLIC_DNS, SubnetMask::CLASS_C).with_dns(vec![PUBLIC_DNS])),
    )
}

pub fn dns_server(id: &str, name: &str) -> Device {
    Device::new(
        id,
        name,
        DeviceKind::DnsServer(
            AddressRecord::new(DNS_SERVER, SubnetMask::CLASS_C)
                .with_gateway(ROUTER_LAN)
                .with_dns(vec![DNS_SERVER]),
        ),
    )
}

/// Host with the given address record
pub fn host(id: &str, name: &str, record: AddressRecord) -> Device {
    Device::new(id, name, DeviceKind::Host(record))
}
