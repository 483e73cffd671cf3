//! Read-only device queries.

use std::net::Ipv4Addr;

use super::types::Device;

/// The slice of the topology that address allocation and DNS lookups need
pub trait DeviceLookup {
    fn device(&self, id: &str) -> Option<&Device>;

    /// First device holding `ip` on any of its ports
    fn device_by_ip(&self, ip: Ipv4Addr) -> Option<&Device>;

    /// Whether `ip` is held by some device other than `except`
    fn address_taken(&self, ip: Ipv4Addr, except: Option<&str>) -> bool {
        self.device_by_ip(ip)
            .map(|owner| Some(owner.id()) != except)
            .unwrap_or(false)
    }
}
