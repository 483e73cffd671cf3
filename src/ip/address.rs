//! IPv4 address helpers.
//!
//! Address fields in the lab are either a dotted-quad or one of the
//! sentinels `N/A` / `0.0.0.0`, both of which mean "unset". This file turns
//! those strings into `Option<Ipv4Addr>` and provides the subnet arithmetic
//! the rest of the engine relies on.

use ipnet::{ipv4_mask_to_prefix, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Sentinel shown for an address that has not been configured
pub const UNSET: &str = "N/A";

/// Errors produced while validating address fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid address '{0}': expected four numbers 0-255 (e.g. 192.168.1.10)")]
    InvalidAddress(String),

    #[error("Invalid subnet mask '{0}' (e.g. 255.255.255.0)")]
    InvalidSubnetMask(String),
}

/// A contiguous IPv4 netmask.
///
/// Device masks are never `0.0.0.0`; the only place an all-zero mask shows
/// up is the default route, which uses [`SubnetMask::ANY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubnetMask(Ipv4Addr);

impl SubnetMask {
    /// `0.0.0.0`, matches every address
    pub const ANY: SubnetMask = SubnetMask(Ipv4Addr::UNSPECIFIED);

    /// `/24`, the mask every preset device starts with
    pub const CLASS_C: SubnetMask = SubnetMask(Ipv4Addr::new(255, 255, 255, 0));

    /// Parse a dotted-quad mask, rejecting non-contiguous and all-zero masks
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim();
        let addr: Ipv4Addr = trimmed
            .parse()
            .map_err(|_| AddressError::InvalidSubnetMask(trimmed.to_string()))?;

        match ipv4_mask_to_prefix(addr) {
            Ok(prefix) if prefix > 0 => Ok(SubnetMask(addr)),
            _ => Err(AddressError::InvalidSubnetMask(trimmed.to_string())),
        }
    }

    /// Build a mask from a prefix length (`0..=32`)
    pub fn from_prefix(prefix: u8) -> Option<Self> {
        Ipv4Net::new(Ipv4Addr::UNSPECIFIED, prefix)
            .ok()
            .map(|net| SubnetMask(net.netmask()))
    }

    pub fn prefix_len(&self) -> u8 {
        ipv4_mask_to_prefix(self.0).unwrap_or(0)
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.0
    }

    pub fn is_any(&self) -> bool {
        self.0 == Ipv4Addr::UNSPECIFIED
    }
}

impl Default for SubnetMask {
    fn default() -> Self {
        Self::CLASS_C
    }
}

impl fmt::Display for SubnetMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse an address field, mapping the sentinels to `None`
///
/// # Examples
/// ```
/// use netlab::ip::address::parse_address;
///
/// assert_eq!(parse_address("N/A").unwrap(), None);
/// assert_eq!(parse_address("0.0.0.0").unwrap(), None);
/// assert!(parse_address("192.168.1.300").is_err());
/// ```
pub fn parse_address(value: &str) -> Result<Option<Ipv4Addr>, AddressError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNSET) {
        return Ok(None);
    }

    let addr: Ipv4Addr = trimmed
        .parse()
        .map_err(|_| AddressError::InvalidAddress(trimmed.to_string()))?;

    if addr.is_unspecified() {
        Ok(None)
    } else {
        Ok(Some(addr))
    }
}

/// Render an optional address the way the lab UI shows it
pub fn display_address(addr: Option<Ipv4Addr>) -> String {
    addr.map(|ip| ip.to_string()).unwrap_or_else(|| UNSET.to_string())
}

/// `ip` together with its network
pub fn subnet(ip: Ipv4Addr, mask: SubnetMask) -> Ipv4Net {
    Ipv4Net::new(ip, mask.prefix_len()).unwrap_or_else(|_| Ipv4Net::from(ip))
}

/// Network address of `ip` under `mask`
pub fn network_of(ip: Ipv4Addr, mask: SubnetMask) -> Ipv4Addr {
    subnet(ip, mask).network()
}

/// Whether two addresses, each under its own mask, land on the same network
pub fn same_network(a: Ipv4Addr, mask_a: SubnetMask, b: Ipv4Addr, mask_b: SubnetMask) -> bool {
    network_of(a, mask_a) == network_of(b, mask_b)
}

/// Whether `ip` lies inside the network `network/mask`
pub fn network_contains(network: Ipv4Addr, mask: SubnetMask, ip: Ipv4Addr) -> bool {
    subnet(network, mask).contains(&ip)
}

/// Classify an address as outside the lab's private ranges.
///
/// 10/8, 172.16/12, 192.168/16, loopback and link-local are private. The
/// TEST-NET-3 block 203.0.113.0/24 is also treated as internal so that lab
/// exercises can number a WAN uplink with it.
pub fn is_external(ip: Ipv4Addr) -> bool {
    let test_net = subnet(Ipv4Addr::new(203, 0, 113, 0), SubnetMask::CLASS_C);
    let private = ip.is_private() || ip.is_loopback() || ip.is_link_local() || test_net.contains(&ip);

    !private
}

/// Host addresses of `ip`'s network, starting `offset` past the network
/// address and stopping before the broadcast address
pub fn hosts_from(ip: Ipv4Addr, mask: SubnetMask, offset: u32) -> impl Iterator<Item = Ipv4Addr> {
    let net = subnet(ip, mask);
    let first = u32::from(net.network()).saturating_add(offset);

    net.hosts().filter(move |host| u32::from(*host) >= first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_sentinels() {
        assert_eq!(parse_address("N/A").unwrap(), None);
        assert_eq!(parse_address("n/a").unwrap(), None);
        assert_eq!(parse_address("").unwrap(), None);
        assert_eq!(parse_address("0.0.0.0").unwrap(), None);
        assert_eq!(parse_address(" 10.0.0.1 ").unwrap(), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        for bad in ["192.168.1", "192.168.1.256", "abc", "1.2.3.4.5"] {
            assert_eq!(
                parse_address(bad),
                Err(AddressError::InvalidAddress(bad.to_string())),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_subnet_mask_validation() {
        assert_eq!(SubnetMask::parse("255.255.255.0").unwrap().prefix_len(), 24);
        assert_eq!(SubnetMask::parse("255.255.255.252").unwrap().prefix_len(), 30);
        assert_eq!(SubnetMask::parse("255.255.255.255").unwrap().prefix_len(), 32);
        assert!(SubnetMask::parse("255.0.255.0").is_err());
        assert!(SubnetMask::parse("0.0.0.0").is_err());
        assert!(SubnetMask::parse("255.255.255.1").is_err());
        assert!(SubnetMask::parse("not-a-mask").is_err());
    }

    #[test]
    fn test_from_prefix() {
        assert_eq!(SubnetMask::from_prefix(24), Some(SubnetMask::CLASS_C));
        assert_eq!(SubnetMask::from_prefix(0), Some(SubnetMask::ANY));
        assert_eq!(SubnetMask::from_prefix(16).unwrap().addr(), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(SubnetMask::from_prefix(33), None);
    }

    #[test]
    fn test_subnet_of_host() {
        let net = subnet(Ipv4Addr::new(172, 16, 4, 9), SubnetMask::from_prefix(22).unwrap());
        assert_eq!(net.network(), Ipv4Addr::new(172, 16, 4, 0));
        assert_eq!(net.broadcast(), Ipv4Addr::new(172, 16, 7, 255));
        assert!(network_contains(Ipv4Addr::new(172, 16, 4, 0), SubnetMask::from_prefix(22).unwrap(), Ipv4Addr::new(172, 16, 6, 1)));
        assert!(!network_contains(Ipv4Addr::new(172, 16, 4, 0), SubnetMask::from_prefix(22).unwrap(), Ipv4Addr::new(172, 16, 8, 1)));
    }

    #[test]
    fn test_network_arithmetic() {
        let mask = SubnetMask::CLASS_C;
        let a = Ipv4Addr::new(192, 168, 1, 10);
        let b = Ipv4Addr::new(192, 168, 1, 20);
        let c = Ipv4Addr::new(192, 168, 2, 20);

        assert_eq!(network_of(a, mask), Ipv4Addr::new(192, 168, 1, 0));
        assert!(same_network(a, mask, b, mask));
        assert!(!same_network(a, mask, c, mask));
        assert!(network_contains(Ipv4Addr::new(192, 168, 0, 0), SubnetMask::from_prefix(16).unwrap(), c));
    }

    #[test]
    fn test_external_classification() {
        assert!(is_external(Ipv4Addr::new(8, 8, 8, 8)));
        assert!(is_external(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(!is_external(Ipv4Addr::new(10, 1, 2, 3)));
        assert!(!is_external(Ipv4Addr::new(172, 20, 0, 1)));
        assert!(!is_external(Ipv4Addr::new(192, 168, 5, 5)));
        assert!(!is_external(Ipv4Addr::new(127, 0, 0, 1)));
        assert!(!is_external(Ipv4Addr::new(169, 254, 1, 1)));
        // TEST-NET-3 is a lab carve-out
        assert!(!is_external(Ipv4Addr::new(203, 0, 113, 5)));
        assert!(is_external(Ipv4Addr::new(203, 0, 114, 5)));
    }

    #[test]
    fn test_hosts_from_skips_network_and_broadcast() {
        let mask = SubnetMask::from_prefix(29).unwrap();
        let hosts: Vec<_> = hosts_from(Ipv4Addr::new(10, 0, 0, 1), mask, 2).collect();
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(10, 0, 0, 6)));
        assert_eq!(hosts.len(), 5);
    }
}
