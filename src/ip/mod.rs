//! IP address handling module.
//!
//! This module covers address parsing and subnet arithmetic, plus the
//! allocation rules applied when router ports are wired up.

pub mod address;
pub mod allocator;

// Re-export commonly used types
pub use address::{AddressError, SubnetMask};
pub use allocator::{allocate_wan_address, lease_host_address, AllocationSource, HostLease, WanAssignment};
