//! Device and interface model.
//!
//! Devices are created here (or by the lab loader) and then handed to the
//! topology registry, which owns them for the rest of the session.

pub mod types;
pub mod factory;
pub mod lookup;

pub use types::{
    AddressRecord, Device, DeviceId, DeviceKind, DeviceType, InterfaceName, Route, Router,
    RouterInterfaces, SecondaryLan,
};
pub use lookup::DeviceLookup;
