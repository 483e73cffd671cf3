//! Errors raised by the topology engine.
//!
//! "Not reachable" is never an error; it is a normal answer carried by
//! [`crate::reachability::Reachability`].

use crate::device::{DeviceId, InterfaceName};
use crate::ip::address::AddressError;

/// Errors that can occur while building or mutating a topology
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Device {0} cannot accept another connection")]
    PortExhausted(DeviceId),

    #[error("Router {0} has no free interface")]
    NoFreeInterface(DeviceId),

    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("Device {0} cannot be connected to itself")]
    SelfConnection(DeviceId),

    #[error("Device id {0} is already registered")]
    DuplicateDevice(DeviceId),

    #[error("Device {0} is not a router")]
    NotARouter(DeviceId),

    #[error("Device {device} has no {interface} interface")]
    MissingInterface {
        device: DeviceId,
        interface: InterfaceName,
    },
}

pub type Result<T> = std::result::Result<T, TopologyError>;
