//! # netlab - Topology and reachability engine for networking labs
//!
//! This library models a small teaching network (hosts, switches, routers,
//! DNS servers and a cloud standing in for the Internet) and answers the
//! question students keep asking: can these two devices talk to each other,
//! and if so, how?
//!
//! ## Overview
//!
//! Devices are wired together through a topology registry that enforces port
//! capacity. A breadth-first path finder establishes physical connectivity,
//! and the reachability evaluator layers addressing on top: subnet matches,
//! gateway relays, router LAN/WAN rules and NAT-style Internet access.
//!
//! ## Key Features
//!
//! - **Typed devices**: one sum type per device variant, routers with WAN, LAN
//!   and optional LAN2 ports
//! - **Capacity rules**: single-port hosts, unbounded switches, configurable
//!   router port count
//! - **Gateway relays**: multi-hop reachability with guaranteed termination
//! - **Address automation**: WAN allocation and host leases on router links
//! - **Static routing**: generated and hand-written routes, idempotent by key
//! - **Lab files**: YAML scenarios with queries, run from the `netlab` CLI
//!
//! ## Architecture
//!
//! - `ip`: address parsing, subnet arithmetic and address allocation
//! - `device`: device model and preset factory
//! - `topology`: connection registry and path finder
//! - `routing`: interface resolution and routing-table generation
//! - `reachability`: the decision procedure and all-pairs matrix
//! - `selector`: the interface-selection port for ambiguous router links
//! - `dns`: DNS capability checks
//! - `config` / `config_loader`: lab scenario format and loading
//! - `report`: JSON report of a lab run
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netlab::device::{factory, AddressRecord};
//! use netlab::ip::address::SubnetMask;
//! use netlab::selector::FirstAvailable;
//! use netlab::topology::{ConnectOptions, Topology};
//! use std::net::Ipv4Addr;
//!
//! let mut topology = Topology::new();
//! topology.add_device(factory::host(
//!     "pc1",
//!     "PC 1",
//!     AddressRecord::new(Ipv4Addr::new(192, 168, 1, 10), SubnetMask::CLASS_C),
//! ))?;
//! topology.add_device(factory::host(
//!     "pc2",
//!     "PC 2",
//!     AddressRecord::new(Ipv4Addr::new(192, 168, 1, 20), SubnetMask::CLASS_C),
//! ))?;
//! topology.create_connection("pc1", "pc2", ConnectOptions::default(), &mut FirstAvailable)?;
//!
//! let result = topology.evaluate("pc1", "pc2")?;
//! assert!(result.can_communicate && !result.via_gateway);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!   max_router_connections: 3
//!   auto_routes: true
//!
//! devices:
//!   - id: r1
//!     type: router
//!     interfaces:
//!       wan: { ip: 203.0.113.5, subnet_mask: 255.255.255.0, gateway: 203.0.113.1 }
//!   - id: pc1
//!     type: computer
//!     ip: 192.168.1.10
//!     gateway: 192.168.1.1
//!   - id: internet
//!     type: cloud
//!
//! links:
//!   - { a: r1, b: pc1, interface_a: lan }
//!   - { a: r1, b: internet, interface_a: wan }
//!
//! queries:
//!   - { from: pc1, to: internet }
//! ```
//!
//! ## Error Handling
//!
//! Engine operations return `netlab::error::Result` with a typed
//! `TopologyError`. "Not reachable" is an ordinary answer, never an error.
//! Loading and reporting use `color_eyre` with context attached at each step.

pub mod config;
pub mod config_loader;
pub mod device;
pub mod dns;
pub mod error;
pub mod ip;
pub mod reachability;
pub mod report;
pub mod routing;
pub mod selector;
pub mod topology;
