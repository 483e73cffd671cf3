//! Registry and path finder behaviour through the public API

use netlab::device::{factory, AddressRecord, InterfaceName};
use netlab::error::TopologyError;
use netlab::ip::address::SubnetMask;
use netlab::selector::FirstAvailable;
use netlab::topology::{ConnectOptions, ConnectOutcome, PathCache, Topology, TopologySettings};
use std::net::Ipv4Addr;

fn host(id: &str, last_octet: u8) -> netlab::device::Device {
    factory::host(
        id,
        id,
        AddressRecord::new(Ipv4Addr::new(192, 168, 1, last_octet), SubnetMask::CLASS_C),
    )
}

fn connect(topology: &mut Topology, a: &str, b: &str) -> Result<ConnectOutcome, TopologyError> {
    topology.create_connection(a, b, ConnectOptions::default(), &mut FirstAvailable)
}

#[test]
fn test_find_path_to_self() {
    let mut topology = Topology::new();
    topology.add_device(host("a", 10)).unwrap();
    topology.add_device(factory::router("r1", "R1")).unwrap();

    for id in ["a", "r1"] {
        let path = topology.find_path(id, id).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].id(), id);
    }
}

#[test]
fn test_disconnected_devices_have_no_path() {
    let mut topology = Topology::new();
    topology.add_device(host("a", 10)).unwrap();
    topology.add_device(host("b", 20)).unwrap();

    assert!(topology.find_path("a", "b").is_none());
    assert!(!topology.evaluate("a", "b").unwrap().can_communicate);
}

#[test]
fn test_switch_accepts_many_connections() {
    let mut topology = Topology::new();
    topology.add_device(factory::switch("sw", "SW")).unwrap();
    for n in 0..5u8 {
        let id = format!("h{}", n);
        topology.add_device(host(&id, 10 + n)).unwrap();
        assert!(topology.can_accept_connection("sw", None).unwrap());
        assert!(connect(&mut topology, "sw", &id).unwrap().is_new());
    }

    assert_eq!(topology.device("sw").unwrap().connections().len(), 5);
    assert!(topology.can_accept_connection("sw", None).unwrap());
}

#[test]
fn test_host_accepts_single_connection() {
    let mut topology = Topology::new();
    topology.add_device(host("a", 10)).unwrap();
    topology.add_device(host("b", 20)).unwrap();
    topology.add_device(host("c", 30)).unwrap();

    connect(&mut topology, "a", "b").unwrap();
    assert!(!topology.can_accept_connection("a", None).unwrap());
    assert_eq!(
        connect(&mut topology, "a", "c"),
        Err(TopologyError::PortExhausted("a".to_string()))
    );
    assert_eq!(topology.connections().count(), 1);
}

#[test]
fn test_router_capacity_is_configurable() {
    let mut topology = Topology::with_settings(TopologySettings {
        max_router_connections: 1,
    });
    topology.add_device(factory::router("r1", "R1")).unwrap();
    topology.add_device(host("a", 10)).unwrap();
    topology.add_device(host("b", 20)).unwrap();

    connect(&mut topology, "r1", "a").unwrap();
    assert_eq!(
        connect(&mut topology, "r1", "b"),
        Err(TopologyError::PortExhausted("r1".to_string()))
    );
}

#[test]
fn test_duplicate_link_returns_existing() {
    let mut topology = Topology::new();
    topology.add_device(factory::switch("sw", "SW")).unwrap();
    topology.add_device(factory::switch("sw2", "SW2")).unwrap();

    let first = connect(&mut topology, "sw", "sw2").unwrap();
    let second = connect(&mut topology, "sw2", "sw").unwrap();
    assert_eq!(second, ConnectOutcome::AlreadyConnected(first.id()));
    assert_eq!(topology.connections().count(), 1);
}

#[test]
fn test_remove_connection_clears_membership() {
    let mut topology = Topology::new();
    topology.add_device(factory::router("r1", "R1")).unwrap();
    topology.add_device(host("a", 10)).unwrap();

    let id = topology
        .create_connection(
            "r1",
            "a",
            ConnectOptions::interfaces(Some(InterfaceName::Lan), None),
            &mut FirstAvailable,
        )
        .unwrap()
        .id();
    assert!(topology.evaluate("r1", "a").unwrap().can_communicate);

    assert!(topology.remove_connection(id).is_some());
    assert!(topology.connection(id).is_none());
    assert!(topology.device("a").unwrap().connections().is_empty());
    let r1 = topology.device("r1").unwrap();
    assert!(r1.connections().is_empty());
    assert!(r1.as_router().unwrap().connection_interfaces.is_empty());
    assert!(!topology.evaluate("r1", "a").unwrap().can_communicate);

    // Removing again is a no-op
    assert!(topology.remove_connection(id).is_none());
}

#[test]
fn test_remove_device_cascades() {
    let mut topology = Topology::new();
    topology.add_device(factory::switch("sw", "SW")).unwrap();
    topology.add_device(host("a", 10)).unwrap();
    topology.add_device(host("b", 20)).unwrap();
    connect(&mut topology, "sw", "a").unwrap();
    connect(&mut topology, "sw", "b").unwrap();

    topology.remove_device("sw").unwrap();
    assert_eq!(topology.connections().count(), 0);
    assert!(topology.device("a").unwrap().connections().is_empty());
    assert!(matches!(
        topology.remove_device("sw"),
        Err(TopologyError::UnknownDevice(_))
    ));
}

#[test]
fn test_path_cache_follows_revisions() {
    let mut topology = Topology::new();
    topology.add_device(factory::switch("sw", "SW")).unwrap();
    topology.add_device(host("a", 10)).unwrap();
    topology.add_device(host("b", 20)).unwrap();
    connect(&mut topology, "sw", "a").unwrap();

    let mut cache = PathCache::new();
    assert!(cache.path(&topology, "a", "b").is_none());

    connect(&mut topology, "sw", "b").unwrap();
    assert_eq!(
        cache.path(&topology, "b", "a"),
        Some(vec!["b".to_string(), "sw".to_string(), "a".to_string()])
    );
}
