//! Lab files loaded from disk and run end to end

use netlab::config_loader::{build_lab, load_config};
use netlab::device::InterfaceName;
use netlab::report::{run_queries, LabReport};
use std::io::Write;
use std::net::Ipv4Addr;
use tempfile::NamedTempFile;

const OFFICE_LAB: &str = r#"
general:
  log_level: debug
  max_router_connections: 4
  auto_routes: true

devices:
  - id: gw
    name: Office Router
    type: router
    interfaces:
      wan:
        ip: 203.0.113.5
        subnet_mask: 255.255.255.0
        gateway: 203.0.113.1
      lan2:
        enabled: false
  - id: isp
    type: cloud
  - id: sw
    type: switch
  - id: dns
    type: dns
  - id: laptop
    type: laptop
    ip: 192.168.1.20
    gateway: 192.168.1.1
    dns: [192.168.1.53]
  - id: printer
    type: printer
    ip: 10.9.9.9
    subnet_mask: 255.255.255.0
    gateway: N/A

links:
  - { a: gw, b: isp, interface_a: wan }
  - { a: gw, b: sw }
  - { a: sw, b: dns }
  - { a: sw, b: laptop }
  - { a: sw, b: printer }

queries:
  - { from: laptop, to: dns }
  - { from: laptop, to: printer }
  - { from: gw, to: isp }
"#;

fn write_lab(yaml: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{}", yaml).unwrap();
    temp_file
}

#[test]
fn test_office_lab_runs() {
    let temp_file = write_lab(OFFICE_LAB);
    let config = load_config(temp_file.path()).unwrap();
    assert_eq!(config.topology_settings().max_router_connections, 4);

    let topology = build_lab(&config).unwrap();
    assert_eq!(topology.device_count(), 6);

    // LAN2 is disabled, so the switch landed on LAN
    let uplink = topology.connection_between("gw", "sw").unwrap();
    assert_eq!(uplink.interface_of("gw"), Some(InterfaceName::Lan));

    let results = run_queries(&topology, &config.queries).unwrap();
    assert!(results[0].reachability.can_communicate);
    assert!(!results[1].reachability.can_communicate);
    assert!(results[2].reachability.internet_access);
    assert!(results[2].reachability.requires_nat);

    let table = topology.routing_table("gw").unwrap();
    assert!(table.iter().any(|route| route.is_default()));
}

#[test]
fn test_report_written_to_disk() {
    let temp_file = write_lab(OFFICE_LAB);
    let config = load_config(temp_file.path()).unwrap();
    let topology = build_lab(&config).unwrap();
    let results = run_queries(&topology, &config.queries).unwrap();

    let report = LabReport::new(&topology, results).with_routing_tables(&topology);
    let output = NamedTempFile::new().unwrap();
    report.write_json(output.path()).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.path()).unwrap()).unwrap();
    assert_eq!(json["queries"].as_array().unwrap().len(), 3);
    assert_eq!(json["devices"][0]["name"], "Office Router");
    assert!(json["generated_at"].is_string());
    assert_eq!(json["uplinks"]["gw"]["internet_access"], serde_json::Value::Bool(true));
}

#[test]
fn test_wan_is_numbered_from_upstream() {
    let temp_file = write_lab(
        r#"
devices:
  - id: upstream
    type: router
  - id: branch
    type: router
    interfaces:
      lan: { ip: 172.16.0.1, subnet_mask: 255.255.0.0 }
links:
  - { a: upstream, b: branch, interface_a: lan, interface_b: wan }
"#,
    );
    let config = load_config(temp_file.path()).unwrap();
    let topology = build_lab(&config).unwrap();

    let branch = topology.device("branch").unwrap().as_router().unwrap();
    assert_eq!(branch.interfaces.wan.ip, Some(Ipv4Addr::new(192, 168, 1, 2)));
    assert_eq!(branch.interfaces.wan.gateway, Some(Ipv4Addr::new(192, 168, 1, 1)));
    assert_eq!(branch.routing_table.len(), 1);
}

#[test]
fn test_bad_address_is_reported() {
    let temp_file = write_lab(
        r#"
devices:
  - id: pc
    type: host
    ip: 192.168.1.300
"#,
    );
    let result = load_config(temp_file.path()).and_then(|config| build_lab(&config));
    assert!(result.is_err());
}

#[test]
fn test_unknown_device_type_is_rejected() {
    let temp_file = write_lab(
        r#"
devices:
  - id: fw
    type: firewall
"#,
    );
    assert!(load_config(temp_file.path()).is_err());
}
