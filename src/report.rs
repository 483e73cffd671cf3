//! Lab run report.
//!
//! Collects the answers to a lab's queries, optional routing tables and the
//! all-pairs matrix into one serialisable document.

use chrono::{DateTime, Utc};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::QueryConfig;
use crate::device::{DeviceId, DeviceType, Route};
use crate::ip::address::display_address;
use crate::reachability::{connectivity_ratio, Evaluator, MatrixEntry, Reachability};
use crate::topology::{Connection, Topology};

/// One row of the device inventory
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub address: String,
    pub connections: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub from: DeviceId,
    pub to: DeviceId,
    #[serde(flatten)]
    pub reachability: Reachability,
}

#[derive(Debug, Serialize)]
pub struct LabReport {
    pub generated_at: DateTime<Utc>,
    pub devices: Vec<DeviceSummary>,
    pub connections: Vec<Connection>,
    pub queries: Vec<QueryResult>,
    /// What each router reaches through its own WAN configuration
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub uplinks: BTreeMap<DeviceId, Reachability>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub routing_tables: BTreeMap<DeviceId, Vec<Route>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<MatrixEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<f64>,
}

/// Answer every query against the topology
pub fn run_queries(topology: &Topology, queries: &[QueryConfig]) -> Result<Vec<QueryResult>> {
    queries
        .iter()
        .map(|query| {
            let reachability = topology
                .evaluate(&query.from, &query.to)
                .wrap_err_with(|| format!("Failed to evaluate {} -> {}", query.from, query.to))?;
            Ok(QueryResult {
                from: query.from.clone(),
                to: query.to.clone(),
                reachability,
            })
        })
        .collect()
}

impl LabReport {
    pub fn new(topology: &Topology, queries: Vec<QueryResult>) -> Self {
        let devices = topology
            .devices()
            .map(|device| DeviceSummary {
                id: device.id().to_string(),
                name: device.name.clone(),
                device_type: device.device_type(),
                address: display_address(device.primary_ip()),
                connections: device.connections().len(),
            })
            .collect();

        let evaluator = Evaluator::new(topology);
        let uplinks = topology
            .devices()
            .filter(|device| device.is_router())
            .filter_map(|device| {
                evaluator
                    .uplink(device.id())
                    .ok()
                    .map(|verdict| (device.id().to_string(), verdict))
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            devices,
            connections: topology.connections().cloned().collect(),
            queries,
            uplinks,
            routing_tables: BTreeMap::new(),
            matrix: None,
            connectivity: None,
        }
    }

    /// Attach every router's routing table
    pub fn with_routing_tables(mut self, topology: &Topology) -> Self {
        for device in topology.devices() {
            if let Some(router) = device.as_router() {
                self.routing_tables
                    .insert(device.id().to_string(), router.routing_table.clone());
            }
        }
        self
    }

    pub fn with_matrix(mut self, matrix: Vec<MatrixEntry>) -> Self {
        self.connectivity = Some(connectivity_ratio(&matrix));
        self.matrix = Some(matrix);
        self
    }

    /// Log a human-readable summary
    pub fn log_summary(&self) {
        log::info!("=== Lab report ({}) ===", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        for query in &self.queries {
            let r = &query.reachability;
            let verdict = match (r.can_communicate, r.via_gateway) {
                (false, _) => "UNREACHABLE".to_string(),
                (true, false) => "reachable (direct)".to_string(),
                (true, true) => format!(
                    "reachable via {}",
                    r.connected_via.as_deref().unwrap_or("gateway")
                ),
            };
            log::info!("{} -> {}: {}", query.from, query.to, verdict);
        }
        for (router, uplink) in &self.uplinks {
            let status = if uplink.internet_access {
                "Internet via WAN gateway"
            } else if uplink.has_default_route {
                "Internet via default route"
            } else {
                "no Internet uplink"
            };
            log::info!("{}: {}", router, status);
        }
        for (router, table) in &self.routing_tables {
            log::info!("Routing table of {} ({} routes)", router, table.len());
            for route in table {
                log::info!("  {}", route);
            }
        }
        if let Some(ratio) = self.connectivity {
            log::info!("Connectivity: {:.1}% of device pairs", ratio * 100.0);
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create report file '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .wrap_err_with(|| format!("Failed to write report to '{}'", path.display()))?;
        log::info!("Wrote report to {:?}", path);
        Ok(())
    }
}
