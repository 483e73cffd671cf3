//! All-pairs reachability.
//!
//! Every ordered pair is independent once the topology is frozen, so the
//! pairs are fanned out across the rayon pool.

use rayon::prelude::*;
use serde::Serialize;

use super::evaluator::Evaluator;
use crate::device::DeviceId;
use crate::topology::Topology;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub from: DeviceId,
    pub to: DeviceId,
    pub can_communicate: bool,
    pub via_gateway: bool,
}

/// Reachability for every ordered pair of distinct devices, in device
/// registration order
pub fn reachability_matrix(topology: &Topology) -> Vec<MatrixEntry> {
    let ids: Vec<&str> = topology.devices().map(|device| device.id()).collect();
    let pairs: Vec<(&str, &str)> = ids
        .iter()
        .flat_map(|a| ids.iter().filter(move |b| *b != a).map(move |b| (*a, *b)))
        .collect();

    log::info!("Evaluating {} device pairs", pairs.len());

    let evaluator = Evaluator::new(topology);
    pairs
        .par_iter()
        .filter_map(|(a, b)| {
            evaluator.evaluate(a, b).ok().map(|result| MatrixEntry {
                from: a.to_string(),
                to: b.to_string(),
                can_communicate: result.can_communicate,
                via_gateway: result.via_gateway,
            })
        })
        .collect()
}

/// Fraction of ordered pairs that can communicate
pub fn connectivity_ratio(matrix: &[MatrixEntry]) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    let reachable = matrix.iter().filter(|entry| entry.can_communicate).count();
    reachable as f64 / matrix.len() as f64
}
