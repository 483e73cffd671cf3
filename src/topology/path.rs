//! Breadth-first path search over physical wiring.
//!
//! Paths ignore addressing entirely; they only answer "is there a chain of
//! cables from A to B". Neighbours are expanded in the order their
//! connections were attached, so among equally short paths the one through
//! the earliest-attached links wins.

use std::collections::{HashMap, HashSet, VecDeque};

use super::connections::Topology;
use crate::device::{Device, DeviceId};

impl Topology {
    /// Find the shortest device chain from `a` to `b` using BFS, both ends
    /// included.
    ///
    /// Returns `None` when either id is unknown or no chain exists. A device
    /// reaches itself with a single-element path.
    pub fn find_path(&self, a: &str, b: &str) -> Option<Vec<&Device>> {
        let start = self.device(a)?;
        self.device(b)?;
        if a == b {
            return Some(vec![start]);
        }

        let mut visited: HashSet<&str> = HashSet::from([start.id()]);
        let mut parents: HashMap<&str, &Device> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.neighbors_of(current.id()) {
                if !visited.insert(neighbor.id()) {
                    continue;
                }
                parents.insert(neighbor.id(), current);

                if neighbor.id() == b {
                    let mut path = vec![neighbor];
                    let mut cursor = neighbor.id();
                    while let Some(&parent) = parents.get(cursor) {
                        path.push(parent);
                        cursor = parent.id();
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(neighbor);
            }
        }

        None
    }

    /// [`Topology::find_path`] as device ids
    pub fn find_path_ids(&self, a: &str, b: &str) -> Option<Vec<DeviceId>> {
        self.find_path(a, b)
            .map(|path| path.iter().map(|device| device.id().to_string()).collect())
    }

    /// Whether the chain from `a` to `b` passes through at least one switch
    pub fn connected_via_switch(&self, a: &str, b: &str) -> bool {
        self.find_path(a, b)
            .map(|path| path_has_interior_switch(&path))
            .unwrap_or(false)
    }
}

/// True when some device strictly between the two ends is a switch
pub fn path_has_interior_switch(path: &[&Device]) -> bool {
    path.len() >= 3 && path[1..path.len() - 1].iter().any(|device| device.is_switch())
}

/// Memoised path lookups keyed by unordered device pair.
///
/// Entries are tied to the topology revision they were computed at; any
/// mutation of the topology empties the cache on the next lookup.
#[derive(Debug, Default)]
pub struct PathCache {
    revision: Option<u64>,
    entries: HashMap<(DeviceId, DeviceId), Option<Vec<DeviceId>>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path from `a` to `b` as ids. The reverse direction shares the entry,
    /// so `path(b, a)` is `path(a, b)` reversed.
    pub fn path(&mut self, topology: &Topology, a: &str, b: &str) -> Option<Vec<DeviceId>> {
        if self.revision != Some(topology.revision()) {
            if !self.entries.is_empty() {
                log::debug!("Topology changed, dropping {} cached paths", self.entries.len());
            }
            self.entries.clear();
            self.revision = Some(topology.revision());
        }

        let (first, second, reversed) = if a <= b { (a, b, false) } else { (b, a, true) };
        let entry = self
            .entries
            .entry((first.to_string(), second.to_string()))
            .or_insert_with(|| topology.find_path_ids(first, second));

        entry.clone().map(|mut path| {
            if reversed {
                path.reverse();
            }
            path
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
