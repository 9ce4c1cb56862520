//! System topology of the traced run: machine → node → process → location.

use crate::parser::definitions::Definitions;
use crate::parser::schema::LocationId;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_MACHINE: &str = "machine";
const DEFAULT_NODE: &str = "node";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTree {
    pub machines: BTreeMap<String, MachineEntry>,

    /// Locations with data but no definition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unattributed: Vec<LocationId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineEntry {
    pub nodes: BTreeMap<String, NodeEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Process rank → its locations
    pub processes: BTreeMap<u64, Vec<LocationId>>,
}

impl SystemTree {
    /// Attach every location in `locations` that has a definition
    ///
    /// Undefined locations are left out of the hierarchy and listed in
    /// `unattributed`.
    pub fn build(definitions: &Definitions, locations: &[LocationId]) -> Self {
        let mut tree = SystemTree::default();

        for &location in locations {
            let Ok(def) = definitions.location(location) else {
                tree.unattributed.push(location);
                continue;
            };

            let machine = def.machine.as_deref().unwrap_or(DEFAULT_MACHINE);
            let node = def.node.as_deref().unwrap_or(DEFAULT_NODE);
            tree.machines
                .entry(machine.to_string())
                .or_default()
                .nodes
                .entry(node.to_string())
                .or_default()
                .processes
                .entry(def.process)
                .or_default()
                .push(location);
        }

        for node in tree.machines.values_mut().flat_map(|m| m.nodes.values_mut()) {
            for locations in node.processes.values_mut() {
                locations.sort_unstable();
                locations.dedup();
            }
        }

        debug!(
            "System tree: {} machines, {} unattributed locations",
            tree.machines.len(),
            tree.unattributed.len()
        );
        tree
    }

    pub fn process_count(&self) -> usize {
        self.machines
            .values()
            .flat_map(|m| m.nodes.values())
            .map(|n| n.processes.len())
            .sum()
    }

    pub fn location_count(&self) -> usize {
        self.machines
            .values()
            .flat_map(|m| m.nodes.values())
            .flat_map(|n| n.processes.values())
            .map(Vec::len)
            .sum()
    }
}
