//! Merge a serialized foreign tree into a local one.
//!
//! Foreign node ids only index the foreign mapping. The mapping is first
//! rebuilt into a shape, walked parents-first, and each foreign node is
//! matched to the local node with the same `(region, parent)` chain. Data
//! records are then added with the associative node data combinators, so
//! the merge order across peers does not change the aggregated values.

use super::serialize::SerializedTree;
use crate::aggregator::call_tree::{CallTree, NodeId};
use crate::parser::schema::{LocationId, MetricId, RegionId};
use crate::utils::error::{MergeError, NodeDataError};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};

/// Summary of one merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub nodes_visited: usize,
    pub nodes_created: usize,
    pub records_applied: usize,

    /// Metric records that newly conflicted with the receiver's data
    pub metric_conflicts: Vec<MetricConflict>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricConflict {
    pub node: NodeId,
    pub location: LocationId,
    pub metric: MetricId,
    pub error: NodeDataError,
}

/// Parent/child structure of a foreign mapping, without data
struct ForeignShape {
    regions: HashMap<u64, RegionId>,
    parents: HashMap<u64, Option<u64>>,
    children: HashMap<u64, Vec<u64>>,
    roots: Vec<u64>,
}

impl ForeignShape {
    fn from_mapping(tree: &SerializedTree) -> Result<Self, MergeError> {
        let mut regions = HashMap::with_capacity(tree.mapping.len());
        let mut parents = HashMap::with_capacity(tree.mapping.len());

        for record in &tree.mapping {
            if regions.insert(record.node_id, record.region_id).is_some() {
                return Err(MergeError::DuplicateNode {
                    node_id: record.node_id,
                });
            }
            parents.insert(record.node_id, record.parent);
        }

        let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut roots = Vec::new();
        for record in &tree.mapping {
            match record.parent {
                Some(parent) if !regions.contains_key(&parent) => {
                    return Err(MergeError::DanglingReference { node_id: parent });
                }
                Some(parent) => children.entry(parent).or_default().push(record.node_id),
                None => roots.push(record.node_id),
            }
        }

        Ok(Self {
            regions,
            parents,
            children,
            roots,
        })
    }

    /// Node ids ordered so that every parent precedes its children
    fn parent_first_order(&self) -> Result<Vec<u64>, MergeError> {
        let mut order = Vec::with_capacity(self.regions.len());
        let mut queue: VecDeque<u64> = self.roots.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(children) = self.children.get(&id) {
                queue.extend(children.iter().copied());
            }
        }

        if order.len() != self.regions.len() {
            // Anything left over hangs off a cycle
            let visited: std::collections::HashSet<u64> = order.iter().copied().collect();
            let mut stranded: Vec<u64> = self
                .regions
                .keys()
                .filter(|id| !visited.contains(id))
                .copied()
                .collect();
            stranded.sort_unstable();
            return Err(MergeError::UnreachableNode {
                node_id: stranded.first().copied().unwrap_or_default(),
            });
        }
        Ok(order)
    }

    fn check_reference(&self, node_id: u64) -> Result<(), MergeError> {
        if self.regions.contains_key(&node_id) {
            Ok(())
        } else {
            Err(MergeError::DanglingReference { node_id })
        }
    }
}

fn resolve(local: &HashMap<u64, NodeId>, node_id: u64) -> Result<NodeId, MergeError> {
    local
        .get(&node_id)
        .copied()
        .ok_or(MergeError::DanglingReference { node_id })
}

impl CallTree {
    /// Union `foreign` into this tree
    ///
    /// Structure and references are validated before anything is modified,
    /// so a corrupt input leaves this tree untouched.
    pub fn merge_tree(&mut self, foreign: &SerializedTree) -> Result<MergeReport, MergeError> {
        let shape = ForeignShape::from_mapping(foreign)?;
        let order = shape.parent_first_order()?;

        let referenced = foreign
            .functions
            .iter()
            .map(|r| r.node_id)
            .chain(foreign.messages.iter().map(|r| r.node_id))
            .chain(foreign.collops.iter().map(|r| r.node_id))
            .chain(foreign.metrics.iter().map(|r| r.node_id));
        for node_id in referenced {
            shape.check_reference(node_id)?;
        }

        let mut report = MergeReport::default();
        let mut local: HashMap<u64, NodeId> = HashMap::with_capacity(order.len());

        for foreign_id in order {
            let parent = match shape.parents.get(&foreign_id).copied().flatten() {
                Some(p) => Some(resolve(&local, p)?),
                None => None,
            };
            let region = shape.regions[&foreign_id];

            let before = self.len();
            let id = self.insert_node(region, parent);
            if self.len() > before {
                report.nodes_created += 1;
            }
            report.nodes_visited += 1;
            local.insert(foreign_id, id);
        }

        for record in &foreign.functions {
            let node = resolve(&local, record.node_id)?;
            self.add_function(node, record.location, &record.data);
            report.records_applied += 1;
        }
        for record in &foreign.messages {
            let node = resolve(&local, record.node_id)?;
            self.add_message(node, record.location, &record.data);
            report.records_applied += 1;
        }
        for record in &foreign.collops {
            let node = resolve(&local, record.node_id)?;
            self.add_collop(node, record.location, &record.data);
            report.records_applied += 1;
        }
        for record in &foreign.metrics {
            let node = resolve(&local, record.node_id)?;
            let Some(data) = &record.data else {
                self.node_data_mut(node, record.location)
                    .refuse_metric(record.metric);
                report.records_applied += 1;
                continue;
            };
            match self.add_metric(node, record.location, record.metric, data) {
                // A refused metric absorbs incoming values
                Ok(()) | Err(NodeDataError::MetricRefused) => report.records_applied += 1,
                Err(error) => {
                    warn!(
                        "Refusing metric {} for location {}: {}",
                        record.metric, record.location, error
                    );
                    report.metric_conflicts.push(MetricConflict {
                        node,
                        location: record.location,
                        metric: record.metric,
                        error,
                    });
                }
            }
        }

        debug!(
            "Merged {} nodes ({} new), {} records",
            report.nodes_visited, report.nodes_created, report.records_applied
        );
        Ok(report)
    }

    /// Union another in-process tree into this one
    pub fn merge(&mut self, other: &CallTree) -> Result<MergeReport, MergeError> {
        self.merge_tree(&other.serialize_data())
    }

    /// Rebuild a tree from its serialized form
    pub fn from_serialized(serialized: &SerializedTree) -> Result<CallTree, MergeError> {
        let mut tree = CallTree::new();
        tree.merge_tree(serialized)?;
        Ok(tree)
    }
}
