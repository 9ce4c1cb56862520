//! Flatten a call tree into transport-agnostic record sequences.
//!
//! Node ids in the output are only meaningful within one serialized tree;
//! receivers re-derive identity from `(region, parent)` chains.

use crate::aggregator::call_tree::CallTree;
use crate::aggregator::node_data::{CollopData, FunctionData, MessageData, MetricData};
use crate::parser::schema::{LocationId, MetricId, RegionId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Shape of one node: `(node_id, region_id, parent_node_id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub node_id: u64,
    pub region_id: RegionId,

    /// `None` for roots
    pub parent: Option<u64>,
}

/// Statistics of one location on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord<T> {
    pub node_id: u64,
    pub location: LocationId,
    pub data: T,
}

/// Metric statistics; `data` carries the numeric type tag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub node_id: u64,
    pub location: LocationId,
    pub metric: MetricId,

    /// `None` when the metric refuses updates on this node and location
    pub data: Option<MetricData>,
}

/// A whole tree as five record sequences
///
/// `mapping` lists parents before their children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedTree {
    pub mapping: VecDeque<MappingRecord>,
    pub functions: VecDeque<DataRecord<FunctionData>>,
    pub messages: VecDeque<DataRecord<MessageData>>,
    pub collops: VecDeque<DataRecord<CollopData>>,
    pub metrics: VecDeque<MetricRecord>,
}

impl SerializedTree {
    /// Total number of data records (excluding the mapping)
    pub fn data_len(&self) -> usize {
        self.functions.len() + self.messages.len() + self.collops.len() + self.metrics.len()
    }
}

impl CallTree {
    /// Flatten every node and its per-location statistics in one pre-order pass
    pub fn serialize_data(&self) -> SerializedTree {
        let mut out = SerializedTree::default();
        let mut emitted: HashSet<u64> = HashSet::with_capacity(self.len());

        for (id, node) in self.iter() {
            let node_id = id.index() as u64;
            let parent = node.parent().map(|p| p.index() as u64);
            if let Some(p) = parent {
                assert!(
                    emitted.contains(&p),
                    "node {} serialized before its parent {}",
                    node_id,
                    p
                );
            }
            emitted.insert(node_id);

            out.mapping.push_back(MappingRecord {
                node_id,
                region_id: node.region_id(),
                parent,
            });

            for (&location, data) in node.node_data() {
                out.functions.push_back(DataRecord {
                    node_id,
                    location,
                    data: data.function,
                });
                if let Some(message) = data.message {
                    out.messages.push_back(DataRecord {
                        node_id,
                        location,
                        data: message,
                    });
                }
                if let Some(collop) = data.collop {
                    out.collops.push_back(DataRecord {
                        node_id,
                        location,
                        data: collop,
                    });
                }
                for (&metric, metric_data) in &data.metrics {
                    out.metrics.push_back(MetricRecord {
                        node_id,
                        location,
                        metric,
                        data: Some(*metric_data),
                    });
                }
                for &metric in &data.refused_metrics {
                    out.metrics.push_back(MetricRecord {
                        node_id,
                        location,
                        metric,
                        data: None,
                    });
                }
            }
        }

        debug!(
            "Serialized {} nodes and {} data records",
            out.mapping.len(),
            out.data_len()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::node_data::{MetricValue, NodeData};
    use crate::parser::events::Direction;

    #[test]
    fn test_mapping_lists_parents_first() {
        let mut tree = CallTree::new();
        let a = tree.insert_node(1, None);
        let b = tree.insert_node(2, Some(a));
        tree.insert_node(3, Some(b));
        tree.insert_node(4, None);

        let serialized = tree.serialize_data();
        let mut seen = HashSet::new();
        for record in &serialized.mapping {
            if let Some(parent) = record.parent {
                assert!(seen.contains(&parent));
            }
            seen.insert(record.node_id);
        }
        assert_eq!(serialized.mapping.len(), 4);
    }

    #[test]
    fn test_optional_data_only_when_present() {
        let mut tree = CallTree::new();
        let a = tree.insert_node(1, None);
        tree.add_function(a, 0, &FunctionData::new(1, 10, 10));
        tree.add_message(a, 1, &MessageData::transfer(Direction::Sent, 4));
        let node: &mut NodeData = tree.node_data_mut(a, 1);
        node.add_metric(5, &MetricData::from_delta(MetricValue::F64(2.5)))
            .unwrap();

        let serialized = tree.serialize_data();
        assert_eq!(serialized.functions.len(), 2);
        assert_eq!(serialized.messages.len(), 1);
        assert_eq!(serialized.messages[0].location, 1);
        assert!(serialized.collops.is_empty());
        assert_eq!(serialized.metrics.len(), 1);
        assert_eq!(serialized.metrics[0].metric, 5);
        assert_eq!(serialized.data_len(), 4);
    }

    #[test]
    fn test_refused_metric_is_serialized_without_value() {
        let mut tree = CallTree::new();
        let a = tree.insert_node(1, None);
        tree.add_metric(a, 0, 6, &MetricData::from_delta(MetricValue::U64(3)))
            .unwrap();
        assert!(tree
            .add_metric(a, 0, 6, &MetricData::from_delta(MetricValue::I64(3)))
            .is_err());

        let serialized = tree.serialize_data();
        assert_eq!(serialized.metrics.len(), 1);
        assert_eq!(serialized.metrics[0].metric, 6);
        assert_eq!(serialized.metrics[0].data, None);
    }
}
