//! Call-path tree: one node per distinct sequence of region entries.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. A node is keyed by
//! `(region, parent)`, so the same region reached through different parents
//! (including recursion) yields distinct nodes. Nodes are never removed.

use super::node_data::{CollopData, FunctionData, MessageData, MetricData, NodeData};
use crate::parser::schema::{LocationId, MetricId, RegionId};
use crate::utils::error::NodeDataError;
use std::collections::BTreeMap;

/// Stable handle of a node inside one [`CallTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One call path with its per-location statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CallTreeNode {
    region_id: RegionId,
    parent: Option<NodeId>,
    depth: usize,
    children: BTreeMap<RegionId, NodeId>,
    node_data: BTreeMap<LocationId, NodeData>,
}

impl CallTreeNode {
    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Number of ancestors; roots have depth 0
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> &BTreeMap<RegionId, NodeId> {
        &self.children
    }

    pub fn child(&self, region_id: RegionId) -> Option<NodeId> {
        self.children.get(&region_id).copied()
    }

    pub fn node_data(&self) -> &BTreeMap<LocationId, NodeData> {
        &self.node_data
    }

    pub fn data(&self, location: LocationId) -> Option<&NodeData> {
        self.node_data.get(&location)
    }

    /// Whether any location sent or received point-to-point messages here
    pub fn has_p2p(&self) -> bool {
        self.node_data.values().any(|d| d.message.is_some())
    }

    /// Whether any location took part in collective operations here
    pub fn has_collop(&self) -> bool {
        self.node_data.values().any(|d| d.collop.is_some())
    }

    /// Timing summed over every location
    pub fn total_function(&self) -> FunctionData {
        let mut total = FunctionData::default();
        for data in self.node_data.values() {
            total.add(&data.function);
        }
        total
    }
}

/// Forest of call paths owned by one analysis process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
    roots: BTreeMap<RegionId, NodeId>,
}

impl CallTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Roots indexed by region
    pub fn root_nodes(&self) -> &BTreeMap<RegionId, NodeId> {
        &self.roots
    }

    /// Node behind a handle issued by this tree
    ///
    /// # Panics
    /// If `id` was not issued by this tree
    pub fn node(&self, id: NodeId) -> &CallTreeNode {
        &self.nodes[id.0]
    }

    /// Child of `parent` for `region_id`, created on first visit
    ///
    /// With `parent == None` the node is a root. Repeated calls with the same
    /// pair return the same handle.
    pub fn insert_node(&mut self, region_id: RegionId, parent: Option<NodeId>) -> NodeId {
        let existing = match parent {
            Some(p) => self.node(p).child(region_id),
            None => self.roots.get(&region_id).copied(),
        };
        if let Some(id) = existing {
            return id;
        }

        let id = NodeId(self.nodes.len());
        let depth = parent.map_or(0, |p| self.node(p).depth + 1);
        self.nodes.push(CallTreeNode {
            region_id,
            parent,
            depth,
            children: BTreeMap::new(),
            node_data: BTreeMap::new(),
        });

        match parent {
            Some(p) => {
                self.nodes[p.0].children.insert(region_id, id);
            }
            None => {
                self.roots.insert(region_id, id);
            }
        }
        id
    }

    /// Statistics of `location` on `node`, created empty on first access
    pub fn node_data_mut(&mut self, node: NodeId, location: LocationId) -> &mut NodeData {
        self.nodes[node.0].node_data.entry(location).or_default()
    }

    pub fn add_function(&mut self, node: NodeId, location: LocationId, data: &FunctionData) {
        self.node_data_mut(node, location).add_function(data);
    }

    pub fn add_message(&mut self, node: NodeId, location: LocationId, data: &MessageData) {
        self.node_data_mut(node, location).add_message(data);
    }

    pub fn add_collop(&mut self, node: NodeId, location: LocationId, data: &CollopData) {
        self.node_data_mut(node, location).add_collop(data);
    }

    pub fn add_metric(
        &mut self,
        node: NodeId,
        location: LocationId,
        metric: MetricId,
        data: &MetricData,
    ) -> Result<(), NodeDataError> {
        self.node_data_mut(node, location).add_metric(metric, data)
    }

    /// Pre-order walk over all nodes, roots in region order
    pub fn iter(&self) -> Preorder<'_> {
        let mut stack: Vec<NodeId> = self.roots.values().copied().collect();
        stack.reverse();
        Preorder { tree: self, stack }
    }

    /// Regions from the root down to `id`
    pub fn path_of(&self, id: NodeId) -> Vec<RegionId> {
        let mut path = Vec::with_capacity(self.node(id).depth + 1);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            path.push(node.region_id);
            cursor = node.parent;
        }
        path.reverse();
        path
    }

    /// Node reached by following `path` from the roots
    pub fn find_path(&self, path: &[RegionId]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut cursor = *self.roots.get(first)?;
        for region in rest {
            cursor = self.node(cursor).child(*region)?;
        }
        Some(cursor)
    }

    /// Every location that recorded anything in this tree
    pub fn locations(&self) -> Vec<LocationId> {
        let mut locations: Vec<LocationId> = self
            .nodes
            .iter()
            .flat_map(|n| n.node_data.keys().copied())
            .collect();
        locations.sort_unstable();
        locations.dedup();
        locations
    }
}

/// Lazy pre-order iterator returned by [`CallTree::iter`]
pub struct Preorder<'a> {
    tree: &'a CallTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (NodeId, &'a CallTreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.children.values().rev().copied());
        Some((id, node))
    }
}
