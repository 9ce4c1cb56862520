//! Call-path aggregation engine.
//!
//! This module turns per-location event streams into:
//! - A call-path tree with per-location timing, message, collective and metric data
//! - A system tree of the locations that contributed data
//! - Hot path analysis (top exclusive time consumers)

pub mod call_tree;
pub mod metrics;
pub mod node_data;
pub mod replay;
pub mod system_tree;

// Re-export main types and functions
pub use call_tree::{CallTree, CallTreeNode, NodeId};
pub use metrics::{calculate_hot_paths, calculate_time_distribution, TimeDistribution};
pub use node_data::{
    CollopData, FunctionData, MessageData, MetricData, MetricType, MetricValue, NodeData,
};
pub use replay::{ReplayOutcome, ReplaySession};
pub use system_tree::SystemTree;
