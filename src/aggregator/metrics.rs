//! Calculate hot paths and time distribution from a finished call tree.
//!
//! Hot paths are the call paths with the most exclusive time summed over
//! all locations. These are the primary targets for optimization.

use super::call_tree::{CallTree, NodeId};
use crate::parser::definitions::Definitions;
use crate::parser::schema::HotPath;
use crate::utils::config::PATH_SEPARATOR;
use log::debug;

/// Calculate hot paths from a call tree
///
/// **Public** - main entry point for metrics calculation
///
/// # Arguments
/// * `tree` - Finished (merged) call tree
/// * `definitions` - Region names for rendering paths
/// * `top_n` - Number of top paths to return (e.g., 10)
///
/// # Returns
/// Vector of hot paths, sorted by exclusive time (descending)
pub fn calculate_hot_paths(tree: &CallTree, definitions: &Definitions, top_n: usize) -> Vec<HotPath> {
    debug!("Calculating top {} hot paths from {} call paths", top_n, tree.len());

    let total_time: u64 = tree
        .iter()
        .map(|(_, node)| node.total_function().exclusive_time)
        .sum();

    let mut ranked: Vec<(NodeId, u64)> = tree
        .iter()
        .map(|(id, node)| (id, node.total_function().exclusive_time))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(id, _)| create_hot_path(tree, definitions, id, total_time))
        .collect()
}

/// Render the call path of `id` as `root;child;leaf`
pub fn render_path(tree: &CallTree, definitions: &Definitions, id: NodeId) -> String {
    tree.path_of(id)
        .into_iter()
        .map(|region| definitions.region_name(region))
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Create a HotPath for one node
///
/// **Private** - internal conversion
fn create_hot_path(tree: &CallTree, definitions: &Definitions, id: NodeId, total_time: u64) -> HotPath {
    let node = tree.node(id);
    let totals = node.total_function();

    let percentage = if total_time > 0 {
        (totals.exclusive_time as f64 / total_time as f64) * 100.0
    } else {
        0.0
    };

    HotPath {
        stack: render_path(tree, definitions, id),
        count: totals.count,
        inclusive_time: totals.inclusive_time,
        exclusive_time: totals.exclusive_time,
        percentage,
        locations: node.node_data().len(),
    }
}

/// Calculate exclusive time distribution statistics
///
/// **Public** - provides summary statistics
pub fn calculate_time_distribution(tree: &CallTree) -> TimeDistribution {
    if tree.is_empty() {
        return TimeDistribution::default();
    }

    let mut times: Vec<u64> = tree
        .iter()
        .map(|(_, node)| node.total_function().exclusive_time)
        .collect();
    times.sort_unstable_by(|a, b| b.cmp(a));

    let total: u64 = times.iter().sum();
    let count = times.len();
    let mean = total / count.max(1) as u64;
    let median = times[count / 2];

    let top_10_percent_count = (count as f64 * 0.1).ceil() as usize;
    let top_10_percent_time: u64 = times.iter().take(top_10_percent_count).sum();

    TimeDistribution {
        total_time: total,
        path_count: count,
        mean_time_per_path: mean,
        median_time_per_path: median,
        top_10_percent_time,
        top_10_percent_percentage: if total > 0 {
            (top_10_percent_time as f64 / total as f64) * 100.0
        } else {
            0.0
        },
    }
}

/// Exclusive time distribution statistics
#[derive(Debug, Clone, Default)]
pub struct TimeDistribution {
    /// Exclusive time summed over all call paths and locations
    pub total_time: u64,

    /// Number of call paths
    pub path_count: usize,

    pub mean_time_per_path: u64,
    pub median_time_per_path: u64,

    /// Time spent in the top 10% of call paths
    pub top_10_percent_time: u64,
    pub top_10_percent_percentage: f64,
}

impl TimeDistribution {
    /// Returns true if top 10% of call paths take more than 80% of the time
    pub fn is_highly_concentrated(&self) -> bool {
        self.top_10_percent_percentage > 80.0
    }

    /// Get human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Total: {} | Paths: {} | Mean: {} | Median: {} | Top 10%: {:.1}%",
            self.total_time,
            self.path_count,
            self.mean_time_per_path,
            self.median_time_per_path,
            self.top_10_percent_percentage
        )
    }
}
