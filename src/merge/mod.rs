//! Distributed merge of call trees.
//!
//! This module handles:
//! - Flattening a tree into record sequences
//! - Sealing those sequences for transport
//! - Rebuilding and merging foreign trees
//! - Binomial reduction across analysis processes

pub mod envelope;
pub mod reduction;
pub mod serialize;
pub mod tree_merge;

// Re-export main types
pub use envelope::{RecordCounts, TreeEnvelope};
pub use reduction::{reduce, reduce_trees, reduction_schedule, ReducedTree};
pub use serialize::{DataRecord, MappingRecord, MetricRecord, SerializedTree};
pub use tree_merge::{MergeReport, MetricConflict};
