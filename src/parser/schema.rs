//! Identifiers and the profile JSON schema.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution.

use super::definitions::Definitions;
use crate::aggregator::system_tree::SystemTree;
use crate::merge::envelope::TreeEnvelope;
use serde::{Deserialize, Serialize};

pub type RegionId = u32;
pub type MetricId = u32;
pub type LocationId = u64;

/// Trace clock ticks
pub type Timestamp = u64;

/// Top-level profile structure written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when profile was generated
    pub generated_at: String,

    /// Number of analysis processes the trace was split across
    pub analysis_processes: usize,

    pub definitions: Definitions,

    pub system_tree: SystemTree,

    /// Top hot paths (ranked by exclusive time)
    pub hot_paths: Vec<HotPath>,

    /// Locations whose replay stopped on an error
    #[serde(default)]
    pub failures: Vec<LocationFailure>,

    /// The merged call-path tree, sealed
    pub tree: TreeEnvelope,
}

/// A call path with its time summed over all locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotPath {
    /// Collapsed path representation (e.g., "main;solve;MPI_Allreduce")
    pub stack: String,

    pub count: u64,
    pub inclusive_time: u64,
    pub exclusive_time: u64,

    /// Percentage of total exclusive time
    pub percentage: f64,

    /// Number of locations that executed this path
    pub locations: usize,
}

/// A location whose event stream could not be replayed to the end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFailure {
    pub location: LocationId,
    pub reason: String,
}
