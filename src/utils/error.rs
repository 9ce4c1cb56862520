//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use crate::aggregator::node_data::MetricType;
use crate::parser::schema::{LocationId, MetricId, RegionId, Timestamp};
use thiserror::Error;

/// Errors raised while combining node statistics
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeDataError {
    #[error("Metric type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: MetricType,
        found: MetricType,
    },

    #[error("Metric refuses updates after an earlier conflict")]
    MetricRefused,

    #[error("Double metric arithmetic produced a non-finite value")]
    NonFiniteValue,
}

/// Errors raised while replaying the event stream of one location
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    #[error("Leave without matching Enter on location {location}")]
    StackUnderflow { location: LocationId },

    #[error("Location {location} went back in time from {previous} to {time}")]
    TimeReversal {
        location: LocationId,
        previous: Timestamp,
        time: Timestamp,
    },

    #[error("Location {location} was aborted by an earlier error")]
    LocationAborted { location: LocationId },

    #[error("{kind} event on location {location} outside of any call")]
    NoActiveCall {
        location: LocationId,
        kind: &'static str,
    },
}

impl ReplayError {
    /// Whether the error stops further processing of its location
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReplayError::NoActiveCall { .. })
    }
}

/// Errors raised while merging a serialized tree into a local one
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Data record references node {node_id} which is absent from the mapping")]
    DanglingReference { node_id: u64 },

    #[error("Node {node_id} appears twice in the mapping")]
    DuplicateNode { node_id: u64 },

    #[error("Node {node_id} is not reachable from any root")]
    UnreachableNode { node_id: u64 },

    #[error("Sequence '{sequence}' holds {found} records, envelope announced {expected}")]
    RecordCountMismatch {
        sequence: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    #[error("Envelope encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Lookups into the definition tables that found nothing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Unknown region: {0}")]
    UnknownRegion(RegionId),

    #[error("Unknown location: {0}")]
    UnknownLocation(LocationId),

    #[error("Unknown metric: {0}")]
    UnknownMetric(MetricId),
}

/// Errors that can occur during trace parsing
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed at line {line}: {source}")]
    JsonError {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read trace: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
