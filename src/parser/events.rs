//! Trace events consumed by the replay engine.
//!
//! Readers of any trace format turn their records into `TraceEvent`s; the
//! replay session has a single `handle` entry point for all of them.

use super::definitions::{LocationDef, MetricDef, RegionDef};
use super::schema::{LocationId, MetricId, RegionId, Timestamp};
use crate::aggregator::node_data::MetricValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a point-to-point or collective transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// One record of a trace: an event on a location or a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Enter {
        location: LocationId,
        region: RegionId,
        time: Timestamp,
    },
    Leave {
        location: LocationId,
        time: Timestamp,
    },
    Message {
        location: LocationId,
        direction: Direction,
        bytes: u64,
    },
    Collective {
        location: LocationId,
        direction: Direction,
        bytes: u64,
    },
    Metric {
        location: LocationId,
        metric: MetricId,
        value: MetricValue,
        time: Timestamp,
    },
    DefineRegion(RegionDef),
    DefineMetric(MetricDef),
    DefineLocation(LocationDef),
}

impl TraceEvent {
    /// Location the event happened on; `None` for definitions
    pub fn location(&self) -> Option<LocationId> {
        match self {
            TraceEvent::Enter { location, .. }
            | TraceEvent::Leave { location, .. }
            | TraceEvent::Message { location, .. }
            | TraceEvent::Collective { location, .. }
            | TraceEvent::Metric { location, .. } => Some(*location),
            TraceEvent::DefineRegion(_)
            | TraceEvent::DefineMetric(_)
            | TraceEvent::DefineLocation(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::Enter { .. } => "enter",
            TraceEvent::Leave { .. } => "leave",
            TraceEvent::Message { .. } => "message",
            TraceEvent::Collective { .. } => "collective",
            TraceEvent::Metric { .. } => "metric",
            TraceEvent::DefineRegion(_) => "define_region",
            TraceEvent::DefineMetric(_) => "define_metric",
            TraceEvent::DefineLocation(_) => "define_location",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            Some(location) => write!(f, "{}@{}", self.kind(), location),
            None => f.write_str(self.kind()),
        }
    }
}
