//! Trace input model and schema definitions.
//!
//! This module handles:
//! - The event and definition records consumed by replay
//! - Definition tables used for name resolution
//! - Reading JSON-lines event traces
//! - Defining output schema

pub mod definitions;
pub mod event_trace;
pub mod events;
pub mod schema;

// Re-export main types
pub use definitions::{Definitions, LocationDef, LocationKind, MetricDef, RegionDef};
pub use event_trace::{parse_events, read_trace};
pub use events::{Direction, TraceEvent};
pub use schema::{HotPath, LocationFailure, LocationId, MetricId, Profile, RegionId, Timestamp};
