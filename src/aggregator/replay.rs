//! Replay of per-location event streams into a call-path tree.
//!
//! Each location keeps its own stack of open calls. Events of one location
//! must arrive in causal order; events of different locations may interleave
//! freely. A fatal error on one location stops that location only.

use super::call_tree::{CallTree, NodeId};
use super::node_data::{CollopData, FunctionData, MessageData, MetricData, MetricValue};
use crate::parser::definitions::Definitions;
use crate::parser::events::{Direction, TraceEvent};
use crate::parser::schema::{LocationFailure, LocationId, MetricId, RegionId, Timestamp};
use crate::utils::error::{NodeDataError, ReplayError};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// An open call on a location's stack
#[derive(Debug, Clone)]
struct Frame {
    node: NodeId,
    entered: Timestamp,

    /// Inclusive time of completed child calls
    child_inclusive: u64,

    /// Metric samples observed at entry
    metric_first: BTreeMap<MetricId, MetricValue>,

    /// Inclusive metric deltas of completed child calls
    child_metrics: BTreeMap<MetricId, MetricValue>,

    /// Metrics whose child deltas could not be computed
    refused_metrics: BTreeSet<MetricId>,
}

#[derive(Debug, Default)]
struct LocationState {
    stack: Vec<Frame>,

    /// Samples waiting for the next Enter or Leave
    pending_metrics: BTreeMap<MetricId, MetricValue>,

    /// Timestamp of the latest Enter or Leave
    clock: Option<Timestamp>,

    failure: Option<ReplayError>,
}

impl LocationState {
    /// Move the location clock to `time`; it never goes backwards
    fn advance_clock(&mut self, location: LocationId, time: Timestamp) -> Result<(), ReplayError> {
        if let Some(previous) = self.clock {
            if time < previous {
                return Err(ReplayError::TimeReversal {
                    location,
                    previous,
                    time,
                });
            }
        }
        self.clock = Some(time);
        Ok(())
    }
}

/// Everything a finished replay produced
#[derive(Debug)]
pub struct ReplayOutcome {
    pub tree: CallTree,
    pub definitions: Definitions,

    /// Locations that stopped on a fatal error
    pub failures: Vec<LocationFailure>,

    /// Locations whose stream ended with open calls, and how many
    pub unclosed: Vec<(LocationId, usize)>,

    /// Messages and collectives that happened outside any call
    pub orphan_events: usize,

    /// Metric samples or updates refused because of a type conflict
    pub metric_conflicts: usize,
}

/// Replay state of one analysis process
#[derive(Debug, Default)]
pub struct ReplaySession {
    tree: CallTree,
    definitions: Definitions,
    locations: BTreeMap<LocationId, LocationState>,
    orphan_events: usize,
    metric_conflicts: usize,
}

impl ReplaySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Number of open calls on `location`
    pub fn depth(&self, location: LocationId) -> usize {
        self.locations.get(&location).map_or(0, |s| s.stack.len())
    }

    /// Whether `location` stopped on a fatal error
    pub fn is_aborted(&self, location: LocationId) -> bool {
        self.locations
            .get(&location)
            .is_some_and(|s| s.failure.is_some())
    }

    /// Feed one event
    ///
    /// A fatal error aborts the event's location: every later event for it
    /// returns [`ReplayError::LocationAborted`]. Other locations continue.
    pub fn handle(&mut self, event: &TraceEvent) -> Result<(), ReplayError> {
        let location = match event {
            TraceEvent::DefineRegion(def) => {
                self.definitions.insert_region(def.clone());
                return Ok(());
            }
            TraceEvent::DefineMetric(def) => {
                self.definitions.insert_metric(def.clone());
                return Ok(());
            }
            TraceEvent::DefineLocation(def) => {
                self.definitions.insert_location(def.clone());
                return Ok(());
            }
            TraceEvent::Enter { location, .. }
            | TraceEvent::Leave { location, .. }
            | TraceEvent::Message { location, .. }
            | TraceEvent::Collective { location, .. }
            | TraceEvent::Metric { location, .. } => *location,
        };

        if self.is_aborted(location) {
            return Err(ReplayError::LocationAborted { location });
        }

        let result = match *event {
            TraceEvent::Enter { region, time, .. } => self.enter(location, region, time),
            TraceEvent::Leave { time, .. } => self.leave(location, time),
            TraceEvent::Message {
                direction, bytes, ..
            } => self.transfer(location, direction, bytes, false),
            TraceEvent::Collective {
                direction, bytes, ..
            } => self.transfer(location, direction, bytes, true),
            TraceEvent::Metric {
                metric, value, time, ..
            } => {
                self.sample(location, metric, value, time);
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(err) = &result {
            if err.is_fatal() {
                warn!("Aborting location {}: {}", location, err);
                self.locations.entry(location).or_default().failure = Some(err.clone());
            } else {
                debug!("Dropped event: {}", err);
            }
        }
        result
    }

    /// Feed a whole event sequence, isolating failures per location
    ///
    /// Returns the number of events that were rejected.
    pub fn replay<'a>(&mut self, events: impl IntoIterator<Item = &'a TraceEvent>) -> usize {
        let mut rejected = 0;
        for event in events {
            if self.handle(event).is_err() {
                rejected += 1;
            }
        }
        rejected
    }

    /// Close the session
    pub fn finish(self) -> ReplayOutcome {
        let mut failures = Vec::new();
        let mut unclosed = Vec::new();

        for (location, state) in self.locations {
            if let Some(err) = state.failure {
                failures.push(LocationFailure {
                    location,
                    reason: err.to_string(),
                });
            } else if !state.stack.is_empty() {
                warn!(
                    "Location {} ended with {} open calls",
                    location,
                    state.stack.len()
                );
                unclosed.push((location, state.stack.len()));
            }
        }

        if self.orphan_events > 0 {
            warn!("{} communication events outside any call", self.orphan_events);
        }
        info!(
            "Replay finished: {} call paths, {} failed locations",
            self.tree.len(),
            failures.len()
        );

        ReplayOutcome {
            tree: self.tree,
            definitions: self.definitions,
            failures,
            unclosed,
            orphan_events: self.orphan_events,
            metric_conflicts: self.metric_conflicts,
        }
    }

    fn enter(&mut self, location: LocationId, region: RegionId, time: Timestamp) -> Result<(), ReplayError> {
        let state = self.locations.entry(location).or_default();
        state.advance_clock(location, time)?;
        let parent = state.stack.last().map(|f| f.node);

        let node = self.tree.insert_node(region, parent);
        self.tree.add_function(node, location, &FunctionData::default());

        state.stack.push(Frame {
            node,
            entered: time,
            child_inclusive: 0,
            metric_first: std::mem::take(&mut state.pending_metrics),
            child_metrics: BTreeMap::new(),
            refused_metrics: BTreeSet::new(),
        });
        Ok(())
    }

    fn leave(&mut self, location: LocationId, time: Timestamp) -> Result<(), ReplayError> {
        let state = self.locations.entry(location).or_default();
        let frame = state
            .stack
            .pop()
            .ok_or(ReplayError::StackUnderflow { location })?;
        state.advance_clock(location, time)?;

        let inclusive = time - frame.entered;
        let mut stats = FunctionData::invocation();
        stats.add_inclusive(inclusive);
        stats.subtract_inclusive(frame.child_inclusive);
        self.tree.add_function(frame.node, location, &stats);

        if let Some(parent) = state.stack.last_mut() {
            parent.child_inclusive = parent.child_inclusive.saturating_add(inclusive);
        }

        for &metric in &frame.refused_metrics {
            debug!("Metric {} on location {}: child delta missing", metric, location);
            self.tree
                .node_data_mut(frame.node, location)
                .refuse_metric(metric);
        }

        let last_samples = std::mem::take(&mut state.pending_metrics);
        for (metric, last) in last_samples {
            // No sample at entry: the invocation contributes nothing
            let Some(first) = frame.metric_first.get(&metric) else {
                continue;
            };

            let own = if frame.refused_metrics.contains(&metric) {
                Err(NodeDataError::MetricRefused)
            } else {
                metric_invocation(&frame, metric, *first, last).and_then(|data| {
                    self.tree.add_metric(frame.node, location, metric, &data)?;
                    Ok(data.inclusive)
                })
            };

            let propagated = match (own, state.stack.last_mut()) {
                (Ok(delta), Some(parent)) => {
                    let slot = parent
                        .child_metrics
                        .entry(metric)
                        .or_insert_with(|| MetricValue::zero(delta.value_type()));
                    slot.checked_add(delta).map(|sum| *slot = sum)
                }
                (Ok(_), None) => Ok(()),
                (Err(err), _) => {
                    self.tree
                        .node_data_mut(frame.node, location)
                        .refuse_metric(metric);
                    Err(err)
                }
            };

            if let Err(err) = propagated {
                if err != NodeDataError::MetricRefused {
                    self.metric_conflicts += 1;
                    warn!("Metric {} on location {}: {}", metric, location, err);
                }
                // The parent's exclusive share is unknown without this delta
                if let Some(parent) = state.stack.last_mut() {
                    parent.refused_metrics.insert(metric);
                }
            }
        }
        Ok(())
    }

    fn transfer(
        &mut self,
        location: LocationId,
        direction: Direction,
        bytes: u64,
        collective: bool,
    ) -> Result<(), ReplayError> {
        let top = self
            .locations
            .get(&location)
            .and_then(|s| s.stack.last())
            .map(|f| f.node);

        let Some(node) = top else {
            self.orphan_events += 1;
            return Err(ReplayError::NoActiveCall {
                location,
                kind: if collective { "collective" } else { "message" },
            });
        };

        if collective {
            self.tree
                .add_collop(node, location, &CollopData::transfer(direction, bytes));
        } else {
            self.tree
                .add_message(node, location, &MessageData::transfer(direction, bytes));
        }
        Ok(())
    }

    fn sample(&mut self, location: LocationId, metric: MetricId, value: MetricValue, time: Timestamp) {
        if let Some(def) = self.definitions.metrics.get(&metric) {
            if def.value_type != value.value_type() {
                self.metric_conflicts += 1;
                warn!(
                    "Metric {} sample at {} on location {} is {}, defined as {}",
                    metric,
                    time,
                    location,
                    value.value_type(),
                    def.value_type
                );
                return;
            }
        }
        self.locations
            .entry(location)
            .or_default()
            .pending_metrics
            .insert(metric, value);
    }
}

/// Inclusive/exclusive metric data of one completed invocation
fn metric_invocation(
    frame: &Frame,
    metric: MetricId,
    first: MetricValue,
    last: MetricValue,
) -> Result<MetricData, NodeDataError> {
    let delta = last.checked_sub(first)?;
    let mut data = MetricData::from_delta(delta);
    if let Some(children) = frame.child_metrics.get(&metric) {
        data.subtract_inclusive(*children)?;
    }
    Ok(data)
}
