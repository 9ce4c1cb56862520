//! Per-location statistics kept on every call-path node.
//!
//! Every container has an associative, commutative `add`, so partial results
//! built by different analysis processes can be combined in any order.
//! Integer metric arithmetic wraps; counters, bytes and times saturate.

use crate::parser::events::Direction;
use crate::parser::schema::MetricId;
use crate::utils::error::NodeDataError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Timing statistics of one call path on one location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionData {
    /// Number of completed invocations
    pub count: u64,

    /// Time spent in the call including sub-calls
    pub inclusive_time: u64,

    /// Time spent in the call excluding sub-calls
    pub exclusive_time: u64,
}

impl FunctionData {
    pub fn new(count: u64, inclusive_time: u64, exclusive_time: u64) -> Self {
        Self {
            count,
            inclusive_time,
            exclusive_time,
        }
    }

    /// One completed invocation with no time attributed yet
    pub fn invocation() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn add(&mut self, other: &FunctionData) {
        self.count = self.count.saturating_add(other.count);
        self.inclusive_time = self.inclusive_time.saturating_add(other.inclusive_time);
        self.exclusive_time = self.exclusive_time.saturating_add(other.exclusive_time);
    }

    /// Attribute `delta` of own time: grows both inclusive and exclusive time
    pub fn add_inclusive(&mut self, delta: u64) {
        self.inclusive_time = self.inclusive_time.saturating_add(delta);
        self.exclusive_time = self.exclusive_time.saturating_add(delta);
    }

    /// Remove a child's inclusive time from this node's exclusive share
    pub fn subtract_inclusive(&mut self, delta: u64) {
        self.exclusive_time = self.exclusive_time.saturating_sub(delta);
    }
}

macro_rules! transfer_data {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub count_sent: u64,
            pub count_received: u64,
            pub bytes_sent: u64,
            pub bytes_received: u64,
        }

        impl $name {
            /// Statistics of a single transfer
            pub fn transfer(direction: Direction, bytes: u64) -> Self {
                let mut data = Self::default();
                data.record(direction, bytes);
                data
            }

            pub fn record(&mut self, direction: Direction, bytes: u64) {
                match direction {
                    Direction::Sent => {
                        self.count_sent = self.count_sent.saturating_add(1);
                        self.bytes_sent = self.bytes_sent.saturating_add(bytes);
                    }
                    Direction::Received => {
                        self.count_received = self.count_received.saturating_add(1);
                        self.bytes_received = self.bytes_received.saturating_add(bytes);
                    }
                }
            }

            pub fn add(&mut self, other: &$name) {
                self.count_sent = self.count_sent.saturating_add(other.count_sent);
                self.count_received = self.count_received.saturating_add(other.count_received);
                self.bytes_sent = self.bytes_sent.saturating_add(other.bytes_sent);
                self.bytes_received = self.bytes_received.saturating_add(other.bytes_received);
            }
        }
    };
}

transfer_data!(
    /// Point-to-point message statistics
    MessageData
);

transfer_data!(
    /// Collective communication statistics
    CollopData
);

/// Declared numeric type of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    U64,
    I64,
    F64,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricType::U64 => "uint64",
            MetricType::I64 => "int64",
            MetricType::F64 => "double",
        };
        f.write_str(name)
    }
}

/// A metric sample or accumulated metric value, tagged with its type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricValue {
    U64(u64),
    I64(i64),
    F64(f64),
}

impl MetricValue {
    pub fn zero(value_type: MetricType) -> Self {
        match value_type {
            MetricType::U64 => MetricValue::U64(0),
            MetricType::I64 => MetricValue::I64(0),
            MetricType::F64 => MetricValue::F64(0.0),
        }
    }

    pub fn value_type(&self) -> MetricType {
        match self {
            MetricValue::U64(_) => MetricType::U64,
            MetricValue::I64(_) => MetricType::I64,
            MetricValue::F64(_) => MetricType::F64,
        }
    }

    pub fn checked_add(self, other: MetricValue) -> Result<MetricValue, NodeDataError> {
        match (self, other) {
            (MetricValue::U64(a), MetricValue::U64(b)) => Ok(MetricValue::U64(a.wrapping_add(b))),
            (MetricValue::I64(a), MetricValue::I64(b)) => Ok(MetricValue::I64(a.wrapping_add(b))),
            (MetricValue::F64(a), MetricValue::F64(b)) => finite(a + b),
            (a, b) => Err(NodeDataError::TypeMismatch {
                expected: a.value_type(),
                found: b.value_type(),
            }),
        }
    }

    pub fn checked_sub(self, other: MetricValue) -> Result<MetricValue, NodeDataError> {
        match (self, other) {
            (MetricValue::U64(a), MetricValue::U64(b)) => Ok(MetricValue::U64(a.wrapping_sub(b))),
            (MetricValue::I64(a), MetricValue::I64(b)) => Ok(MetricValue::I64(a.wrapping_sub(b))),
            (MetricValue::F64(a), MetricValue::F64(b)) => finite(a - b),
            (a, b) => Err(NodeDataError::TypeMismatch {
                expected: a.value_type(),
                found: b.value_type(),
            }),
        }
    }
}

/// Doubles must stay finite: infinities and NaN have no JSON encoding
fn finite(value: f64) -> Result<MetricValue, NodeDataError> {
    if value.is_finite() {
        Ok(MetricValue::F64(value))
    } else {
        Err(NodeDataError::NonFiniteValue)
    }
}

/// Accumulated value of one metric on one call path and location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub value_type: MetricType,
    pub inclusive: MetricValue,
    pub exclusive: MetricValue,
}

impl MetricData {
    pub fn zero(value_type: MetricType) -> Self {
        Self {
            value_type,
            inclusive: MetricValue::zero(value_type),
            exclusive: MetricValue::zero(value_type),
        }
    }

    /// Data for one invocation whose metric grew by `delta`
    pub fn from_delta(delta: MetricValue) -> Self {
        Self {
            value_type: delta.value_type(),
            inclusive: delta,
            exclusive: delta,
        }
    }

    /// Combine with `other`; on error `self` is left unchanged
    pub fn add(&mut self, other: &MetricData) -> Result<(), NodeDataError> {
        self.check_type(other.value_type)?;
        let inclusive = self.inclusive.checked_add(other.inclusive)?;
        let exclusive = self.exclusive.checked_add(other.exclusive)?;
        self.inclusive = inclusive;
        self.exclusive = exclusive;
        Ok(())
    }

    pub fn add_inclusive(&mut self, delta: MetricValue) -> Result<(), NodeDataError> {
        self.check_type(delta.value_type())?;
        let inclusive = self.inclusive.checked_add(delta)?;
        let exclusive = self.exclusive.checked_add(delta)?;
        self.inclusive = inclusive;
        self.exclusive = exclusive;
        Ok(())
    }

    pub fn subtract_inclusive(&mut self, delta: MetricValue) -> Result<(), NodeDataError> {
        self.check_type(delta.value_type())?;
        self.exclusive = self.exclusive.checked_sub(delta)?;
        Ok(())
    }

    fn check_type(&self, found: MetricType) -> Result<(), NodeDataError> {
        if self.value_type == found {
            Ok(())
        } else {
            Err(NodeDataError::TypeMismatch {
                expected: self.value_type,
                found,
            })
        }
    }
}

/// Everything recorded for one location on one call-path node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub function: FunctionData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collop: Option<CollopData>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<MetricId, MetricData>,

    /// Metrics that conflicted once and now refuse every update; a refused
    /// metric keeps no value in `metrics`
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub refused_metrics: BTreeSet<MetricId>,
}

impl NodeData {
    pub fn add_function(&mut self, data: &FunctionData) {
        self.function.add(data);
    }

    pub fn add_message(&mut self, data: &MessageData) {
        self.message.get_or_insert_with(MessageData::default).add(data);
    }

    pub fn add_collop(&mut self, data: &CollopData) {
        self.collop.get_or_insert_with(CollopData::default).add(data);
    }

    /// Combine metric data; a conflict poisons the metric for this location
    pub fn add_metric(&mut self, metric: MetricId, data: &MetricData) -> Result<(), NodeDataError> {
        if self.refused_metrics.contains(&metric) {
            return Err(NodeDataError::MetricRefused);
        }

        let slot = self
            .metrics
            .entry(metric)
            .or_insert_with(|| MetricData::zero(data.value_type));

        if let Err(err) = slot.add(data) {
            self.refuse_metric(metric);
            return Err(err);
        }
        Ok(())
    }

    /// Drop the value of `metric` and refuse every later update
    pub fn refuse_metric(&mut self, metric: MetricId) {
        self.metrics.remove(&metric);
        self.refused_metrics.insert(metric);
    }

    /// Combine everything from `other`; returns the first metric failure after
    /// applying all other updates
    pub fn add(&mut self, other: &NodeData) -> Result<(), NodeDataError> {
        self.add_function(&other.function);
        if let Some(message) = &other.message {
            self.add_message(message);
        }
        if let Some(collop) = &other.collop {
            self.add_collop(collop);
        }
        for &metric in &other.refused_metrics {
            self.refuse_metric(metric);
        }

        let mut first_error = None;
        for (metric, data) in &other.metrics {
            // A refused metric absorbs values from either side
            if self.refused_metrics.contains(metric) {
                continue;
            }
            if let Err(err) = self.add_metric(*metric, data) {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen, QuickCheck};

    #[test]
    fn test_function_add_sums_fields() {
        let mut a = FunctionData::new(1, 50, 20);
        a.add(&FunctionData::new(2, 30, 30));
        assert_eq!(a, FunctionData::new(3, 80, 50));
    }

    #[test]
    fn test_function_inclusive_adjustments() {
        let mut data = FunctionData::invocation();
        data.add_inclusive(50);
        data.subtract_inclusive(20);
        assert_eq!(data, FunctionData::new(1, 50, 30));
        assert!(data.exclusive_time <= data.inclusive_time);
    }

    #[test]
    fn test_transfer_record_by_direction() {
        let mut msg = MessageData::transfer(Direction::Sent, 128);
        msg.record(Direction::Received, 64);
        msg.record(Direction::Sent, 32);

        assert_eq!(msg.count_sent, 2);
        assert_eq!(msg.bytes_sent, 160);
        assert_eq!(msg.count_received, 1);
        assert_eq!(msg.bytes_received, 64);
    }

    #[test]
    fn test_metric_type_mismatch() {
        let mut data = MetricData::from_delta(MetricValue::U64(10));
        let err = data.add(&MetricData::from_delta(MetricValue::F64(1.5))).unwrap_err();
        assert_eq!(
            err,
            NodeDataError::TypeMismatch {
                expected: MetricType::U64,
                found: MetricType::F64,
            }
        );
        // Receiver untouched
        assert_eq!(data.inclusive, MetricValue::U64(10));
    }

    #[test]
    fn test_metric_subtract_inclusive() {
        let mut data = MetricData::from_delta(MetricValue::I64(80));
        data.subtract_inclusive(MetricValue::I64(30)).unwrap();
        assert_eq!(data.inclusive, MetricValue::I64(80));
        assert_eq!(data.exclusive, MetricValue::I64(50));
    }

    #[test]
    fn test_mismatched_metric_is_refused_afterwards() {
        let mut node = NodeData::default();
        node.add_metric(7, &MetricData::from_delta(MetricValue::U64(1)))
            .unwrap();

        assert!(node
            .add_metric(7, &MetricData::from_delta(MetricValue::I64(1)))
            .is_err());
        assert_eq!(
            node.add_metric(7, &MetricData::from_delta(MetricValue::U64(1))),
            Err(NodeDataError::MetricRefused)
        );
        // Other metrics are unaffected
        assert!(node
            .add_metric(8, &MetricData::from_delta(MetricValue::I64(1)))
            .is_ok());
    }

    #[test]
    fn test_refused_metric_absorbs_from_either_side() {
        let mut refused = NodeData::default();
        refused
            .add_metric(4, &MetricData::from_delta(MetricValue::U64(1)))
            .unwrap();
        assert!(refused
            .add_metric(4, &MetricData::from_delta(MetricValue::F64(1.0)))
            .is_err());
        assert!(refused.metrics.is_empty());

        let mut valued = NodeData::default();
        valued
            .add_metric(4, &MetricData::from_delta(MetricValue::U64(9)))
            .unwrap();

        let mut left = refused.clone();
        left.add(&valued).unwrap();
        let mut right = valued.clone();
        right.add(&refused).unwrap();

        assert_eq!(left, right);
        assert!(left.metrics.is_empty());
        assert!(left.refused_metrics.contains(&4));
    }

    #[test]
    fn test_non_finite_double_is_rejected() {
        let huge = MetricValue::F64(1.7e308);
        assert_eq!(
            huge.checked_sub(MetricValue::F64(-1.7e308)),
            Err(NodeDataError::NonFiniteValue)
        );

        let mut node = NodeData::default();
        node.add_metric(2, &MetricData::from_delta(huge)).unwrap();
        assert_eq!(
            node.add_metric(2, &MetricData::from_delta(huge)),
            Err(NodeDataError::NonFiniteValue)
        );
        assert!(node.metrics.is_empty());
        assert!(node.refused_metrics.contains(&2));
    }

    #[test]
    fn test_node_data_add_creates_optional_parts() {
        let mut a = NodeData::default();
        let mut b = NodeData::default();
        b.add_collop(&CollopData::transfer(Direction::Received, 8));

        a.add(&b).unwrap();
        assert!(a.message.is_none());
        assert_eq!(a.collop.map(|c| c.bytes_received), Some(8));
    }

    #[derive(Debug, Clone)]
    struct Sample(NodeData);

    impl Arbitrary for Sample {
        fn arbitrary(g: &mut Gen) -> Self {
            let small = |g: &mut Gen| u64::arbitrary(g) % 1_000_000;
            let mut data = NodeData::default();
            data.add_function(&FunctionData::new(small(g), small(g), small(g)));
            if bool::arbitrary(g) {
                data.add_message(&MessageData::transfer(Direction::Sent, small(g)));
            }
            if bool::arbitrary(g) {
                data.add_collop(&CollopData::transfer(Direction::Received, small(g)));
            }
            if bool::arbitrary(g) {
                let delta = MetricValue::I64(i64::arbitrary(g));
                data.add_metric(1, &MetricData::from_delta(delta)).ok();
            }
            if bool::arbitrary(g) {
                // Quarter steps keep double sums exact in any grouping
                let delta = MetricValue::F64(f64::from(i32::arbitrary(g) % 1_000_000) * 0.25);
                data.add_metric(2, &MetricData::from_delta(delta)).ok();
            }
            if bool::arbitrary(g) {
                // Metric 3 changes type between samples and ends up refused
                let delta = if bool::arbitrary(g) {
                    MetricValue::U64(u64::arbitrary(g))
                } else {
                    MetricValue::I64(i64::arbitrary(g))
                };
                data.add_metric(3, &MetricData::from_delta(delta)).ok();
            }
            Sample(data)
        }
    }

    fn combined(a: &NodeData, b: &NodeData) -> NodeData {
        let mut out = a.clone();
        // Conflicts only poison metrics; the combined value is still defined
        out.add(b).ok();
        out
    }

    #[test]
    fn prop_add_is_associative() {
        fn prop(a: Sample, b: Sample, c: Sample) -> bool {
            let left = combined(&combined(&a.0, &b.0), &c.0);
            let right = combined(&a.0, &combined(&b.0, &c.0));
            left == right
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Sample, Sample, Sample) -> bool);
    }

    #[test]
    fn prop_add_is_commutative() {
        fn prop(a: Sample, b: Sample) -> bool {
            combined(&a.0, &b.0) == combined(&b.0, &a.0)
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Sample, Sample) -> bool);
    }
}
