//! Region, metric and location definition tables.
//!
//! Events only carry numeric ids; names are resolved against these tables
//! after replay, so definitions may arrive in any order relative to the
//! events that use them. A lookup that finds nothing is logged and counted,
//! and the caller omits whatever it wanted to derive from it.

use super::schema::{LocationId, MetricId, RegionId};
use crate::aggregator::node_data::MetricType;
use crate::utils::error::DefinitionError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;

/// An instrumented code unit or operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDef {
    pub id: RegionId,
    pub name: String,

    /// Programming model the region belongs to (mpi, openmp, user, ...)
    #[serde(default)]
    pub paradigm: Option<String>,

    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDef {
    pub id: MetricId,
    pub name: String,
    pub value_type: MetricType,

    #[serde(default)]
    pub unit: Option<String>,
}

/// Kind of execution stream a location stands for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    #[default]
    Thread,
    Process,
    GpuStream,
}

/// A thread, process or accelerator stream that produced events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDef {
    pub id: LocationId,
    pub name: String,

    #[serde(default)]
    pub kind: LocationKind,

    /// Rank of the owning process
    #[serde(default)]
    pub process: u64,

    #[serde(default)]
    pub node: Option<String>,

    #[serde(default)]
    pub machine: Option<String>,
}

/// Definition tables shared by replay, summaries and the system tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub regions: BTreeMap<RegionId, RegionDef>,

    #[serde(default)]
    pub metrics: BTreeMap<MetricId, MetricDef>,

    #[serde(default)]
    pub locations: BTreeMap<LocationId, LocationDef>,

    #[serde(skip)]
    unknown_lookups: Cell<usize>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_region(&mut self, def: RegionDef) {
        if let Some(previous) = self.regions.get(&def.id) {
            if previous != &def {
                warn!("Region {} redefined as '{}'", def.id, def.name);
            }
        }
        self.regions.insert(def.id, def);
    }

    pub fn insert_metric(&mut self, def: MetricDef) {
        if let Some(previous) = self.metrics.get(&def.id) {
            if previous != &def {
                warn!("Metric {} redefined as '{}'", def.id, def.name);
            }
        }
        self.metrics.insert(def.id, def);
    }

    pub fn insert_location(&mut self, def: LocationDef) {
        if let Some(previous) = self.locations.get(&def.id) {
            if previous != &def {
                warn!("Location {} redefined as '{}'", def.id, def.name);
            }
        }
        self.locations.insert(def.id, def);
    }

    /// Take over every definition of `other`
    pub fn extend(&mut self, other: Definitions) {
        for def in other.regions.into_values() {
            self.insert_region(def);
        }
        for def in other.metrics.into_values() {
            self.insert_metric(def);
        }
        for def in other.locations.into_values() {
            self.insert_location(def);
        }
        self.unknown_lookups
            .set(self.unknown_lookups.get() + other.unknown_lookups.get());
    }

    pub fn region(&self, id: RegionId) -> Result<&RegionDef, DefinitionError> {
        self.regions
            .get(&id)
            .ok_or_else(|| self.miss(DefinitionError::UnknownRegion(id)))
    }

    pub fn metric(&self, id: MetricId) -> Result<&MetricDef, DefinitionError> {
        self.metrics
            .get(&id)
            .ok_or_else(|| self.miss(DefinitionError::UnknownMetric(id)))
    }

    pub fn location(&self, id: LocationId) -> Result<&LocationDef, DefinitionError> {
        self.locations
            .get(&id)
            .ok_or_else(|| self.miss(DefinitionError::UnknownLocation(id)))
    }

    /// Region name, or a `region#<id>` placeholder when undefined
    pub fn region_name(&self, id: RegionId) -> String {
        match self.region(id) {
            Ok(def) => def.name.clone(),
            Err(_) => format!("region#{}", id),
        }
    }

    /// Number of lookups that referenced an undefined id
    pub fn unknown_lookups(&self) -> usize {
        self.unknown_lookups.get()
    }

    fn miss(&self, err: DefinitionError) -> DefinitionError {
        self.unknown_lookups.set(self.unknown_lookups.get() + 1);
        if self.unknown_lookups.get() == 1 {
            warn!("Incomplete trace definitions: {}", err);
        } else {
            debug!("Incomplete trace definitions: {}", err);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: RegionId, name: &str) -> RegionDef {
        RegionDef {
            id,
            name: name.to_string(),
            paradigm: None,
            file: None,
            line: None,
        }
    }

    #[test]
    fn test_known_region_lookup() {
        let mut defs = Definitions::new();
        defs.insert_region(region(1, "main"));

        assert_eq!(defs.region(1).unwrap().name, "main");
        assert_eq!(defs.region_name(1), "main");
        assert_eq!(defs.unknown_lookups(), 0);
    }

    #[test]
    fn test_unknown_lookups_are_counted() {
        let defs = Definitions::new();

        assert_eq!(defs.region(9), Err(DefinitionError::UnknownRegion(9)));
        assert_eq!(defs.region_name(9), "region#9");
        assert!(defs.location(4).is_err());
        assert_eq!(defs.unknown_lookups(), 3);
    }

    #[test]
    fn test_extend_prefers_incoming() {
        let mut a = Definitions::new();
        a.insert_region(region(1, "old"));

        let mut b = Definitions::new();
        b.insert_region(region(1, "new"));
        b.insert_region(region(2, "other"));

        a.extend(b);
        assert_eq!(a.regions.len(), 2);
        assert_eq!(a.region_name(1), "new");
    }
}
