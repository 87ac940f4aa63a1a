//! Cross-border transmission links.
//!
//! Interconnectors are directed; a symmetric declaration expands into two
//! directed instances with the same parameters. The link graph may contain
//! cycles: only the post-solve export-flow walk needs an ordering, and it
//! operates on a per-hour thresholded subgraph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::region::Region;

/// Fee charged to the exporting side per MWh of flow, reflecting
/// interconnection capacity costs in the European market.
pub const OUTFLOW_CAPACITY_COST_EUR_PER_MWH: f64 = 2.0;

/// Very simplistic classification of interconnector technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterconnectorKind {
    AcOverland,
    HvdcSubmarine,
}

impl InterconnectorKind {
    pub fn id(&self) -> &'static str {
        match self {
            InterconnectorKind::AcOverland => "land_ac",
            InterconnectorKind::HvdcSubmarine => "sea_dc",
        }
    }
}

/// A directed cross-border link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interconnector {
    /// Maximum power the interconnector can carry.
    pub capacity_mw: f64,
    /// Part of the capacity with no capex costs (preexisting capacity).
    pub paid_off_capacity_mw: f64,
    /// Loss as a ratio of the current flow.
    pub loss: f64,
    /// Length of the line in km. Costs are only calculated when non-zero.
    pub length_km: f64,
    pub kind: InterconnectorKind,
}

impl Interconnector {
    pub fn new(capacity_mw: f64, loss: f64) -> Self {
        Interconnector {
            capacity_mw,
            paid_off_capacity_mw: 0.0,
            loss,
            length_km: 0.0,
            kind: InterconnectorKind::AcOverland,
        }
    }

    pub fn validate(&self, from: &Region, to: &Region) -> GridResult<()> {
        if !(0.0..1.0).contains(&self.loss) {
            return Err(GridError::Config(format!(
                "interconnector {from}->{to}: loss must be in [0, 1), got {}",
                self.loss
            )));
        }
        if self.capacity_mw < 0.0 || self.paid_off_capacity_mw > self.capacity_mw {
            return Err(GridError::Config(format!(
                "interconnector {from}->{to}: paid-off capacity must not exceed capacity"
            )));
        }
        Ok(())
    }
}

/// The directed link graph of the dispatch problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interconnectors {
    pub from_to: BTreeMap<Region, BTreeMap<Region, Interconnector>>,
}

impl Interconnectors {
    pub fn new() -> Self {
        Interconnectors::default()
    }

    /// Insert a directed link.
    pub fn insert(&mut self, from: Region, to: Region, link: Interconnector) {
        self.from_to.entry(from).or_default().insert(to, link);
    }

    /// Insert a pair of directed links with the same parameters.
    pub fn insert_symmetric(&mut self, a: Region, b: Region, link: Interconnector) {
        self.insert(a.clone(), b.clone(), link.clone());
        self.insert(b, a, link);
    }

    /// All links leaving the given region.
    pub fn connections_from(&self, source: &Region) -> BTreeMap<Region, Interconnector> {
        self.from_to.get(source).cloned().unwrap_or_default()
    }

    /// All links entering the given region.
    pub fn connections_to(&self, target: &Region) -> BTreeMap<Region, Interconnector> {
        self.from_to
            .iter()
            .filter_map(|(from, to_map)| {
                to_map.get(target).map(|link| (from.clone(), link.clone()))
            })
            .collect()
    }

    pub fn validate(&self) -> GridResult<()> {
        for (from, to_map) in &self.from_to {
            for (to, link) in to_map {
                link.validate(from, to)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_insert() {
        let mut links = Interconnectors::new();
        links.insert_symmetric(
            Region::new("DE"),
            Region::new("AT"),
            Interconnector::new(5000.0, 0.02),
        );
        let from_de = links.connections_from(&Region::new("DE"));
        let to_de = links.connections_to(&Region::new("DE"));
        assert_eq!(from_de.len(), 1);
        assert_eq!(to_de.len(), 1);
        assert_eq!(from_de[&Region::new("AT")].capacity_mw, 5000.0);
    }

    #[test]
    fn test_connections_to() {
        let mut links = Interconnectors::new();
        links.insert(
            Region::new("CZ"),
            Region::new("DE"),
            Interconnector::new(2100.0, 0.02),
        );
        links.insert(
            Region::new("PL"),
            Region::new("DE"),
            Interconnector::new(2500.0, 0.02),
        );
        let to_de = links.connections_to(&Region::new("DE"));
        assert_eq!(to_de.len(), 2);
        assert!(links.connections_to(&Region::new("CZ")).is_empty());
    }

    #[test]
    fn test_loss_validation() {
        let mut links = Interconnectors::new();
        links.insert(
            Region::new("CZ"),
            Region::new("DE"),
            Interconnector::new(2100.0, 1.0),
        );
        assert!(links.validate().is_err());
    }
}
