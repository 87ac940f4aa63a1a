//! Entity model of the dispatch problem.
//!
//! The original configuration of this kind of model is a free-form parameter
//! map with default filling. Here every entity kind is a tagged struct whose
//! shared prefix is [`SourceBase`]; default filling lives in explicit
//! constructors (see the scenarios crate) and the invariants are checked by
//! `validate` methods at construction time, before the LP is ever built.

mod basic;
mod flexible;
mod heat;
mod reserves;
mod storage;

pub use basic::{BasicFlexibility, BasicSource, BasicSourceType, ProfileOverride};
pub use flexible::{FlexibleSource, FlexibleSourceType, ProductionLimit};
pub use heat::HeatCoupling;
pub use reserves::Reserves;
pub use storage::{Storage, StorageType, StorageUse};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::economics::SourceEconomics;
use crate::error::{GridError, GridResult};

/// Attributes shared by every source kind (basic, flexible, storage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBase {
    /// Installed capacity (that capacity optimization may decrease).
    pub capacity_mw: f64,
    /// The minimal installed capacity, used in capacity optimization.
    pub min_capacity_mw: f64,
    /// Capacity that is considered already paid off. Must be at most the
    /// minimal installed capacity: paid-off capacity never enters the
    /// optimization, it only decreases reported total system costs.
    pub paid_off_capacity_mw: f64,
    /// Is this source classified as renewable? Only used for statistics.
    pub renewable: bool,
    /// Virtual sources (such as loss of load) help meet the optimization
    /// constraints but are excluded from capex and capacity statistics.
    pub is_virtual: bool,
    /// Carbon intensity, used for statistics.
    pub co2_t_mwh: f64,
    pub economics: SourceEconomics,
}

impl SourceBase {
    /// A zero-capacity, cost-free base. Starting point for tests and for
    /// constructors that fill in concrete parameters.
    pub fn new(capacity_mw: f64, economics: SourceEconomics) -> Self {
        SourceBase {
            capacity_mw,
            min_capacity_mw: 0.0,
            paid_off_capacity_mw: 0.0,
            renewable: false,
            is_virtual: false,
            co2_t_mwh: 0.0,
            economics,
        }
    }

    /// Fix both capacity bounds, excluding the source from capacity
    /// optimization.
    pub fn with_fixed_capacity(mut self) -> Self {
        self.min_capacity_mw = self.capacity_mw;
        self
    }

    pub fn validate(&self, what: &str) -> GridResult<()> {
        if self.paid_off_capacity_mw > self.min_capacity_mw {
            return Err(GridError::Config(format!(
                "{what}: paid-off capacity {} MW must be below min capacity {} MW",
                self.paid_off_capacity_mw, self.min_capacity_mw
            )));
        }
        if self.min_capacity_mw > self.capacity_mw {
            return Err(GridError::Config(format!(
                "{what}: min capacity {} MW must be below capacity {} MW",
                self.min_capacity_mw, self.capacity_mw
            )));
        }
        self.economics.validate(what)
    }

    /// Sum of two bases for region aggregation. Capacities add up; the
    /// economics of `self` win when they differ (with a warning, as summary
    /// figures for the aggregate become approximate).
    pub(crate) fn merged(&self, other: &SourceBase, what: &str) -> SourceBase {
        if self.economics != other.economics {
            warn!("different economics for {what} when aggregating, picking one of the values; summary figures will be approximate");
        }
        SourceBase {
            capacity_mw: self.capacity_mw + other.capacity_mw,
            min_capacity_mw: self.min_capacity_mw + other.min_capacity_mw,
            paid_off_capacity_mw: self.paid_off_capacity_mw + other.paid_off_capacity_mw,
            renewable: self.renewable,
            is_virtual: self.is_virtual,
            co2_t_mwh: self.co2_t_mwh,
            economics: self.economics.clone(),
        }
    }
}

/// Capacity-weighted average with equal-value fallback when both weights are
/// zero.
pub(crate) fn weighted_average(a: f64, weight_a: f64, b: f64, weight_b: f64) -> GridResult<f64> {
    let total = weight_a + weight_b;
    if total > 0.0 {
        Ok((a * weight_a + b * weight_b) / total)
    } else if a == b {
        Ok(a)
    } else {
        Err(GridError::Numeric(format!(
            "cannot average {a} and {b} with zero total weight"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_off_above_min_rejected() {
        let mut base = SourceBase::new(100.0, SourceEconomics::free());
        base.paid_off_capacity_mw = 10.0;
        assert!(base.validate("test").is_err());
        base.min_capacity_mw = 10.0;
        base.validate("test").unwrap();
    }

    #[test]
    fn test_min_above_capacity_rejected() {
        let mut base = SourceBase::new(100.0, SourceEconomics::free());
        base.min_capacity_mw = 200.0;
        assert!(base.validate("test").is_err());
    }

    #[test]
    fn test_merged_sums_capacities() {
        let a = SourceBase::new(100.0, SourceEconomics::free()).with_fixed_capacity();
        let b = SourceBase::new(50.0, SourceEconomics::free());
        let merged = a.merged(&b, "test");
        assert_eq!(merged.capacity_mw, 150.0);
        assert_eq!(merged.min_capacity_mw, 100.0);
    }

    #[test]
    fn test_weighted_average() {
        assert_eq!(weighted_average(1.0, 1.0, 3.0, 1.0).unwrap(), 2.0);
        assert_eq!(weighted_average(0.9, 0.0, 0.9, 0.0).unwrap(), 0.9);
        assert!(weighted_average(0.9, 0.0, 0.8, 0.0).is_err());
    }
}
