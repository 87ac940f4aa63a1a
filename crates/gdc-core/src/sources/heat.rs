//! Heat coupling of dispatchable sources.

use serde::{Deserialize, Serialize};

/// How a dispatchable source produces district heat next to electricity.
/// Each variant drives a distinct constraint pattern in the LP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeatCoupling {
    /// Heat production is proportional to electricity production and cannot
    /// be curtailed.
    BackPressure {
        /// MW of heat produced per MW of electricity.
        ratio_heat_mw_per_el_mw: f64,
    },
    /// Steam extraction trades electricity for heat between a base ratio
    /// (no extraction) and a maximum given by the minimum allowed
    /// electricity share.
    Extraction {
        /// MW of heat per MW of electricity when no steam gets extracted.
        base_ratio_heat_mw_per_el_mw: f64,
        /// MW of heat "bought" per MW of decreased electricity.
        heat_mw_per_decreased_el_mw: f64,
        /// Minimum allowed proportion of electricity production when steam
        /// extraction is at its maximum.
        min_ratio_el: f64,
    },
    /// Waste exhaust heat that can be recovered up to a maximum ratio and
    /// can always just be let go.
    HeatRecovery {
        max_heat_mw_per_el_mw: f64,
    },
}

impl HeatCoupling {
    /// Canonical extraction turbine parameters.
    pub fn canonical_extraction() -> Self {
        HeatCoupling::Extraction {
            base_ratio_heat_mw_per_el_mw: 0.0,
            heat_mw_per_decreased_el_mw: 3.0,
            min_ratio_el: 0.4,
        }
    }

    /// Canonical back-pressure turbine parameters.
    pub fn canonical_back_pressure() -> Self {
        HeatCoupling::BackPressure {
            ratio_heat_mw_per_el_mw: 2.0,
        }
    }
}
