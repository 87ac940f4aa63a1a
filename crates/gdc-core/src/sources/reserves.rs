//! Implicit modelling of balancing reserves.

use serde::{Deserialize, Serialize};

/// Per-region balancing reserves, modeled implicitly: extra demand in every
/// hour plus a blanket slack requirement on dispatchable hydropower.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reserves {
    /// Additional demand in each hour in MW.
    pub additional_load_mw: f64,
    /// Required headroom on hydropower discharging capacity in MW.
    pub hydro_capacity_reduction_mw: f64,
}

impl Reserves {
    pub fn merged(&self, other: &Reserves) -> Reserves {
        Reserves {
            additional_load_mw: self.additional_load_mw + other.additional_load_mw,
            hydro_capacity_reduction_mw: self.hydro_capacity_reduction_mw
                + other.hydro_capacity_reduction_mw,
        }
    }
}
