//! Fuel and allowance price sets.
//!
//! Variable and ramp-up costs of fuel-burning sources are derived from
//! these inputs at entity-construction time, so one scenario can be
//! evaluated under several price worlds.

use gdc_core::{GridError, GridResult};
use serde::{Deserialize, Serialize};

const EFFICIENCY_COAL: f64 = 0.4;

/// The set of fuel prices (per MWh of lower heating value) and the carbon
/// price for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputCosts {
    /// Price of carbon emissions in EUR per metric ton of CO₂.
    pub emission_price_per_t_eur: f64,
    pub lignite_price_per_mwh_lhv_eur: f64,
    pub biomass_price_per_mwh_lhv_eur: f64,
    pub biogas_price_per_mwh_lhv_eur: f64,
    pub hard_coal_price_per_mwh_lhv_eur: f64,
    pub fossil_gas_price_per_mwh_lhv_eur: f64,
    pub biomethane_price_per_mwh_lhv_eur: f64,
}

impl InputCosts {
    /// Price levels of the early 2020s.
    pub fn current() -> Self {
        InputCosts {
            emission_price_per_t_eur: 90.0,
            lignite_price_per_mwh_lhv_eur: 10.0,
            // Assumes a feed-in premium of around 100 EUR/MWh el.
            biomass_price_per_mwh_lhv_eur: 20.0 * EFFICIENCY_COAL,
            biogas_price_per_mwh_lhv_eur: 20.0 * EFFICIENCY_COAL,
            // Computed from the price per 1000 tons of coal (8.141 MWh of
            // thermal energy).
            hard_coal_price_per_mwh_lhv_eur: 220.0 / 8.141,
            fossil_gas_price_per_mwh_lhv_eur: 70.0,
            biomethane_price_per_mwh_lhv_eur: 50.0,
        }
    }

    /// Central 2030 estimate.
    pub fn year_2030() -> Self {
        InputCosts {
            emission_price_per_t_eur: 120.0,
            lignite_price_per_mwh_lhv_eur: 10.0 * EFFICIENCY_COAL,
            biomass_price_per_mwh_lhv_eur: 20.0 * EFFICIENCY_COAL,
            biogas_price_per_mwh_lhv_eur: 20.0 * EFFICIENCY_COAL,
            hard_coal_price_per_mwh_lhv_eur: 120.0 / 8.141,
            fossil_gas_price_per_mwh_lhv_eur: 25.0,
            biomethane_price_per_mwh_lhv_eur: 50.0,
        }
    }

    pub fn by_name(name: &str) -> GridResult<Self> {
        match name {
            "current" => Ok(InputCosts::current()),
            "2030" => Ok(InputCosts::year_2030()),
            "2030-cheap-ets" => Ok(InputCosts {
                emission_price_per_t_eur: 40.0,
                ..InputCosts::year_2030()
            }),
            "2030-higher-ets" => Ok(InputCosts {
                emission_price_per_t_eur: 200.0,
                ..InputCosts::year_2030()
            }),
            other => Err(GridError::Config(format!(
                "input costs key '{other}' is not defined"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_by_name() {
        assert_eq!(InputCosts::by_name("current").unwrap(), InputCosts::current());
        let cheap = InputCosts::by_name("2030-cheap-ets").unwrap();
        assert_eq!(cheap.emission_price_per_t_eur, 40.0);
        assert_eq!(
            cheap.fossil_gas_price_per_mwh_lhv_eur,
            InputCosts::year_2030().fossil_gas_price_per_mwh_lhv_eur
        );
        assert!(InputCosts::by_name("2077").is_err());
    }
}
