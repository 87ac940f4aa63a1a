//! Canonical per-technology parameter defaults.
//!
//! Cost figures follow the IEA World Energy Outlook 2023 (Europe), the
//! Danish Energy Agency technology catalogue and Ember's New Generation
//! report, converted to 2022 EUR. Scenario configurations overlay their own
//! values over these.

use gdc_core::{BasicSourceType, FlexibleSourceType, StorageType, StorageUse};
use gdc_ts::keys;

use crate::params::{
    BasicSourceParams, EconomicsParams, ExtractionParams, FlexibleSourceParams, Fuel,
    FuelCostParams, StorageParams,
};

pub(crate) fn usd_to_eur_2022(usd: f64) -> f64 {
    usd * 0.95
}

/// Price of nuclear fuel per MWh of electricity.
pub const NUCLEAR_FUEL_PRICE_EUR_MWH_EL: f64 = 12.0;
const NUCLEAR_EFFICIENCY: f64 = 0.33;

const EFFICIENCY_CCGT: f64 = 0.56;
const EFFICIENCY_OCGT: f64 = 0.4;
const EFFICIENCY_COAL: f64 = 0.4;
const EFFICIENCY_COAL_BACKPRESSURE: f64 = 0.3;

const EMISSIONS_GAS_PER_MWH_LHV_T: f64 = 0.22;
const EMISSIONS_HARD_COAL_PER_MWH_LHV_T: f64 = 0.76 * EFFICIENCY_COAL;
const EMISSIONS_LIGNITE_PER_MWH_LHV_T: f64 = 1.0 * EFFICIENCY_COAL;

const PUMPED_CHARGING_EFFICIENCY: f64 = 0.8;
const PUMPED_DISCHARGING_EFFICIENCY: f64 = 0.9;

/// Cost of buying a MWh of hydrogen on the market (2 EUR/kg at 33.33
/// kWh/kg LHV).
const COST_FOR_MWH_HYDROGEN_EUR: f64 = 2.0 * 30.0;

fn renewable_economics(overnight: f64, fixed_o_m: f64, discount_rate: f64) -> EconomicsParams {
    EconomicsParams {
        overnight_costs_per_kw_eur: Some(overnight),
        construction_time_years: Some(1.0),
        lifetime_years: Some(25.0),
        fixed_o_m_costs_per_kw_eur: Some(fixed_o_m),
        variable_costs_per_mwh_eur: Some(0.0),
        discount_rate: Some(discount_rate),
        ..EconomicsParams::default()
    }
}

/// Defaults for a basic source kind.
pub fn basic_source_defaults(kind: BasicSourceType) -> BasicSourceParams {
    match kind {
        BasicSourceType::Solar => BasicSourceParams {
            renewable: Some(true),
            economics: renewable_economics(usd_to_eur_2022(900.0), usd_to_eur_2022(12.0), 1.05),
            ..BasicSourceParams::default()
        },
        BasicSourceType::Onshore => BasicSourceParams {
            renewable: Some(true),
            economics: renewable_economics(usd_to_eur_2022(1750.0), usd_to_eur_2022(35.0), 1.05),
            ..BasicSourceParams::default()
        },
        BasicSourceType::Offshore => BasicSourceParams {
            renewable: Some(true),
            economics: renewable_economics(usd_to_eur_2022(3430.0), usd_to_eur_2022(65.0), 1.06),
            ..BasicSourceParams::default()
        },
        BasicSourceType::Hydro => BasicSourceParams {
            renewable: Some(true),
            economics: EconomicsParams {
                construction_time_years: Some(5.0),
                lifetime_years: Some(80.0),
                variable_costs_per_mwh_eur: Some(4.0),
                overnight_costs_per_kw_eur: Some(2700.0),
                fixed_o_m_costs_per_kw_eur: Some(15.0),
                ..EconomicsParams::default()
            },
            ..BasicSourceParams::default()
        },
        BasicSourceType::Nuclear => BasicSourceParams {
            renewable: Some(false),
            // Flexible by default with zero flexibility.
            flexible: Some(true),
            max_decrease_mw: Some(0.0),
            ramp_rate: Some(0.5),
            ramp_up_cost_mw_eur: Some(gdc_core::opex::ramp_up_cost_per_mw_eur(
                21.0,
                // Assuming lower consumption for hot nuclear restarts.
                8.0,
                NUCLEAR_FUEL_PRICE_EUR_MWH_EL * NUCLEAR_EFFICIENCY,
                0.0,
                0.0,
            )),
            economics: EconomicsParams {
                construction_time_years: Some(7.0),
                lifetime_years: Some(60.0),
                decommissioning_time_years: Some(10.0),
                decommissioning_cost_ratio: Some(0.15),
                variable_costs_per_mwh_eur: Some(NUCLEAR_FUEL_PRICE_EUR_MWH_EL + 10.0),
                overnight_costs_per_kw_eur: Some(usd_to_eur_2022(6600.0)),
                fixed_o_m_costs_per_kw_eur: Some(usd_to_eur_2022(100.0)),
                ..EconomicsParams::default()
            },
            ..BasicSourceParams::default()
        },
    }
}

fn coal_fuel_costs(fuel: Fuel, efficiency_el: f64, emissions: f64) -> FuelCostParams {
    FuelCostParams {
        variable_o_m_per_mwh_el_eur: 5.0,
        wear_cost_per_mw_eur: 50.0,
        ramp_fuel_per_mw_gj: 18.0,
        efficiency_el,
        emissions_per_mwh_lhv_t: emissions,
        fuel,
    }
}

/// Defaults for a flexible source kind, for the kinds the library covers.
/// Kinds without defaults must be fully specified in the configuration.
pub fn flexible_source_defaults(kind: FlexibleSourceType) -> FlexibleSourceParams {
    let coal_economics = EconomicsParams {
        construction_time_years: Some(4.0),
        lifetime_years: Some(40.0),
        fixed_o_m_costs_per_kw_eur: Some(80.0),
        ..EconomicsParams::default()
    };
    match kind {
        FlexibleSourceType::Coal => FlexibleSourceParams {
            ramp_rate: Some(0.15),
            fuel_costs: Some(coal_fuel_costs(
                Fuel::HardCoal,
                EFFICIENCY_COAL,
                EMISSIONS_HARD_COAL_PER_MWH_LHV_T,
            )),
            economics: EconomicsParams {
                overnight_costs_per_kw_eur: Some(usd_to_eur_2022(2000.0)),
                ..coal_economics
            },
            ..FlexibleSourceParams::default()
        },
        FlexibleSourceType::Lignite => FlexibleSourceParams {
            ramp_rate: Some(0.1),
            fuel_costs: Some(coal_fuel_costs(
                Fuel::Lignite,
                EFFICIENCY_COAL,
                EMISSIONS_LIGNITE_PER_MWH_LHV_T,
            )),
            economics: EconomicsParams {
                overnight_costs_per_kw_eur: Some(3000.0),
                ..coal_economics
            },
            ..FlexibleSourceParams::default()
        },
        FlexibleSourceType::LigniteExtraction => FlexibleSourceParams {
            extraction_turbine: Some(ExtractionParams {
                base_ratio_heat_mw_per_el_mw: 0.0,
                heat_mw_per_decreased_el_mw: 3.0,
                min_ratio_el: 0.4,
            }),
            ..flexible_source_defaults(FlexibleSourceType::Lignite)
        },
        FlexibleSourceType::LigniteBackpressure => FlexibleSourceParams {
            back_pressure_turbine: Some(crate::params::BackPressureParams {
                ratio_heat_mw_per_el_mw: 2.0,
            }),
            fuel_costs: Some(coal_fuel_costs(
                Fuel::Lignite,
                EFFICIENCY_COAL_BACKPRESSURE,
                EMISSIONS_LIGNITE_PER_MWH_LHV_T,
            )),
            ..flexible_source_defaults(FlexibleSourceType::Lignite)
        },
        FlexibleSourceType::GasCcgt => FlexibleSourceParams {
            ramp_rate: Some(0.5),
            fuel_costs: Some(FuelCostParams {
                variable_o_m_per_mwh_el_eur: 4.0,
                wear_cost_per_mw_eur: 25.0,
                ramp_fuel_per_mw_gj: 7.6,
                efficiency_el: EFFICIENCY_CCGT,
                emissions_per_mwh_lhv_t: EMISSIONS_GAS_PER_MWH_LHV_T,
                fuel: Fuel::FossilGas,
            }),
            economics: EconomicsParams {
                construction_time_years: Some(3.0),
                lifetime_years: Some(30.0),
                fixed_o_m_costs_per_kw_eur: Some(15.0),
                overnight_costs_per_kw_eur: Some(usd_to_eur_2022(1000.0)),
                ..EconomicsParams::default()
            },
            ..FlexibleSourceParams::default()
        },
        FlexibleSourceType::GasChp => FlexibleSourceParams {
            extraction_turbine: Some(ExtractionParams {
                base_ratio_heat_mw_per_el_mw: 0.0,
                heat_mw_per_decreased_el_mw: 3.0,
                min_ratio_el: 0.4,
            }),
            economics: EconomicsParams {
                construction_time_years: Some(3.0),
                lifetime_years: Some(30.0),
                // Danish Energy Agency, "Gas turbine, combined cycle -
                // extraction", September 2023 edition.
                overnight_costs_per_kw_eur: Some(880.0),
                fixed_o_m_costs_per_kw_eur: Some(30.0),
                ..EconomicsParams::default()
            },
            ..flexible_source_defaults(FlexibleSourceType::GasCcgt)
        },
        FlexibleSourceType::GasPeak => FlexibleSourceParams {
            ramp_rate: Some(0.5),
            fuel_costs: Some(FuelCostParams {
                variable_o_m_per_mwh_el_eur: 4.0,
                wear_cost_per_mw_eur: 20.0,
                ramp_fuel_per_mw_gj: 0.2,
                efficiency_el: EFFICIENCY_OCGT,
                emissions_per_mwh_lhv_t: EMISSIONS_GAS_PER_MWH_LHV_T,
                fuel: Fuel::FossilGas,
            }),
            economics: EconomicsParams {
                construction_time_years: Some(2.0),
                lifetime_years: Some(30.0),
                fixed_o_m_costs_per_kw_eur: Some(8.0),
                overnight_costs_per_kw_eur: Some(480.0),
                ..EconomicsParams::default()
            },
            ..FlexibleSourceParams::default()
        },
        FlexibleSourceType::SolidBiomass => FlexibleSourceParams {
            renewable: Some(true),
            ramp_rate: Some(0.15),
            fuel_costs: Some(FuelCostParams {
                variable_o_m_per_mwh_el_eur: 10.0,
                wear_cost_per_mw_eur: 50.0,
                ramp_fuel_per_mw_gj: 18.0,
                efficiency_el: EFFICIENCY_COAL,
                emissions_per_mwh_lhv_t: 0.0,
                fuel: Fuel::Biomass,
            }),
            economics: EconomicsParams {
                construction_time_years: Some(4.0),
                lifetime_years: Some(40.0),
                fixed_o_m_costs_per_kw_eur: Some(40.0),
                overnight_costs_per_kw_eur: Some(2500.0),
                ..EconomicsParams::default()
            },
            ..FlexibleSourceParams::default()
        },
        FlexibleSourceType::LossOfLoad => FlexibleSourceParams {
            // Artificial capacity to cover any extra load; no need to
            // optimize capex as there are no fixed costs.
            capacity_mw: Some(1_000_000.0),
            min_capacity_mw: Some(1_000_000.0),
            is_virtual: Some(true),
            // Allow loss of load to "produce" heat shortage without
            // necessarily inducing power shortage.
            extraction_turbine: Some(ExtractionParams {
                base_ratio_heat_mw_per_el_mw: 0.0,
                heat_mw_per_decreased_el_mw: 1.0,
                min_ratio_el: 0.0,
            }),
            economics: EconomicsParams {
                // Reflects the value of lost load.
                variable_costs_per_mwh_eur: Some(4000.0),
                ..EconomicsParams::default()
            },
            ..FlexibleSourceParams::default()
        },
        _ => FlexibleSourceParams::default(),
    }
}

/// Defaults for a storage kind, for the kinds the library covers.
pub fn storage_defaults(kind: StorageType) -> StorageParams {
    let pumped = StorageParams {
        kind: Some(StorageType::Pumped),
        renewable: Some(true),
        charging_efficiency: Some(PUMPED_CHARGING_EFFICIENCY),
        discharging_efficiency: Some(PUMPED_DISCHARGING_EFFICIENCY),
        economics: EconomicsParams {
            construction_time_years: Some(5.0),
            lifetime_years: Some(80.0),
            fixed_o_m_costs_per_kw_eur: Some(15.0),
            overnight_costs_per_kw_eur: Some(2000.0),
            // Variable O&M only; the price of input electricity is counted
            // elsewhere.
            variable_costs_per_mwh_eur: Some(4.0),
            ..EconomicsParams::default()
        },
        ..StorageParams::default()
    };
    // The PECD database scales all hydro energy to output power, so the
    // PECD-based variants put the full round-trip loss into charging.
    let hydro_pecd = StorageParams {
        use_: Some(StorageUse::ElectricityAsBasic),
        charging_efficiency: Some(PUMPED_CHARGING_EFFICIENCY * PUMPED_DISCHARGING_EFFICIENCY),
        discharging_efficiency: Some(1.0),
        capacity_mw_charging: Some(0.0),
        min_capacity_mw_charging: Some(0.0),
        ..pumped.clone()
    };
    let li_ion = StorageParams {
        kind: Some(StorageType::LiIon),
        charging_efficiency: Some(0.95),
        discharging_efficiency: Some(0.95),
        initial_energy_ratio: Some(1.0),
        economics: EconomicsParams {
            construction_time_years: Some(1.0),
            lifetime_years: Some(15.0),
            overnight_costs_per_kw_eur: Some(500.0),
            fixed_o_m_costs_per_kw_eur: Some(8.0),
            variable_costs_per_mwh_eur: Some(2.0),
            ..EconomicsParams::default()
        },
        ..StorageParams::default()
    };
    let electrolysis = EconomicsParams {
        construction_time_years: Some(1.0),
        lifetime_years: Some(25.0),
        fixed_o_m_costs_per_kw_eur: Some(15.0),
        overnight_costs_per_kw_eur: Some(usd_to_eur_2022(1355.0)),
        variable_costs_per_mwh_eur: Some(4.0),
        ..EconomicsParams::default()
    };

    match kind {
        StorageType::Pumped => pumped,
        StorageType::PumpedOpen => StorageParams {
            kind: Some(StorageType::PumpedOpen),
            use_: Some(StorageUse::Electricity),
            inflow_hourly_data_key: Some(keys::HYDRO_INFLOW_PUMPED_OPEN.to_string()),
            charging_efficiency: Some(
                PUMPED_CHARGING_EFFICIENCY * PUMPED_DISCHARGING_EFFICIENCY,
            ),
            discharging_efficiency: Some(1.0),
            ..pumped
        },
        StorageType::Reservoir => StorageParams {
            kind: Some(StorageType::Reservoir),
            inflow_hourly_data_key: Some(keys::HYDRO_INFLOW_RESERVOIR.to_string()),
            economics: EconomicsParams {
                // One EUR below pumped hydro to distinguish the two in the
                // optimization.
                variable_costs_per_mwh_eur: Some(3.0),
                ..hydro_pecd.economics.clone()
            },
            ..hydro_pecd
        },
        StorageType::RunOfRiver => StorageParams {
            kind: Some(StorageType::RunOfRiver),
            inflow_hourly_data_key: Some(keys::HYDRO_INFLOW_ROR.to_string()),
            max_energy_mwh: Some(0.0),
            economics: EconomicsParams {
                variable_costs_per_mwh_eur: Some(2.0),
                ..hydro_pecd.economics.clone()
            },
            ..hydro_pecd
        },
        StorageType::LiIon => li_ion,
        StorageType::LiIon2h => StorageParams {
            kind: Some(StorageType::LiIon2h),
            max_energy_hours: Some(2.0),
            ..li_ion
        },
        StorageType::LiIon4h => StorageParams {
            kind: Some(StorageType::LiIon4h),
            max_energy_hours: Some(4.0),
            economics: EconomicsParams {
                overnight_costs_per_kw_eur: Some(700.0),
                ..li_ion.economics.clone()
            },
            ..li_ion
        },
        StorageType::Hydrogen => StorageParams {
            kind: Some(StorageType::Hydrogen),
            charging_efficiency: Some(0.65),
            discharging_efficiency: Some(0.55),
            // De-facto unbounded storage capacity, with enough hydrogen for
            // the start of the year.
            max_energy_mwh: Some(200_000_000.0),
            initial_energy_mwh: Some(100_000_000.0),
            final_energy_mwh: Some(100_000_000.0),
            cost_sell_buy_mwh_eur: Some(COST_FOR_MWH_HYDROGEN_EUR),
            // Discharging cost profile: hydrogen burnt in an H2-ready CCGT
            // plant. Charging: independent electrolysis devices.
            separate_charging: Some(electrolysis),
            economics: EconomicsParams {
                construction_time_years: Some(3.0),
                lifetime_years: Some(30.0),
                fixed_o_m_costs_per_kw_eur: Some(15.0),
                overnight_costs_per_kw_eur: Some(1500.0),
                variable_costs_per_mwh_eur: Some(4.0),
                ..EconomicsParams::default()
            },
            ..StorageParams::default()
        },
        StorageType::Dsr => StorageParams {
            kind: Some(StorageType::Dsr),
            use_: Some(StorageUse::DemandFlexibility),
            charging_efficiency: Some(1.0),
            discharging_efficiency: Some(1.0),
            // An artificial ramp limit keeps the shifted demand curve from
            // jumping too much.
            ramp_rate: Some(0.2),
            economics: EconomicsParams {
                variable_costs_per_mwh_eur: Some(0.0),
                overnight_costs_per_kw_eur: Some(0.0),
                fixed_o_m_costs_per_kw_eur: Some(0.0),
                ..EconomicsParams::default()
            },
            ..StorageParams::default()
        },
        StorageType::Heat => StorageParams {
            kind: Some(StorageType::Heat),
            use_: Some(StorageUse::Heat),
            // Slightly below one to avoid simultaneous charging and
            // discharging.
            charging_efficiency: Some(0.99),
            discharging_efficiency: Some(1.0),
            // Loses around 6% per hour.
            loss_rate_per_day: Some(0.77),
            economics: EconomicsParams {
                variable_costs_per_mwh_eur: Some(0.0),
                ..EconomicsParams::default()
            },
            ..StorageParams::default()
        },
        _ => StorageParams {
            kind: Some(kind),
            ..StorageParams::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::InputCosts;
    use gdc_core::HeatCoupling;

    #[test]
    fn test_nuclear_defaults_are_inflexible_by_default() {
        let params = basic_source_defaults(BasicSourceType::Nuclear);
        let source = params.build(BasicSourceType::Nuclear).unwrap();
        assert!(source.flexibility.is_some());
        // Zero allowed decrease means no actual flexibility.
        assert!(!source.is_truly_flexible());
        assert_eq!(source.base.economics.variable_costs_per_mwh_eur, 22.0);
    }

    #[test]
    fn test_loss_of_load_defaults() {
        let params = flexible_source_defaults(FlexibleSourceType::LossOfLoad);
        let source = params
            .build(FlexibleSourceType::LossOfLoad, &InputCosts::year_2030())
            .unwrap();
        assert!(source.base.is_virtual);
        assert_eq!(source.base.capacity_mw, 1_000_000.0);
        assert_eq!(source.base.economics.variable_costs_per_mwh_eur, 4000.0);
        assert!(matches!(source.heat, Some(HeatCoupling::Extraction { .. })));
    }

    #[test]
    fn test_lignite_emissions_exceed_gas() {
        let costs = InputCosts::year_2030();
        let lignite = flexible_source_defaults(FlexibleSourceType::Lignite)
            .build(FlexibleSourceType::Lignite, &costs)
            .unwrap();
        let gas = flexible_source_defaults(FlexibleSourceType::GasCcgt)
            .build(FlexibleSourceType::GasCcgt, &costs)
            .unwrap();
        assert!(lignite.base.co2_t_mwh > gas.base.co2_t_mwh);
        assert!((lignite.base.co2_t_mwh - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hydrogen_storage_has_separate_charging() {
        let storage = storage_defaults(StorageType::Hydrogen).build().unwrap();
        assert!(storage.separate_charging.is_some());
        assert_eq!(storage.final_energy_mwh, 100_000_000.0);
        assert_eq!(storage.cost_sell_buy_mwh_eur, 60.0);
    }
}
