//! Partial parameter sets and their conversion into entities.
//!
//! Run configurations specify only what differs from the per-technology
//! defaults. Every `*Params` struct therefore carries optional fields, an
//! `overlaid` merge (configured values win over defaults) and a `build`
//! constructor that fills the remaining defaults and validates the result.

use gdc_core::{
    BasicFlexibility, BasicSource, BasicSourceType, FlexibleSource, FlexibleSourceType,
    GridError, GridResult, HeatCoupling, ProductionLimit, ProfileOverride, Region, Reserves,
    SourceBase, SourceEconomics, Storage, StorageType, StorageUse,
};
use serde::{Deserialize, Serialize};

use crate::costs::InputCosts;

fn or(over: Option<f64>, base: Option<f64>) -> Option<f64> {
    over.or(base)
}

/// Economic parameters with defaults left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomicsParams {
    pub overnight_costs_per_kw_eur: Option<f64>,
    /// Decommissioning costs as a ratio of overnight costs.
    pub decommissioning_cost_ratio: Option<f64>,
    pub construction_time_years: Option<f64>,
    pub lifetime_years: Option<f64>,
    pub lifetime_hours: Option<f64>,
    pub decommissioning_time_years: Option<f64>,
    pub fixed_o_m_costs_per_kw_eur: Option<f64>,
    pub variable_costs_per_mwh_eur: Option<f64>,
    pub discount_rate: Option<f64>,
}

impl EconomicsParams {
    pub fn overlaid(self, base: &EconomicsParams) -> EconomicsParams {
        EconomicsParams {
            overnight_costs_per_kw_eur: or(
                self.overnight_costs_per_kw_eur,
                base.overnight_costs_per_kw_eur,
            ),
            decommissioning_cost_ratio: or(
                self.decommissioning_cost_ratio,
                base.decommissioning_cost_ratio,
            ),
            construction_time_years: or(self.construction_time_years, base.construction_time_years),
            lifetime_years: or(self.lifetime_years, base.lifetime_years),
            lifetime_hours: or(self.lifetime_hours, base.lifetime_hours),
            decommissioning_time_years: or(
                self.decommissioning_time_years,
                base.decommissioning_time_years,
            ),
            fixed_o_m_costs_per_kw_eur: or(
                self.fixed_o_m_costs_per_kw_eur,
                base.fixed_o_m_costs_per_kw_eur,
            ),
            variable_costs_per_mwh_eur: or(
                self.variable_costs_per_mwh_eur,
                base.variable_costs_per_mwh_eur,
            ),
            discount_rate: or(self.discount_rate, base.discount_rate),
        }
    }

    pub fn build(&self) -> SourceEconomics {
        let overnight_costs_per_kw_eur = self.overnight_costs_per_kw_eur.unwrap_or(0.0);
        let decommissioning_cost_ratio = self.decommissioning_cost_ratio.unwrap_or(0.05);
        SourceEconomics {
            overnight_costs_per_kw_eur,
            decommissioning_cost_per_kw_eur: overnight_costs_per_kw_eur
                * decommissioning_cost_ratio,
            construction_time_years: self.construction_time_years.unwrap_or(1.0),
            lifetime_years: self.lifetime_years.unwrap_or(1.0),
            lifetime_hours: self.lifetime_hours,
            decommissioning_time_years: self.decommissioning_time_years.unwrap_or(2.0),
            fixed_o_m_costs_per_kw_eur: self.fixed_o_m_costs_per_kw_eur.unwrap_or(0.0),
            variable_costs_per_mwh_eur: self.variable_costs_per_mwh_eur.unwrap_or(0.0),
            discount_rate: self.discount_rate.unwrap_or(1.08),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrideParams {
    pub country: String,
    pub installed_gw: f64,
    pub source_type: Option<BasicSourceType>,
}

/// Parameters of a basic (non-dispatchable) source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicSourceParams {
    pub capacity_mw: Option<f64>,
    pub min_capacity_mw: Option<f64>,
    pub paid_off_capacity_mw: Option<f64>,
    pub renewable: Option<bool>,
    pub co2_t_mwh: Option<f64>,
    /// Turn the predefined curve into a bounded decision variable.
    pub flexible: Option<bool>,
    pub max_decrease_mw: Option<f64>,
    pub min_production_mw: Option<f64>,
    pub ramp_rate: Option<f64>,
    pub ramp_up_cost_mw_eur: Option<f64>,
    pub profile_override: Option<ProfileOverrideParams>,
    #[serde(flatten)]
    pub economics: EconomicsParams,
}

impl BasicSourceParams {
    pub fn overlaid(self, base: &BasicSourceParams) -> BasicSourceParams {
        BasicSourceParams {
            capacity_mw: or(self.capacity_mw, base.capacity_mw),
            min_capacity_mw: or(self.min_capacity_mw, base.min_capacity_mw),
            paid_off_capacity_mw: or(self.paid_off_capacity_mw, base.paid_off_capacity_mw),
            renewable: self.renewable.or(base.renewable),
            co2_t_mwh: or(self.co2_t_mwh, base.co2_t_mwh),
            flexible: self.flexible.or(base.flexible),
            max_decrease_mw: or(self.max_decrease_mw, base.max_decrease_mw),
            min_production_mw: or(self.min_production_mw, base.min_production_mw),
            ramp_rate: or(self.ramp_rate, base.ramp_rate),
            ramp_up_cost_mw_eur: or(self.ramp_up_cost_mw_eur, base.ramp_up_cost_mw_eur),
            profile_override: self.profile_override.or_else(|| base.profile_override.clone()),
            economics: self.economics.overlaid(&base.economics),
        }
    }

    pub fn build(&self, kind: BasicSourceType) -> GridResult<BasicSource> {
        let capacity_mw = self.capacity_mw.unwrap_or(0.0);
        let base = SourceBase {
            capacity_mw,
            min_capacity_mw: self.min_capacity_mw.unwrap_or(0.0),
            paid_off_capacity_mw: self.paid_off_capacity_mw.unwrap_or(0.0),
            renewable: self.renewable.unwrap_or(false),
            is_virtual: false,
            co2_t_mwh: self.co2_t_mwh.unwrap_or(0.0),
            economics: self.economics.build(),
        };
        let mut source = BasicSource::new(kind, base);
        if self.flexible.unwrap_or(false) {
            source = source.with_flexibility(BasicFlexibility {
                max_decrease_mw: self.max_decrease_mw.unwrap_or(capacity_mw),
                min_production_mw: self.min_production_mw.unwrap_or(0.0),
                ramp_rate: self.ramp_rate.unwrap_or(1.0),
                ramp_up_cost_mw_eur: self.ramp_up_cost_mw_eur.unwrap_or(0.0),
            });
        }
        if let Some(profile) = &self.profile_override {
            source.profile_override = Some(ProfileOverride {
                region: Region::new(profile.country.clone()),
                installed_gw: profile.installed_gw,
                source_type: profile.source_type,
            });
        }
        source.validate()?;
        Ok(source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackPressureParams {
    pub ratio_heat_mw_per_el_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub base_ratio_heat_mw_per_el_mw: f64,
    pub heat_mw_per_decreased_el_mw: f64,
    pub min_ratio_el: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatRecoveryParams {
    pub max_heat_mw_per_el_mw: f64,
}

/// Fuel-dependent cost derivation of a flexible source: the variable and
/// ramp-up costs follow from fuel price, efficiency and allowances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelCostParams {
    pub variable_o_m_per_mwh_el_eur: f64,
    pub wear_cost_per_mw_eur: f64,
    pub ramp_fuel_per_mw_gj: f64,
    pub efficiency_el: f64,
    pub emissions_per_mwh_lhv_t: f64,
    pub fuel: Fuel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fuel {
    #[default]
    None,
    FossilGas,
    HardCoal,
    Lignite,
    Biomass,
    Biogas,
    Biomethane,
    /// Fixed price per MWh of electricity (e.g. nuclear fuel).
    FixedPerMwhEl,
}

impl FuelCostParams {
    fn fuel_price(&self, costs: &InputCosts) -> f64 {
        match self.fuel {
            Fuel::None | Fuel::FixedPerMwhEl => 0.0,
            Fuel::FossilGas => costs.fossil_gas_price_per_mwh_lhv_eur,
            Fuel::HardCoal => costs.hard_coal_price_per_mwh_lhv_eur,
            Fuel::Lignite => costs.lignite_price_per_mwh_lhv_eur,
            Fuel::Biomass => costs.biomass_price_per_mwh_lhv_eur,
            Fuel::Biogas => costs.biogas_price_per_mwh_lhv_eur,
            Fuel::Biomethane => costs.biomethane_price_per_mwh_lhv_eur,
        }
    }

    pub fn variable_costs_per_mwh_eur(&self, costs: &InputCosts) -> f64 {
        gdc_core::opex::operation_cost_per_mwh_eur(
            self.variable_o_m_per_mwh_el_eur,
            self.fuel_price(costs),
            self.efficiency_el,
            self.emissions_per_mwh_lhv_t,
            costs.emission_price_per_t_eur,
        )
    }

    pub fn ramp_up_cost_mw_eur(&self, costs: &InputCosts) -> f64 {
        gdc_core::opex::ramp_up_cost_per_mw_eur(
            self.wear_cost_per_mw_eur,
            self.ramp_fuel_per_mw_gj,
            self.fuel_price(costs),
            self.emissions_per_mwh_lhv_t,
            costs.emission_price_per_t_eur,
        )
    }

    pub fn co2_t_mwh(&self) -> f64 {
        self.emissions_per_mwh_lhv_t / self.efficiency_el
    }
}

/// Parameters of a flexible (dispatchable) source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlexibleSourceParams {
    pub capacity_mw: Option<f64>,
    pub min_capacity_mw: Option<f64>,
    pub paid_off_capacity_mw: Option<f64>,
    pub renewable: Option<bool>,
    #[serde(rename = "virtual")]
    pub is_virtual: Option<bool>,
    pub co2_t_mwh: Option<f64>,
    pub ramp_rate: Option<f64>,
    pub ramp_up_cost_mw_eur: Option<f64>,
    /// Cap on total production in TWh per year.
    pub max_total_twh: Option<f64>,
    /// Cap on the average capacity factor (scales with capacity
    /// optimization); values below one become a production limit.
    pub uptime_ratio: Option<f64>,
    pub back_pressure_turbine: Option<BackPressureParams>,
    pub extraction_turbine: Option<ExtractionParams>,
    pub heat_recovery_unit: Option<HeatRecoveryParams>,
    /// Fuel-based cost derivation; explicit `variable_costs_per_mwh_eur`
    /// and `ramp_up_cost_mw_eur` win over it.
    pub fuel_costs: Option<FuelCostParams>,
    #[serde(flatten)]
    pub economics: EconomicsParams,
}

impl FlexibleSourceParams {
    pub fn overlaid(self, base: &FlexibleSourceParams) -> FlexibleSourceParams {
        FlexibleSourceParams {
            capacity_mw: or(self.capacity_mw, base.capacity_mw),
            min_capacity_mw: or(self.min_capacity_mw, base.min_capacity_mw),
            paid_off_capacity_mw: or(self.paid_off_capacity_mw, base.paid_off_capacity_mw),
            renewable: self.renewable.or(base.renewable),
            is_virtual: self.is_virtual.or(base.is_virtual),
            co2_t_mwh: or(self.co2_t_mwh, base.co2_t_mwh),
            ramp_rate: or(self.ramp_rate, base.ramp_rate),
            ramp_up_cost_mw_eur: or(self.ramp_up_cost_mw_eur, base.ramp_up_cost_mw_eur),
            max_total_twh: or(self.max_total_twh, base.max_total_twh),
            uptime_ratio: or(self.uptime_ratio, base.uptime_ratio),
            back_pressure_turbine: self
                .back_pressure_turbine
                .or_else(|| base.back_pressure_turbine.clone()),
            extraction_turbine: self
                .extraction_turbine
                .or_else(|| base.extraction_turbine.clone()),
            heat_recovery_unit: self
                .heat_recovery_unit
                .or_else(|| base.heat_recovery_unit.clone()),
            fuel_costs: self.fuel_costs.or_else(|| base.fuel_costs.clone()),
            economics: self.economics.overlaid(&base.economics),
        }
    }

    pub fn build(&self, kind: FlexibleSourceType, costs: &InputCosts) -> GridResult<FlexibleSource> {
        let capacity_mw = self.capacity_mw.unwrap_or(0.0);

        let mut economics = self.economics.clone();
        let mut co2_t_mwh = self.co2_t_mwh;
        let mut ramp_up_cost = self.ramp_up_cost_mw_eur;
        if let Some(fuel_costs) = &self.fuel_costs {
            if economics.variable_costs_per_mwh_eur.is_none() {
                economics.variable_costs_per_mwh_eur =
                    Some(fuel_costs.variable_costs_per_mwh_eur(costs));
            }
            if ramp_up_cost.is_none() {
                ramp_up_cost = Some(fuel_costs.ramp_up_cost_mw_eur(costs));
            }
            if co2_t_mwh.is_none() {
                co2_t_mwh = Some(fuel_costs.co2_t_mwh());
            }
        }

        let base = SourceBase {
            capacity_mw,
            min_capacity_mw: self.min_capacity_mw.unwrap_or(0.0),
            paid_off_capacity_mw: self.paid_off_capacity_mw.unwrap_or(0.0),
            renewable: self.renewable.unwrap_or(false),
            is_virtual: self.is_virtual.unwrap_or(false),
            co2_t_mwh: co2_t_mwh.unwrap_or(0.0),
            economics: economics.build(),
        };
        let mut source = FlexibleSource::new(kind, base)
            .with_ramp(self.ramp_rate.unwrap_or(1.0), ramp_up_cost.unwrap_or(0.0));

        if let Some(params) = &self.back_pressure_turbine {
            source = source.with_heat(HeatCoupling::BackPressure {
                ratio_heat_mw_per_el_mw: params.ratio_heat_mw_per_el_mw,
            });
        } else if let Some(params) = &self.extraction_turbine {
            source = source.with_heat(HeatCoupling::Extraction {
                base_ratio_heat_mw_per_el_mw: params.base_ratio_heat_mw_per_el_mw,
                heat_mw_per_decreased_el_mw: params.heat_mw_per_decreased_el_mw,
                min_ratio_el: params.min_ratio_el,
            });
        } else if let Some(params) = &self.heat_recovery_unit {
            source = source.with_heat(HeatCoupling::HeatRecovery {
                max_heat_mw_per_el_mw: params.max_heat_mw_per_el_mw,
            });
        }

        if let Some(max_total_twh) = self.max_total_twh {
            source = source.with_limit(ProductionLimit::TotalTwh(max_total_twh));
        } else if let Some(uptime_ratio) = self.uptime_ratio {
            if uptime_ratio < 1.0 {
                source = source.with_limit(ProductionLimit::CapacityFactor(uptime_ratio));
            }
        }
        source.validate()?;
        Ok(source)
    }
}

/// Parameters of a storage facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageParams {
    #[serde(rename = "type")]
    pub kind: Option<StorageType>,
    #[serde(rename = "use")]
    pub use_: Option<StorageUse>,
    /// Shorthand for equal charging and discharging capacity.
    pub nominal_mw: Option<f64>,
    /// Shorthand for equal minimal charging and discharging capacity.
    pub min_nominal_mw: Option<f64>,
    pub capacity_mw: Option<f64>,
    pub capacity_mw_charging: Option<f64>,
    pub min_capacity_mw: Option<f64>,
    pub min_capacity_mw_charging: Option<f64>,
    pub paid_off_capacity_mw: Option<f64>,
    pub paid_off_capacity_mw_charging: Option<f64>,
    pub min_charging_capacity_ratio_to_vre: Option<f64>,
    pub renewable: Option<bool>,
    pub co2_t_mwh: Option<f64>,

    pub max_energy_mwh: Option<f64>,
    /// Shorthand: energy capacity as hours of full discharging.
    pub max_energy_hours: Option<f64>,
    pub initial_energy_mwh: Option<f64>,
    /// Shorthand: initial energy as a ratio of `max_energy_mwh`.
    pub initial_energy_ratio: Option<f64>,
    pub final_energy_mwh: Option<f64>,
    pub min_final_energy_mwh: Option<f64>,
    pub midnight_energy_mwh: Option<f64>,

    pub charging_efficiency: Option<f64>,
    pub discharging_efficiency: Option<f64>,
    pub loss_rate_per_day: Option<f64>,
    pub use_mwh_per_day: Option<f64>,
    pub cost_sell_buy_mwh_eur: Option<f64>,
    pub ramp_rate: Option<f64>,
    pub inflow_hourly_data_key: Option<String>,
    pub inflow_min_discharge_ratio: Option<f64>,
    pub max_capacity_mw_hourly_data_key: Option<String>,
    pub max_capacity_mw_factor: Option<f64>,

    pub separate_charging: Option<EconomicsParams>,
    /// Shorthand: overnight costs per kWh of energy capacity instead of per
    /// kW of discharging capacity.
    pub overnight_costs_per_kwh_eur: Option<f64>,
    /// Shorthand: usage-limited lifetime in full cycles.
    pub lifetime_cycles: Option<f64>,
    #[serde(flatten)]
    pub economics: EconomicsParams,
}

impl StorageParams {
    pub fn overlaid(self, base: &StorageParams) -> StorageParams {
        StorageParams {
            kind: self.kind.or(base.kind),
            use_: self.use_.or(base.use_),
            nominal_mw: or(self.nominal_mw, base.nominal_mw),
            min_nominal_mw: or(self.min_nominal_mw, base.min_nominal_mw),
            capacity_mw: or(self.capacity_mw, base.capacity_mw),
            capacity_mw_charging: or(self.capacity_mw_charging, base.capacity_mw_charging),
            min_capacity_mw: or(self.min_capacity_mw, base.min_capacity_mw),
            min_capacity_mw_charging: or(
                self.min_capacity_mw_charging,
                base.min_capacity_mw_charging,
            ),
            paid_off_capacity_mw: or(self.paid_off_capacity_mw, base.paid_off_capacity_mw),
            paid_off_capacity_mw_charging: or(
                self.paid_off_capacity_mw_charging,
                base.paid_off_capacity_mw_charging,
            ),
            min_charging_capacity_ratio_to_vre: or(
                self.min_charging_capacity_ratio_to_vre,
                base.min_charging_capacity_ratio_to_vre,
            ),
            renewable: self.renewable.or(base.renewable),
            co2_t_mwh: or(self.co2_t_mwh, base.co2_t_mwh),
            max_energy_mwh: or(self.max_energy_mwh, base.max_energy_mwh),
            max_energy_hours: or(self.max_energy_hours, base.max_energy_hours),
            initial_energy_mwh: or(self.initial_energy_mwh, base.initial_energy_mwh),
            initial_energy_ratio: or(self.initial_energy_ratio, base.initial_energy_ratio),
            final_energy_mwh: or(self.final_energy_mwh, base.final_energy_mwh),
            min_final_energy_mwh: or(self.min_final_energy_mwh, base.min_final_energy_mwh),
            midnight_energy_mwh: or(self.midnight_energy_mwh, base.midnight_energy_mwh),
            charging_efficiency: or(self.charging_efficiency, base.charging_efficiency),
            discharging_efficiency: or(self.discharging_efficiency, base.discharging_efficiency),
            loss_rate_per_day: or(self.loss_rate_per_day, base.loss_rate_per_day),
            use_mwh_per_day: or(self.use_mwh_per_day, base.use_mwh_per_day),
            cost_sell_buy_mwh_eur: or(self.cost_sell_buy_mwh_eur, base.cost_sell_buy_mwh_eur),
            ramp_rate: or(self.ramp_rate, base.ramp_rate),
            inflow_hourly_data_key: self
                .inflow_hourly_data_key
                .or_else(|| base.inflow_hourly_data_key.clone()),
            inflow_min_discharge_ratio: or(
                self.inflow_min_discharge_ratio,
                base.inflow_min_discharge_ratio,
            ),
            max_capacity_mw_hourly_data_key: self
                .max_capacity_mw_hourly_data_key
                .or_else(|| base.max_capacity_mw_hourly_data_key.clone()),
            max_capacity_mw_factor: or(self.max_capacity_mw_factor, base.max_capacity_mw_factor),
            separate_charging: self.separate_charging.or_else(|| base.separate_charging.clone()),
            overnight_costs_per_kwh_eur: or(
                self.overnight_costs_per_kwh_eur,
                base.overnight_costs_per_kwh_eur,
            ),
            lifetime_cycles: or(self.lifetime_cycles, base.lifetime_cycles),
            economics: self.economics.overlaid(&base.economics),
        }
    }

    pub fn build(&self) -> GridResult<Storage> {
        let kind = self
            .kind
            .ok_or_else(|| GridError::Config("storage entry is missing its type".into()))?;
        // Charging and discharging capacities derive from the nominal
        // shorthand unless given explicitly.
        let nominal_mw = self.nominal_mw.unwrap_or(0.0);
        let capacity_mw = self.capacity_mw.unwrap_or(nominal_mw);
        let capacity_mw_charging = self.capacity_mw_charging.unwrap_or(nominal_mw);
        let min_nominal_mw = self.min_nominal_mw.unwrap_or(0.0);
        let min_capacity_mw = self.min_capacity_mw.unwrap_or(min_nominal_mw);
        let min_capacity_mw_charging = self.min_capacity_mw_charging.unwrap_or(min_nominal_mw);

        let mut max_energy_mwh = self.max_energy_mwh.unwrap_or(0.0);
        if let Some(hours) = self.max_energy_hours {
            max_energy_mwh = capacity_mw * hours;
        }
        let mut initial_energy_mwh = self.initial_energy_mwh.unwrap_or(0.0);
        if let Some(ratio) = self.initial_energy_ratio {
            initial_energy_mwh = max_energy_mwh * ratio;
        }
        let final_energy_mwh = self.final_energy_mwh.unwrap_or(0.0);
        // Unless given explicitly, the hard bound mirrors the target.
        let min_final_energy_mwh = self.min_final_energy_mwh.unwrap_or(final_energy_mwh);

        let discharging_efficiency = self.discharging_efficiency.unwrap_or(1.0);

        let mut economics = self.economics.clone();
        if let Some(per_kwh) = self.overnight_costs_per_kwh_eur {
            if capacity_mw <= 0.0 {
                return Err(GridError::Config(format!(
                    "storage {}: overnight costs per kWh need a positive discharging capacity",
                    kind.id()
                )));
            }
            let kwh_per_kw = max_energy_mwh / capacity_mw;
            economics.overnight_costs_per_kw_eur = Some(per_kwh * kwh_per_kw);
        }
        if let Some(cycles) = self.lifetime_cycles {
            if capacity_mw > 0.0 && discharging_efficiency > 0.0 {
                let draining_mw = capacity_mw / discharging_efficiency;
                let hours_for_full_cycle = max_energy_mwh / draining_mw;
                economics.lifetime_hours = Some(cycles * hours_for_full_cycle);
            }
        }

        let storage = Storage {
            kind,
            use_: self.use_.unwrap_or(StorageUse::Electricity),
            base: SourceBase {
                capacity_mw,
                min_capacity_mw,
                paid_off_capacity_mw: self.paid_off_capacity_mw.unwrap_or(0.0),
                renewable: self.renewable.unwrap_or(false),
                is_virtual: false,
                co2_t_mwh: self.co2_t_mwh.unwrap_or(0.0),
                economics: economics.build(),
            },
            capacity_mw_charging,
            min_capacity_mw_charging,
            paid_off_capacity_mw_charging: self.paid_off_capacity_mw_charging.unwrap_or(0.0),
            min_charging_capacity_ratio_to_vre: self
                .min_charging_capacity_ratio_to_vre
                .unwrap_or(0.0),
            separate_charging: self.separate_charging.as_ref().map(EconomicsParams::build),
            max_energy_mwh,
            initial_energy_mwh,
            final_energy_mwh,
            min_final_energy_mwh,
            midnight_energy_mwh: self.midnight_energy_mwh,
            charging_efficiency: self.charging_efficiency.unwrap_or(1.0),
            discharging_efficiency,
            loss_rate_per_day: self.loss_rate_per_day.unwrap_or(0.0),
            use_mwh_per_day: self.use_mwh_per_day.unwrap_or(0.0),
            cost_sell_buy_mwh_eur: self.cost_sell_buy_mwh_eur.unwrap_or(0.0),
            ramp_rate: self.ramp_rate.unwrap_or(1.0),
            inflow_hourly_data_key: self.inflow_hourly_data_key.clone(),
            inflow_min_discharge_ratio: self.inflow_min_discharge_ratio,
            max_capacity_mw_hourly_data_key: self.max_capacity_mw_hourly_data_key.clone(),
            max_capacity_mw_factor: self.max_capacity_mw_factor,
        };
        storage.validate()?;
        Ok(storage)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservesParams {
    #[serde(default)]
    pub additional_load_mw: f64,
    #[serde(default)]
    pub hydro_capacity_reduction_mw: f64,
}

impl ReservesParams {
    pub fn build(&self) -> Reserves {
        Reserves {
            additional_load_mw: self.additional_load_mw,
            hydro_capacity_reduction_mw: self.hydro_capacity_reduction_mw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_shorthands() {
        let params = StorageParams {
            kind: Some(StorageType::LiIon4h),
            nominal_mw: Some(1000.0),
            min_nominal_mw: Some(1000.0),
            max_energy_hours: Some(4.0),
            initial_energy_ratio: Some(0.5),
            charging_efficiency: Some(0.95),
            discharging_efficiency: Some(0.95),
            ..StorageParams::default()
        };
        let storage = params.build().unwrap();
        assert_eq!(storage.base.capacity_mw, 1000.0);
        assert_eq!(storage.capacity_mw_charging, 1000.0);
        assert_eq!(storage.max_energy_mwh, 4000.0);
        assert_eq!(storage.initial_energy_mwh, 2000.0);
        assert_eq!(storage.min_capacity_mw_charging, 1000.0);
    }

    #[test]
    fn test_storage_per_kwh_costs() {
        let params = StorageParams {
            kind: Some(StorageType::LiIon),
            nominal_mw: Some(100.0),
            max_energy_hours: Some(2.0),
            overnight_costs_per_kwh_eur: Some(250.0),
            ..StorageParams::default()
        };
        let storage = params.build().unwrap();
        assert_eq!(storage.base.economics.overnight_costs_per_kw_eur, 500.0);
    }

    #[test]
    fn test_lifetime_cycles_shorthand() {
        let params = StorageParams {
            kind: Some(StorageType::LiIon),
            nominal_mw: Some(100.0),
            max_energy_hours: Some(4.0),
            lifetime_cycles: Some(3000.0),
            discharging_efficiency: Some(0.8),
            ..StorageParams::default()
        };
        let storage = params.build().unwrap();
        // A full cycle drains 400 MWh at 125 MW, i.e. 3.2 hours.
        let lifetime_hours = storage.base.economics.lifetime_hours.unwrap();
        assert!((lifetime_hours - 3000.0 * 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_flexible_fuel_cost_derivation() {
        let params = FlexibleSourceParams {
            capacity_mw: Some(1000.0),
            fuel_costs: Some(FuelCostParams {
                variable_o_m_per_mwh_el_eur: 4.0,
                wear_cost_per_mw_eur: 25.0,
                ramp_fuel_per_mw_gj: 7.6,
                efficiency_el: 0.56,
                emissions_per_mwh_lhv_t: 0.22,
                fuel: Fuel::FossilGas,
            }),
            ..FlexibleSourceParams::default()
        };
        let costs = InputCosts::year_2030();
        let source = params.build(FlexibleSourceType::GasCcgt, &costs).unwrap();
        let expected = (25.0 + 0.22 * 120.0) / 0.56 + 4.0;
        assert!(
            (source.base.economics.variable_costs_per_mwh_eur - expected).abs() < 1e-9
        );
        assert!((source.base.co2_t_mwh - 0.22 / 0.56).abs() < 1e-9);
        assert!(source.ramp_up_cost_mw_eur > 25.0);
    }

    #[test]
    fn test_basic_flexibility_defaults_to_full_decrease() {
        let params = BasicSourceParams {
            capacity_mw: Some(500.0),
            flexible: Some(true),
            ..BasicSourceParams::default()
        };
        let source = params.build(BasicSourceType::Hydro).unwrap();
        let flexibility = source.flexibility.clone().unwrap();
        assert_eq!(flexibility.max_decrease_mw, 500.0);
        assert!(source.is_truly_flexible());
    }
}
