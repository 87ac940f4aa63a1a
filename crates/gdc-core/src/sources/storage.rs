//! Grid storage facilities.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::economics::SourceEconomics;
use crate::error::{GridError, GridResult};
use crate::sources::{weighted_average, SourceBase};

/// What a storage device balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageUse {
    /// Standard storage for electricity.
    Electricity,
    /// Storage for electricity that is reported as a basic source.
    ElectricityAsBasic,
    /// Demand flexibility; only alters the effective load curve.
    DemandFlexibility,
    /// Storage for heat (in district heating systems).
    Heat,
}

impl StorageUse {
    pub fn is_electricity(&self) -> bool {
        matches!(self, StorageUse::Electricity | StorageUse::ElectricityAsBasic)
    }
}

/// Kinds of storage facilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Demand-side response.
    Dsr,
    /// Hydro flexibility.
    HydroFlex,
    /// Heat storage.
    Heat,
    /// Flexibility of heat pump electricity demand.
    HeatFlex,
    /// Hydrogen-based storage.
    Hydrogen,
    /// Hydrogen-based storage with OCGT turbines.
    HydrogenPeak,
    /// Generic lithium-ion batteries.
    LiIon,
    /// 2-hour lithium-ion batteries.
    LiIon2h,
    /// 4-hour lithium-ion batteries.
    LiIon4h,
    /// Vehicle-to-grid with 11 kW charging.
    VehicleToGrid11kw,
    /// Vehicle-to-grid with 3 kW slow charging.
    VehicleToGrid3kw,
    /// Smart charging of electric cars.
    SmartCharging,
    /// Pondage hydro power: a turbine on a river with a small reservoir
    /// upstream for short-term storage.
    Pondage,
    /// Pumped hydro power, closed loop.
    Pumped,
    /// Pumped hydro power, open loop (allows for river inflows).
    PumpedOpen,
    /// Reservoir hydro power.
    Reservoir,
    /// Run-of-river hydro power.
    RunOfRiver,
}

impl StorageType {
    pub fn id(&self) -> &'static str {
        match self {
            StorageType::Dsr => "dsr",
            StorageType::HydroFlex => "hydro-flex",
            StorageType::Heat => "heat",
            StorageType::HeatFlex => "heat-flex",
            StorageType::Hydrogen => "h2",
            StorageType::HydrogenPeak => "h2p",
            StorageType::LiIon => "li",
            StorageType::LiIon2h => "li-2",
            StorageType::LiIon4h => "li-4",
            StorageType::VehicleToGrid11kw => "v2g11",
            StorageType::VehicleToGrid3kw => "v2g",
            StorageType::SmartCharging => "ecars",
            StorageType::Pondage => "h_pond",
            StorageType::Pumped => "pump",
            StorageType::PumpedOpen => "pump_open",
            StorageType::Reservoir => "h_dams",
            StorageType::RunOfRiver => "h_ror",
        }
    }

    /// Hydropower-backed storage counts towards balancing reserves.
    pub fn available_for_reserves(&self) -> bool {
        matches!(
            self,
            StorageType::Pondage
                | StorageType::Pumped
                | StorageType::PumpedOpen
                | StorageType::Reservoir
                | StorageType::RunOfRiver
        )
    }
}

/// A storage facility. `base.capacity_mw` is the discharging capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub kind: StorageType,
    pub use_: StorageUse,
    pub base: SourceBase,
    pub capacity_mw_charging: f64,
    pub min_capacity_mw_charging: f64,
    /// Charging capacity that is considered already paid off. Must be at
    /// most the minimal charging capacity.
    pub paid_off_capacity_mw_charging: f64,
    /// Charging capacity is enforced to at least this ratio of the summed
    /// installed capacity of solar, onshore and offshore.
    pub min_charging_capacity_ratio_to_vre: f64,
    /// Separate cost profile for the charging side (electrolyser-like).
    /// When set, state bounds are scaled by the number of modeled years
    /// rather than by the installed factor.
    pub separate_charging: Option<SourceEconomics>,

    pub max_energy_mwh: f64,
    pub initial_energy_mwh: f64,
    /// The ideal final energy: ending up with more results in financial
    /// gains, ending up with less (if allowed by `min_final_energy_mwh`) in
    /// further costs.
    pub final_energy_mwh: f64,
    /// The strict lower limit for final energy of the storage.
    pub min_final_energy_mwh: f64,
    /// If provided, the state of charge must equal this value every
    /// midnight.
    pub midnight_energy_mwh: Option<f64>,

    pub charging_efficiency: f64,
    pub discharging_efficiency: f64,
    /// Loss of state of charge per day, as a ratio of current charge.
    pub loss_rate_per_day: f64,
    /// Constant exogenous drain (useful for e-mobility). Scales with the
    /// installed factor.
    pub use_mwh_per_day: f64,
    /// Bonus per MWh of final energy above `final_energy_mwh`, malus per
    /// MWh missing (down to the hard bound).
    pub cost_sell_buy_mwh_eur: f64,
    /// Power (as a ratio of charging plus discharging capacity) by which
    /// the net output can change up or down in one hour.
    pub ramp_rate: f64,
    /// Natural inflow, given as a column key of the hourly data (MW).
    pub inflow_hourly_data_key: Option<String>,
    /// Minimal ratio of inflow that must be directly discharged in the
    /// given hour. Only effective together with `inflow_hourly_data_key`.
    pub inflow_min_discharge_ratio: Option<f64>,
    /// Additional per-hour charging/discharging capacity limit, given as a
    /// column key of the hourly data (MW). Independent of the installed
    /// factor.
    pub max_capacity_mw_hourly_data_key: Option<String>,
    /// Factor applied to the `max_capacity_mw_hourly_data_key` data.
    pub max_capacity_mw_factor: Option<f64>,
}

impl Storage {
    /// Symmetric storage with the given charging and discharging capacity
    /// and no energy bounds; a starting point for the builder-style
    /// setters.
    pub fn new(kind: StorageType, nominal_mw: f64, economics: SourceEconomics) -> Self {
        Storage {
            kind,
            use_: StorageUse::Electricity,
            base: SourceBase::new(nominal_mw, economics),
            capacity_mw_charging: nominal_mw,
            min_capacity_mw_charging: 0.0,
            paid_off_capacity_mw_charging: 0.0,
            min_charging_capacity_ratio_to_vre: 0.0,
            separate_charging: None,
            max_energy_mwh: 0.0,
            initial_energy_mwh: 0.0,
            final_energy_mwh: 0.0,
            min_final_energy_mwh: 0.0,
            midnight_energy_mwh: None,
            charging_efficiency: 1.0,
            discharging_efficiency: 1.0,
            loss_rate_per_day: 0.0,
            use_mwh_per_day: 0.0,
            cost_sell_buy_mwh_eur: 0.0,
            ramp_rate: 1.0,
            inflow_hourly_data_key: None,
            inflow_min_discharge_ratio: None,
            max_capacity_mw_hourly_data_key: None,
            max_capacity_mw_factor: None,
        }
    }

    pub fn with_fixed_capacities(mut self) -> Self {
        self.base.min_capacity_mw = self.base.capacity_mw;
        self.min_capacity_mw_charging = self.capacity_mw_charging;
        self
    }

    pub fn with_energy(mut self, max_energy_mwh: f64, initial_energy_mwh: f64) -> Self {
        self.max_energy_mwh = max_energy_mwh;
        self.initial_energy_mwh = initial_energy_mwh;
        self
    }

    pub fn with_efficiencies(mut self, charging: f64, discharging: f64) -> Self {
        self.charging_efficiency = charging;
        self.discharging_efficiency = discharging;
        self
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.charging_efficiency * self.discharging_efficiency
    }

    pub fn validate(&self) -> GridResult<()> {
        let what = format!("storage {}", self.kind.id());
        self.base.validate(&what)?;
        if self.paid_off_capacity_mw_charging > self.min_capacity_mw_charging {
            return Err(GridError::Config(format!(
                "{what}: paid-off charging capacity {} MW must be below min charging capacity {} MW",
                self.paid_off_capacity_mw_charging, self.min_capacity_mw_charging
            )));
        }
        if self.min_capacity_mw_charging > self.capacity_mw_charging {
            return Err(GridError::Config(format!(
                "{what}: min charging capacity {} MW must be below charging capacity {} MW",
                self.min_capacity_mw_charging, self.capacity_mw_charging
            )));
        }
        if self.min_charging_capacity_ratio_to_vre < 0.0 {
            return Err(GridError::Config(format!(
                "{what}: cannot force a negative charging-to-VRE ratio"
            )));
        }
        if !(self.ramp_rate > 0.0 && self.ramp_rate <= 1.0) {
            return Err(GridError::Config(format!(
                "{what}: ramp rate must be in (0, 1], got {}",
                self.ramp_rate
            )));
        }
        if self.loss_rate_per_day >= 1.0 {
            return Err(GridError::Config(format!(
                "{what}: cannot lose more than 100% of charge per day"
            )));
        }
        if self.min_final_energy_mwh > self.final_energy_mwh
            || self.final_energy_mwh > self.max_energy_mwh
        {
            return Err(GridError::Config(format!(
                "{what}: final-energy window must satisfy min_final ({}) <= final ({}) <= max_energy ({})",
                self.min_final_energy_mwh, self.final_energy_mwh, self.max_energy_mwh
            )));
        }
        if !(self.charging_efficiency > 0.0) || !(self.discharging_efficiency > 0.0) {
            return Err(GridError::Config(format!(
                "{what}: efficiencies must be positive"
            )));
        }
        if let Some(economics) = &self.separate_charging {
            economics.validate(&format!("{what} (charging)"))?;
        }
        Ok(())
    }

    /// Sum of two storage facilities of the same kind for region
    /// aggregation. Capacities and energy bounds add up; efficiencies are
    /// capacity-weighted averages.
    pub fn merged(&self, other: &Storage) -> GridResult<Storage> {
        if self.kind != other.kind {
            return Err(GridError::Config(format!(
                "cannot merge storage of kinds {} and {}",
                self.kind.id(),
                other.kind.id()
            )));
        }
        let what = format!("storage {}", self.kind.id());
        if self.use_ != other.use_ {
            return Err(GridError::Config(format!(
                "{what}: uses must match when aggregating"
            )));
        }
        if self.midnight_energy_mwh.is_some() != other.midnight_energy_mwh.is_some() {
            return Err(GridError::Config(format!(
                "{what}: midnight constraints must match when aggregating"
            )));
        }
        if self.separate_charging != other.separate_charging {
            return Err(GridError::Config(format!(
                "{what}: charging cost profiles must match when aggregating"
            )));
        }
        if self.loss_rate_per_day != other.loss_rate_per_day
            || self.ramp_rate != other.ramp_rate
            || self.inflow_hourly_data_key != other.inflow_hourly_data_key
            || self.inflow_min_discharge_ratio != other.inflow_min_discharge_ratio
            || self.max_capacity_mw_hourly_data_key != other.max_capacity_mw_hourly_data_key
            || self.max_capacity_mw_factor != other.max_capacity_mw_factor
        {
            return Err(GridError::Config(format!(
                "{what}: operating parameters must match when aggregating"
            )));
        }
        if self.cost_sell_buy_mwh_eur != other.cost_sell_buy_mwh_eur {
            warn!("different cost_sell_buy_mwh_eur values for {what}, picking one of the values; summary figures will be approximate");
        }
        if self.min_charging_capacity_ratio_to_vre != other.min_charging_capacity_ratio_to_vre {
            warn!("different min_charging_capacity_ratio_to_VRE values for {what}, picking one of the values as this cannot be aggregated");
        }

        let charging_efficiency = weighted_average(
            self.charging_efficiency,
            self.capacity_mw_charging,
            other.charging_efficiency,
            other.capacity_mw_charging,
        )
        .map_err(|_| {
            GridError::Config(format!(
                "{what}: charging efficiencies differ with zero charging capacity on both sides"
            ))
        })?;
        let discharging_efficiency = weighted_average(
            self.discharging_efficiency,
            self.base.capacity_mw,
            other.discharging_efficiency,
            other.base.capacity_mw,
        )
        .map_err(|_| {
            GridError::Config(format!(
                "{what}: discharging efficiencies differ with zero capacity on both sides"
            ))
        })?;

        Ok(Storage {
            kind: self.kind,
            use_: self.use_,
            base: self.base.merged(&other.base, &what),
            capacity_mw_charging: self.capacity_mw_charging + other.capacity_mw_charging,
            min_capacity_mw_charging: self.min_capacity_mw_charging
                + other.min_capacity_mw_charging,
            paid_off_capacity_mw_charging: self.paid_off_capacity_mw_charging
                + other.paid_off_capacity_mw_charging,
            min_charging_capacity_ratio_to_vre: self.min_charging_capacity_ratio_to_vre,
            separate_charging: self.separate_charging.clone(),
            max_energy_mwh: self.max_energy_mwh + other.max_energy_mwh,
            initial_energy_mwh: self.initial_energy_mwh + other.initial_energy_mwh,
            final_energy_mwh: self.final_energy_mwh + other.final_energy_mwh,
            min_final_energy_mwh: self.min_final_energy_mwh + other.min_final_energy_mwh,
            midnight_energy_mwh: self
                .midnight_energy_mwh
                .map(|mwh| mwh + other.midnight_energy_mwh.unwrap_or(0.0)),
            charging_efficiency,
            discharging_efficiency,
            loss_rate_per_day: self.loss_rate_per_day,
            use_mwh_per_day: self.use_mwh_per_day + other.use_mwh_per_day,
            cost_sell_buy_mwh_eur: self.cost_sell_buy_mwh_eur,
            ramp_rate: self.ramp_rate,
            inflow_hourly_data_key: self.inflow_hourly_data_key.clone(),
            inflow_min_discharge_ratio: self.inflow_min_discharge_ratio,
            max_capacity_mw_hourly_data_key: self.max_capacity_mw_hourly_data_key.clone(),
            max_capacity_mw_factor: self.max_capacity_mw_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery(nominal_mw: f64) -> Storage {
        Storage::new(StorageType::LiIon, nominal_mw, SourceEconomics::free())
            .with_fixed_capacities()
            .with_energy(4.0 * nominal_mw, 0.0)
            .with_efficiencies(0.95, 0.95)
    }

    #[test]
    fn test_loss_rate_bound() {
        let mut storage = battery(100.0);
        storage.loss_rate_per_day = 1.0;
        assert!(storage.validate().is_err());
        storage.loss_rate_per_day = 0.1;
        storage.validate().unwrap();
    }

    #[test]
    fn test_final_energy_window() {
        let mut storage = battery(100.0);
        storage.final_energy_mwh = 100.0;
        storage.min_final_energy_mwh = 200.0;
        assert!(storage.validate().is_err());
        storage.min_final_energy_mwh = 50.0;
        storage.validate().unwrap();
    }

    #[test]
    fn test_merge_weights_efficiencies() {
        let mut a = battery(100.0);
        a.discharging_efficiency = 0.9;
        let mut b = battery(300.0);
        b.discharging_efficiency = 0.8;
        let merged = a.merged(&b).unwrap();
        assert_eq!(merged.base.capacity_mw, 400.0);
        assert_eq!(merged.max_energy_mwh, 1600.0);
        assert!((merged.discharging_efficiency - 0.825).abs() < 1e-9);
    }

    #[test]
    fn test_reserve_availability() {
        assert!(StorageType::Pumped.available_for_reserves());
        assert!(StorageType::RunOfRiver.available_for_reserves());
        assert!(!StorageType::LiIon.available_for_reserves());
        assert!(!StorageType::Hydrogen.available_for_reserves());
    }
}
