//! Canonical column names of the per-region hourly tables.
//!
//! Input loaders, the LP extractor, the price estimator and the statistics
//! layer all address columns through these keys so that persisted solutions
//! stay readable across the pipeline.

use gdc_core::{BasicSourceType, FlexibleSourceType, Region, Storage, StorageType};

pub const DATE: &str = "Date";
pub const LOAD: &str = "Load";
pub const LOAD_BASE: &str = "Load_Base";
pub const LOAD_BEFORE_FLEXIBILITY: &str = "Load_Before_Flexibility";
pub const LOAD_HEAT_PUMPS: &str = "Load_Heat_Pumps";
/// Hourly heat demand, similarly to electricity in MW.
pub const HEAT_DEMAND: &str = "Heat_Demand_MW";
/// Hourly heat production from flexible sources, in MW.
pub const HEAT_FLEXIBLE_PRODUCTION: &str = "Heat_Flexible";
pub const IMPORT: &str = "Import";
pub const EXPORT: &str = "Export";
pub const NET_IMPORT: &str = "Net_Import";

pub const SOLAR: &str = "Solar";
pub const WIND: &str = "Wind";
pub const WIND_ONSHORE: &str = "Wind onshore";
pub const WIND_OFFSHORE: &str = "Wind offshore";
pub const NUCLEAR: &str = "Nuclear";
pub const HYDRO: &str = "Hydro";
pub const HYDRO_INFLOW_ROR: &str = "Hydro RoR inflow";
pub const HYDRO_INFLOW_RESERVOIR: &str = "Hydro reservoir inflow";
pub const HYDRO_INFLOW_PUMPED_OPEN: &str = "Hydro pumped open inflow";
pub const HYDRO_INFLOW_PONDAGE: &str = "Hydro pondage inflow";

pub const FLEXIBLE: &str = "Flexible";
pub const ELECTRICITY_EQUIVALENT_FLEXIBLE: &str = "Electricity_Equivalent_Flexible";
pub const CHARGING: &str = "Charging";
pub const DISCHARGING: &str = "Discharging";
pub const LOAD_SHIFT: &str = "Load_Shift";
pub const VRE: &str = "VRE";
pub const RESIDUAL: &str = "Residual";
pub const PRODUCTION: &str = "Production";
pub const TOTAL_WITHOUT_STORAGE: &str = "Total_Without_Storage";
pub const TOTAL: &str = "Total";
pub const STORABLE: &str = "Storable";
pub const CURTAILMENT: &str = "Curtailment";
pub const SHORTAGE: &str = "Shortage";

pub const PRICE: &str = "Price";
pub const PRICE_EXPORT: &str = "Price_Export";
pub const PRICE_IMPORT: &str = "Price_Import";
pub const PRICE_TYPE: &str = "Price_Type";

/// Linear optimization stops with some error in the order of W; values up
/// to 1 kW are treated as zero.
pub fn small_threshold() -> f64 {
    0.001
}

/// Approximate a zero price as nuclear and hydro covering the residual load.
pub fn has_excess(nuclear_mw: f64, hydro_mw: f64, residual_mw: f64) -> bool {
    (nuclear_mw + hydro_mw) - residual_mw > small_threshold()
}

pub fn has_curtailment(curtailment_mw: f64) -> bool {
    curtailment_mw > small_threshold()
}

pub fn basic_key(kind: BasicSourceType) -> &'static str {
    match kind {
        BasicSourceType::Solar => SOLAR,
        BasicSourceType::Onshore => WIND_ONSHORE,
        BasicSourceType::Offshore => WIND_OFFSHORE,
        BasicSourceType::Nuclear => NUCLEAR,
        BasicSourceType::Hydro => HYDRO,
    }
}

pub fn basic_used_key(kind: BasicSourceType) -> String {
    format!("{}_Used", basic_key(kind))
}

pub fn basic_excess_key(kind: BasicSourceType) -> String {
    format!("{}_Excess", basic_key(kind))
}

pub fn flexible_basic_predefined_key(kind: BasicSourceType) -> String {
    format!("{}_Predefined", basic_key(kind))
}

pub fn flexible_basic_decrease_key(kind: BasicSourceType) -> String {
    format!("{}_Decrease", basic_key(kind))
}

pub fn flexible_key(kind: FlexibleSourceType) -> String {
    format!("Flexible_{}", kind.id())
}

pub fn flexible_electricity_equivalent_key(kind: FlexibleSourceType) -> String {
    format!("Electricity_Equivalent_Flexible_{}", kind.id())
}

pub fn flexible_heat_key(kind: FlexibleSourceType) -> String {
    format!("Heat_Flexible_{}", kind.id())
}

pub fn charging_key(storage: &Storage) -> String {
    storage_charging_key(storage.kind)
}

pub fn discharging_key(storage: &Storage) -> String {
    storage_discharging_key(storage.kind)
}

pub fn state_of_charge_key(storage: &Storage) -> String {
    format!("State_Of_Charge_{}", storage.kind.id())
}

pub fn storage_charging_key(kind: StorageType) -> String {
    format!("Charging_{}", kind.id())
}

pub fn storage_discharging_key(kind: StorageType) -> String {
    format!("Discharging_{}", kind.id())
}

pub fn import_key(from: &Region) -> String {
    format!("Import_{from}")
}

pub fn export_key(to: &Region) -> String {
    format!("Export_{to}")
}

pub fn basic_ramp_up_key(kind: BasicSourceType) -> String {
    format!("Ramp_Up_{}", basic_key(kind))
}

pub fn flexible_ramp_up_key(kind: FlexibleSourceType) -> String {
    format!("Ramp_Up_{}", kind.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdc_core::SourceEconomics;

    #[test]
    fn test_basic_keys() {
        assert_eq!(basic_key(BasicSourceType::Onshore), "Wind onshore");
        assert_eq!(basic_key(BasicSourceType::Solar), "Solar");
        assert_eq!(flexible_basic_decrease_key(BasicSourceType::Nuclear), "Nuclear_Decrease");
    }

    #[test]
    fn test_entity_keys() {
        assert_eq!(flexible_key(FlexibleSourceType::GasCcgt), "Flexible_gas_ccgt");
        let storage = Storage::new(StorageType::LiIon4h, 100.0, SourceEconomics::free());
        assert_eq!(charging_key(&storage), "Charging_li-4");
        assert_eq!(state_of_charge_key(&storage), "State_Of_Charge_li-4");
        assert_eq!(import_key(&Region::new("DE")), "Import_DE");
    }

    #[test]
    fn test_thresholded_predicates() {
        assert!(!has_curtailment(0.0005));
        assert!(has_curtailment(0.1));
        assert!(has_excess(10.0, 0.0, 9.0));
        assert!(!has_excess(10.0, 0.0, 10.0));
    }
}
