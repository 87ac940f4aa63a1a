//! Annualized investment cost calculus.
//!
//! Investment costs are annualized through a discounted-cashflow schedule:
//! construction spend is spread over the construction years, the plant then
//! earns over its lifetime, and decommissioning spend follows. All three
//! activities are expressed in discounted years and the total discounted
//! spend is divided by the discounted lifetime to obtain a cost per year of
//! operation.
//!
//! All functions here are scalar. The LP-side capex and opex terms of the
//! dispatch problem are linear in installed capacity, so the builder
//! multiplies the per-MW coefficients computed here into its capacity
//! expressions.

use crate::economics::SourceEconomics;
use crate::interconnector::InterconnectorKind;
use crate::sources::{SourceBase, Storage};

/// Capital is assumed to be needed, on average, half a year into the first
/// year of each activity.
const INITIAL_DELAY_YEARS: f64 = 0.5;

/// Discounted length in years of an activity of duration `activity_years`
/// starting `delay_years` from now: `sum_k rate^-(delay + k)` for
/// `k in 0..activity_years`, with the last term scaled for fractional
/// durations. Durations above 100 years are approximated by the geometric
/// series limit.
pub fn discounted_activity_years(discount_rate: f64, delay_years: f64, activity_years: f64) -> f64 {
    if activity_years > 100.0 {
        return discount_rate.powf(-delay_years) / (1.0 - 1.0 / discount_rate);
    }
    let mut total = 0.0;
    let mut exponent = -delay_years;
    let mut remaining = activity_years;
    while remaining >= 1.0 {
        total += discount_rate.powf(exponent);
        exponent -= 1.0;
        remaining -= 1.0;
    }
    if remaining > 0.0 {
        total += remaining * discount_rate.powf(exponent);
    }
    total
}

/// Annualized investment cost (construction plus decommissioning) per MW of
/// installed capacity, for the given effective lifetime.
pub fn investment_cost_per_mw_year(economics: &SourceEconomics, lifetime_years: f64) -> f64 {
    let rate = economics.discount_rate;
    let construction_years = economics.construction_time_years;
    let decommissioning_years = economics.decommissioning_time_years;

    let construction_discounted_years =
        discounted_activity_years(rate, INITIAL_DELAY_YEARS, construction_years);
    let lifetime_discounted_years =
        discounted_activity_years(rate, INITIAL_DELAY_YEARS + construction_years, lifetime_years);
    let decommissioning_discounted_years = discounted_activity_years(
        rate,
        INITIAL_DELAY_YEARS + construction_years + lifetime_years,
        decommissioning_years,
    );

    let construction_costs_per_kw_eur = construction_discounted_years
        * (economics.overnight_costs_per_kw_eur / construction_years);
    let decommissioning_costs_per_kw_eur = decommissioning_discounted_years
        * (economics.decommissioning_cost_per_kw_eur / decommissioning_years);

    1000.0 * (construction_costs_per_kw_eur + decommissioning_costs_per_kw_eur)
        / lifetime_discounted_years
}

/// Annualized investment cost for `capacity_mw` of installed capacity.
///
/// When the lifetime is specified in hours and a usage estimate is
/// available, the effective lifetime in years is derived from the actual
/// full-load hours per year.
pub fn investment_costs_per_year_eur(
    economics: &SourceEconomics,
    capacity_mw: f64,
    production_mwh: Option<f64>,
) -> f64 {
    let mut lifetime_years = economics.lifetime_years;
    if let (Some(lifetime_hours), Some(production)) = (economics.lifetime_hours, production_mwh) {
        if production > 0.0 && capacity_mw > 0.0 {
            let production_hours = production / capacity_mw;
            lifetime_years = lifetime_hours / production_hours;
        }
    }
    investment_cost_per_mw_year(economics, lifetime_years) * capacity_mw
}

/// Annual fixed costs per MW of installed capacity: fixed O&M plus, unless
/// the lifetime is usage-limited (`lifetime_hours` set, in which case the
/// investment is recovered through opex instead), the annualized investment.
pub fn capex_per_mw_year(economics: &SourceEconomics) -> f64 {
    let mut per_mw = 1000.0 * economics.fixed_o_m_costs_per_kw_eur;
    if economics.lifetime_hours.is_none() {
        per_mw += investment_cost_per_mw_year(economics, economics.lifetime_years);
    }
    per_mw
}

/// Annual fixed costs of a source, excluding capacity that is already paid
/// off (paid-off capacity never enters the optimization; it only lowers
/// reported system costs).
pub fn source_capex_per_year_eur(base: &SourceBase) -> f64 {
    let newly_built_capacity_mw = base.capacity_mw - base.paid_off_capacity_mw;
    newly_built_capacity_mw * capex_per_mw_year(&base.economics)
}

/// Annual fixed costs of a storage facility: discharging side plus, for
/// separately-charged storage (electrolyser-like), the charging side.
pub fn storage_capex_per_year_eur(storage: &Storage) -> f64 {
    let mut capex = (storage.base.capacity_mw - storage.base.paid_off_capacity_mw)
        * capex_per_mw_year(&storage.base.economics);
    if let Some(charging_economics) = &storage.separate_charging {
        capex += (storage.capacity_mw_charging - storage.paid_off_capacity_mw_charging)
            * capex_per_mw_year(charging_economics);
    }
    capex
}

/// Variable cost per MWh. With a usage-limited lifetime the annualized
/// investment moves into this coefficient: divided by actual production when
/// an estimate is available, otherwise by the fair share of full-load hours
/// per year implied by `lifetime_hours / lifetime_years`.
pub fn opex_per_mwh_eur(
    economics: &SourceEconomics,
    capacity_mw: f64,
    production_mwh: Option<f64>,
) -> f64 {
    let mut opex = economics.variable_costs_per_mwh_eur;
    if let Some(lifetime_hours) = economics.lifetime_hours {
        match production_mwh {
            Some(production) if production > 0.0 => {
                opex +=
                    investment_costs_per_year_eur(economics, capacity_mw, Some(production))
                        / production;
            }
            _ => {
                let investment_per_mw_year =
                    investment_cost_per_mw_year(economics, economics.lifetime_years);
                let fair_hours_per_year = lifetime_hours / economics.lifetime_years;
                opex += investment_per_mw_year / fair_hours_per_year;
            }
        }
    }
    opex
}

/// Discharging opex of a storage facility per MWh.
pub fn discharging_opex_per_mwh_eur(storage: &Storage, discharging_mwh: Option<f64>) -> f64 {
    opex_per_mwh_eur(&storage.base.economics, storage.base.capacity_mw, discharging_mwh)
}

/// Charging opex of a storage facility per MWh. Zero unless the storage has
/// a separate charging cost profile.
pub fn charging_opex_per_mwh_eur(storage: &Storage, charging_mwh: Option<f64>) -> f64 {
    match &storage.separate_charging {
        Some(charging_economics) => {
            opex_per_mwh_eur(charging_economics, storage.capacity_mw_charging, charging_mwh)
        }
        None => 0.0,
    }
}

// Interconnector expansion economics. Investment costs per MW of net
// transfer capacity and per km, with the rated-capacity margin already
// folded in (a higher rated capacity is needed to reach the desired NTC).
const RATIO_OF_NTC: f64 = 0.7;
const OVERHEAD_SHARE_OVER_LAND: f64 = 0.75;

const OVERHEAD_400KV_OVERNIGHT_PER_MW_KM_EUR: f64 = 1500.0 / RATIO_OF_NTC;
const UNDERGROUND_400KV_OVERNIGHT_PER_MW_KM_EUR: f64 = 4000.0 / RATIO_OF_NTC;
const SUBMARINE_HVDC_OVERNIGHT_PER_MW_KM_EUR: f64 = 3000.0 / RATIO_OF_NTC;

const OVERHEAD_400KV_FIXED_O_M_PER_MW_KM_EUR: f64 = 20.0;
const SUBMARINE_HVDC_FIXED_O_M_PER_MW_KM_EUR: f64 = 40.0;

const HVAC_LIFETIME_YEARS: f64 = 50.0;
const HVDC_LIFETIME_YEARS: f64 = 30.0;
const HVAC_CONSTRUCTION_TIME_YEARS: f64 = 5.0;
const HVDC_CONSTRUCTION_TIME_YEARS: f64 = 3.0;
const INTERCONNECTOR_DISCOUNT_RATE: f64 = 1.04;

/// Annual cost of an interconnector of the given capacity and length:
/// fixed O&M plus annualized construction costs.
pub fn interconnector_capex_per_year_eur(
    capacity_mw: f64,
    length_km: f64,
    fixed_o_m_costs_per_mw_per_km_eur: f64,
    overnight_costs_per_mw_per_km_eur: f64,
    construction_time_years: f64,
    lifetime_years: f64,
    discount_rate: f64,
) -> f64 {
    let o_m_per_year = capacity_mw * fixed_o_m_costs_per_mw_per_km_eur * length_km;
    let economics = SourceEconomics {
        overnight_costs_per_kw_eur: (overnight_costs_per_mw_per_km_eur / 1000.0) * length_km,
        decommissioning_cost_per_kw_eur: 0.0,
        construction_time_years,
        lifetime_years,
        lifetime_hours: None,
        decommissioning_time_years: 1.0,
        fixed_o_m_costs_per_kw_eur: 0.0,
        variable_costs_per_mwh_eur: 0.0,
        discount_rate,
    };
    o_m_per_year + investment_costs_per_year_eur(&economics, capacity_mw, None)
}

/// Annual cost of expanding a cross-border link by `capacity_mw` over
/// `distance_km`, per link type.
pub fn expansion_capex_per_year_eur(
    capacity_mw: f64,
    distance_km: f64,
    kind: InterconnectorKind,
) -> f64 {
    let (fixed_o_m, overnight, construction_years, lifetime_years) = match kind {
        InterconnectorKind::AcOverland => {
            let underground_share = 1.0 - OVERHEAD_SHARE_OVER_LAND;
            let overnight = OVERHEAD_SHARE_OVER_LAND * OVERHEAD_400KV_OVERNIGHT_PER_MW_KM_EUR
                + underground_share * UNDERGROUND_400KV_OVERNIGHT_PER_MW_KM_EUR;
            (
                OVERHEAD_400KV_FIXED_O_M_PER_MW_KM_EUR,
                overnight,
                HVAC_CONSTRUCTION_TIME_YEARS,
                HVAC_LIFETIME_YEARS,
            )
        }
        InterconnectorKind::HvdcSubmarine => (
            SUBMARINE_HVDC_FIXED_O_M_PER_MW_KM_EUR,
            SUBMARINE_HVDC_OVERNIGHT_PER_MW_KM_EUR,
            HVDC_CONSTRUCTION_TIME_YEARS,
            HVDC_LIFETIME_YEARS,
        ),
    };
    interconnector_capex_per_year_eur(
        capacity_mw,
        distance_km,
        fixed_o_m,
        overnight,
        construction_years,
        lifetime_years,
        INTERCONNECTOR_DISCOUNT_RATE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discounted_years_no_discount_limit() {
        // With rate just above 1, discounted years approach nominal years.
        let years = discounted_activity_years(1.0 + 1e-9, 0.5, 10.0);
        assert!((years - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_discounted_years_fractional_tail() {
        // The last, fractional year is scaled linearly.
        let full = discounted_activity_years(1.05, 0.5, 3.0);
        let fractional = discounted_activity_years(1.05, 0.5, 2.5);
        let tail = 0.5 * 1.05f64.powf(-2.5);
        assert!((full - fractional - tail).abs() < 1e-9);
    }

    #[test]
    fn test_discounted_years_long_lifetime_approximation() {
        // Above 100 years the geometric limit is used; it must dominate the
        // 100-year sum but stay close for high discounting.
        let limit = discounted_activity_years(1.08, 0.5, 150.0);
        let exact = discounted_activity_years(1.08, 0.5, 100.0);
        assert!(limit > exact);
        assert!(limit < exact * 1.01);
    }

    #[test]
    fn test_investment_cost_annualization() {
        // 1000 EUR/kW overnight, built in one year, 20-year lifetime at 5%:
        // the annualized cost must exceed the undiscounted 50 EUR/kW/year.
        let economics = SourceEconomics {
            overnight_costs_per_kw_eur: 1000.0,
            lifetime_years: 20.0,
            construction_time_years: 1.0,
            discount_rate: 1.05,
            ..SourceEconomics::free()
        };
        let per_mw = investment_cost_per_mw_year(&economics, 20.0);
        assert!(per_mw > 50_000.0, "per_mw = {per_mw}");
        assert!(per_mw < 100_000.0, "per_mw = {per_mw}");
    }

    #[test]
    fn test_usage_limited_lifetime_moves_investment_to_opex() {
        let economics = SourceEconomics {
            overnight_costs_per_kw_eur: 500.0,
            lifetime_years: 10.0,
            lifetime_hours: Some(40_000.0),
            discount_rate: 1.05,
            ..SourceEconomics::free()
        };
        // Capex keeps only fixed O&M (none here).
        assert_eq!(capex_per_mw_year(&economics), 0.0);
        // Opex carries the investment via the fair-hours share.
        let opex = opex_per_mwh_eur(&economics, 100.0, None);
        assert!(opex > 0.0);
        // With a usage estimate of exactly the fair share, the two paths agree.
        let fair_production = 100.0 * 40_000.0 / 10.0;
        let opex_used = opex_per_mwh_eur(&economics, 100.0, Some(fair_production));
        assert!((opex - opex_used).abs() / opex < 1e-9);
    }

    #[test]
    fn test_expansion_capex_scales_with_capacity_and_distance() {
        let one = expansion_capex_per_year_eur(100.0, 100.0, InterconnectorKind::AcOverland);
        let double_cap = expansion_capex_per_year_eur(200.0, 100.0, InterconnectorKind::AcOverland);
        assert!((double_cap - 2.0 * one).abs() / one < 1e-9);
        let hvdc = expansion_capex_per_year_eur(100.0, 100.0, InterconnectorKind::HvdcSubmarine);
        assert!(hvdc > 0.0);
    }
}
