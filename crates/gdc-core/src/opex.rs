//! Operating cost helpers for fuel-burning sources.
//!
//! These derive the per-MWh variable cost and the per-MW ramp-up cost from
//! fuel prices (per MWh of lower heating value), electric efficiency and
//! emission allowance prices.

/// Variable cost per MWh of electricity: fuel and allowances per MWh of
/// heat input divided by electric efficiency, plus variable O&M.
pub fn operation_cost_per_mwh_eur(
    variable_o_m_per_mwh_el_eur: f64,
    fuel_price_per_mwh_lhv_eur: f64,
    efficiency_el: f64,
    emissions_per_mwh_lhv_t: f64,
    emission_price_per_t_eur: f64,
) -> f64 {
    let costs_per_mwh_lhv_eur =
        fuel_price_per_mwh_lhv_eur + emissions_per_mwh_lhv_t * emission_price_per_t_eur;
    let costs_per_mwh_el_eur = costs_per_mwh_lhv_eur / efficiency_el;
    costs_per_mwh_el_eur + variable_o_m_per_mwh_el_eur
}

/// Fixed cost of increasing output by one MW: component wear plus the extra
/// fuel (given in GJ per MW) and its emission allowances.
pub fn ramp_up_cost_per_mw_eur(
    wear_cost_per_mw_eur: f64,
    ramp_fuel_per_mw_gj: f64,
    fuel_cost_per_mwh_lhv_eur: f64,
    emissions_per_mwh_lhv_t: f64,
    emission_price_per_t_eur: f64,
) -> f64 {
    let ramp_fuel_per_mw_mwh_lhv = ramp_fuel_per_mw_gj / 3.6;
    let fuel_costs = ramp_fuel_per_mw_mwh_lhv * fuel_cost_per_mwh_lhv_eur;

    let emissions_price_per_mwh_lhv_eur = emission_price_per_t_eur * emissions_per_mwh_lhv_t;
    let emissions_cost = emissions_price_per_mwh_lhv_eur * ramp_fuel_per_mw_mwh_lhv;
    wear_cost_per_mw_eur + fuel_costs + emissions_cost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_cost_divides_by_efficiency() {
        // 20 EUR/MWh fuel at 50% efficiency is 40 EUR/MWh electric.
        let cost = operation_cost_per_mwh_eur(4.0, 20.0, 0.5, 0.0, 0.0);
        assert!((cost - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_operation_cost_includes_allowances() {
        let without = operation_cost_per_mwh_eur(0.0, 20.0, 0.4, 0.2, 0.0);
        let with = operation_cost_per_mwh_eur(0.0, 20.0, 0.4, 0.2, 80.0);
        assert!((with - without - 0.2 * 80.0 / 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_ramp_up_cost() {
        // 18 GJ/MW = 5 MWh LHV per MW of ramp.
        let cost = ramp_up_cost_per_mw_eur(50.0, 18.0, 10.0, 0.0, 0.0);
        assert!((cost - 100.0).abs() < 1e-9);
    }
}
