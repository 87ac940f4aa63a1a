//! Economic parameters of a power source.
//!
//! [`SourceEconomics`] captures the funding, construction and operating cost
//! figures used by both the annualized capex calculus and the per-MWh opex
//! coefficients of the LP objective.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// Economic parameters related to the funding, construction and operations
/// of a power source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEconomics {
    pub overnight_costs_per_kw_eur: f64,
    pub decommissioning_cost_per_kw_eur: f64,
    /// Assuming costs are spread linearly over the years.
    pub construction_time_years: f64,
    /// Fixed lifetime, independent of usage.
    pub lifetime_years: f64,
    /// Lifetime may also be specified in hours of full utilization. In this
    /// case this number is what mainly determines the costs;
    /// `lifetime_years` is only used as a supportive figure to estimate
    /// interest costs in the linear optimization.
    pub lifetime_hours: Option<f64>,
    /// Assuming costs are spread linearly over the years.
    pub decommissioning_time_years: f64,
    /// Part of operations and maintenance (O&M) that is independent of the
    /// capacity factor.
    pub fixed_o_m_costs_per_kw_eur: f64,
    /// Includes fuel, carbon price, and the variable part of O&M.
    pub variable_costs_per_mwh_eur: f64,
    /// Discount rate as a multiplicative factor, e.g. 1.05 denotes a 5% rate.
    pub discount_rate: f64,
}

impl SourceEconomics {
    /// Cost-free economics with the minimal valid schedule. Useful as a
    /// starting point for tests and for virtual sources that only carry a
    /// variable cost.
    pub fn free() -> Self {
        SourceEconomics {
            overnight_costs_per_kw_eur: 0.0,
            decommissioning_cost_per_kw_eur: 0.0,
            construction_time_years: 1.0,
            lifetime_years: 1.0,
            lifetime_hours: None,
            decommissioning_time_years: 1.0,
            fixed_o_m_costs_per_kw_eur: 0.0,
            variable_costs_per_mwh_eur: 0.0,
            discount_rate: 1.08,
        }
    }

    /// Cost-free economics with the given variable cost per MWh.
    pub fn with_variable_costs(variable_costs_per_mwh_eur: f64) -> Self {
        SourceEconomics {
            variable_costs_per_mwh_eur,
            ..SourceEconomics::free()
        }
    }

    pub fn validate(&self, what: &str) -> GridResult<()> {
        if self.lifetime_years <= 0.0 {
            return Err(GridError::Config(format!(
                "{what}: lifetime_years must be positive, got {}",
                self.lifetime_years
            )));
        }
        if self.construction_time_years <= 0.0 {
            return Err(GridError::Config(format!(
                "{what}: construction_time_years must be positive, got {}",
                self.construction_time_years
            )));
        }
        if self.decommissioning_time_years <= 0.0 {
            return Err(GridError::Config(format!(
                "{what}: decommissioning_time_years must be positive, got {}",
                self.decommissioning_time_years
            )));
        }
        if self.discount_rate < 1.0 {
            return Err(GridError::Config(format!(
                "{what}: discount_rate is a multiplicative factor and must be >= 1, got {}",
                self.discount_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_is_valid() {
        SourceEconomics::free().validate("test").unwrap();
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let mut economics = SourceEconomics::free();
        economics.lifetime_years = 0.0;
        assert!(economics.validate("test").is_err());
    }

    #[test]
    fn test_subunit_discount_rate_rejected() {
        let mut economics = SourceEconomics::free();
        economics.discount_rate = 0.95;
        assert!(economics.validate("test").is_err());
    }
}
