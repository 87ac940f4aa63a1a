//! Flexible (dispatchable) sources.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::sources::{HeatCoupling, SourceBase};

/// Kinds of dispatchable sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexibleSourceType {
    /// General biogas/biomethane-fired plant.
    Biogas,
    /// Biogas-fired OCGT plant.
    BiogasPeak,
    /// Hard coal-fired power plant.
    Coal,
    /// Hard coal-fired plant with a back-pressure turbine for heat
    /// co-generation.
    CoalBackpressure,
    /// Hard coal-fired plant with a steam extraction turbine.
    CoalExtraction,
    /// General natural gas-fired power plant.
    Gas,
    /// Natural gas-fired CCGT power plant.
    GasCcgt,
    /// Natural gas-fired CCGT plant with carbon capture.
    GasCcgtCcs,
    /// Natural gas-fired CCGT plant with extraction turbine co-generation.
    GasChp,
    /// Natural gas-fired engine.
    GasEngine,
    /// Peaking gas-fired OCGT power plant.
    GasPeak,
    /// General lignite-fired power plant.
    Lignite,
    /// Lignite-fired plant with a back-pressure turbine.
    LigniteBackpressure,
    /// Lignite-fired plant with a steam extraction turbine.
    LigniteExtraction,
    /// Expected energy not served: virtual source of power when load is
    /// higher than production.
    LossOfLoad,
    /// Mazut-fired power plant.
    Mazut,
    /// Power generation from burning fossil-based fuel oils.
    FossilOil,
    /// Abstract "other renewables" power source.
    OtherRes,
    /// General solid biomass-burning power plant.
    SolidBiomass,
    /// Combined heat and power solid biomass-burning plant.
    SolidBiomassChp,
    /// Waste-burning power plant.
    Waste,
    /// Small modular nuclear.
    Smr,
    /// Demand reduction when generation is not sufficient (very expensive).
    Dsr,
}

impl FlexibleSourceType {
    pub fn id(&self) -> &'static str {
        match self {
            FlexibleSourceType::Biogas => "biogas",
            FlexibleSourceType::BiogasPeak => "bio_peak",
            FlexibleSourceType::Coal => "coal",
            FlexibleSourceType::CoalBackpressure => "coal_bp",
            FlexibleSourceType::CoalExtraction => "coal_ex",
            FlexibleSourceType::Gas => "gas",
            FlexibleSourceType::GasCcgt => "gas_ccgt",
            FlexibleSourceType::GasCcgtCcs => "gas_ccgt_ccs",
            FlexibleSourceType::GasChp => "gas_chp",
            FlexibleSourceType::GasEngine => "gas_eng",
            FlexibleSourceType::GasPeak => "gas_peak",
            FlexibleSourceType::Lignite => "lig",
            FlexibleSourceType::LigniteBackpressure => "lig_bp",
            FlexibleSourceType::LigniteExtraction => "lig_ex",
            FlexibleSourceType::LossOfLoad => "eens",
            FlexibleSourceType::Mazut => "mazut",
            FlexibleSourceType::FossilOil => "oil",
            FlexibleSourceType::OtherRes => "o_RES",
            FlexibleSourceType::SolidBiomass => "bio",
            FlexibleSourceType::SolidBiomassChp => "b_CHP",
            FlexibleSourceType::Waste => "waste",
            FlexibleSourceType::Smr => "smr",
            FlexibleSourceType::Dsr => "dsr",
        }
    }
}

/// Cap on the total production of a flexible source over the whole modeled
/// period (electricity equivalent in the case of CHP).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProductionLimit {
    /// Cap on the average capacity factor. Scales with capacity
    /// optimization.
    CapacityFactor(f64),
    /// Absolute cap in TWh per year.
    TotalTwh(f64),
}

/// A dispatchable generator whose output the LP chooses freely within
/// capacity and ramp limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexibleSource {
    pub kind: FlexibleSourceType,
    pub base: SourceBase,
    pub limit: Option<ProductionLimit>,
    /// Power (as a ratio of capacity) by which production can change up or
    /// down in one hour.
    pub ramp_rate: f64,
    /// Fixed cost for increasing output by 1 MW.
    pub ramp_up_cost_mw_eur: f64,
    /// Type of heat production, if any.
    pub heat: Option<HeatCoupling>,
}

impl FlexibleSource {
    pub fn new(kind: FlexibleSourceType, base: SourceBase) -> Self {
        FlexibleSource {
            kind,
            base,
            limit: None,
            ramp_rate: 1.0,
            ramp_up_cost_mw_eur: 0.0,
            heat: None,
        }
    }

    pub fn with_ramp(mut self, ramp_rate: f64, ramp_up_cost_mw_eur: f64) -> Self {
        self.ramp_rate = ramp_rate;
        self.ramp_up_cost_mw_eur = ramp_up_cost_mw_eur;
        self
    }

    pub fn with_heat(mut self, heat: HeatCoupling) -> Self {
        self.heat = Some(heat);
        self
    }

    pub fn with_limit(mut self, limit: ProductionLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> GridResult<()> {
        let what = format!("flexible source {}", self.kind.id());
        self.base.validate(&what)?;
        if !(self.ramp_rate > 0.0 && self.ramp_rate <= 1.0) {
            return Err(GridError::Config(format!(
                "{what}: ramp rate must be in (0, 1], got {}",
                self.ramp_rate
            )));
        }
        Ok(())
    }

    /// Sum of two sources of the same kind for region aggregation.
    /// Production limits add up; ramp and heat parameters must match.
    pub fn merged(&self, other: &FlexibleSource) -> GridResult<FlexibleSource> {
        if self.kind != other.kind {
            return Err(GridError::Config(format!(
                "cannot merge flexible sources of kinds {} and {}",
                self.kind.id(),
                other.kind.id()
            )));
        }
        let what = format!("flexible source {}", self.kind.id());
        if self.ramp_rate != other.ramp_rate
            || self.ramp_up_cost_mw_eur != other.ramp_up_cost_mw_eur
        {
            return Err(GridError::Config(format!(
                "{what}: ramp parameters must match when aggregating"
            )));
        }
        if self.heat != other.heat {
            return Err(GridError::Config(format!(
                "{what}: heat couplings must match when aggregating"
            )));
        }
        let limit = match (self.limit, other.limit) {
            (Some(ProductionLimit::TotalTwh(a)), Some(ProductionLimit::TotalTwh(b))) => {
                Some(ProductionLimit::TotalTwh(a + b))
            }
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
            _ => {
                return Err(GridError::Config(format!(
                    "{what}: incompatible production limits when aggregating"
                )))
            }
        };
        Ok(FlexibleSource {
            kind: self.kind,
            base: self.base.merged(&other.base, &what),
            limit,
            ramp_rate: self.ramp_rate,
            ramp_up_cost_mw_eur: self.ramp_up_cost_mw_eur,
            heat: self.heat.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economics::SourceEconomics;

    fn gas(capacity_mw: f64) -> FlexibleSource {
        FlexibleSource::new(
            FlexibleSourceType::GasCcgt,
            SourceBase::new(capacity_mw, SourceEconomics::with_variable_costs(80.0)),
        )
    }

    #[test]
    fn test_ramp_rate_validation() {
        assert!(gas(100.0).with_ramp(1.5, 0.0).validate().is_err());
        assert!(gas(100.0).with_ramp(0.5, 0.0).validate().is_ok());
    }

    #[test]
    fn test_merge_adds_total_twh_limits() {
        let a = gas(100.0).with_limit(ProductionLimit::TotalTwh(1.0));
        let b = gas(200.0).with_limit(ProductionLimit::TotalTwh(2.0));
        let merged = a.merged(&b).unwrap();
        assert_eq!(merged.base.capacity_mw, 300.0);
        assert_eq!(merged.limit, Some(ProductionLimit::TotalTwh(3.0)));
    }

    #[test]
    fn test_merge_rejects_mismatched_ramp() {
        let a = gas(100.0).with_ramp(0.5, 0.0);
        let b = gas(100.0).with_ramp(0.3, 0.0);
        assert!(a.merged(&b).is_err());
    }
}
