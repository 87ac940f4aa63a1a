//! Basic (non-dispatchable) sources.
//!
//! A basic source produces a predefined hourly curve. A basic source with
//! [`BasicFlexibility`] may additionally decrease production below the
//! curve, within bounds, which turns its hourly output into an LP variable.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::region::Region;
use crate::sources::SourceBase;

/// Kinds of basic sources with predefined hourly generation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicSourceType {
    Solar,
    Onshore,
    Offshore,
    Hydro,
    Nuclear,
}

impl BasicSourceType {
    pub const ALL: [BasicSourceType; 5] = [
        BasicSourceType::Solar,
        BasicSourceType::Onshore,
        BasicSourceType::Offshore,
        BasicSourceType::Hydro,
        BasicSourceType::Nuclear,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            BasicSourceType::Solar => "solar",
            BasicSourceType::Onshore => "onshore",
            BasicSourceType::Offshore => "offshore",
            BasicSourceType::Hydro => "hydro",
            BasicSourceType::Nuclear => "nuclear",
        }
    }

    pub fn is_wind(&self) -> bool {
        matches!(self, BasicSourceType::Onshore | BasicSourceType::Offshore)
    }

    pub fn is_variable_renewable(&self) -> bool {
        self.is_wind() || *self == BasicSourceType::Solar
    }
}

/// Redirection of the production profile to another region's normalized
/// curve, scaled to the given installed capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverride {
    pub region: Region,
    pub installed_gw: f64,
    pub source_type: Option<BasicSourceType>,
}

/// Bounded downward flexibility of a basic source.
///
/// Two modes of decreasing production can be combined: `max_decrease_mw`
/// shrinks with the current output ratio (a fleet running at 50% of nominal
/// output can only shed half of the nominal decrease), while
/// `min_production_mw` is an absolute floor. In hours with the predefined
/// curve below the floor, production follows the curve with no flexibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicFlexibility {
    /// Maximum decrease of production compared to the predefined curve.
    pub max_decrease_mw: f64,
    /// Minimum level to which production can sink.
    pub min_production_mw: f64,
    /// Power (as a ratio of capacity) by which production can change up or
    /// down in one hour.
    pub ramp_rate: f64,
    /// Fixed cost for increasing output by 1 MW.
    pub ramp_up_cost_mw_eur: f64,
}

/// A source whose hourly output is taken from a predefined curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicSource {
    pub kind: BasicSourceType,
    pub base: SourceBase,
    pub profile_override: Option<ProfileOverride>,
    pub flexibility: Option<BasicFlexibility>,
}

impl BasicSource {
    pub fn new(kind: BasicSourceType, base: SourceBase) -> Self {
        BasicSource {
            kind,
            base,
            profile_override: None,
            flexibility: None,
        }
    }

    pub fn with_flexibility(mut self, flexibility: BasicFlexibility) -> Self {
        self.flexibility = Some(flexibility);
        self
    }

    /// Whether this source actually exposes flexibility to the LP (a
    /// flexibility block with zero allowed decrease is inert).
    pub fn is_truly_flexible(&self) -> bool {
        match &self.flexibility {
            Some(flexibility) => {
                flexibility.max_decrease_mw > 0.0
                    && flexibility.min_production_mw < self.base.capacity_mw
            }
            None => false,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        let what = format!("basic source {}", self.kind.id());
        self.base.validate(&what)?;
        if let Some(flexibility) = &self.flexibility {
            if !(flexibility.ramp_rate > 0.0 && flexibility.ramp_rate <= 1.0) {
                return Err(GridError::Config(format!(
                    "{what}: ramp rate must be in (0, 1], got {}",
                    flexibility.ramp_rate
                )));
            }
            if flexibility.max_decrease_mw < 0.0 || flexibility.min_production_mw < 0.0 {
                return Err(GridError::Config(format!(
                    "{what}: flexibility bounds must be non-negative"
                )));
            }
        }
        Ok(())
    }

    /// Sum of two sources of the same kind for region aggregation.
    pub fn merged(&self, other: &BasicSource) -> GridResult<BasicSource> {
        if self.kind != other.kind {
            return Err(GridError::Config(format!(
                "cannot merge basic sources of kinds {} and {}",
                self.kind.id(),
                other.kind.id()
            )));
        }
        let what = format!("basic source {}", self.kind.id());
        let flexibility = match (&self.flexibility, &other.flexibility) {
            (Some(a), Some(b)) => {
                if a.ramp_rate != b.ramp_rate || a.ramp_up_cost_mw_eur != b.ramp_up_cost_mw_eur {
                    return Err(GridError::Config(format!(
                        "{what}: ramp parameters must match when aggregating"
                    )));
                }
                Some(BasicFlexibility {
                    max_decrease_mw: a.max_decrease_mw + b.max_decrease_mw,
                    min_production_mw: a.min_production_mw + b.min_production_mw,
                    ramp_rate: a.ramp_rate,
                    ramp_up_cost_mw_eur: a.ramp_up_cost_mw_eur,
                })
            }
            (None, None) => None,
            _ => {
                return Err(GridError::Config(format!(
                    "{what}: cannot merge a flexible and a non-flexible source"
                )))
            }
        };
        Ok(BasicSource {
            kind: self.kind,
            base: self.base.merged(&other.base, &what),
            profile_override: None,
            flexibility,
        })
    }
}
