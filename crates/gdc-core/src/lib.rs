//! # gdc-core: entity model and cost calculus for the grid dispatch engine
//!
//! This crate holds the typed entity model of a multi-region electricity
//! system (basic non-dispatchable sources, flexible dispatchable sources,
//! storage facilities, balancing reserves and cross-border
//! interconnectors) together with the discounted-cashflow cost calculus
//! that turns overnight investment costs into the annualized capex and
//! per-MWh opex coefficients of the dispatch LP.
//!
//! The entities are immutable through LP construction; after a solve, the
//! extractor may scale installed capacities by the optimized installed
//! factors. Invariants (capacity ordering, ramp-rate and loss-rate ranges,
//! final-energy windows) are checked by the `validate` constructors before
//! a problem is ever built, so the solver only sees consistent data.

pub mod capex;
pub mod economics;
pub mod error;
pub mod interconnector;
pub mod opex;
pub mod region;
pub mod sources;

pub use economics::SourceEconomics;
pub use error::{GridError, GridResult};
pub use interconnector::{
    Interconnector, InterconnectorKind, Interconnectors, OUTFLOW_CAPACITY_COST_EUR_PER_MWH,
};
pub use region::Region;
pub use sources::{
    BasicFlexibility, BasicSource, BasicSourceType, FlexibleSource, FlexibleSourceType,
    HeatCoupling, ProductionLimit, ProfileOverride, Reserves, SourceBase, Storage, StorageType,
    StorageUse,
};
