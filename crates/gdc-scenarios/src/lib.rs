//! # gdc-scenarios: run configuration and parameter defaults
//!
//! A scenario is a YAML document naming the modeled years, per-country
//! sources, storage and reserves, the interconnector graph and the
//! optimization switches. Entities are built by overlaying the configured
//! parameters over a per-technology defaults library (cost figures from
//! public technology catalogues), with fuel-dependent variable and ramp-up
//! costs derived from a selectable price set.

pub mod config;
pub mod costs;
pub mod defaults;
pub mod params;

pub use config::{CountryConfig, CountryEntities, LinkParams, RunConfig};
pub use costs::InputCosts;
pub use params::{
    BasicSourceParams, EconomicsParams, FlexibleSourceParams, Fuel, FuelCostParams,
    ReservesParams, StorageParams,
};
