//! Run configuration.
//!
//! One YAML document describes a complete run: the modeled years, the
//! per-country entity parameters, the interconnector declarations and the
//! optimization and solver switches. Hourly time series are loaded by
//! external collaborators and joined with the built entities by the caller.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use gdc_core::{
    BasicSource, BasicSourceType, FlexibleSource, FlexibleSourceType, GridError, GridResult,
    Interconnector, InterconnectorKind, Interconnectors, Region, Reserves, Storage,
};

use crate::costs::InputCosts;
use crate::defaults::{basic_source_defaults, flexible_source_defaults, storage_defaults};
use crate::params::{
    BasicSourceParams, FlexibleSourceParams, ReservesParams, StorageParams,
};

/// One country's entity parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryConfig {
    #[serde(default)]
    pub basic_sources: BTreeMap<BasicSourceType, BasicSourceParams>,
    #[serde(default)]
    pub flexible_sources: BTreeMap<FlexibleSourceType, FlexibleSourceParams>,
    #[serde(default)]
    pub storage: Vec<StorageParams>,
    /// Demand scaling factors, consumed by the load extrapolation pipeline.
    #[serde(default)]
    pub load_factors: Option<serde_yaml::Value>,
    #[serde(default)]
    pub reserves: Option<ReservesParams>,
    /// Include this country's district heating demand in the heat balance.
    #[serde(default)]
    pub heat_demand: Option<bool>,
    /// Temperature series selector, consumed by the heat demand estimator.
    #[serde(default)]
    pub temperatures: Option<serde_yaml::Value>,
    /// Merge this country into the named aggregate region for reporting.
    #[serde(default)]
    pub in_aggregate: Option<String>,
}

/// A directed (or, with `symmetric`, bidirectional) link declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkParams {
    #[serde(default)]
    pub capacity_mw: f64,
    #[serde(default)]
    pub paid_off_capacity_mw: f64,
    #[serde(default)]
    pub loss: f64,
    #[serde(default)]
    pub length_km: f64,
    #[serde(rename = "type", default)]
    pub kind: Option<InterconnectorKind>,
    #[serde(default)]
    pub symmetric: bool,
}

/// The whole run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: Option<String>,
    /// Calendar years the joint hourly index spans.
    pub common_years: Vec<i32>,
    /// Weather years of the ENTSO-E dataset, one per common year.
    #[serde(default)]
    pub entsoe_years: Vec<i32>,
    /// Weather years of the PECD dataset, one per common year.
    #[serde(default)]
    pub pecd_years: Vec<i32>,
    pub countries: BTreeMap<String, CountryConfig>,
    #[serde(default)]
    pub interconnectors: BTreeMap<String, BTreeMap<String, LinkParams>>,
    /// Fuel and allowance price set (a preset name).
    #[serde(default)]
    pub input_costs: Option<String>,
    /// Day/week/region selector consumed by the plotting layer.
    #[serde(default)]
    pub filter: Option<serde_yaml::Value>,
    /// Output format selector consumed by the reporting layer.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub optimize_capex: bool,
    #[serde(default)]
    pub optimize_heat: bool,
    #[serde(default)]
    pub optimize_ramp_up_costs: bool,
    #[serde(default)]
    pub load_previous_solution: bool,
    #[serde(default)]
    pub include_transmission_loss_in_price: bool,
    /// Preferred LP backend by name.
    #[serde(default)]
    pub solver: Option<String>,
    #[serde(default)]
    pub solver_timeout_minutes: Option<u64>,
    #[serde(default)]
    pub solver_shift_ipm_termination_by_orders: u32,
}

/// One country's built entities, ready to be joined with its hourly data.
#[derive(Debug, Clone)]
pub struct CountryEntities {
    pub basic_sources: BTreeMap<BasicSourceType, BasicSource>,
    pub flexible_sources: Vec<FlexibleSource>,
    pub storage: Vec<Storage>,
    pub reserves: Option<Reserves>,
    pub heat_demand: bool,
    pub in_aggregate: Option<Region>,
}

impl RunConfig {
    pub fn from_yaml_str(yaml: &str) -> GridResult<RunConfig> {
        let config: RunConfig =
            serde_yaml::from_str(yaml).map_err(|err| GridError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> GridResult<RunConfig> {
        let yaml = std::fs::read_to_string(path)?;
        RunConfig::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.common_years.is_empty() {
            return Err(GridError::Config("common_years must not be empty".into()));
        }
        for (name, years) in [("entsoe_years", &self.entsoe_years), ("pecd_years", &self.pecd_years)]
        {
            if !years.is_empty() && years.len() != self.common_years.len() {
                return Err(GridError::Config(format!(
                    "{name} has {} entries for {} common years",
                    years.len(),
                    self.common_years.len()
                )));
            }
        }
        if self.countries.is_empty() {
            return Err(GridError::Config("no countries configured".into()));
        }
        Ok(())
    }

    /// Number of modeled weather years.
    pub fn num_years(&self) -> usize {
        self.common_years.len()
    }

    pub fn input_costs(&self) -> GridResult<InputCosts> {
        match &self.input_costs {
            Some(name) => InputCosts::by_name(name),
            None => Ok(InputCosts::current()),
        }
    }

    /// Build the typed entities of every country, applying the defaults
    /// library underneath the configured parameters. Every country gets a
    /// loss-of-load source so that adequacy always has a (very expensive)
    /// fallback.
    pub fn build_entities(&self) -> GridResult<BTreeMap<Region, CountryEntities>> {
        let costs = self.input_costs()?;
        let mut entities = BTreeMap::new();
        for (name, country) in &self.countries {
            let region = Region::new(name.clone());

            let mut basic_sources = BTreeMap::new();
            for (kind, params) in &country.basic_sources {
                let merged = params.clone().overlaid(&basic_source_defaults(*kind));
                basic_sources.insert(*kind, merged.build(*kind)?);
            }

            let mut flexible_params = country.flexible_sources.clone();
            flexible_params
                .entry(FlexibleSourceType::LossOfLoad)
                .or_default();
            let mut flexible_sources = Vec::new();
            for (kind, params) in &flexible_params {
                let merged = params.clone().overlaid(&flexible_source_defaults(*kind));
                flexible_sources.push(merged.build(*kind, &costs)?);
            }

            let mut storage = Vec::new();
            for params in &country.storage {
                let kind = params.kind.ok_or_else(|| {
                    GridError::Config(format!("{name}: storage entry is missing its type"))
                })?;
                let merged = params.clone().overlaid(&storage_defaults(kind));
                storage.push(merged.build()?);
            }

            entities.insert(
                region,
                CountryEntities {
                    basic_sources,
                    flexible_sources,
                    storage,
                    reserves: country.reserves.as_ref().map(ReservesParams::build),
                    heat_demand: country.heat_demand.unwrap_or(false),
                    in_aggregate: country
                        .in_aggregate
                        .as_ref()
                        .map(|name| Region::new(name.clone())),
                },
            );
        }
        Ok(entities)
    }

    /// Build the directed link graph, restricted to the configured
    /// countries. Symmetric declarations expand into two directed links.
    pub fn build_interconnectors(&self) -> GridResult<Interconnectors> {
        let mut links = Interconnectors::new();
        for (from, to_map) in &self.interconnectors {
            if !self.countries.contains_key(from) {
                continue;
            }
            for (to, params) in to_map {
                if !self.countries.contains_key(to) {
                    continue;
                }
                let link = Interconnector {
                    capacity_mw: params.capacity_mw,
                    paid_off_capacity_mw: params.paid_off_capacity_mw,
                    loss: params.loss,
                    length_km: params.length_km,
                    kind: params.kind.unwrap_or(InterconnectorKind::AcOverland),
                };
                if params.symmetric {
                    links.insert_symmetric(Region::new(from.clone()), Region::new(to.clone()), link);
                } else {
                    links.insert(Region::new(from.clone()), Region::new(to.clone()), link);
                }
            }
        }
        links.validate()?;
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
name: two-country-example
common_years: [2020]
entsoe_years: [2019]
pecd_years: [2009]
countries:
  CZ:
    basic_sources:
      nuclear: { capacity_mw: 4047, min_capacity_mw: 4047 }
      solar: { capacity_mw: 2066 }
    flexible_sources:
      gas_ccgt: { capacity_mw: 1200 }
    storage:
      - { type: li_ion4h, nominal_mw: 1000 }
    reserves: { hydro_capacity_reduction_mw: 450 }
  DE:
    basic_sources:
      onshore: { capacity_mw: 56000 }
interconnectors:
  CZ:
    DE: { capacity_mw: 2100, loss: 0.02 }
  DE:
    CZ: { capacity_mw: 1500, loss: 0.02 }
optimize_capex: false
solver: clarabel
solver_shift_ipm_termination_by_orders: 1
"#;

    #[test]
    fn test_parse_and_build() {
        let config = RunConfig::from_yaml_str(EXAMPLE).unwrap();
        assert_eq!(config.num_years(), 1);

        let entities = config.build_entities().unwrap();
        let cz = &entities[&Region::new("CZ")];
        assert_eq!(
            cz.basic_sources[&BasicSourceType::Nuclear].base.capacity_mw,
            4047.0
        );
        // Defaults filled the solar economics in.
        assert!(cz.basic_sources[&BasicSourceType::Solar]
            .base
            .economics
            .overnight_costs_per_kw_eur
            > 0.0);
        // Loss of load is always present.
        assert!(cz
            .flexible_sources
            .iter()
            .any(|source| source.kind == FlexibleSourceType::LossOfLoad));
        assert_eq!(cz.storage.len(), 1);
        assert_eq!(cz.storage[0].max_energy_mwh, 4000.0);
        assert_eq!(cz.reserves.unwrap().hydro_capacity_reduction_mw, 450.0);

        let links = config.build_interconnectors().unwrap();
        assert_eq!(
            links.connections_from(&Region::new("CZ"))[&Region::new("DE")].capacity_mw,
            2100.0
        );
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = RunConfig::from_yaml_str(EXAMPLE).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.common_years, config.common_years);
        assert_eq!(back.countries.len(), config.countries.len());
    }

    #[test]
    fn test_year_list_length_mismatch() {
        let yaml = r#"
common_years: [2020, 2021]
entsoe_years: [2019]
countries:
  CZ: {}
"#;
        let err = RunConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("entsoe_years"));
    }

    #[test]
    fn test_symmetric_link_expansion() {
        let yaml = r#"
common_years: [2020]
countries:
  AT: {}
  DE: {}
interconnectors:
  DE:
    AT: { capacity_mw: 5000, loss: 0.02, symmetric: true }
"#;
        let config = RunConfig::from_yaml_str(yaml).unwrap();
        let links = config.build_interconnectors().unwrap();
        assert_eq!(
            links.connections_from(&Region::new("AT"))[&Region::new("DE")].capacity_mw,
            5000.0
        );
    }

    #[test]
    fn test_links_to_unknown_countries_are_dropped() {
        let yaml = r#"
common_years: [2020]
countries:
  CZ: {}
interconnectors:
  CZ:
    DE: { capacity_mw: 2100 }
"#;
        let config = RunConfig::from_yaml_str(yaml).unwrap();
        let links = config.build_interconnectors().unwrap();
        assert!(links.connections_from(&Region::new("CZ")).is_empty());
    }
}
