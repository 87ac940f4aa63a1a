//! Seasonal and annual statistics of a solved grid.
//!
//! All figures are pure functions of the solved hourly tables and the
//! entity parameters: energy aggregates in TWh per year, production hours,
//! capacity factors, emissions, the capex/opex/wholesale economics of every
//! source, and the value buckets of basic production. Output is a long-form
//! record list that can be appended to a CSV and pivoted into a wide table.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

use polars::prelude::{DataFrame, NamedFrom, Series};
use serde::Serialize;
use tracing::warn;

use gdc_core::{
    capex, BasicSourceType, FlexibleSourceType, GridError, GridResult, Interconnectors, Region,
    StorageType, OUTFLOW_CAPACITY_COST_EUR_PER_MWH,
};
use gdc_ts::{keys, season_mask, HourlyFrame, Season};

use crate::grid::RegionGrid;

const TWH_IN_MWH: f64 = 1_000_000.0;

/// The statistic kinds tracked per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatKind {
    // Only computed for the whole year.
    CapacityGw,
    CapacityChargingGw,

    // Aggregate values.
    LoadTwh,
    ImportTwh,
    ExportTwh,
    NetImportTwh,
    CurtailmentTwh,

    // Values computed per source.
    ProductionTwh,
    ProductionElEqTwh,
    ProductionUsedTwh,
    ProductionExcessTwh,
    /// Overlaps with production for grid storage.
    DischargedTwh,
    ChargedTwh,
    /// Total natural inflow (e.g. for hydro storage).
    InflowTwh,
    HeatProductionPj,
    /// Number of hours during which the source was producing any energy.
    ProductionHours,

    // Source economics.
    CapexMnEurPerYear,
    OpexMnEur,
    WholesaleExpensesMnEur,
    WholesaleRevenuesMnEur,
    AverageConsumerPrice,
    AverageProducerPrice,

    CapacityFactor,
    CapacityFactorCharging,

    EmissionsMtCo2,

    PowerShareHighValue,
    PowerShareLowValue,
    PowerShareZeroValue,
}

impl StatKind {
    pub fn id(&self) -> &'static str {
        match self {
            StatKind::CapacityGw => "capacity_GW",
            StatKind::CapacityChargingGw => "capacity_charging_GW",
            StatKind::LoadTwh => "load_TWh",
            StatKind::ImportTwh => "import_TWh",
            StatKind::ExportTwh => "export_TWh",
            StatKind::NetImportTwh => "net_import_TWh",
            StatKind::CurtailmentTwh => "curtailment_TWh",
            StatKind::ProductionTwh => "production_TWh",
            StatKind::ProductionElEqTwh => "production_el_eq_TWh",
            StatKind::ProductionUsedTwh => "production_used_TWh",
            StatKind::ProductionExcessTwh => "production_excess_TWh",
            StatKind::DischargedTwh => "discharged_TWh",
            StatKind::ChargedTwh => "charged_TWh",
            StatKind::InflowTwh => "inflow_TWh",
            StatKind::HeatProductionPj => "heat_production_PJ",
            StatKind::ProductionHours => "production_hours",
            StatKind::CapexMnEurPerYear => "capex_mn_EUR_per_yr",
            StatKind::OpexMnEur => "opex_mn_EUR",
            StatKind::WholesaleExpensesMnEur => "wholesale_expenses_mn_EUR",
            StatKind::WholesaleRevenuesMnEur => "wholesale_revenues_mn_EUR",
            StatKind::AverageConsumerPrice => "avg_consumer_price_EUR_per_MWh",
            StatKind::AverageProducerPrice => "avg_producer_price_EUR_per_MWh",
            StatKind::CapacityFactor => "capacity_factor",
            StatKind::CapacityFactorCharging => "capacity_factor_charging",
            StatKind::EmissionsMtCo2 => "emissions_MtCO2",
            StatKind::PowerShareHighValue => "power_share_high_value",
            StatKind::PowerShareLowValue => "power_share_low_value",
            StatKind::PowerShareZeroValue => "power_share_zero_value",
        }
    }
}

/// What a statistic is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKey {
    Basic(BasicSourceType),
    Flexible(FlexibleSourceType),
    Storage(StorageType),
    ImportExport,
    Total,
}

impl SourceKey {
    pub fn id(&self) -> &'static str {
        match self {
            SourceKey::Basic(kind) => kind.id(),
            SourceKey::Flexible(kind) => kind.id(),
            SourceKey::Storage(kind) => kind.id(),
            SourceKey::ImportExport => "IMPORT_EXPORT",
            SourceKey::Total => "TOTAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatRecord {
    pub season: Season,
    pub source: SourceKey,
    pub stat: StatKind,
    pub value: f64,
}

/// A long-form statistics row ready for CSV output.
#[derive(Debug, Clone, Serialize)]
pub struct StatOutputRow {
    pub name: String,
    pub region: String,
    pub season: String,
    pub source: String,
    pub stat: String,
    #[serde(rename = "val")]
    pub value: f64,
}

/// All statistics of one region for one run.
pub struct GridStats {
    pub name: String,
    pub region: Region,
    records: Vec<StatRecord>,
}

impl GridStats {
    /// Compute the statistics of a solved grid. The grid's flexible sources
    /// get sorted by variable cost (cheapest first, as they stack in merit
    /// order) and the used/excess decomposition columns are added to its
    /// table.
    pub fn compute(
        name: &str,
        grid: &mut RegionGrid,
        interconnectors: Option<&Interconnectors>,
    ) -> GridResult<GridStats> {
        split_excess_production(&mut grid.data)?;
        grid.flexible_sources.sort_by(|a, b| {
            a.base
                .economics
                .variable_costs_per_mwh_eur
                .total_cmp(&b.base.economics.variable_costs_per_mwh_eur)
        });

        let mut stats = GridStats {
            name: name.to_string(),
            region: grid.region.clone(),
            records: Vec::new(),
        };

        stats.compute_source_installed(grid);
        if let Some(interconnectors) = interconnectors {
            stats.compute_interconnector_capex(grid, interconnectors)?;
        }

        for season in Season::ALL {
            let mask = season_mask(grid.data.index(), season);
            let frame = grid.data.filter_rows(&mask)?;
            let total_hours = frame.len() as f64 / grid.num_years;
            stats.compute_source_stats(grid, &frame, season, total_hours)?;
            stats.compute_average_prices(&frame, season)?;
        }
        Ok(stats)
    }

    pub fn records(&self) -> &[StatRecord] {
        &self.records
    }

    pub fn value(&self, source: SourceKey, stat: StatKind, season: Season) -> Option<f64> {
        self.records
            .iter()
            .find(|record| {
                record.season == season && record.source == source && record.stat == stat
            })
            .map(|record| record.value)
    }

    /// The long-form rows `{name, region, season, source, stat, val}`.
    pub fn output_rows(&self) -> Vec<StatOutputRow> {
        self.records
            .iter()
            .map(|record| StatOutputRow {
                name: self.name.clone(),
                region: self.region.to_string(),
                season: record.season.code().to_string(),
                source: record.source.id().to_string(),
                stat: record.stat.id().to_string(),
                value: record.value,
            })
            .collect()
    }

    fn store(&mut self, season: Season, source: SourceKey, stat: StatKind, value: f64) {
        self.records.push(StatRecord {
            season,
            source,
            stat,
            value,
        });
    }

    fn values_of(&self, stat: StatKind, season: Season) -> Vec<(SourceKey, f64)> {
        self.records
            .iter()
            .filter(|record| record.stat == stat && record.season == season)
            .map(|record| (record.source, record.value))
            .collect()
    }

    fn compute_source_installed(&mut self, grid: &RegionGrid) {
        for (kind, source) in &grid.basic_sources {
            self.store(
                Season::Year,
                SourceKey::Basic(*kind),
                StatKind::CapacityGw,
                source.base.capacity_mw / 1000.0,
            );
        }
        for source in &grid.flexible_sources {
            if !source.base.is_virtual {
                self.store(
                    Season::Year,
                    SourceKey::Flexible(source.kind),
                    StatKind::CapacityGw,
                    source.base.capacity_mw / 1000.0,
                );
            }
        }
        for storage in &grid.storage {
            if storage.separate_charging.is_some() {
                self.store(
                    Season::Year,
                    SourceKey::Storage(storage.kind),
                    StatKind::CapacityChargingGw,
                    storage.capacity_mw_charging / 1000.0,
                );
            }
            self.store(
                Season::Year,
                SourceKey::Storage(storage.kind),
                StatKind::CapacityGw,
                storage.base.capacity_mw / 1000.0,
            );
        }
        let total: f64 = self
            .values_of(StatKind::CapacityGw, Season::Year)
            .iter()
            .map(|(_, value)| value)
            .sum();
        self.store(Season::Year, SourceKey::Total, StatKind::CapacityGw, total);
    }

    /// Annual interconnector costs attributed to this region: half of the
    /// expansion capex (the other country pays the other half) over half
    /// the length of each adjacent link.
    fn compute_interconnector_capex(
        &mut self,
        grid: &RegionGrid,
        interconnectors: &Interconnectors,
    ) -> GridResult<()> {
        let from_links = interconnectors.connections_from(&grid.region);
        let to_links = interconnectors.connections_to(&grid.region);
        let mut neighbors: Vec<&Region> = from_links.keys().chain(to_links.keys()).collect();
        neighbors.sort();
        neighbors.dedup();

        let mut total_capex_mn_eur = 0.0;
        for neighbor in neighbors {
            let (upgrade_mw, length_km, kind) =
                match (from_links.get(neighbor), to_links.get(neighbor)) {
                    (Some(out_link), Some(in_link)) => {
                        // Both directions present: this is one connection,
                        // take the average expansion.
                        if out_link.length_km != in_link.length_km || out_link.kind != in_link.kind
                        {
                            return Err(GridError::Config(format!(
                                "links between {} and {neighbor} disagree on length or type",
                                grid.region
                            )));
                        }
                        let upgrade_out = out_link.capacity_mw - out_link.paid_off_capacity_mw;
                        let upgrade_in = in_link.capacity_mw - in_link.paid_off_capacity_mw;
                        ((upgrade_out + upgrade_in) / 2.0, out_link.length_km, out_link.kind)
                    }
                    (Some(link), None) | (None, Some(link)) => (
                        link.capacity_mw - link.paid_off_capacity_mw,
                        link.length_km,
                        link.kind,
                    ),
                    (None, None) => continue,
                };
            // Each country pays half of the costs.
            let country_length_km = length_km / 2.0;
            let country_capex_eur =
                capex::expansion_capex_per_year_eur(upgrade_mw, country_length_km, kind);
            total_capex_mn_eur += country_capex_eur / 1e6;
        }
        self.store(
            Season::Year,
            SourceKey::ImportExport,
            StatKind::CapexMnEurPerYear,
            total_capex_mn_eur,
        );
        Ok(())
    }

    fn compute_source_stats(
        &mut self,
        grid: &RegionGrid,
        frame: &HourlyFrame,
        season: Season,
        total_hours: f64,
    ) -> GridResult<()> {
        let num_years = grid.num_years;
        let sum_twh_per_year =
            |key: &str| -> GridResult<f64> { Ok(frame.column_sum(key)? / TWH_IN_MWH / num_years) };

        // Aggregate energy figures.
        self.store(
            season,
            SourceKey::Total,
            StatKind::LoadTwh,
            sum_twh_per_year(keys::LOAD)?,
        );
        let curtailment_twh = frame
            .values(keys::CURTAILMENT)?
            .iter()
            .map(|value| value.max(0.0))
            .sum::<f64>()
            / TWH_IN_MWH
            / num_years;
        self.store(season, SourceKey::Total, StatKind::CurtailmentTwh, curtailment_twh);
        let import_twh = sum_twh_per_year(keys::IMPORT)?;
        let export_twh = sum_twh_per_year(keys::EXPORT)?;
        self.store(season, SourceKey::Total, StatKind::ImportTwh, import_twh);
        self.store(season, SourceKey::Total, StatKind::ExportTwh, export_twh);
        self.store(
            season,
            SourceKey::Total,
            StatKind::NetImportTwh,
            import_twh - export_twh,
        );

        // Production per source.
        for (kind, _) in &grid.basic_sources {
            let source_key = SourceKey::Basic(*kind);
            self.store(
                season,
                source_key,
                StatKind::ProductionTwh,
                sum_twh_per_year(keys::basic_key(*kind))?,
            );
            let used_key = keys::basic_used_key(*kind);
            if frame.has_column(&used_key) {
                self.store(
                    season,
                    source_key,
                    StatKind::ProductionUsedTwh,
                    sum_twh_per_year(&used_key)?,
                );
                self.store(
                    season,
                    source_key,
                    StatKind::ProductionExcessTwh,
                    sum_twh_per_year(&keys::basic_excess_key(*kind))?,
                );
            }
        }
        for source in &grid.flexible_sources {
            let source_key = SourceKey::Flexible(source.kind);
            self.store(
                season,
                source_key,
                StatKind::ProductionTwh,
                sum_twh_per_year(&keys::flexible_key(source.kind))?,
            );
            if source.heat.is_some() {
                let el_eq_key = keys::flexible_electricity_equivalent_key(source.kind);
                if frame.has_column(&el_eq_key) {
                    self.store(
                        season,
                        source_key,
                        StatKind::ProductionElEqTwh,
                        sum_twh_per_year(&el_eq_key)?,
                    );
                }
                let heat_key = keys::flexible_heat_key(source.kind);
                if frame.has_column(&heat_key) {
                    // Terawatt-hours to petajoules.
                    self.store(
                        season,
                        source_key,
                        StatKind::HeatProductionPj,
                        3.6 * sum_twh_per_year(&heat_key)?,
                    );
                }
            }
        }
        for storage in &grid.storage {
            let source_key = SourceKey::Storage(storage.kind);
            let discharged_twh = sum_twh_per_year(&keys::discharging_key(storage))?;
            self.store(season, source_key, StatKind::ProductionTwh, discharged_twh);
            self.store(season, source_key, StatKind::DischargedTwh, discharged_twh);
            self.store(
                season,
                source_key,
                StatKind::ChargedTwh,
                sum_twh_per_year(&keys::charging_key(storage))?,
            );
            if let Some(inflow_key) = &storage.inflow_hourly_data_key {
                if frame.has_column(inflow_key) {
                    self.store(
                        season,
                        source_key,
                        StatKind::InflowTwh,
                        sum_twh_per_year(inflow_key)?,
                    );
                }
            }
        }
        for stat in [StatKind::ProductionTwh, StatKind::DischargedTwh, StatKind::ChargedTwh] {
            let total: f64 = self.values_of(stat, season).iter().map(|(_, value)| value).sum();
            self.store(season, SourceKey::Total, stat, total);
        }

        self.compute_production_hours(grid, frame, season)?;
        self.compute_capacity_factors(grid, season, total_hours);
        self.compute_emissions(grid, season);
        self.compute_costs(grid, frame, season)?;
        self.compute_power_share(grid, frame, season)?;
        Ok(())
    }

    fn compute_production_hours(
        &mut self,
        grid: &RegionGrid,
        frame: &HourlyFrame,
        season: Season,
    ) -> GridResult<()> {
        // Only production of more than 1 kWh counts.
        let count_hours = |values: Vec<f64>| {
            values.iter().filter(|value| **value > keys::small_threshold()).count() as f64
        };
        for source in &grid.flexible_sources {
            let hours = count_hours(frame.values(&keys::flexible_key(source.kind))?);
            self.store(
                season,
                SourceKey::Flexible(source.kind),
                StatKind::ProductionHours,
                hours,
            );
        }
        for storage in &grid.storage {
            let hours = count_hours(frame.values(&keys::discharging_key(storage))?);
            self.store(
                season,
                SourceKey::Storage(storage.kind),
                StatKind::ProductionHours,
                hours,
            );
        }
        Ok(())
    }

    fn compute_capacity_factors(&mut self, grid: &RegionGrid, season: Season, total_hours: f64) {
        self.compute_capacity_factor_impl(
            grid,
            season,
            total_hours,
            StatKind::ProductionTwh,
            StatKind::CapacityGw,
            StatKind::CapacityFactor,
        );
        self.compute_capacity_factor_impl(
            grid,
            season,
            total_hours,
            StatKind::ChargedTwh,
            StatKind::CapacityChargingGw,
            StatKind::CapacityFactorCharging,
        );
    }

    fn compute_capacity_factor_impl(
        &mut self,
        grid: &RegionGrid,
        season: Season,
        total_hours: f64,
        production_stat: StatKind,
        capacity_stat: StatKind,
        factor_stat: StatKind,
    ) {
        let capacities: BTreeMap<SourceKey, f64> =
            self.values_of(capacity_stat, Season::Year).into_iter().collect();
        let productions: BTreeMap<SourceKey, f64> =
            self.values_of(production_stat, season).into_iter().collect();
        let productions_el_eq: BTreeMap<SourceKey, f64> =
            self.values_of(StatKind::ProductionElEqTwh, season).into_iter().collect();

        // A source with zero installed capacity contributes no capacity
        // factor. This includes the aggregate value.
        for (source_key, capacity_gw) in capacities {
            if capacity_gw == 0.0 || total_hours == 0.0 {
                continue;
            }
            let Some(production_twh) = productions.get(&source_key) else {
                continue;
            };
            // For CHP the electricity equivalent measures utilization.
            let production_twh =
                productions_el_eq.get(&source_key).copied().unwrap_or(*production_twh);
            let factor = production_twh * 1000.0 / (capacity_gw * total_hours);
            if factor > 1.05 {
                let is_wind = matches!(
                    source_key,
                    SourceKey::Basic(kind) if kind.is_wind()
                );
                if !is_wind {
                    warn!(
                        region = %grid.region,
                        source = source_key.id(),
                        factor,
                        "production exceeds 105% of installed capacity"
                    );
                }
            }
            self.store(season, source_key, factor_stat, factor);
        }
    }

    fn compute_emissions(&mut self, grid: &RegionGrid, season: Season) {
        let mut co2_t_mwh: BTreeMap<SourceKey, f64> = BTreeMap::new();
        for (kind, source) in &grid.basic_sources {
            co2_t_mwh.insert(SourceKey::Basic(*kind), source.base.co2_t_mwh);
        }
        for source in &grid.flexible_sources {
            co2_t_mwh.insert(SourceKey::Flexible(source.kind), source.base.co2_t_mwh);
        }
        for storage in &grid.storage {
            co2_t_mwh.insert(SourceKey::Storage(storage.kind), storage.base.co2_t_mwh);
        }

        let productions: BTreeMap<SourceKey, f64> =
            self.values_of(StatKind::ProductionTwh, season).into_iter().collect();
        let productions_el_eq: BTreeMap<SourceKey, f64> =
            self.values_of(StatKind::ProductionElEqTwh, season).into_iter().collect();

        let mut total_mt = 0.0;
        for (source_key, production_twh) in productions {
            if matches!(source_key, SourceKey::ImportExport | SourceKey::Total) {
                continue;
            }
            // Emissions from heat production count too in the case of CHP.
            let production_twh =
                productions_el_eq.get(&source_key).copied().unwrap_or(production_twh);
            let intensity = co2_t_mwh.get(&source_key).copied().unwrap_or(0.0);
            // Tonnes per MWh equal megatonnes per TWh.
            let co2_mt = production_twh * intensity;
            self.store(season, source_key, StatKind::EmissionsMtCo2, co2_mt);
            total_mt += co2_mt;
        }
        self.store(season, SourceKey::Total, StatKind::EmissionsMtCo2, total_mt);
    }

    /// Total ramp-up costs of a source over the season in millions EUR, if
    /// ramp-up generation was tracked by the optimization.
    fn ramp_up_costs_mn_eur(
        frame: &HourlyFrame,
        ramp_up_key: &str,
        ramp_up_cost_mw_eur: f64,
    ) -> GridResult<f64> {
        if !frame.has_column(ramp_up_key) {
            return Ok(0.0);
        }
        let total: f64 = frame.values(ramp_up_key)?.iter().sum();
        Ok(total * ramp_up_cost_mw_eur / 1e6)
    }

    fn compute_costs(
        &mut self,
        grid: &RegionGrid,
        frame: &HourlyFrame,
        season: Season,
    ) -> GridResult<()> {
        let num_years = grid.num_years;
        let prices = frame.values(keys::PRICE)?;
        let total_price_mn_eur = |values: &[f64]| -> f64 {
            prices.iter().zip(values).map(|(price, value)| price * value).sum::<f64>()
                / 1e6
                / num_years
        };

        for (kind, source) in &grid.basic_sources {
            let source_key = SourceKey::Basic(*kind);
            let total_mwh = TWH_IN_MWH
                * self
                    .value(source_key, StatKind::ProductionTwh, season)
                    .unwrap_or(0.0);
            let capex_mn_eur = capex::source_capex_per_year_eur(&source.base) / 1e6;
            let opex_eur_per_mwh = capex::opex_per_mwh_eur(
                &source.base.economics,
                source.base.capacity_mw,
                Some(total_mwh),
            );
            let mut opex_mn_eur = opex_eur_per_mwh * total_mwh / 1e6;
            let revenues_mn_eur = total_price_mn_eur(&frame.values(keys::basic_key(*kind))?);
            if let Some(flexibility) = &source.flexibility {
                opex_mn_eur += Self::ramp_up_costs_mn_eur(
                    frame,
                    &keys::basic_ramp_up_key(*kind),
                    flexibility.ramp_up_cost_mw_eur,
                )?;
            }
            self.store(season, source_key, StatKind::CapexMnEurPerYear, capex_mn_eur);
            self.store(season, source_key, StatKind::OpexMnEur, opex_mn_eur);
            self.store(season, source_key, StatKind::WholesaleRevenuesMnEur, revenues_mn_eur);
        }

        for source in &grid.flexible_sources {
            if source.base.is_virtual {
                continue;
            }
            let source_key = SourceKey::Flexible(source.kind);
            let key = if source.heat.is_some() {
                keys::flexible_electricity_equivalent_key(source.kind)
            } else {
                keys::flexible_key(source.kind)
            };
            let total_mwh = TWH_IN_MWH
                * self
                    .value(source_key, StatKind::ProductionTwh, season)
                    .unwrap_or(0.0);
            let capex_mn_eur = capex::source_capex_per_year_eur(&source.base) / 1e6;
            let opex_eur_per_mwh = capex::opex_per_mwh_eur(
                &source.base.economics,
                source.base.capacity_mw,
                Some(total_mwh),
            );
            let mut opex_mn_eur = opex_eur_per_mwh * total_mwh / 1e6;
            opex_mn_eur += Self::ramp_up_costs_mn_eur(
                frame,
                &keys::flexible_ramp_up_key(source.kind),
                source.ramp_up_cost_mw_eur,
            )?;
            let revenues_mn_eur = if frame.has_column(&key) {
                total_price_mn_eur(&frame.values(&key)?)
            } else {
                0.0
            };
            self.store(season, source_key, StatKind::CapexMnEurPerYear, capex_mn_eur);
            self.store(season, source_key, StatKind::OpexMnEur, opex_mn_eur);
            self.store(season, source_key, StatKind::WholesaleRevenuesMnEur, revenues_mn_eur);
        }

        for storage in &grid.storage {
            if !storage.use_.is_electricity() {
                continue;
            }
            let source_key = SourceKey::Storage(storage.kind);
            let discharging = frame.values(&keys::discharging_key(storage))?;
            let charging = frame.values(&keys::charging_key(storage))?;
            let sell_revenue_mn_eur = total_price_mn_eur(&discharging);
            let buy_expenses_mn_eur = total_price_mn_eur(&charging);

            let total_mwh_discharged = TWH_IN_MWH
                * self
                    .value(source_key, StatKind::DischargedTwh, season)
                    .unwrap_or(0.0);
            let total_mwh_charged = TWH_IN_MWH
                * self.value(source_key, StatKind::ChargedTwh, season).unwrap_or(0.0);
            let capex_mn_eur = capex::storage_capex_per_year_eur(storage) / 1e6;
            let discharging_opex =
                capex::discharging_opex_per_mwh_eur(storage, Some(total_mwh_discharged));
            let charging_opex = capex::charging_opex_per_mwh_eur(storage, Some(total_mwh_charged));
            let mut opex_mn_eur = (discharging_opex * total_mwh_discharged
                + charging_opex * total_mwh_charged)
                / 1e6;

            // Final-state gains (e.g. selling stored hydrogen) reduce opex;
            // a missing final state adds costs.
            let state = frame.values(&keys::state_of_charge_key(storage))?;
            if let Some(final_state_mwh) = state.last() {
                let mut target_final_state_mwh = storage.final_energy_mwh;
                if storage.separate_charging.is_some() {
                    target_final_state_mwh *= num_years;
                }
                let extra_state_mwh = final_state_mwh - target_final_state_mwh;
                let total_gains_mn_eur = extra_state_mwh * storage.cost_sell_buy_mwh_eur / 1e6;
                opex_mn_eur -= total_gains_mn_eur / num_years;
            }

            self.store(season, source_key, StatKind::CapexMnEurPerYear, capex_mn_eur);
            self.store(season, source_key, StatKind::OpexMnEur, opex_mn_eur);
            self.store(
                season,
                source_key,
                StatKind::WholesaleExpensesMnEur,
                buy_expenses_mn_eur,
            );
            self.store(
                season,
                source_key,
                StatKind::WholesaleRevenuesMnEur,
                sell_revenue_mn_eur,
            );
        }

        // Export revenues and import costs across the borders.
        let net_import = frame.values(keys::NET_IMPORT)?;
        let export = frame.values(keys::EXPORT)?;
        let price_export = frame.values(keys::PRICE_EXPORT)?;
        let price_import = frame.values(keys::PRICE_IMPORT)?;
        let export_revenues_mn_eur: f64 = (0..net_import.len())
            .map(|t| {
                // The exporting party carries the interconnection fee.
                -net_import[t].min(0.0) * price_export[t]
                    - export[t] * OUTFLOW_CAPACITY_COST_EUR_PER_MWH
            })
            .sum::<f64>()
            / 1e6
            / num_years;
        self.store(
            season,
            SourceKey::ImportExport,
            StatKind::WholesaleRevenuesMnEur,
            export_revenues_mn_eur,
        );
        let import_costs_mn_eur: f64 = (0..net_import.len())
            .map(|t| net_import[t].max(0.0) * price_import[t])
            .sum::<f64>()
            / 1e6
            / num_years;
        self.store(
            season,
            SourceKey::ImportExport,
            StatKind::WholesaleExpensesMnEur,
            import_costs_mn_eur,
        );
        Ok(())
    }

    fn compute_average_prices(&mut self, frame: &HourlyFrame, season: Season) -> GridResult<()> {
        let prices = frame.values(keys::PRICE)?;
        let load = frame.values(keys::LOAD)?;
        let production = frame.values(keys::PRODUCTION)?;

        let consumer = weighted_average(&prices, &load).ok_or_else(|| {
            GridError::Numeric(format!(
                "zero total load in season {} when computing the consumer price",
                season.code()
            ))
        })?;
        self.store(season, SourceKey::Total, StatKind::AverageConsumerPrice, consumer);

        let producer = weighted_average(&prices, &production).ok_or_else(|| {
            GridError::Numeric(format!(
                "zero total production in season {} when computing the producer price",
                season.code()
            ))
        })?;
        self.store(season, SourceKey::Total, StatKind::AverageProducerPrice, producer);
        Ok(())
    }

    /// Value buckets of basic production: zero-value production coincides
    /// with curtailment, low-value with storable excess, high-value with
    /// hours where excess is absent.
    fn compute_power_share(
        &mut self,
        grid: &RegionGrid,
        frame: &HourlyFrame,
        season: Season,
    ) -> GridResult<()> {
        let nuclear = frame.values(keys::NUCLEAR)?;
        let hydro = frame.values(keys::HYDRO)?;
        let residual = frame.values(keys::RESIDUAL)?;
        let curtailment = frame.values(keys::CURTAILMENT)?;
        let excess: Vec<bool> = (0..frame.len())
            .map(|t| keys::has_excess(nuclear[t], hydro[t], residual[t]))
            .collect();
        let curtailed: Vec<bool> =
            curtailment.iter().map(|value| keys::has_curtailment(*value)).collect();

        for (kind, _) in &grid.basic_sources {
            let source_key = SourceKey::Basic(*kind);
            let total_twh = self
                .value(source_key, StatKind::ProductionTwh, season)
                .unwrap_or(0.0);
            if total_twh == 0.0 {
                self.store(season, source_key, StatKind::PowerShareZeroValue, 0.0);
                self.store(season, source_key, StatKind::PowerShareLowValue, 0.0);
                self.store(season, source_key, StatKind::PowerShareHighValue, 1.0);
                continue;
            }
            let production = frame.values(keys::basic_key(*kind))?;
            let mut zero_mwh = 0.0;
            let mut low_mwh = 0.0;
            let mut high_mwh = 0.0;
            for t in 0..production.len() {
                if excess[t] && curtailed[t] {
                    zero_mwh += production[t];
                } else if excess[t] {
                    low_mwh += production[t];
                } else {
                    high_mwh += production[t];
                }
            }
            let to_share = |mwh: f64| mwh / TWH_IN_MWH / grid.num_years / total_twh;
            self.store(season, source_key, StatKind::PowerShareZeroValue, to_share(zero_mwh));
            self.store(season, source_key, StatKind::PowerShareLowValue, to_share(low_mwh));
            self.store(season, source_key, StatKind::PowerShareHighValue, to_share(high_mwh));
        }
        Ok(())
    }
}

fn weighted_average(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return None;
    }
    let weighted: f64 = values.iter().zip(weights).map(|(value, weight)| value * weight).sum();
    Some(weighted / total_weight)
}

/// Allocate VRE production into used and excess parts by the residual
/// consumption left after nuclear and hydro. Adds the per-source `_Used`
/// and `_Excess` columns in place.
pub fn split_excess_production(data: &mut HourlyFrame) -> GridResult<()> {
    let load = data.values(keys::LOAD)?;
    let net_import = data.values(keys::NET_IMPORT)?;
    let nuclear = data.values(keys::NUCLEAR)?;
    let hydro = data.values(keys::HYDRO)?;
    let vre = data.values(keys::VRE)?;
    let charging = if data.has_column(keys::CHARGING) {
        Some((data.values(keys::CHARGING)?, data.values(keys::DISCHARGING)?))
    } else {
        None
    };

    let rows = load.len();
    let mut used_vre = vec![0.0; rows];
    let mut excess_vre = vec![0.0; rows];
    for t in 0..rows {
        let mut consumption = load[t] - net_import[t];
        if let Some((charging, discharging)) = &charging {
            consumption += charging[t] - discharging[t];
        }
        let residual = (consumption - nuclear[t] - hydro[t]).max(0.0);
        used_vre[t] = vre[t].min(residual);
        excess_vre[t] = (vre[t] - residual).max(0.0);
    }

    for key in [keys::SOLAR, keys::WIND_ONSHORE, keys::WIND_OFFSHORE, keys::WIND] {
        let production = data.values(key)?;
        let mut used = vec![0.0; rows];
        let mut excess = vec![0.0; rows];
        for t in 0..rows {
            if vre[t] > 0.0 {
                let share = production[t] / vre[t];
                used[t] = used_vre[t] * share;
                excess[t] = excess_vre[t] * share;
            }
        }
        data.set_values(&format!("{key}_Used"), used)?;
        data.set_values(&format!("{key}_Excess"), excess)?;
    }
    Ok(())
}

/// Append long-form statistics rows to a CSV file, writing the header only
/// when the file is created.
pub fn append_stats_csv(rows: &[StatOutputRow], path: &Path) -> GridResult<()> {
    let exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if !exists {
        writer
            .write_record(["name", "region", "season", "source", "stat", "val"])
            .map_err(|err| GridError::Other(err.to_string()))?;
    }
    for row in rows {
        writer
            .write_record([
                row.name.as_str(),
                row.region.as_str(),
                row.season.as_str(),
                row.source.as_str(),
                row.stat.as_str(),
                &row.value.to_string(),
            ])
            .map_err(|err| GridError::Other(err.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Pivot long-form rows into a wide table: one row per
/// (name, region, season, stat), one column per source.
pub fn pivot_stats_wide(rows: &[StatOutputRow]) -> GridResult<DataFrame> {
    let mut sources: Vec<&str> = rows.iter().map(|row| row.source.as_str()).collect();
    sources.sort();
    sources.dedup();

    let mut groups: BTreeMap<(String, String, String, String), BTreeMap<String, f64>> =
        BTreeMap::new();
    for row in rows {
        groups
            .entry((
                row.name.clone(),
                row.region.clone(),
                row.season.clone(),
                row.stat.clone(),
            ))
            .or_default()
            .insert(row.source.clone(), row.value);
    }

    let mut names = Vec::with_capacity(groups.len());
    let mut regions = Vec::with_capacity(groups.len());
    let mut seasons = Vec::with_capacity(groups.len());
    let mut stats = Vec::with_capacity(groups.len());
    let mut source_columns: BTreeMap<&str, Vec<Option<f64>>> =
        sources.iter().map(|source| (*source, Vec::new())).collect();
    for ((name, region, season, stat), values) in &groups {
        names.push(name.clone());
        regions.push(region.clone());
        seasons.push(season.clone());
        stats.push(stat.clone());
        for source in &sources {
            source_columns
                .get_mut(source)
                .expect("source present")
                .push(values.get(*source).copied());
        }
    }

    let mut columns = vec![
        Series::new("name", names),
        Series::new("region", regions),
        Series::new("season", seasons),
        Series::new("stat", stats),
    ];
    for source in sources {
        columns.push(Series::new(source, source_columns.remove(source).expect("source present")));
    }
    DataFrame::new(columns).map_err(|err| GridError::Data(err.to_string()))
}
