//! Post-solve estimation of locational hourly prices.
//!
//! Prices are not decision variables. They are derived from the solved
//! dispatch in two sweeps: a generation-side sweep walking the per-hour
//! export-flow order (the marginal producing technology or the import
//! shadow sets the price), and a charging-side sweep that floors the price
//! at the average margin storage realizes when buying.

use std::collections::{BTreeMap, BTreeSet};

use gdc_core::{capex, GridResult, Interconnectors, Region, StorageType, StorageUse};
use gdc_ts::keys;

use crate::export_flow::{ExportFlow, FlowColumns};
use crate::grid::RegionGrid;

/// Price of the demand side when nuclear and hydro already cover the
/// residual load (storage still bids a little above zero).
const MINIMUM_STORAGE_PRICE: f64 = 5.0;

const CURTAILMENT_LABEL: &str = "Curtailment";
const CHARGING_MIN_LABEL: &str = "Charging_min";

struct StorageView {
    kind: StorageType,
    use_: StorageUse,
    charging_key: String,
    discharging_key: String,
    charging: Vec<f64>,
    discharging: Vec<f64>,
    capacity_mw_charging: f64,
    cost_sell_buy_mwh_eur: f64,
    charging_efficiency: f64,
    discharging_efficiency: f64,
}

/// Read-only snapshot of the columns the estimator consults.
struct EstimatorView {
    curtailment: Vec<f64>,
    residual: Vec<f64>,
    nuclear: Vec<f64>,
    hydro: Vec<f64>,
    net_import: Vec<f64>,
    /// Per basic source: variable cost and solved production column.
    basic: Vec<(f64, String, Vec<f64>)>,
    /// Per flexible source: variable cost and solved production column.
    flexible: Vec<(f64, String, Vec<f64>)>,
    storage: Vec<StorageView>,
    /// The cheapest flexible variable cost, used as the bid of storage
    /// discharging (zero when the region has no flexible sources).
    min_flexible_price: f64,
}

impl EstimatorView {
    fn from_grid(grid: &RegionGrid) -> GridResult<EstimatorView> {
        let mut basic = Vec::new();
        for (kind, source) in &grid.basic_sources {
            let key = keys::basic_key(*kind);
            basic.push((
                source.base.economics.variable_costs_per_mwh_eur,
                key.to_string(),
                grid.data.values(key)?,
            ));
        }
        let mut flexible = Vec::new();
        for source in &grid.flexible_sources {
            let key = keys::flexible_key(source.kind);
            flexible.push((
                source.base.economics.variable_costs_per_mwh_eur,
                key.clone(),
                grid.data.values(&key)?,
            ));
        }
        let mut storage = Vec::new();
        for facility in &grid.storage {
            let charging_key = keys::charging_key(facility);
            let discharging_key = keys::discharging_key(facility);
            storage.push(StorageView {
                kind: facility.kind,
                use_: facility.use_,
                charging: grid.data.values(&charging_key)?,
                discharging: grid.data.values(&discharging_key)?,
                charging_key,
                discharging_key,
                capacity_mw_charging: facility.capacity_mw_charging,
                cost_sell_buy_mwh_eur: facility.cost_sell_buy_mwh_eur,
                charging_efficiency: facility.charging_efficiency,
                discharging_efficiency: facility.discharging_efficiency,
            });
        }
        let min_flexible_price = grid
            .flexible_sources
            .iter()
            .map(|source| source.base.economics.variable_costs_per_mwh_eur)
            .fold(f64::INFINITY, f64::min);
        Ok(EstimatorView {
            curtailment: grid.data.values(keys::CURTAILMENT)?,
            residual: grid.data.values(keys::RESIDUAL)?,
            nuclear: grid.data.values(keys::NUCLEAR)?,
            hydro: grid.data.values(keys::HYDRO)?,
            net_import: grid.data.values(keys::NET_IMPORT)?,
            basic,
            flexible,
            storage,
            min_flexible_price: if min_flexible_price.is_finite() {
                min_flexible_price
            } else {
                0.0
            },
        })
    }
}

fn update_max(
    current: (f64, String),
    candidate_price: f64,
    candidate_amount: f64,
    candidate_label: &str,
) -> (f64, String) {
    if candidate_amount > 0.0 && candidate_price > current.0 {
        (candidate_price, candidate_label.to_string())
    } else {
        current
    }
}

/// Generation-side price at hour `t`: zero under curtailment, the minimum
/// storage bid under excess, otherwise the maximum over the import shadow
/// and the variable costs of everything producing.
fn estimate_spot_price(view: &EstimatorView, t: usize, import_price: f64) -> (f64, String) {
    // No discussion about a positive price under non-negligible curtailment.
    if keys::has_curtailment(view.curtailment[t]) {
        return (0.0, CURTAILMENT_LABEL.to_string());
    }
    // Producing sources do not dictate the price under excess; the demand
    // side does.
    if keys::has_excess(view.nuclear[t], view.hydro[t], view.residual[t]) {
        return (MINIMUM_STORAGE_PRICE, CHARGING_MIN_LABEL.to_string());
    }

    let mut maximum = (0.0, CURTAILMENT_LABEL.to_string());
    maximum = update_max(maximum, import_price, view.net_import[t], keys::NET_IMPORT);
    for (variable_cost, label, production) in &view.basic {
        maximum = update_max(maximum, *variable_cost, production[t], label);
    }
    for (variable_cost, label, production) in &view.flexible {
        maximum = update_max(maximum, *variable_cost, production[t], label);
    }
    for storage in &view.storage {
        if !storage.use_.is_electricity() {
            continue;
        }
        let mut price = view.min_flexible_price;
        // Storage that cannot charge but can buy energy (such as imported
        // hydrogen) bids its buy price instead.
        if storage.capacity_mw_charging == 0.0 && storage.cost_sell_buy_mwh_eur > 0.0 {
            price = price.max(storage.cost_sell_buy_mwh_eur / storage.discharging_efficiency);
        }
        maximum = update_max(maximum, price, storage.discharging[t], &storage.discharging_key);
    }
    maximum
}

/// Average margin per MWh discharged that each electricity storage realized
/// over the whole run, net of opex and round-trip losses.
fn storage_average_margin_per_mwh(
    grid: &RegionGrid,
    view: &EstimatorView,
    prices: &[f64],
) -> BTreeMap<StorageType, f64> {
    let mut margins = BTreeMap::new();
    for (facility, storage_view) in grid.storage.iter().zip(&view.storage) {
        if !facility.use_.is_electricity() {
            continue;
        }
        let total_discharging_mwh: f64 = storage_view.discharging.iter().sum();
        if total_discharging_mwh == 0.0 {
            margins.insert(facility.kind, 0.0);
            continue;
        }
        let sell_eur: f64 = prices
            .iter()
            .zip(&storage_view.discharging)
            .map(|(price, discharging)| price * discharging)
            .sum();
        let price_per_mwh_eur = sell_eur / total_discharging_mwh;

        // Opex for discharging is composed of opex for charging (increased
        // by losses) and opex for discharging itself.
        let total_charging_mwh: f64 = storage_view.charging.iter().sum();
        let charging_opex = capex::charging_opex_per_mwh_eur(facility, Some(total_charging_mwh));
        let round_trip_efficiency = facility.round_trip_efficiency();
        let mut opex_per_mwh_eur = charging_opex / round_trip_efficiency;
        opex_per_mwh_eur +=
            capex::discharging_opex_per_mwh_eur(facility, Some(total_discharging_mwh));

        margins.insert(
            facility.kind,
            (price_per_mwh_eur - opex_per_mwh_eur) * round_trip_efficiency,
        );
    }
    margins
}

/// Charging-side floor at hour `t`: the smallest (non-negative) average
/// margin among the storage actually charging, applied when it exceeds the
/// generation-side price.
fn estimate_spot_price_with_charging(
    view: &EstimatorView,
    t: usize,
    current: (f64, String),
    margins: &BTreeMap<StorageType, f64>,
) -> (f64, String) {
    if keys::has_curtailment(view.curtailment[t]) {
        return current;
    }
    let mut minimum: Option<(f64, &str)> = None;
    for storage in &view.storage {
        if storage.use_ != StorageUse::Electricity {
            continue;
        }
        let buy_price = margins.get(&storage.kind).copied().unwrap_or(0.0).max(0.0);
        if storage.charging[t] > 0.0
            && minimum.map(|(price, _)| buy_price < price).unwrap_or(true)
        {
            minimum = Some((buy_price, &storage.charging_key));
        }
    }
    if let Some((buy_price, label)) = minimum {
        if buy_price > current.0 {
            return (buy_price, label.to_string());
        }
    }
    current
}

/// Fill the `Price`, `Price_Import`, `Price_Export` and `Price_Type`
/// columns of every region from the solved dispatch.
pub(crate) fn estimate_spot_prices(
    grids: &mut BTreeMap<Region, RegionGrid>,
    interconnectors: &Interconnectors,
    include_transmission_loss_in_price: bool,
) -> GridResult<()> {
    let regions: BTreeSet<Region> = grids.keys().cloned().collect();
    let num_steps = grids.values().next().map(|grid| grid.data.len()).unwrap_or(0);

    let mut views = BTreeMap::new();
    let mut flows = BTreeMap::new();
    for (region, grid) in grids.iter() {
        views.insert(region.clone(), EstimatorView::from_grid(grid)?);
        flows.insert(
            region.clone(),
            FlowColumns::from_frame(&grid.data, interconnectors, region, &regions)?,
        );
    }

    let walk = ExportFlow::new(interconnectors, &regions, include_transmission_loss_in_price);

    let mut prices: BTreeMap<Region, Vec<f64>> = BTreeMap::new();
    let mut import_prices: BTreeMap<Region, Vec<f64>> = BTreeMap::new();
    let mut export_prices: BTreeMap<Region, Vec<f64>> = BTreeMap::new();
    let mut price_types: BTreeMap<Region, Vec<String>> = BTreeMap::new();
    for region in &regions {
        prices.insert(region.clone(), vec![0.0; num_steps]);
        import_prices.insert(region.clone(), vec![0.0; num_steps]);
        export_prices.insert(region.clone(), vec![0.0; num_steps]);
        price_types.insert(region.clone(), vec![String::new(); num_steps]);
    }

    // Sweep 1: generation-side prices along the export-flow order, then
    // export prices once all import prices of the hour are known.
    for t in 0..num_steps {
        for region in walk.order(t, &flows)? {
            let import_price = walk.import_price(&region, t, &flows, &prices);
            let (price, marginal_type) = estimate_spot_price(&views[&region], t, import_price);
            prices.get_mut(&region).expect("region present")[t] = price;
            import_prices.get_mut(&region).expect("region present")[t] = import_price;
            price_types.get_mut(&region).expect("region present")[t] = marginal_type;
        }
        for region in &regions {
            let export_price = walk.export_price(region, t, &flows, &import_prices);
            export_prices.get_mut(region).expect("region present")[t] = export_price;
        }
    }

    // Sweep 2: possibly raise prices to the storage charging floor.
    for (region, grid) in grids.iter() {
        let view = &views[region];
        let margins = storage_average_margin_per_mwh(grid, view, &prices[region]);
        let region_prices = prices.get_mut(region).expect("region present");
        let region_types = price_types.get_mut(region).expect("region present");
        for t in 0..num_steps {
            let current = (region_prices[t], region_types[t].clone());
            let (price, marginal_type) =
                estimate_spot_price_with_charging(view, t, current, &margins);
            region_prices[t] = price;
            region_types[t] = marginal_type;
        }
    }

    for (region, grid) in grids.iter_mut() {
        grid.data.set_values(keys::PRICE, prices.remove(region).expect("region present"))?;
        grid.data.set_values(
            keys::PRICE_IMPORT,
            import_prices.remove(region).expect("region present"),
        )?;
        grid.data.set_values(
            keys::PRICE_EXPORT,
            export_prices.remove(region).expect("region present"),
        )?;
        grid.data.set_strings(
            keys::PRICE_TYPE,
            price_types.remove(region).expect("region present"),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdc_core::{
        BasicSource, BasicSourceType, FlexibleSource, FlexibleSourceType, SourceBase,
        SourceEconomics, Storage,
    };
    use gdc_ts::{hourly_index, HourlyFrame};
    use std::collections::BTreeMap as Map;

    fn view_with(
        curtailment: f64,
        residual: f64,
        nuclear: f64,
        flexible: Vec<(f64, &str, f64)>,
    ) -> EstimatorView {
        EstimatorView {
            curtailment: vec![curtailment],
            residual: vec![residual],
            nuclear: vec![nuclear],
            hydro: vec![0.0],
            net_import: vec![0.0],
            basic: vec![(10.0, "Nuclear".to_string(), vec![nuclear])],
            flexible: flexible
                .iter()
                .map(|(cost, label, production)| {
                    (*cost, label.to_string(), vec![*production])
                })
                .collect(),
            storage: vec![],
            min_flexible_price: {
                let minimum = flexible
                    .iter()
                    .map(|(cost, _, _)| *cost)
                    .fold(f64::INFINITY, f64::min);
                if minimum.is_finite() {
                    minimum
                } else {
                    0.0
                }
            },
        }
    }

    #[test]
    fn test_curtailment_zeroes_the_price() {
        let view = view_with(50.0, 100.0, 100.0, vec![]);
        let (price, label) = estimate_spot_price(&view, 0, 30.0);
        assert_eq!(price, 0.0);
        assert_eq!(label, "Curtailment");
    }

    #[test]
    fn test_excess_sets_minimum_storage_price() {
        let view = view_with(0.0, 50.0, 100.0, vec![]);
        let (price, label) = estimate_spot_price(&view, 0, 30.0);
        assert_eq!(price, MINIMUM_STORAGE_PRICE);
        assert_eq!(label, "Charging_min");
    }

    #[test]
    fn test_marginal_source_sets_the_price() {
        let view = view_with(0.0, 300.0, 100.0, vec![(80.0, "Flexible_gas", 150.0)]);
        let (price, label) = estimate_spot_price(&view, 0, 30.0);
        assert_eq!(price, 80.0);
        assert_eq!(label, "Flexible_gas");
    }

    #[test]
    fn test_idle_source_does_not_set_the_price() {
        let view = view_with(0.0, 300.0, 100.0, vec![(80.0, "Flexible_gas", 0.0)]);
        let (price, label) = estimate_spot_price(&view, 0, 0.0);
        assert_eq!(price, 10.0);
        assert_eq!(label, "Nuclear");
    }

    #[test]
    fn test_end_to_end_single_region_prices() {
        // One region, no links: nuclear at 10 EUR/MWh is marginal in hour 0,
        // gas at 80 EUR/MWh in hour 1, curtailment zeroes hour 2.
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = hourly_index(start, 3);
        let mut columns: Vec<(&str, Vec<f64>)> = vec![
            (keys::LOAD, vec![900.0, 1200.0, 500.0]),
            (keys::SOLAR, vec![0.0, 0.0, 900.0]),
            (keys::WIND_ONSHORE, vec![0.0; 3]),
            (keys::WIND_OFFSHORE, vec![0.0; 3]),
            (keys::HYDRO, vec![0.0; 3]),
            (keys::NUCLEAR, vec![900.0, 1000.0, 0.0]),
            (keys::CURTAILMENT, vec![0.0, 0.0, 400.0]),
            (keys::NET_IMPORT, vec![0.0; 3]),
            (keys::IMPORT, vec![0.0; 3]),
            (keys::EXPORT, vec![0.0; 3]),
            ("Flexible_gas_ccgt", vec![0.0, 200.0, 0.0]),
        ];
        let residual: Vec<f64> = vec![900.0, 1200.0, -400.0];
        columns.push((keys::RESIDUAL, residual));
        let frame = HourlyFrame::from_columns(index, columns).unwrap();

        let mut basic_sources = Map::new();
        basic_sources.insert(
            BasicSourceType::Nuclear,
            BasicSource::new(
                BasicSourceType::Nuclear,
                SourceBase::new(1000.0, SourceEconomics::with_variable_costs(10.0))
                    .with_fixed_capacity(),
            ),
        );
        let gas = FlexibleSource::new(
            FlexibleSourceType::GasCcgt,
            SourceBase::new(500.0, SourceEconomics::with_variable_costs(80.0)),
        );
        let grid = RegionGrid::new(
            Region::new("CZ"),
            frame,
            basic_sources,
            vec![gas],
            vec![],
            1.0,
        )
        .unwrap();

        let mut grids = BTreeMap::new();
        grids.insert(Region::new("CZ"), grid);
        estimate_spot_prices(&mut grids, &Interconnectors::new(), false).unwrap();

        let grid = &grids[&Region::new("CZ")];
        let price = grid.data.values(keys::PRICE).unwrap();
        assert_eq!(price, vec![10.0, 80.0, 0.0]);
        let price_type = grid.data.strings(keys::PRICE_TYPE).unwrap();
        assert_eq!(price_type[1], "Flexible_gas_ccgt");
        assert_eq!(price_type[2], "Curtailment");
    }

    #[test]
    fn test_charging_floor_raises_price() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let index = hourly_index(start, 2);
        // Hour 0: battery charges at a zero generation-side price (excess is
        // absent, curtailment absent, nothing produces). Hour 1: it
        // discharges at 100 EUR/MWh. The margin then floors hour 0.
        let frame = HourlyFrame::from_columns(
            index,
            vec![
                (keys::LOAD, vec![100.0, 100.0]),
                (keys::SOLAR, vec![0.0, 0.0]),
                (keys::WIND_ONSHORE, vec![0.0; 2]),
                (keys::WIND_OFFSHORE, vec![0.0; 2]),
                (keys::HYDRO, vec![0.0; 2]),
                (keys::NUCLEAR, vec![0.0; 2]),
                (keys::CURTAILMENT, vec![0.0, 0.0]),
                (keys::RESIDUAL, vec![100.0, 100.0]),
                (keys::NET_IMPORT, vec![0.0; 2]),
                (keys::IMPORT, vec![0.0; 2]),
                (keys::EXPORT, vec![0.0; 2]),
                ("Flexible_gas_ccgt", vec![0.0, 0.0]),
                ("Charging_li", vec![50.0, 0.0]),
                ("Discharging_li", vec![0.0, 50.0]),
                ("State_Of_Charge_li", vec![50.0, 0.0]),
            ],
        )
        .unwrap();

        let battery = Storage::new(
            gdc_core::StorageType::LiIon,
            100.0,
            SourceEconomics::free(),
        )
        .with_fixed_capacities()
        .with_energy(400.0, 0.0);
        let gas = FlexibleSource::new(
            FlexibleSourceType::GasCcgt,
            SourceBase::new(500.0, SourceEconomics::with_variable_costs(100.0)),
        );
        let grid = RegionGrid::new(
            Region::new("CZ"),
            frame,
            Map::new(),
            vec![gas],
            vec![battery],
            1.0,
        )
        .unwrap();

        let mut grids = BTreeMap::new();
        grids.insert(Region::new("CZ"), grid);
        estimate_spot_prices(&mut grids, &Interconnectors::new(), false).unwrap();

        let grid = &grids[&Region::new("CZ")];
        let price = grid.data.values(keys::PRICE).unwrap();
        let price_type = grid.data.strings(keys::PRICE_TYPE).unwrap();
        // Hour 1: discharging bids the cheapest flexible cost (100).
        assert_eq!(price[1], 100.0);
        // Hour 0: floored by the storage margin (100 EUR/MWh at perfect
        // round-trip efficiency, no opex).
        assert_eq!(price[0], 100.0);
        assert_eq!(price_type[0], "Charging_li");
    }
}
