//! End-to-end dispatch scenarios exercising the full pipeline: LP
//! construction, solve, extraction, price estimation, persistence and
//! statistics.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use gdc_algo::{DispatchConfig, GridDispatch, GridStats, RegionGrid, SourceKey, StatKind};
use gdc_core::{
    BasicFlexibility, BasicSource, BasicSourceType, FlexibleSource, FlexibleSourceType,
    Interconnector, Interconnectors, Region, SourceBase, SourceEconomics, Storage, StorageType,
};
use gdc_ts::{hourly_index, keys, HourlyFrame, Season};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// A frame with all required columns; everything except the load defaults
/// to zero.
fn input_frame(hours: usize, load: Vec<f64>) -> HourlyFrame {
    let zeros = vec![0.0; hours];
    HourlyFrame::from_columns(
        hourly_index(start(), hours),
        vec![
            (keys::LOAD, load),
            (keys::HEAT_DEMAND, zeros.clone()),
            (keys::SOLAR, zeros.clone()),
            (keys::WIND_ONSHORE, zeros.clone()),
            (keys::WIND_OFFSHORE, zeros.clone()),
            (keys::NUCLEAR, zeros.clone()),
            (keys::HYDRO, zeros),
        ],
    )
    .unwrap()
}

fn loss_of_load() -> FlexibleSource {
    let mut base = SourceBase::new(1_000_000.0, SourceEconomics::with_variable_costs(4000.0))
        .with_fixed_capacity();
    base.is_virtual = true;
    FlexibleSource::new(FlexibleSourceType::LossOfLoad, base)
}

fn gas(capacity_mw: f64, variable_cost: f64) -> FlexibleSource {
    FlexibleSource::new(
        FlexibleSourceType::GasCcgt,
        SourceBase::new(capacity_mw, SourceEconomics::with_variable_costs(variable_cost))
            .with_fixed_capacity(),
    )
}

fn single_region(grid: RegionGrid, out_dir: &std::path::Path) -> GridDispatch {
    let mut grids = BTreeMap::new();
    grids.insert(grid.region.clone(), grid);
    GridDispatch::new(grids, Interconnectors::new(), DispatchConfig::new(out_dir)).unwrap()
}

#[test]
fn load_only_grid_is_served_by_loss_of_load_at_4000() {
    let hours = 48;
    let dir = tempfile::tempdir().unwrap();
    let grid = RegionGrid::new(
        Region::new("CZ"),
        input_frame(hours, vec![1000.0; hours]),
        BTreeMap::new(),
        vec![loss_of_load()],
        vec![],
        1.0,
    )
    .unwrap();
    let mut dispatch = single_region(grid, dir.path());
    dispatch.optimize().unwrap();

    let grid = &dispatch.grids[&Region::new("CZ")];
    let eens = grid.data.values("Flexible_eens").unwrap();
    let curtailment = grid.data.values(keys::CURTAILMENT).unwrap();
    let price = grid.data.values(keys::PRICE).unwrap();
    for t in 0..hours {
        // The whole load is energy not served.
        assert!((eens[t] - 1000.0).abs() < 1e-2, "hour {t}: eens = {}", eens[t]);
        assert!(curtailment[t].abs() < 1e-2);
        assert!((price[t] - 4000.0).abs() < 1e-6, "hour {t}: price = {}", price[t]);
    }
}

#[test]
fn constant_nuclear_runs_a_full_year_at_marginal_cost() {
    let hours = 8760;
    let dir = tempfile::tempdir().unwrap();
    let mut frame = input_frame(hours, vec![1000.0; hours]);
    frame.set_values(keys::NUCLEAR, vec![1000.0; hours]).unwrap();

    let mut basic_sources = BTreeMap::new();
    basic_sources.insert(
        BasicSourceType::Nuclear,
        BasicSource::new(
            BasicSourceType::Nuclear,
            SourceBase::new(1000.0, SourceEconomics::with_variable_costs(22.0))
                .with_fixed_capacity(),
        ),
    );
    let grid = RegionGrid::new(
        Region::new("CZ"),
        frame,
        basic_sources,
        vec![loss_of_load()],
        vec![],
        1.0,
    )
    .unwrap();
    let mut dispatch = single_region(grid, dir.path());
    dispatch.optimize().unwrap();

    let grid = dispatch.grids.get_mut(&Region::new("CZ")).unwrap();
    let nuclear = grid.data.values(keys::NUCLEAR).unwrap();
    let price = grid.data.values(keys::PRICE).unwrap();
    assert!(nuclear.iter().all(|mw| (mw - 1000.0).abs() < 1e-6));
    assert!(price.iter().all(|eur| (eur - 22.0).abs() < 1e-6));

    let stats = GridStats::compute("year", grid, None).unwrap();
    let factor = stats
        .value(
            SourceKey::Basic(BasicSourceType::Nuclear),
            StatKind::CapacityFactor,
            Season::Year,
        )
        .unwrap();
    assert!((factor - 1.0).abs() < 1e-6, "capacity factor = {factor}");
    let load_twh = stats
        .value(SourceKey::Total, StatKind::LoadTwh, Season::Year)
        .unwrap();
    assert!((load_twh - 8.76).abs() < 1e-6);
}

#[test]
fn cheap_exporter_saturates_the_link_and_sets_import_prices() {
    let hours = 48;
    let dir = tempfile::tempdir().unwrap();

    // Region A: 2 GW of cheap dispatchable nuclear at 5 EUR/MWh, no load.
    let nuclear = FlexibleSource::new(
        FlexibleSourceType::Smr,
        SourceBase::new(2000.0, SourceEconomics::with_variable_costs(5.0)).with_fixed_capacity(),
    );
    let grid_a = RegionGrid::new(
        Region::new("A"),
        input_frame(hours, vec![0.0; hours]),
        BTreeMap::new(),
        vec![nuclear],
        vec![],
        1.0,
    )
    .unwrap();

    // Region B: load alternating between 400 MW (fully importable) and
    // 1000 MW (the 500 MW link saturates, gas fills the rest).
    let load_b: Vec<f64> =
        (0..hours).map(|t| if t % 2 == 0 { 400.0 } else { 1000.0 }).collect();
    let grid_b = RegionGrid::new(
        Region::new("B"),
        input_frame(hours, load_b.clone()),
        BTreeMap::new(),
        vec![gas(1000.0, 80.0)],
        vec![],
        1.0,
    )
    .unwrap();

    let mut links = Interconnectors::new();
    links.insert_symmetric(Region::new("A"), Region::new("B"), Interconnector::new(500.0, 0.02));

    let mut grids = BTreeMap::new();
    grids.insert(Region::new("A"), grid_a);
    grids.insert(Region::new("B"), grid_b);
    let mut config = DispatchConfig::new(dir.path());
    config.include_transmission_loss_in_price = true;
    let mut dispatch = GridDispatch::new(grids, links, config).unwrap();
    dispatch.optimize().unwrap();

    let b = &dispatch.grids[&Region::new("B")];
    let import = b.data.values("Import_A").unwrap();
    let price = b.data.values(keys::PRICE).unwrap();
    let a = &dispatch.grids[&Region::new("A")];
    let export = a.data.values("Export_B").unwrap();
    let price_a = a.data.values(keys::PRICE).unwrap();

    let imported_hour_price = 5.0 / 0.98 + 2.0;
    for t in 0..hours {
        if t % 2 == 0 {
            // Low-load hours: fully served by imports at the exporter's
            // price, grossed up by the loss plus the link fee.
            assert!((import[t] - 400.0).abs() < 1e-2, "hour {t}: import = {}", import[t]);
            assert!(
                (price[t] - imported_hour_price).abs() < 1e-3,
                "hour {t}: price = {}",
                price[t]
            );
        } else {
            // Peak hours: the link saturates at 500 MW and gas is marginal.
            assert!((export[t] - 500.0).abs() < 1e-2, "hour {t}: export = {}", export[t]);
            assert!((import[t] - 490.0).abs() < 1e-2);
            assert!((price[t] - 80.0).abs() < 1e-3, "hour {t}: price = {}", price[t]);
        }
        assert!((price_a[t] - 5.0).abs() < 1e-3);
    }

    // Aggregate sum: pointwise addition of the solved frames.
    let total = RegionGrid::aggregate(&dispatch.grids).unwrap().unwrap();
    let load_total = total.data.values(keys::LOAD).unwrap();
    for (t, expected) in load_b.iter().enumerate() {
        assert!((load_total[t] - expected).abs() < 1e-6);
    }
}

fn battery(nominal_mw: f64, max_energy_mwh: f64, fixed: bool) -> Storage {
    let mut storage = Storage::new(StorageType::LiIon, nominal_mw, SourceEconomics::free())
        .with_energy(max_energy_mwh, 0.0)
        .with_efficiencies(0.95, 0.95);
    if fixed {
        storage = storage.with_fixed_capacities();
    }
    storage
}

/// A two-day horizon with four sunny midday hours per day.
fn solar_profile(hours: usize, peak_mw: f64) -> Vec<f64> {
    (0..hours)
        .map(|t| if (10..14).contains(&(t % 24)) { peak_mw } else { 0.0 })
        .collect()
}

#[test]
fn battery_arbitrage_shifts_solar_into_the_night() {
    let hours = 48;
    let dir = tempfile::tempdir().unwrap();
    let mut frame = input_frame(hours, vec![500.0; hours]);
    frame.set_values(keys::SOLAR, solar_profile(hours, 1500.0)).unwrap();

    let mut basic_sources = BTreeMap::new();
    basic_sources.insert(
        BasicSourceType::Solar,
        BasicSource::new(
            BasicSourceType::Solar,
            SourceBase::new(2000.0, SourceEconomics::free()).with_fixed_capacity(),
        ),
    );
    let grid = RegionGrid::new(
        Region::new("CZ"),
        frame,
        basic_sources,
        vec![gas(2000.0, 80.0)],
        vec![battery(1000.0, 4000.0, true)],
        1.0,
    )
    .unwrap();
    let mut dispatch = single_region(grid, dir.path());
    dispatch.optimize().unwrap();

    let grid = &dispatch.grids[&Region::new("CZ")];
    let charging = grid.data.values("Charging_li").unwrap();
    let discharging = grid.data.values("Discharging_li").unwrap();
    let state = grid.data.values("State_Of_Charge_li").unwrap();
    let load = grid.data.values(keys::LOAD).unwrap();
    let total = grid.data.values(keys::TOTAL).unwrap();

    let total_charged: f64 = charging.iter().sum();
    let total_discharged: f64 = discharging.iter().sum();
    // The full solar surplus gets stored each day.
    assert!(
        (total_charged - 8000.0).abs() < 10.0,
        "total charged = {total_charged}"
    );
    // Discharged energy reflects the round-trip efficiency.
    let round_trip = 0.95 * 0.95;
    assert!(
        (total_discharged - round_trip * total_charged).abs() < 10.0,
        "discharged {total_discharged} vs charged {total_charged}"
    );
    for t in 0..hours {
        let sunny = (10..14).contains(&(t % 24));
        if sunny {
            assert!(charging[t] > 900.0, "hour {t} should charge, got {}", charging[t]);
        } else {
            assert!(charging[t] < 1e-2, "hour {t} should not charge, got {}", charging[t]);
        }
        // State of charge stays within bounds and the balance holds with
        // slack equal to curtailment.
        assert!((-1e-3..=4000.0 + 1e-3).contains(&state[t]));
        assert!(total[t] + 1e-2 >= load[t]);
    }

    // Persist/reload round trip reproduces the quantity columns.
    let path = dir.path().join("CZ.csv");
    let reloaded = HourlyFrame::load_csv(&path).unwrap();
    for key in ["Charging_li", "Discharging_li", keys::SOLAR, keys::PRICE] {
        let original = grid.data.values(key).unwrap();
        let roundtrip = reloaded.values(key).unwrap();
        for t in 0..hours {
            let scale = original[t].abs().max(1.0);
            assert!(
                (original[t] - roundtrip[t]).abs() / scale < 1e-6,
                "{key} differs at hour {t}"
            );
        }
    }
}

#[test]
fn capex_optimization_drops_an_uneconomic_battery() {
    let hours = 48;
    let dir = tempfile::tempdir().unwrap();
    let mut frame = input_frame(hours, vec![500.0; hours]);
    frame.set_values(keys::SOLAR, solar_profile(hours, 1500.0)).unwrap();

    let mut basic_sources = BTreeMap::new();
    basic_sources.insert(
        BasicSourceType::Solar,
        BasicSource::new(
            BasicSourceType::Solar,
            SourceBase::new(2000.0, SourceEconomics::free()).with_fixed_capacity(),
        ),
    );
    // Exorbitant investment costs: the optimum is to not build the battery
    // at all.
    let mut expensive = battery(1000.0, 4000.0, false);
    expensive.base.economics = SourceEconomics {
        overnight_costs_per_kw_eur: 100_000.0,
        lifetime_years: 15.0,
        construction_time_years: 1.0,
        discount_rate: 1.05,
        ..SourceEconomics::free()
    };
    let grid = RegionGrid::new(
        Region::new("CZ"),
        frame,
        basic_sources,
        vec![gas(2000.0, 80.0)],
        vec![expensive],
        1.0,
    )
    .unwrap();

    let mut grids = BTreeMap::new();
    grids.insert(Region::new("CZ"), grid);
    let mut config = DispatchConfig::new(dir.path());
    config.options.optimize_capex = true;
    let mut dispatch = GridDispatch::new(grids, Interconnectors::new(), config).unwrap();
    dispatch.optimize().unwrap();

    let storage = &dispatch.grids[&Region::new("CZ")].storage[0];
    assert!(
        storage.base.capacity_mw < 1e-3,
        "battery capacity = {}",
        storage.base.capacity_mw
    );
    assert!(storage.capacity_mw_charging < 1e-3);
    assert!(storage.max_energy_mwh < 1e-2);
}

#[test]
fn ramp_limited_flexible_basic_absorbs_predefined_jumps() {
    let hours = 48;
    let dir = tempfile::tempdir().unwrap();
    // The predefined curve alternates between 1000 MW and 0 MW in 6-hour
    // blocks; each edge jumps by ten times the hourly ramp limit.
    let predefined: Vec<f64> = (0..hours)
        .map(|t| if (t / 6) % 2 == 0 { 1000.0 } else { 0.0 })
        .collect();
    let mut frame = input_frame(hours, vec![1100.0; hours]);
    frame.set_values(keys::NUCLEAR, predefined.clone()).unwrap();

    let mut basic_sources = BTreeMap::new();
    basic_sources.insert(
        BasicSourceType::Nuclear,
        BasicSource::new(
            BasicSourceType::Nuclear,
            SourceBase::new(1000.0, SourceEconomics::with_variable_costs(10.0))
                .with_fixed_capacity(),
        )
        .with_flexibility(BasicFlexibility {
            max_decrease_mw: 1000.0,
            min_production_mw: 0.0,
            ramp_rate: 0.1,
            ramp_up_cost_mw_eur: 30.0,
        }),
    );
    let grid = RegionGrid::new(
        Region::new("CZ"),
        frame,
        basic_sources,
        vec![gas(2000.0, 80.0)],
        vec![],
        1.0,
    )
    .unwrap();

    let mut grids = BTreeMap::new();
    grids.insert(Region::new("CZ"), grid);
    let mut config = DispatchConfig::new(dir.path());
    config.options.optimize_ramp_up_costs = true;
    let mut dispatch = GridDispatch::new(grids, Interconnectors::new(), config).unwrap();
    dispatch.optimize().unwrap();

    let grid = &dispatch.grids[&Region::new("CZ")];
    let nuclear = grid.data.values(keys::NUCLEAR).unwrap();
    let ramp_up = grid.data.values("Ramp_Up_Nuclear").unwrap();
    let stored_predefined = grid.data.values("Nuclear_Predefined").unwrap();
    let decrease = grid.data.values("Nuclear_Decrease").unwrap();

    for t in 0..hours {
        assert!((stored_predefined[t] - predefined[t]).abs() < 1e-6);
        // The cheap source tracks its predefined curve: the jumps beyond
        // the ramp limit are absorbed by the relaxation.
        assert!(
            (nuclear[t] - predefined[t]).abs() < 1e-2,
            "hour {t}: production = {}",
            nuclear[t]
        );
        assert!(decrease[t].abs() < 1e-2);
        if t > 0 {
            let jump = predefined[t] - predefined[t - 1];
            if jump > 0.0 {
                // Of the 1000 MW predefined jump, 900 MW come from the
                // relaxation; the ramp-up variable pays for the limit.
                assert!(
                    (ramp_up[t] - 100.0).abs() < 1e-2,
                    "hour {t}: ramp up = {}",
                    ramp_up[t]
                );
            } else {
                assert!(ramp_up[t] < 1e-2, "hour {t}: ramp up = {}", ramp_up[t]);
            }
        }
    }
}

#[test]
fn run_of_river_discharge_is_bounded_by_inflow() {
    let hours = 24;
    let dir = tempfile::tempdir().unwrap();
    let mut frame = input_frame(hours, vec![50.0; hours]);
    frame
        .set_values(keys::HYDRO_INFLOW_ROR, vec![150.0; hours])
        .unwrap();

    // Run-of-river: no storage volume, no charging; half of the inflow must
    // be turbined immediately.
    let mut river = Storage::new(
        StorageType::RunOfRiver,
        200.0,
        SourceEconomics::with_variable_costs(2.0),
    )
    .with_fixed_capacities();
    river.use_ = gdc_core::StorageUse::ElectricityAsBasic;
    river.capacity_mw_charging = 0.0;
    river.min_capacity_mw_charging = 0.0;
    river.inflow_hourly_data_key = Some(keys::HYDRO_INFLOW_ROR.to_string());
    river.inflow_min_discharge_ratio = Some(0.5);

    let grid = RegionGrid::new(
        Region::new("CZ"),
        frame,
        BTreeMap::new(),
        vec![gas(500.0, 80.0)],
        vec![river],
        1.0,
    )
    .unwrap();
    let mut dispatch = single_region(grid, dir.path());
    dispatch.optimize().unwrap();

    let grid = &dispatch.grids[&Region::new("CZ")];
    let discharging = grid.data.values("Discharging_h_ror").unwrap();
    let curtailment = grid.data.values(keys::CURTAILMENT).unwrap();
    for t in 0..hours {
        // The minimum-discharge ratio forces 75 MW even though only 50 MW
        // are consumed; the excess is curtailed.
        assert!(
            (discharging[t] - 75.0).abs() < 1e-2,
            "hour {t}: discharging = {}",
            discharging[t]
        );
        assert!((curtailment[t] - 25.0).abs() < 1e-2);
        assert!(discharging[t] <= 150.0 + 1e-6);
    }
}

#[test]
fn previous_solution_reload_reproduces_quantities() {
    let hours = 48;
    let dir = tempfile::tempdir().unwrap();
    let mut frame = input_frame(hours, vec![1000.0; hours]);
    frame.set_values(keys::NUCLEAR, vec![1000.0; hours]).unwrap();
    let mut basic_sources = BTreeMap::new();
    basic_sources.insert(
        BasicSourceType::Nuclear,
        BasicSource::new(
            BasicSourceType::Nuclear,
            SourceBase::new(1000.0, SourceEconomics::with_variable_costs(22.0))
                .with_fixed_capacity(),
        ),
    );
    let make_grid = |frame: HourlyFrame| {
        RegionGrid::new(
            Region::new("CZ"),
            frame,
            basic_sources.clone(),
            vec![loss_of_load()],
            vec![],
            1.0,
        )
        .unwrap()
    };

    let mut dispatch = single_region(make_grid(frame.clone()), dir.path());
    dispatch.optimize().unwrap();
    let solved = dispatch.grids[&Region::new("CZ")].data.clone();

    let mut config = DispatchConfig::new(dir.path());
    config.load_previous_solution = true;
    let mut grids = BTreeMap::new();
    grids.insert(Region::new("CZ"), make_grid(frame));
    let mut reloaded = GridDispatch::new(grids, Interconnectors::new(), config).unwrap();
    reloaded.optimize().unwrap();

    let reloaded_frame = &reloaded.grids[&Region::new("CZ")].data;
    assert!(!reloaded_frame.has_column(keys::PRICE_TYPE));
    for key in [keys::LOAD, keys::NUCLEAR, keys::PRICE, keys::CURTAILMENT] {
        let expected = solved.values(key).unwrap();
        let actual = reloaded_frame.values(key).unwrap();
        for t in 0..hours {
            let scale = expected[t].abs().max(1.0);
            assert!(
                (expected[t] - actual[t]).abs() / scale < 1e-6,
                "{key} differs at hour {t}"
            );
        }
    }
}

#[test]
fn back_pressure_chp_follows_heat_demand() {
    let hours = 24;
    let dir = tempfile::tempdir().unwrap();
    let mut frame = input_frame(hours, vec![50.0; hours]);
    frame.set_values(keys::HEAT_DEMAND, vec![100.0; hours]).unwrap();

    let chp = FlexibleSource::new(
        FlexibleSourceType::GasChp,
        SourceBase::new(500.0, SourceEconomics::with_variable_costs(60.0)).with_fixed_capacity(),
    )
    .with_heat(gdc_core::HeatCoupling::BackPressure {
        ratio_heat_mw_per_el_mw: 2.0,
    });
    let grid = RegionGrid::new(
        Region::new("CZ"),
        frame,
        BTreeMap::new(),
        vec![chp, loss_of_load()],
        vec![],
        1.0,
    )
    .unwrap();

    let mut grids = BTreeMap::new();
    grids.insert(Region::new("CZ"), grid);
    let mut config = DispatchConfig::new(dir.path());
    config.options.optimize_heat = true;
    let mut dispatch = GridDispatch::new(grids, Interconnectors::new(), config).unwrap();
    dispatch.optimize().unwrap();

    let grid = &dispatch.grids[&Region::new("CZ")];
    let heat = grid.data.values("Heat_Flexible_gas_chp").unwrap();
    let electricity = grid.data.values("Flexible_gas_chp").unwrap();
    for t in 0..hours {
        // The heat balance is an equality; back pressure ties electricity
        // to half the heat output.
        assert!((heat[t] - 100.0).abs() < 1e-2, "hour {t}: heat = {}", heat[t]);
        assert!((electricity[t] - 50.0).abs() < 1e-2);
    }
}
