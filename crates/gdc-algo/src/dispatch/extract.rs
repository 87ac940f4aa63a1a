//! Writing the solved LP back into the per-region hourly tables.
//!
//! Every variable's value is copied into region-owned arrays aligned with
//! the hourly index; the solver handle is released by the caller once all
//! regions are extracted. Installed capacities are scaled by the optimized
//! installed factors afterwards.

use std::collections::BTreeMap;

use good_lp::Variable;

use gdc_core::{GridResult, Region, StorageUse};
use gdc_ts::keys;

use crate::dispatch::builder::{extraction_decrease_values, RegionVariables};
use crate::dispatch::solver::SolvedLp;
use crate::dispatch::DispatchOptions;
use crate::grid::RegionGrid;

fn add_into(total: &mut [f64], values: &[f64]) {
    for (accumulator, value) in total.iter_mut().zip(values) {
        *accumulator += value;
    }
}

fn sub_into(total: &mut [f64], values: &[f64]) {
    for (accumulator, value) in total.iter_mut().zip(values) {
        *accumulator -= value;
    }
}

/// Copy the solved dispatch into the region's frame: per-source production,
/// storage flows and state, per-link imports and exports, and the derived
/// balance series.
#[allow(clippy::too_many_arguments)]
pub(crate) fn extract_solution(
    grid: &mut RegionGrid,
    variables: &RegionVariables,
    options: &DispatchOptions,
    solution: &SolvedLp,
    inflow: &BTreeMap<Region, Vec<Variable>>,
    outflow: &BTreeMap<Region, Vec<Variable>>,
    inflow_loss: &BTreeMap<Region, f64>,
) -> GridResult<()> {
    let rows = grid.data.len();

    let mut total_flexible = vec![0.0; rows];
    let mut total_flexible_el_eq = vec![0.0; rows];
    let mut total_flexible_heat = vec![0.0; rows];
    for (index, source) in grid.flexible_sources.iter().enumerate() {
        let mut flexible = solution.values(&variables.flexible_production[index]);

        if source.heat.is_some() {
            // For CHP the production variable is the electricity
            // equivalent; actual electricity output shrinks with steam
            // extraction.
            add_into(&mut total_flexible_el_eq, &flexible);
            grid.data
                .set_values(&keys::flexible_electricity_equivalent_key(source.kind), flexible.clone())?;

            if let Some(heat_vars) = &variables.flexible_heat_production[index] {
                let heat = solution.values(heat_vars);
                add_into(&mut total_flexible_heat, &heat);
                grid.data
                    .set_values(&keys::flexible_heat_key(source.kind), heat.clone())?;
                if let Some(decrease) = extraction_decrease_values(source, &flexible, &heat) {
                    sub_into(&mut flexible, &decrease);
                }
            }
        }

        // Keep the solved ramp-up generation so that exact ramp-up costs can
        // be recomputed later.
        if options.optimize_ramp_up_costs {
            if let Some(ramp_up) = &variables.flexible_ramp_up[index] {
                grid.data.set_values(
                    &keys::flexible_ramp_up_key(source.kind),
                    solution.values(ramp_up),
                )?;
            }
        }

        add_into(&mut total_flexible, &flexible);
        grid.data.set_values(&keys::flexible_key(source.kind), flexible)?;
    }

    grid.data.set_values(keys::FLEXIBLE, total_flexible.clone())?;
    if options.optimize_heat {
        grid.data
            .set_values(keys::ELECTRICITY_EQUIVALENT_FLEXIBLE, total_flexible_el_eq)?;
        grid.data
            .set_values(keys::HEAT_FLEXIBLE_PRODUCTION, total_flexible_heat)?;
    }

    let mut total_charging = vec![0.0; rows];
    let mut total_discharging = vec![0.0; rows];
    let mut load_shift = vec![0.0; rows];
    let mut has_load_shift = false;
    for (index, storage) in grid.storage.iter().enumerate() {
        let charging = solution.values(&variables.storage_charging[index]);
        let discharging = solution.values(&variables.storage_discharging[index]);
        let state = solution.values(&variables.storage_state[index]);

        grid.data.set_values(&keys::charging_key(storage), charging.clone())?;
        grid.data
            .set_values(&keys::discharging_key(storage), discharging.clone())?;
        grid.data.set_values(&keys::state_of_charge_key(storage), state)?;

        if storage.use_ == StorageUse::DemandFlexibility {
            add_into(&mut load_shift, &charging);
            sub_into(&mut load_shift, &discharging);
            has_load_shift = true;
        } else if storage.use_.is_electricity() {
            // Only electricity storage enters the totals.
            add_into(&mut total_charging, &charging);
            add_into(&mut total_discharging, &discharging);
        }
    }
    grid.data.set_values(keys::CHARGING, total_charging.clone())?;
    grid.data.set_values(keys::DISCHARGING, total_discharging.clone())?;
    grid.data.set_values(keys::LOAD_SHIFT, load_shift.clone())?;

    let mut total_import = vec![0.0; rows];
    let mut total_export = vec![0.0; rows];
    for (from, flow_vars) in inflow {
        let loss = inflow_loss.get(from).copied().unwrap_or(0.0);
        let import: Vec<f64> = solution
            .values(flow_vars)
            .into_iter()
            .map(|flow| flow * (1.0 - loss))
            .collect();
        add_into(&mut total_import, &import);
        grid.data.set_values(&keys::import_key(from), import)?;
    }
    for (to, flow_vars) in outflow {
        let export = solution.values(flow_vars);
        add_into(&mut total_export, &export);
        grid.data.set_values(&keys::export_key(to), export)?;
    }
    let net_import: Vec<f64> = total_import
        .iter()
        .zip(&total_export)
        .map(|(import, export)| import - export)
        .collect();
    grid.data.set_values(keys::IMPORT, total_import)?;
    grid.data.set_values(keys::EXPORT, total_export)?;
    grid.data.set_values(keys::NET_IMPORT, net_import.clone())?;

    // Scale the predefined basic series by the computed installed factors
    // and extract flexible basic production.
    let basic_kinds: Vec<_> = grid.basic_sources.keys().copied().collect();
    for kind in &basic_kinds {
        let key = keys::basic_key(*kind);
        if let Some(production_vars) = variables.flexible_basic_production.get(kind) {
            let predefined = grid.data.values(key)?;
            let solved = solution.values(production_vars);
            let decrease: Vec<f64> = predefined
                .iter()
                .zip(&solved)
                .map(|(predefined, solved)| predefined - solved)
                .collect();
            grid.data
                .set_values(&keys::flexible_basic_predefined_key(*kind), predefined)?;
            grid.data.set_values(key, solved)?;
            grid.data
                .set_values(&keys::flexible_basic_decrease_key(*kind), decrease)?;

            if options.optimize_ramp_up_costs {
                if let Some(ramp_up) = variables.flexible_basic_ramp_up.get(kind) {
                    grid.data
                        .set_values(&keys::basic_ramp_up_key(*kind), solution.values(ramp_up))?;
                }
            }
        } else {
            let installed_factor = solution.value(variables.basic_installed[kind]);
            let scaled: Vec<f64> = grid
                .data
                .values(key)?
                .into_iter()
                .map(|value| value * installed_factor)
                .collect();
            grid.data.set_values(key, scaled)?;
        }
    }

    let mut load = grid.data.values(keys::LOAD)?;
    if has_load_shift {
        grid.data.set_values(keys::LOAD_BEFORE_FLEXIBILITY, load.clone())?;
        add_into(&mut load, &load_shift);
        grid.data.set_values(keys::LOAD, load.clone())?;
    }

    // Derived balance series.
    let onshore = grid.data.values(keys::WIND_ONSHORE)?;
    let offshore = grid.data.values(keys::WIND_OFFSHORE)?;
    let solar = grid.data.values(keys::SOLAR)?;
    let hydro = grid.data.values(keys::HYDRO)?;
    let nuclear = grid.data.values(keys::NUCLEAR)?;

    let wind: Vec<f64> = onshore.iter().zip(&offshore).map(|(a, b)| a + b).collect();
    let vre: Vec<f64> = wind.iter().zip(&solar).map(|(a, b)| a + b).collect();
    let residual: Vec<f64> = load.iter().zip(&vre).map(|(load, vre)| load - vre).collect();
    let production: Vec<f64> = (0..rows)
        .map(|t| vre[t] + hydro[t] + nuclear[t] + total_flexible[t])
        .collect();
    let total_without_storage: Vec<f64> =
        (0..rows).map(|t| production[t] + net_import[t]).collect();
    let total: Vec<f64> = (0..rows)
        .map(|t| total_without_storage[t] - total_charging[t] + total_discharging[t])
        .collect();
    let storable: Vec<f64> = (0..rows).map(|t| total_without_storage[t] - load[t]).collect();
    let curtailment: Vec<f64> = (0..rows).map(|t| total[t] - load[t]).collect();
    let shortage: Vec<f64> = (0..rows).map(|t| load[t] - total[t]).collect();

    grid.data.set_values(keys::WIND, wind)?;
    grid.data.set_values(keys::VRE, vre)?;
    grid.data.set_values(keys::RESIDUAL, residual)?;
    grid.data.set_values(keys::PRODUCTION, production)?;
    grid.data
        .set_values(keys::TOTAL_WITHOUT_STORAGE, total_without_storage)?;
    grid.data.set_values(keys::TOTAL, total)?;
    grid.data.set_values(keys::STORABLE, storable)?;
    grid.data.set_values(keys::CURTAILMENT, curtailment)?;
    grid.data.set_values(keys::SHORTAGE, shortage)?;

    Ok(())
}

/// Scale installed capacities by the optimized installed factors. For
/// storage without separate charging, the energy bounds scale along with
/// the capacity.
pub(crate) fn extract_factors(
    grid: &mut RegionGrid,
    variables: &RegionVariables,
    solution: &SolvedLp,
) {
    for (kind, source) in grid.basic_sources.iter_mut() {
        let installed_factor = solution.value(variables.basic_installed[kind]);
        source.base.capacity_mw *= installed_factor;
    }

    for (index, source) in grid.flexible_sources.iter_mut().enumerate() {
        let installed_factor = solution.value(variables.flexible_installed[index]);
        source.base.capacity_mw *= installed_factor;
    }

    for (index, storage) in grid.storage.iter_mut().enumerate() {
        let discharging_factor = solution.value(variables.storage_discharging_installed[index]);
        storage.base.capacity_mw *= discharging_factor;
        if storage.separate_charging.is_some() {
            let charging_factor = solution.value(variables.storage_charging_installed[index]);
            storage.capacity_mw_charging *= charging_factor;
        } else {
            storage.capacity_mw_charging *= discharging_factor;
            storage.initial_energy_mwh *= discharging_factor;
            storage.max_energy_mwh *= discharging_factor;
            storage.final_energy_mwh *= discharging_factor;
            storage.min_final_energy_mwh *= discharging_factor;
            if let Some(midnight) = storage.midnight_energy_mwh.as_mut() {
                *midnight *= discharging_factor;
            }
        }
    }
}
