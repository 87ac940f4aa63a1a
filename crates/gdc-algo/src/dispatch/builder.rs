//! Construction of the per-region LP.
//!
//! Every region contributes installed-factor variables, per-hour production,
//! charging/discharging and state-of-charge variables, and the hourly
//! adequacy, flexibility, storage and ramp constraints. Cross-border flow
//! variables are created by the orchestrator and appear in exactly two
//! per-region balances. The constraint rows are streamed straight into the
//! backend model; nothing is materialized densely.

use std::collections::BTreeMap;

use good_lp::{constraint, Constraint, Expression, ProblemVariables, Variable, variable};

use gdc_core::{
    capex, BasicSource, BasicSourceType, FlexibleSource, GridError, GridResult, HeatCoupling,
    ProductionLimit, Region, Storage, OUTFLOW_CAPACITY_COST_EUR_PER_MWH,
};
use gdc_ts::keys;

use crate::grid::RegionGrid;
use crate::dispatch::DispatchOptions;

/// Handles of one region's LP variables, kept for solution extraction.
pub(crate) struct RegionVariables {
    pub basic_installed: BTreeMap<BasicSourceType, Variable>,
    /// Per truly-flexible basic type, hourly production variables.
    pub flexible_basic_production: BTreeMap<BasicSourceType, Vec<Variable>>,
    /// Per truly-flexible basic type with a ramp limit, hourly ramp-up
    /// variables.
    pub flexible_basic_ramp_up: BTreeMap<BasicSourceType, Vec<Variable>>,
    pub flexible_installed: Vec<Variable>,
    pub flexible_production: Vec<Vec<Variable>>,
    /// Hourly heat production, for heat-coupled sources when heat is
    /// optimized.
    pub flexible_heat_production: Vec<Option<Vec<Variable>>>,
    /// Hourly ramp-up variables, for sources with a ramp limit.
    pub flexible_ramp_up: Vec<Option<Vec<Variable>>>,
    pub storage_charging_installed: Vec<Variable>,
    pub storage_discharging_installed: Vec<Variable>,
    pub storage_state: Vec<Vec<Variable>>,
    pub storage_charging: Vec<Vec<Variable>>,
    pub storage_discharging: Vec<Vec<Variable>>,
}

/// Link-flow variables adjacent to one region.
pub(crate) struct RegionFlows<'a> {
    pub outflow: &'a BTreeMap<Region, Vec<Variable>>,
    pub inflow: &'a BTreeMap<Region, Vec<Variable>>,
    pub inflow_loss: &'a BTreeMap<Region, f64>,
}

/// Lower bound of an installed factor: zero when capex optimization is
/// active, the min/installed ratio otherwise (one for fixed capacities).
fn installed_low_bound(optimize_capex: bool, installed_mw: f64, min_installed_mw: f64) -> f64 {
    let global_low_bound = if optimize_capex { 0.0 } else { 1.0 };
    if installed_mw == 0.0 {
        return global_low_bound;
    }
    let min_ratio = min_installed_mw / installed_mw;
    if global_low_bound > min_ratio {
        global_low_bound
    } else {
        min_ratio.min(1.0)
    }
}

/// Dynamically-scaled lower production bound of a flexible basic source at
/// the given hour: the absolute floor, raised by the bounded decrease from
/// the predefined value, capped at the predefined value itself (hours with
/// the curve below the floor follow the curve with no flexibility).
fn flexible_basic_min_production(source: &BasicSource, predefined_mw: f64) -> f64 {
    let flexibility = source
        .flexibility
        .as_ref()
        .expect("only called for flexible basic sources");
    let mut min_production_mw = flexibility.min_production_mw;
    if source.base.capacity_mw > 0.0 {
        // Cap the output ratio at 1.0 in case of inconsistent data where the
        // historical production exceeds net capacity.
        let current_output_ratio = (predefined_mw / source.base.capacity_mw).min(1.0);
        let relative_min_mw = predefined_mw - current_output_ratio * flexibility.max_decrease_mw;
        min_production_mw = min_production_mw.max(relative_min_mw);
    }
    min_production_mw.min(predefined_mw)
}

/// Add ramp constraints for hour `t > 0` of a ramp-limited source, with an
/// optional relaxation when the predefined curve of a flexible basic source
/// ramps faster than the source itself could.
#[allow(clippy::too_many_arguments)]
fn add_ramp_constraints(
    constraints: &mut Vec<Constraint>,
    hourly_cost: &mut Expression,
    optimize_ramp_up_costs: bool,
    ramp_rate: f64,
    capacity_mw: f64,
    ramp_up_cost_mw_eur: f64,
    production: &[Variable],
    ramp_up: &[Variable],
    installed: Variable,
    t: usize,
    ramp_up_predefined_mw: f64,
) {
    debug_assert!(t > 0, "cannot add ramp constraints for the first time slice");
    debug_assert!(ramp_rate < 1.0, "no ramp constraints for sources with ramp rate 1");
    let max_ramp_mw = ramp_rate * capacity_mw;

    // Positive or negative relaxation of the ramp limits when the predefined
    // curve ramps faster than the source could.
    let mut ramp_up_extra = Expression::from(0.0);
    let mut ramp_down_extra = Expression::from(0.0);
    if ramp_up_predefined_mw > max_ramp_mw {
        ramp_up_extra = (ramp_up_predefined_mw - max_ramp_mw) * installed;
    } else if ramp_up_predefined_mw < -max_ramp_mw {
        ramp_down_extra = (-(ramp_up_predefined_mw + max_ramp_mw)) * installed;
    }

    let max_ramp_scaled = max_ramp_mw * installed;
    constraints.push(constraint!(ramp_up[t] <= max_ramp_scaled.clone()));
    constraints.push(constraint!(
        production[t - 1] + ramp_up[t] - max_ramp_scaled - ramp_down_extra <= production[t]
    ));
    constraints.push(constraint!(
        production[t - 1] + ramp_up[t] + ramp_up_extra >= production[t]
    ));
    if optimize_ramp_up_costs {
        *hourly_cost += ramp_up_cost_mw_eur * ramp_up[t];
    }
}

/// Decrease of electricity output of an extraction turbine implied by the
/// given heat production.
fn extraction_el_decrease(
    base_ratio_heat_mw_per_el_mw: f64,
    heat_mw_per_decreased_el_mw: f64,
    el_production: Expression,
    heat_production: Expression,
) -> Expression {
    let variable_heat = heat_production - el_production * base_ratio_heat_mw_per_el_mw;
    variable_heat * (1.0 / heat_mw_per_decreased_el_mw)
}

struct StorageColumns {
    inflow: Option<Vec<f64>>,
    max_capacity: Option<Vec<f64>>,
}

fn storage_columns(grid: &RegionGrid, storage: &Storage) -> GridResult<StorageColumns> {
    let inflow = match &storage.inflow_hourly_data_key {
        Some(key) => Some(grid.data.values(key).map_err(|_| {
            GridError::Data(format!(
                "{}: storage {} expects inflow column '{key}'",
                grid.region,
                storage.kind.id()
            ))
        })?),
        None => None,
    };
    let max_capacity = match &storage.max_capacity_mw_hourly_data_key {
        Some(key) => {
            let mut values = grid.data.values(key).map_err(|_| {
                GridError::Data(format!(
                    "{}: storage {} expects capacity column '{key}'",
                    grid.region,
                    storage.kind.id()
                ))
            })?;
            if let Some(factor) = storage.max_capacity_mw_factor {
                for value in &mut values {
                    *value *= factor;
                }
            }
            Some(values)
        }
        None => None,
    };
    Ok(StorageColumns { inflow, max_capacity })
}

/// Validate the storage parameters that the LP cannot combine with capacity
/// optimization.
fn validate_storage_for_build(grid: &RegionGrid) -> GridResult<()> {
    for storage in &grid.storage {
        let fixed = storage.base.min_capacity_mw == storage.base.capacity_mw
            && storage.min_capacity_mw_charging == storage.capacity_mw_charging;
        if storage.inflow_min_discharge_ratio.is_some()
            && storage.base.min_capacity_mw != storage.base.capacity_mw
        {
            return Err(GridError::Config(format!(
                "{}: storage {}: inflow_min_discharge_ratio does not work with capacity optimization",
                grid.region,
                storage.kind.id()
            )));
        }
        if storage.ramp_rate < 1.0 && !fixed {
            return Err(GridError::Config(format!(
                "{}: storage {}: ramp limits require fixed capacities",
                grid.region,
                storage.kind.id()
            )));
        }
    }
    Ok(())
}

/// Build one region's variables, constraints and objective contribution.
pub(crate) fn build_region_problem(
    grid: &RegionGrid,
    options: &DispatchOptions,
    vars: &mut ProblemVariables,
    objective: &mut Expression,
    constraints: &mut Vec<Constraint>,
    flows: RegionFlows<'_>,
) -> GridResult<RegionVariables> {
    let num_steps = grid.data.len();
    let num_years = grid.num_years;

    validate_storage_for_build(grid)?;

    let load = grid.data.values(keys::LOAD)?;
    let heat_demand = if options.optimize_heat {
        Some(grid.data.values(keys::HEAT_DEMAND)?)
    } else {
        None
    };
    let additional_load_mw = grid
        .reserves
        .map(|reserves| reserves.additional_load_mw)
        .unwrap_or(0.0);

    let mut basic_profiles: BTreeMap<BasicSourceType, Vec<f64>> = BTreeMap::new();
    for kind in grid.basic_sources.keys() {
        basic_profiles.insert(*kind, grid.data.values(keys::basic_key(*kind))?);
    }

    // Installed factors for basic sources.
    let mut basic_installed = BTreeMap::new();
    let mut basic_opex = BTreeMap::new();
    for (kind, source) in &grid.basic_sources {
        let low_bound = installed_low_bound(
            options.optimize_capex,
            source.base.capacity_mw,
            source.base.min_capacity_mw,
        );
        let installed = vars.add(variable().min(low_bound).max(1.0));
        basic_installed.insert(*kind, installed);
        basic_opex.insert(*kind, capex::opex_per_mwh_eur(&source.base.economics, source.base.capacity_mw, None));
    }

    // Hourly production and ramp variables for truly-flexible basic sources.
    let mut flexible_basic_production = BTreeMap::new();
    let mut flexible_basic_ramp_up = BTreeMap::new();
    for (kind, source) in &grid.basic_sources {
        if !source.is_truly_flexible() {
            continue;
        }
        let production: Vec<Variable> =
            (0..num_steps).map(|_| vars.add(variable().min(0.0))).collect();
        flexible_basic_production.insert(*kind, production);
        let flexibility = source.flexibility.as_ref().expect("truly flexible");
        if flexibility.ramp_rate < 1.0 {
            let max_ramp = flexibility.ramp_rate * source.base.capacity_mw;
            let ramp_up: Vec<Variable> = (0..num_steps)
                .map(|_| vars.add(variable().min(0.0).max(max_ramp)))
                .collect();
            flexible_basic_ramp_up.insert(*kind, ramp_up);
        }
    }

    // Installed factors, production, heat and ramp variables for flexible
    // sources.
    let mut flexible_installed = Vec::new();
    let mut flexible_production = Vec::new();
    let mut flexible_heat_production = Vec::new();
    let mut flexible_ramp_up = Vec::new();
    let mut flexible_opex = Vec::new();
    for source in &grid.flexible_sources {
        let low_bound = installed_low_bound(
            options.optimize_capex,
            source.base.capacity_mw,
            source.base.min_capacity_mw,
        );
        let installed = vars.add(variable().min(low_bound).max(1.0));
        flexible_installed.push(installed);

        let production: Vec<Variable> = (0..num_steps)
            .map(|_| vars.add(variable().min(0.0).max(source.base.capacity_mw)))
            .collect();
        flexible_production.push(production);

        if source.ramp_rate < 1.0 {
            let max_ramp = source.ramp_rate * source.base.capacity_mw;
            let ramp_up: Vec<Variable> = (0..num_steps)
                .map(|_| vars.add(variable().min(0.0).max(max_ramp)))
                .collect();
            flexible_ramp_up.push(Some(ramp_up));
        } else {
            flexible_ramp_up.push(None);
        }

        if options.optimize_heat && source.heat.is_some() {
            let heat: Vec<Variable> =
                (0..num_steps).map(|_| vars.add(variable().min(0.0))).collect();
            flexible_heat_production.push(Some(heat));
        } else {
            flexible_heat_production.push(None);
        }

        flexible_opex.push(capex::opex_per_mwh_eur(
            &source.base.economics,
            source.base.capacity_mw,
            None,
        ));
    }

    // Installed factors, state and flow variables for storage.
    let mut storage_charging_installed = Vec::new();
    let mut storage_discharging_installed = Vec::new();
    let mut storage_state = Vec::new();
    let mut storage_charging = Vec::new();
    let mut storage_discharging = Vec::new();
    let mut storage_discharging_opex = Vec::new();
    let mut storage_charging_opex = Vec::new();
    let mut storage_data = Vec::new();
    for storage in &grid.storage {
        let charging_low_bound = installed_low_bound(
            options.optimize_capex,
            storage.capacity_mw_charging,
            storage.min_capacity_mw_charging,
        );
        let discharging_low_bound = installed_low_bound(
            options.optimize_capex,
            storage.base.capacity_mw,
            storage.base.min_capacity_mw,
        );
        storage_charging_installed.push(vars.add(variable().min(charging_low_bound).max(1.0)));
        storage_discharging_installed.push(vars.add(variable().min(discharging_low_bound).max(1.0)));

        let mut max_energy_mwh = storage.max_energy_mwh;
        if storage.separate_charging.is_some() {
            max_energy_mwh *= num_years;
        }
        storage_state.push(
            (0..num_steps)
                .map(|_| vars.add(variable().min(0.0).max(max_energy_mwh)))
                .collect::<Vec<Variable>>(),
        );
        storage_charging.push(
            (0..num_steps)
                .map(|_| vars.add(variable().min(0.0).max(storage.capacity_mw_charging)))
                .collect::<Vec<Variable>>(),
        );
        storage_discharging.push(
            (0..num_steps)
                .map(|_| vars.add(variable().min(0.0).max(storage.base.capacity_mw)))
                .collect::<Vec<Variable>>(),
        );

        storage_discharging_opex.push(capex::discharging_opex_per_mwh_eur(storage, None));
        storage_charging_opex.push(capex::charging_opex_per_mwh_eur(storage, None));
        storage_data.push(storage_columns(grid, storage)?);
    }

    // Global storage constraints: non-separate storage keeps one installed
    // factor for both sides, and charging capacity may be tied to VRE.
    for (index, storage) in grid.storage.iter().enumerate() {
        let charging_installed = storage_charging_installed[index];
        if storage.separate_charging.is_none() {
            let discharging_installed = storage_discharging_installed[index];
            constraints.push(constraint!(charging_installed == discharging_installed));
        }
        if storage.min_charging_capacity_ratio_to_vre > 0.0 {
            let mut installed_vre_mw = Expression::from(0.0);
            for (kind, source) in &grid.basic_sources {
                if kind.is_variable_renewable() {
                    installed_vre_mw += source.base.capacity_mw * basic_installed[kind];
                }
            }
            let installed_charging_mw = storage.capacity_mw_charging * charging_installed;
            constraints.push(constraint!(
                installed_charging_mw
                    >= installed_vre_mw * storage.min_charging_capacity_ratio_to_vre
            ));
        }
    }

    // Balancing reserves need at least one hydro-backed storage to provide
    // the headroom.
    let required_reserve_mw = grid
        .reserves
        .map(|reserves| reserves.hydro_capacity_reduction_mw)
        .unwrap_or(0.0);
    if required_reserve_mw > 0.0
        && !grid.storage.iter().any(|storage| storage.kind.available_for_reserves())
    {
        return Err(GridError::Config(format!(
            "no hydro reserve capacities available in {}, {required_reserve_mw} MW is required",
            grid.region
        )));
    }

    // Per flexible source, the total production over all hours (electricity
    // equivalent in the case of CHP), for the global production caps.
    let mut flexible_el_eq_sums: Vec<Expression> =
        grid.flexible_sources.iter().map(|_| Expression::from(0.0)).collect();
    // Per truly-flexible basic type, the previous hour's predefined value.
    let mut last_predefined: BTreeMap<BasicSourceType, f64> = BTreeMap::new();

    for t in 0..num_steps {
        let mut hourly_cost = Expression::from(0.0);
        let mut total_supply = Expression::from(0.0);
        let mut total_heat_supply = Expression::from(0.0);

        // Production and variable costs from basic sources.
        for (kind, source) in &grid.basic_sources {
            let production: Expression = if source.is_truly_flexible() {
                flexible_basic_production[kind][t].into()
            } else {
                basic_profiles[kind][t] * basic_installed[kind]
            };
            total_supply += production.clone();
            hourly_cost += production * basic_opex[kind];
        }

        // Production and variable costs from flexible sources.
        for (index, source) in grid.flexible_sources.iter().enumerate() {
            let production = flexible_production[index][t];
            let mut el_production = Expression::from(production);
            hourly_cost += flexible_opex[index] * production;

            if options.optimize_heat {
                if let (Some(heat), Some(heat_vars)) =
                    (&source.heat, &flexible_heat_production[index])
                {
                    // Steam extraction decreases electricity output; costs
                    // correspond to the full (electricity-equivalent)
                    // production above.
                    if let HeatCoupling::Extraction {
                        base_ratio_heat_mw_per_el_mw,
                        heat_mw_per_decreased_el_mw,
                        ..
                    } = heat
                    {
                        el_production = el_production
                            - extraction_el_decrease(
                                *base_ratio_heat_mw_per_el_mw,
                                *heat_mw_per_decreased_el_mw,
                                production.into(),
                                heat_vars[t].into(),
                            );
                    }
                    total_heat_supply += heat_vars[t];
                }
            }

            total_supply += el_production;
            flexible_el_eq_sums[index] += production;
        }

        // Inflow / outflow and variable costs from grid storage.
        for (index, storage) in grid.storage.iter().enumerate() {
            let discharging = storage_discharging[index][t];
            let charging = storage_charging[index][t];
            if storage.use_.is_electricity()
                || storage.use_ == gdc_core::StorageUse::DemandFlexibility
            {
                total_supply += discharging;
                total_supply -= charging;
            } else {
                total_heat_supply += discharging;
                total_heat_supply -= charging;
            }
            hourly_cost += storage_discharging_opex[index] * discharging;
            if storage.separate_charging.is_some() {
                hourly_cost += storage_charging_opex[index] * charging;
            }
        }

        // Inflow / outflow and fees from interconnectors. Exporters pay for
        // interconnection capacity.
        for (from, inflow_vars) in flows.inflow {
            let loss = flows.inflow_loss.get(from).copied().unwrap_or(0.0);
            total_supply += (1.0 - loss) * inflow_vars[t];
        }
        for outflow_vars in flows.outflow.values() {
            total_supply -= outflow_vars[t];
            hourly_cost += OUTFLOW_CAPACITY_COST_EUR_PER_MWH * outflow_vars[t];
        }

        // Adequacy. VRE generation can be arbitrarily curtailed, so
        // over-production is allowed.
        let total_demand_mw = load[t] + additional_load_mw;
        constraints.push(constraint!(total_supply >= total_demand_mw));

        if let Some(heat_demand) = &heat_demand {
            constraints.push(constraint!(total_heat_supply == heat_demand[t]));
        }

        // Flexibility envelope for flexible basic sources; hourly production
        // must also respect the optimized installed capacity.
        for (kind, source) in &grid.basic_sources {
            if !source.is_truly_flexible() {
                continue;
            }
            let predefined_mw = basic_profiles[kind][t];
            let min_production_mw = flexible_basic_min_production(source, predefined_mw);
            let installed = basic_installed[kind];
            let production = flexible_basic_production[kind][t];
            if min_production_mw == predefined_mw {
                constraints.push(constraint!(production == predefined_mw * installed));
            } else {
                constraints.push(constraint!(production <= predefined_mw * installed));
                constraints.push(constraint!(production >= min_production_mw * installed));
            }
        }

        // Production of flexible sources must respect the optimized
        // installed capacity.
        for (index, source) in grid.flexible_sources.iter().enumerate() {
            if source.base.min_capacity_mw < source.base.capacity_mw {
                let installed = flexible_installed[index];
                constraints.push(constraint!(
                    flexible_production[index][t] <= source.base.capacity_mw * installed
                ));
            }
        }

        // Storage flows must respect the optimized installed capacities;
        // hydro-backed storage headroom counts towards reserves.
        let mut available_reserve_mw = Expression::from(0.0);
        for (index, storage) in grid.storage.iter().enumerate() {
            let charging = storage_charging[index][t];
            let discharging = storage_discharging[index][t];
            if storage.min_capacity_mw_charging < storage.capacity_mw_charging {
                let charging_installed = storage_charging_installed[index];
                constraints.push(constraint!(
                    charging <= storage.capacity_mw_charging * charging_installed
                ));
            }
            if let Some(max_capacity) = &storage_data[index].max_capacity {
                constraints.push(constraint!(charging <= max_capacity[t]));
                constraints.push(constraint!(discharging <= max_capacity[t]));
            }

            if storage.base.min_capacity_mw < storage.base.capacity_mw {
                let discharging_installed = storage_discharging_installed[index];
                let discharging_installed_mw =
                    storage.base.capacity_mw * discharging_installed;
                constraints.push(constraint!(discharging <= discharging_installed_mw.clone()));
                if storage.kind.available_for_reserves() {
                    available_reserve_mw += discharging_installed_mw - discharging;
                }
                // The limit on stored energy is derived from the discharging
                // installed factor.
                if storage.separate_charging.is_none() {
                    let state = storage_state[index][t];
                    constraints.push(constraint!(
                        state <= storage.max_energy_mwh * discharging_installed
                    ));
                }
            } else if storage.kind.available_for_reserves() {
                available_reserve_mw += Expression::from(storage.base.capacity_mw) - discharging;
            }
        }

        // Implicit balancing reserves via hydropower headroom.
        if required_reserve_mw > 0.0 {
            constraints.push(constraint!(available_reserve_mw >= required_reserve_mw));
        }

        // Heat production constraints per turbine type.
        if options.optimize_heat {
            for (index, source) in grid.flexible_sources.iter().enumerate() {
                let Some(heat_vars) = &flexible_heat_production[index] else {
                    continue;
                };
                let heat = heat_vars[t];
                let el = flexible_production[index][t];
                match source.heat.as_ref().expect("heat vars imply coupling") {
                    HeatCoupling::BackPressure { ratio_heat_mw_per_el_mw } => {
                        constraints.push(constraint!(heat == *ratio_heat_mw_per_el_mw * el));
                    }
                    HeatCoupling::Extraction {
                        base_ratio_heat_mw_per_el_mw,
                        heat_mw_per_decreased_el_mw,
                        min_ratio_el,
                    } => {
                        let max_heat_variable_ratio =
                            heat_mw_per_decreased_el_mw * (1.0 - min_ratio_el);
                        let max_heat_ratio = base_ratio_heat_mw_per_el_mw + max_heat_variable_ratio;
                        constraints
                            .push(constraint!(heat >= *base_ratio_heat_mw_per_el_mw * el));
                        constraints.push(constraint!(heat <= max_heat_ratio * el));
                    }
                    HeatCoupling::HeatRecovery { max_heat_mw_per_el_mw } => {
                        // Waste exhaust heat can always just be let go.
                        constraints.push(constraint!(heat <= *max_heat_mw_per_el_mw * el));
                    }
                }
            }
        }

        // Ramp limits for flexible sources.
        for (index, source) in grid.flexible_sources.iter().enumerate() {
            if let Some(ramp_up) = &flexible_ramp_up[index] {
                if t > 0 {
                    add_ramp_constraints(
                        constraints,
                        &mut hourly_cost,
                        options.optimize_ramp_up_costs,
                        source.ramp_rate,
                        source.base.capacity_mw,
                        source.ramp_up_cost_mw_eur,
                        &flexible_production[index],
                        ramp_up,
                        flexible_installed[index],
                        t,
                        0.0,
                    );
                }
            }
        }

        // Ramp limits for flexible basic sources, relaxed by the predefined
        // curve's own movement.
        for (kind, source) in &grid.basic_sources {
            if !source.is_truly_flexible() {
                continue;
            }
            let predefined_mw = basic_profiles[kind][t];
            if let Some(ramp_up) = flexible_basic_ramp_up.get(kind) {
                if t > 0 {
                    let flexibility = source.flexibility.as_ref().expect("truly flexible");
                    let ramp_up_predefined_mw = predefined_mw - last_predefined[kind];
                    add_ramp_constraints(
                        constraints,
                        &mut hourly_cost,
                        options.optimize_ramp_up_costs,
                        flexibility.ramp_rate,
                        source.base.capacity_mw,
                        flexibility.ramp_up_cost_mw_eur,
                        &flexible_basic_production[kind],
                        ramp_up,
                        basic_installed[kind],
                        t,
                        ramp_up_predefined_mw,
                    );
                }
            }
            last_predefined.insert(*kind, predefined_mw);
        }

        // Ramp limits for storage, on the net output change.
        for (index, storage) in grid.storage.iter().enumerate() {
            if storage.ramp_rate < 1.0 && t > 0 {
                let max_ramp_mw =
                    storage.ramp_rate * (storage.base.capacity_mw + storage.capacity_mw_charging);
                let before_out = Expression::from(storage_charging[index][t - 1])
                    - storage_discharging[index][t - 1];
                let now_out = Expression::from(storage_charging[index][t])
                    - storage_discharging[index][t];
                constraints.push(constraint!(before_out.clone() - max_ramp_mw <= now_out.clone()));
                constraints.push(constraint!(before_out + max_ramp_mw >= now_out));
            }
        }

        // Storage state transitions.
        for (index, storage) in grid.storage.iter().enumerate() {
            if storage.use_ == gdc_core::StorageUse::Heat && !options.optimize_heat {
                continue;
            }
            let state = &storage_state[index];
            let charging = storage_charging[index][t];
            let discharging = storage_discharging[index][t];
            let installed = storage_discharging_installed[index];

            let previous_state: Expression = if t > 0 {
                let keep_rate_day = 1.0 - storage.loss_rate_per_day;
                let keep_rate_hour = keep_rate_day.powf(1.0 / 24.0);
                keep_rate_hour * state[t - 1]
            } else if storage.separate_charging.is_some() {
                Expression::from(storage.initial_energy_mwh * num_years)
            } else {
                storage.initial_energy_mwh * installed
            };

            let inflow_mw = storage_data[index]
                .inflow
                .as_ref()
                .map(|values| values[t])
                .unwrap_or(0.0);
            let state_discharging = (1.0 / storage.discharging_efficiency) * discharging;
            let net_charging = storage.charging_efficiency * charging - state_discharging.clone();
            let use_mw = (storage.use_mwh_per_day / 24.0) * installed;
            let net_inflow = Expression::from(inflow_mw) - use_mw;

            // In all cases spilling is allowed (new state <= old state + ...).
            if storage.max_energy_mwh == 0.0 {
                constraints.push(constraint!(discharging <= net_inflow));
            } else if storage.capacity_mw_charging == 0.0 {
                constraints.push(constraint!(
                    state[t] <= previous_state + net_inflow - state_discharging.clone()
                ));
            } else {
                constraints.push(constraint!(
                    state[t] <= previous_state + net_inflow + net_charging
                ));
            }

            if let Some(ratio) = storage.inflow_min_discharge_ratio {
                if inflow_mw > 0.0 {
                    let min_production = (inflow_mw * ratio).min(storage.base.capacity_mw);
                    constraints.push(constraint!(state_discharging >= min_production));
                }
            }

            if let Some(midnight_energy_mwh) = storage.midnight_energy_mwh {
                if t % 24 == 0 {
                    if storage.separate_charging.is_some() {
                        constraints.push(constraint!(
                            state[t] == midnight_energy_mwh * num_years
                        ));
                    } else {
                        constraints
                            .push(constraint!(state[t] == midnight_energy_mwh * installed));
                    }
                }
            }

            if t + 1 == num_steps {
                // `min_final_energy_mwh` is a strict bound; `final_energy_mwh`
                // is the reference for profit from selling excess energy or
                // costs of buying the missing energy (e.g. hydrogen).
                let (min_final, final_target): (Expression, Expression) =
                    if storage.separate_charging.is_some() {
                        (
                            Expression::from(storage.min_final_energy_mwh * num_years),
                            Expression::from(storage.final_energy_mwh * num_years),
                        )
                    } else {
                        (
                            storage.min_final_energy_mwh * installed,
                            storage.final_energy_mwh * installed,
                        )
                    };
                constraints.push(constraint!(state[t] >= min_final));
                let extra_state = Expression::from(state[t]) - final_target;
                hourly_cost += extra_state * (-storage.cost_sell_buy_mwh_eur);
            }
        }

        *objective += hourly_cost;
    }

    // Global production caps per flexible source (electricity equivalent in
    // the case of CHP).
    for (index, source) in grid.flexible_sources.iter().enumerate() {
        match source.limit {
            Some(ProductionLimit::CapacityFactor(max_capacity_factor)) => {
                let max_total_twh =
                    num_years * source.base.capacity_mw * max_capacity_factor * 8760.0 / 1e6;
                let scaled = max_total_twh * flexible_installed[index];
                constraints.push(constraint!(
                    flexible_el_eq_sums[index].clone() * (1.0 / 1e6) <= scaled
                ));
            }
            Some(ProductionLimit::TotalTwh(max_total_twh)) => {
                constraints.push(constraint!(
                    flexible_el_eq_sums[index].clone() * (1.0 / 1e6)
                        <= num_years * max_total_twh
                ));
            }
            None => {}
        }
    }

    // Annualized fixed costs, scaled by the optimized installed capacities.
    // Paid-off capacity is a constant shift and is left out here; the
    // statistics subtract it.
    for (kind, source) in &grid.basic_sources {
        let per_mw_year = capex::capex_per_mw_year(&source.base.economics);
        *objective += (source.base.capacity_mw * per_mw_year * num_years) * basic_installed[kind];
    }
    for (index, source) in grid.flexible_sources.iter().enumerate() {
        if !source.base.is_virtual {
            let per_mw_year = capex::capex_per_mw_year(&source.base.economics);
            *objective +=
                (source.base.capacity_mw * per_mw_year * num_years) * flexible_installed[index];
        }
    }
    for (index, storage) in grid.storage.iter().enumerate() {
        let per_mw_year = capex::capex_per_mw_year(&storage.base.economics);
        *objective += (storage.base.capacity_mw * per_mw_year * num_years)
            * storage_discharging_installed[index];
        if let Some(charging_economics) = &storage.separate_charging {
            let charging_per_mw_year = capex::capex_per_mw_year(charging_economics);
            *objective += (storage.capacity_mw_charging * charging_per_mw_year * num_years)
                * storage_charging_installed[index];
        }
    }

    Ok(RegionVariables {
        basic_installed,
        flexible_basic_production,
        flexible_basic_ramp_up,
        flexible_installed,
        flexible_production,
        flexible_heat_production,
        flexible_ramp_up,
        storage_charging_installed,
        storage_discharging_installed,
        storage_state,
        storage_charging,
        storage_discharging,
    })
}

/// How a flexible source's electricity output relates to its production
/// variable once heat extraction is accounted for; used by the extractor.
pub(crate) fn extraction_decrease_values(
    source: &FlexibleSource,
    production: &[f64],
    heat: &[f64],
) -> Option<Vec<f64>> {
    match &source.heat {
        Some(HeatCoupling::Extraction {
            base_ratio_heat_mw_per_el_mw,
            heat_mw_per_decreased_el_mw,
            ..
        }) => Some(
            production
                .iter()
                .zip(heat)
                .map(|(el, heat)| {
                    (heat - el * base_ratio_heat_mw_per_el_mw) / heat_mw_per_decreased_el_mw
                })
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdc_core::{BasicFlexibility, SourceBase, SourceEconomics};

    #[test]
    fn test_installed_low_bound() {
        // Without capex optimization the factor is pinned to 1.
        assert_eq!(installed_low_bound(false, 100.0, 0.0), 1.0);
        // With it, the bound is the min/installed ratio.
        assert_eq!(installed_low_bound(true, 100.0, 30.0), 0.3);
        assert_eq!(installed_low_bound(true, 100.0, 0.0), 0.0);
        // Zero installed capacity falls back to the global bound.
        assert_eq!(installed_low_bound(true, 0.0, 0.0), 0.0);
        assert_eq!(installed_low_bound(false, 0.0, 0.0), 1.0);
    }

    #[test]
    fn test_flexible_basic_min_production() {
        let source = BasicSource::new(
            BasicSourceType::Nuclear,
            SourceBase::new(1000.0, SourceEconomics::free()).with_fixed_capacity(),
        )
        .with_flexibility(BasicFlexibility {
            max_decrease_mw: 400.0,
            min_production_mw: 100.0,
            ramp_rate: 1.0,
            ramp_up_cost_mw_eur: 0.0,
        });
        // At full output the full decrease is available.
        assert_eq!(flexible_basic_min_production(&source, 1000.0), 600.0);
        // At half output the available decrease halves.
        assert_eq!(flexible_basic_min_production(&source, 500.0), 300.0);
        // The absolute floor binds when the relative one falls below it.
        assert_eq!(flexible_basic_min_production(&source, 200.0), 120.0);
        // Below the floor, production follows the curve with no flexibility.
        assert_eq!(flexible_basic_min_production(&source, 50.0), 50.0);
        // Output ratio is capped at 1 for inconsistent historical data.
        assert_eq!(flexible_basic_min_production(&source, 1200.0), 800.0);
    }

    #[test]
    fn test_extraction_decrease_values() {
        let source = FlexibleSource::new(
            gdc_core::FlexibleSourceType::GasChp,
            SourceBase::new(100.0, SourceEconomics::free()),
        )
        .with_heat(HeatCoupling::Extraction {
            base_ratio_heat_mw_per_el_mw: 0.0,
            heat_mw_per_decreased_el_mw: 3.0,
            min_ratio_el: 0.4,
        });
        let decrease =
            extraction_decrease_values(&source, &[90.0, 90.0], &[0.0, 30.0]).unwrap();
        assert_eq!(decrease, vec![0.0, 10.0]);
    }
}
