//! Joint dispatch-and-capacity optimization over all regions.
//!
//! The orchestrator aligns the per-region hourly tables to a joint index,
//! creates the cross-border flow variables (each appears in exactly two
//! per-region balances), assembles every region's variables and constraints
//! into one LP, solves it, writes the solution back into the tables and
//! derives locational prices. The core is single-threaded and deterministic
//! given its inputs; the only blocking call is the solver invocation.

pub(crate) mod builder;
pub(crate) mod extract;
pub mod solver;

pub use solver::{SolverConfig, SolverKind};

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Timelike;
use good_lp::{variable, Expression, ProblemVariables, Variable};
use tracing::{info, warn};

use gdc_core::{GridError, GridResult, Interconnectors, Region};
use gdc_ts::{keys, union_index};

use crate::grid::RegionGrid;
use crate::spot_price::estimate_spot_prices;
use builder::{build_region_problem, RegionFlows};

/// What the LP co-optimizes next to hourly dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Optimize installed capacities within their bounds (installed factors
    /// get a lower bound of zero instead of one).
    pub optimize_capex: bool,
    /// Include the heat balance and CHP heat production.
    pub optimize_heat: bool,
    /// Charge for output increases of ramp-limited sources.
    pub optimize_ramp_up_costs: bool,
}

/// Full configuration of one optimization run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub options: DispatchOptions,
    /// Inflate import prices by the transmission loss of the link.
    pub include_transmission_loss_in_price: bool,
    /// Skip the LP and reload the per-region CSVs of a previous run.
    /// Assumes the same grid parameters as that run; capacities optimized
    /// under `optimize_capex` are not persisted and cannot be recovered.
    pub load_previous_solution: bool,
    pub solver: SolverConfig,
    /// Directory for the per-region solution CSVs.
    pub out_dir: PathBuf,
}

impl DispatchConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        DispatchConfig {
            options: DispatchOptions::default(),
            include_transmission_loss_in_price: false,
            load_previous_solution: false,
            solver: SolverConfig::default(),
            out_dir: out_dir.into(),
        }
    }
}

/// The multi-region optimization problem.
pub struct GridDispatch {
    pub grids: BTreeMap<Region, RegionGrid>,
    pub interconnectors: Interconnectors,
    pub config: DispatchConfig,
}

impl GridDispatch {
    pub fn new(
        grids: BTreeMap<Region, RegionGrid>,
        interconnectors: Interconnectors,
        config: DispatchConfig,
    ) -> GridResult<Self> {
        if grids.is_empty() {
            return Err(GridError::Config("no regions to optimize".into()));
        }
        interconnectors.validate()?;
        Ok(GridDispatch {
            grids,
            interconnectors,
            config,
        })
    }

    /// Columns a region's table contributes to the LP: the required load and
    /// per-source series, the optional PECD and load-decomposition columns,
    /// and any column referenced by a storage parameter.
    fn relevant_columns(grid: &RegionGrid) -> Vec<String> {
        let mut columns: Vec<String> = [
            keys::LOAD,
            keys::HEAT_DEMAND,
            keys::SOLAR,
            keys::WIND_ONSHORE,
            keys::WIND_OFFSHORE,
            keys::NUCLEAR,
            keys::HYDRO,
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();
        for optional in [
            keys::HYDRO_INFLOW_ROR,
            keys::HYDRO_INFLOW_RESERVOIR,
            keys::HYDRO_INFLOW_PUMPED_OPEN,
            keys::HYDRO_INFLOW_PONDAGE,
            keys::LOAD_BASE,
            keys::LOAD_HEAT_PUMPS,
        ] {
            if grid.data.has_column(optional) && !columns.iter().any(|name| name == optional) {
                columns.push(optional.to_string());
            }
        }
        for storage in &grid.storage {
            for key in [
                storage.inflow_hourly_data_key.as_ref(),
                storage.max_capacity_mw_hourly_data_key.as_ref(),
            ]
            .into_iter()
            .flatten()
            {
                if grid.data.has_column(key) && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Run the optimization (or reload a previous solution). On success the
    /// grids hold the solved hourly tables, scaled capacities and price
    /// columns, and the per-region CSVs are written to the output
    /// directory.
    pub fn optimize(&mut self) -> GridResult<()> {
        if self.config.load_previous_solution {
            for (region, grid) in self.grids.iter_mut() {
                let path = self.config.out_dir.join(format!("{region}.csv"));
                grid.data = gdc_ts::HourlyFrame::load_csv(&path)?;
                grid.data.drop_column(keys::PRICE_TYPE)?;
            }
            info!(out_dir = %self.config.out_dir.display(), "loaded previous solution");
            return Ok(());
        }

        // Restrict every region to the columns the LP consumes (validating
        // the required ones) and align all tables to the joint index.
        for grid in self.grids.values_mut() {
            let columns = Self::relevant_columns(grid);
            let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
            grid.data = grid.data.select_columns(&column_refs).map_err(|err| {
                GridError::Config(format!("{}: {err}", grid.region))
            })?;
        }
        let joint_index = union_index(self.grids.values().map(|grid| grid.data.index()));
        if joint_index.is_empty() {
            return Err(GridError::Config("all region tables are empty".into()));
        }
        if joint_index[0].time().hour() != 0 {
            // The midnight storage constraint assumes the index starts at
            // local midnight.
            warn!(
                first_hour = joint_index[0].time().hour(),
                "joint index does not start at midnight; midnight storage constraints are shifted"
            );
        }
        for grid in self.grids.values_mut() {
            grid.data = grid.data.align_to(&joint_index)?;
        }
        let num_steps = joint_index.len();

        // Shared flow variables per directed link with positive capacity.
        let mut vars = ProblemVariables::new();
        let mut outflow: BTreeMap<Region, BTreeMap<Region, Vec<Variable>>> = BTreeMap::new();
        let mut inflow: BTreeMap<Region, BTreeMap<Region, Vec<Variable>>> = BTreeMap::new();
        let mut inflow_loss: BTreeMap<Region, BTreeMap<Region, f64>> = BTreeMap::new();
        for region in self.grids.keys() {
            outflow.insert(region.clone(), BTreeMap::new());
            inflow.insert(region.clone(), BTreeMap::new());
            inflow_loss.insert(region.clone(), BTreeMap::new());
        }
        for (from, to_map) in &self.interconnectors.from_to {
            for (to, link) in to_map {
                if link.capacity_mw <= 0.0
                    || !self.grids.contains_key(from)
                    || !self.grids.contains_key(to)
                {
                    continue;
                }
                let flow: Vec<Variable> = (0..num_steps)
                    .map(|_| vars.add(variable().min(0.0).max(link.capacity_mw)))
                    .collect();
                outflow.get_mut(from).expect("region present").insert(to.clone(), flow.clone());
                inflow.get_mut(to).expect("region present").insert(from.clone(), flow);
                inflow_loss
                    .get_mut(to)
                    .expect("region present")
                    .insert(from.clone(), link.loss);
            }
        }

        info!(regions = self.grids.len(), hours = num_steps, "constructing the problem");
        let mut objective = Expression::from(0.0);
        let mut constraints = Vec::new();
        let mut region_variables = BTreeMap::new();
        for (region, grid) in &self.grids {
            let variables = build_region_problem(
                grid,
                &self.config.options,
                &mut vars,
                &mut objective,
                &mut constraints,
                RegionFlows {
                    outflow: &outflow[region],
                    inflow: &inflow[region],
                    inflow_loss: &inflow_loss[region],
                },
            )?;
            region_variables.insert(region.clone(), variables);
        }

        info!(constraints = constraints.len(), "solving the problem");
        let solution = solver::solve_lp(vars, objective, constraints, &self.config.solver)?;

        for (region, grid) in self.grids.iter_mut() {
            let variables = &region_variables[region];
            extract::extract_solution(
                grid,
                variables,
                &self.config.options,
                &solution,
                &inflow[region],
                &outflow[region],
                &inflow_loss[region],
            )?;
            extract::extract_factors(grid, variables, &solution);
        }
        drop(solution);

        info!("estimating spot prices");
        estimate_spot_prices(
            &mut self.grids,
            &self.interconnectors,
            self.config.include_transmission_loss_in_price,
        )?;

        std::fs::create_dir_all(&self.config.out_dir)?;
        for (region, grid) in self.grids.iter_mut() {
            let path = self.config.out_dir.join(format!("{region}.csv"));
            grid.data.store_csv(&path)?;
            // Keep only numeric columns in memory after persisting.
            grid.data.drop_column(keys::PRICE_TYPE)?;
        }
        info!(out_dir = %self.config.out_dir.display(), "solution stored");
        Ok(())
    }
}
