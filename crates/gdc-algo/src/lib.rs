//! # gdc-algo: dispatch and capacity co-optimization
//!
//! The core of the grid dispatch engine: a joint linear program over hourly
//! dispatch, storage operation, cross-border flows and (optionally)
//! installed capacities, followed by the post-solve price estimation and
//! the seasonal statistics rollups.
//!
//! ## Pipeline
//!
//! | Stage | Module | Responsibility |
//! |-------|--------|----------------|
//! | Build | [`dispatch`] | Variables and constraints per region, shared link flows |
//! | Solve | [`dispatch::solver`] | Backend selection, tolerances, timeout |
//! | Extract | [`dispatch`] | Solution values into per-region tables, capacity scaling |
//! | Order | `export_flow` | Per-hour exporters-before-importers walk |
//! | Price | `spot_price` | Locational hourly prices from dispatch and import shadows |
//! | Report | [`stats`] | Seasonal production, emissions, costs, capacity factors |
//!
//! ## Example
//!
//! ```ignore
//! use gdc_algo::{DispatchConfig, GridDispatch};
//!
//! let mut dispatch = GridDispatch::new(grids, interconnectors, DispatchConfig::new("out"))?;
//! dispatch.optimize()?;
//! for (region, grid) in &mut dispatch.grids {
//!     let stats = gdc_algo::GridStats::compute("run", grid, None)?;
//!     println!("{region}: {:?} TWh", stats.value(
//!         gdc_algo::SourceKey::Total,
//!         gdc_algo::StatKind::LoadTwh,
//!         gdc_ts::Season::Year,
//!     ));
//! }
//! ```

pub mod dispatch;
mod export_flow;
pub mod grid;
mod spot_price;
pub mod stats;

pub use dispatch::{DispatchConfig, DispatchOptions, GridDispatch, SolverConfig, SolverKind};
pub use grid::RegionGrid;
pub use stats::{
    append_stats_csv, pivot_stats_wide, GridStats, SourceKey, StatKind, StatOutputRow, StatRecord,
};
