//! # gdc-ts: hourly time-series plumbing for the grid dispatch engine
//!
//! Per-region hourly quantities live in polars data frames addressed by the
//! canonical column [`keys`]. This crate provides the joint-index alignment
//! (left join with short-gap backfill), CSV persistence of solved grids,
//! seasonal slicing for the statistics layer and pointwise frame addition
//! for aggregate regions.

pub mod frame;
pub mod keys;
pub mod season;

pub use frame::{hourly_index, union_index, HourlyFrame, MAX_BACKFILL_HOURS};
pub use season::{season_mask, Season};
