//! Per-region grids: entities plus their hourly data.

use std::collections::BTreeMap;

use gdc_core::{
    BasicSource, BasicSourceType, FlexibleSource, GridError, GridResult, Region, Reserves, Storage,
};
use gdc_ts::{keys, HourlyFrame};

/// One region's share of the dispatch problem: its sources, storage and
/// hourly data. Entities are immutable through LP construction; after a
/// solve the extractor scales capacities by the optimized installed factors
/// and extends the frame with solved columns.
#[derive(Debug, Clone)]
pub struct RegionGrid {
    pub region: Region,
    pub data: HourlyFrame,
    pub basic_sources: BTreeMap<BasicSourceType, BasicSource>,
    pub flexible_sources: Vec<FlexibleSource>,
    pub storage: Vec<Storage>,
    pub reserves: Option<Reserves>,
    /// Number of modeled weather years (the hourly index spans this many
    /// calendar years).
    pub num_years: f64,
    /// Is this grid the sum of all grids in the model?
    pub is_complete: bool,
}

impl RegionGrid {
    pub fn new(
        region: Region,
        data: HourlyFrame,
        basic_sources: BTreeMap<BasicSourceType, BasicSource>,
        flexible_sources: Vec<FlexibleSource>,
        storage: Vec<Storage>,
        num_years: f64,
    ) -> GridResult<Self> {
        for source in basic_sources.values() {
            source.validate()?;
        }
        for source in &flexible_sources {
            source.validate()?;
        }
        for facility in &storage {
            facility.validate()?;
        }
        Ok(RegionGrid {
            region,
            data,
            basic_sources,
            flexible_sources,
            storage,
            reserves: None,
            num_years,
            is_complete: false,
        })
    }

    pub fn with_reserves(mut self, reserves: Reserves) -> Self {
        self.reserves = Some(reserves);
        self
    }

    /// Merge with another grid into an aggregate region. Data frames are
    /// summed pointwise; the price columns instead get weighted averages
    /// (load-weighted spot price, flow-weighted import/export prices) with a
    /// zero fallback when the weights sum to zero.
    pub fn merged(&self, other: &RegionGrid) -> GridResult<RegionGrid> {
        if self.is_complete || other.is_complete {
            return Err(GridError::Config(
                "cannot add the complete grid to another grid".into(),
            ));
        }
        if self.num_years != other.num_years {
            return Err(GridError::Config(
                "number of years must be the same in both grids".into(),
            ));
        }

        let mut data = self.data.add_pointwise(&other.data)?;
        if self.data.has_column(keys::PRICE) && other.data.has_column(keys::PRICE) {
            let price = weighted_column(
                &self.data, &other.data, keys::PRICE, keys::LOAD)?;
            data.set_values(keys::PRICE, price)?;
        }
        if self.data.has_column(keys::PRICE_IMPORT) && other.data.has_column(keys::PRICE_IMPORT) {
            let price_export = weighted_column(
                &self.data, &other.data, keys::PRICE_EXPORT, keys::EXPORT)?;
            data.set_values(keys::PRICE_EXPORT, price_export)?;
            let price_import = weighted_column(
                &self.data, &other.data, keys::PRICE_IMPORT, keys::IMPORT)?;
            data.set_values(keys::PRICE_IMPORT, price_import)?;
        }

        let mut basic_sources = BTreeMap::new();
        for (kind, source) in &self.basic_sources {
            match other.basic_sources.get(kind) {
                Some(other_source) => {
                    basic_sources.insert(*kind, source.merged(other_source)?);
                }
                None => {
                    basic_sources.insert(*kind, source.clone());
                }
            }
        }
        for (kind, source) in &other.basic_sources {
            basic_sources.entry(*kind).or_insert_with(|| source.clone());
        }

        let reserves = match (&self.reserves, &other.reserves) {
            (Some(a), Some(b)) => Some(a.merged(b)),
            (Some(a), None) | (None, Some(a)) => Some(*a),
            (None, None) => None,
        };

        Ok(RegionGrid {
            region: self.region.aggregate_with(&other.region),
            data,
            basic_sources,
            flexible_sources: merge_flexible_by_kind(&self.flexible_sources, &other.flexible_sources)?,
            storage: merge_storage_by_kind(&self.storage, &other.storage)?,
            reserves,
            num_years: self.num_years,
            is_complete: false,
        })
    }

    /// Sum all grids into a single "complete" aggregate covering the whole
    /// model.
    pub fn aggregate(grids: &BTreeMap<Region, RegionGrid>) -> GridResult<Option<RegionGrid>> {
        let mut iter = grids.values();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut total = first.clone();
        for grid in iter {
            total = total.merged(grid)?;
        }
        total.region = Region::aggregate_of(grids.keys());
        total.is_complete = true;
        Ok(Some(total))
    }
}

/// Weighted per-hour average of a column over two grids; hours with zero
/// total weight fall back to zero (aggregates with zero net flows).
fn weighted_column(
    a: &HourlyFrame,
    b: &HourlyFrame,
    value_key: &str,
    weight_key: &str,
) -> GridResult<Vec<f64>> {
    let value_a = a.values(value_key)?;
    let value_b = b.values(value_key)?;
    let weight_a = a.values(weight_key)?;
    let weight_b = b.values(weight_key)?;
    Ok((0..value_a.len())
        .map(|t| {
            let total = weight_a[t] + weight_b[t];
            if total > 0.0 {
                (value_a[t] * weight_a[t] + value_b[t] * weight_b[t]) / total
            } else {
                0.0
            }
        })
        .collect())
}

fn merge_flexible_by_kind(
    a: &[FlexibleSource],
    b: &[FlexibleSource],
) -> GridResult<Vec<FlexibleSource>> {
    let mut merged: Vec<FlexibleSource> = Vec::new();
    for source in a {
        match b.iter().find(|other| other.kind == source.kind) {
            Some(other) => merged.push(source.merged(other)?),
            None => merged.push(source.clone()),
        }
    }
    for source in b {
        if !a.iter().any(|other| other.kind == source.kind) {
            merged.push(source.clone());
        }
    }
    Ok(merged)
}

fn merge_storage_by_kind(a: &[Storage], b: &[Storage]) -> GridResult<Vec<Storage>> {
    let mut merged: Vec<Storage> = Vec::new();
    for facility in a {
        match b.iter().find(|other| other.kind == facility.kind) {
            Some(other) => merged.push(facility.merged(other)?),
            None => merged.push(facility.clone()),
        }
    }
    for facility in b {
        if !a.iter().any(|other| other.kind == facility.kind) {
            merged.push(facility.clone());
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gdc_core::{SourceBase, SourceEconomics};
    use gdc_ts::hourly_index;

    fn frame(hours: usize, load: f64) -> HourlyFrame {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        HourlyFrame::from_columns(
            hourly_index(start, hours),
            vec![(keys::LOAD, vec![load; hours])],
        )
        .unwrap()
    }

    fn grid(name: &str, load: f64, nuclear_mw: f64) -> RegionGrid {
        let mut basic_sources = BTreeMap::new();
        basic_sources.insert(
            BasicSourceType::Nuclear,
            BasicSource::new(
                BasicSourceType::Nuclear,
                SourceBase::new(nuclear_mw, SourceEconomics::free()).with_fixed_capacity(),
            ),
        );
        RegionGrid::new(
            Region::new(name),
            frame(4, load),
            basic_sources,
            vec![],
            vec![],
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_merge_sums_data_and_capacities() {
        let merged = grid("CZ", 100.0, 1000.0).merged(&grid("SK", 50.0, 500.0)).unwrap();
        assert_eq!(merged.region.as_str(), "CZ - SK");
        assert_eq!(merged.data.values(keys::LOAD).unwrap(), vec![150.0; 4]);
        assert_eq!(
            merged.basic_sources[&BasicSourceType::Nuclear].base.capacity_mw,
            1500.0
        );
    }

    #[test]
    fn test_merge_weights_prices_by_load() {
        let mut a = grid("CZ", 100.0, 0.0);
        let mut b = grid("SK", 300.0, 0.0);
        a.data.set_values(keys::PRICE, vec![40.0; 4]).unwrap();
        b.data.set_values(keys::PRICE, vec![80.0; 4]).unwrap();
        let merged = a.merged(&b).unwrap();
        let price = merged.data.values(keys::PRICE).unwrap();
        assert!((price[0] - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_zero_weight_price_fallback() {
        let mut a = grid("CZ", 0.0, 0.0);
        let mut b = grid("SK", 0.0, 0.0);
        for grid in [&mut a, &mut b] {
            grid.data.set_values(keys::PRICE, vec![50.0; 4]).unwrap();
            grid.data.set_values(keys::PRICE_IMPORT, vec![30.0; 4]).unwrap();
            grid.data.set_values(keys::PRICE_EXPORT, vec![20.0; 4]).unwrap();
            grid.data.set_values(keys::IMPORT, vec![0.0; 4]).unwrap();
            grid.data.set_values(keys::EXPORT, vec![0.0; 4]).unwrap();
        }
        let merged = a.merged(&b).unwrap();
        assert_eq!(merged.data.values(keys::PRICE_IMPORT).unwrap(), vec![0.0; 4]);
        assert_eq!(merged.data.values(keys::PRICE_EXPORT).unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_aggregate_marks_complete() {
        let mut grids = BTreeMap::new();
        grids.insert(Region::new("CZ"), grid("CZ", 100.0, 1000.0));
        grids.insert(Region::new("SK"), grid("SK", 50.0, 0.0));
        let total = RegionGrid::aggregate(&grids).unwrap().unwrap();
        assert!(total.is_complete);
        assert_eq!(total.region.as_str(), "CZ, SK");
        assert!(total.merged(&grids[&Region::new("CZ")]).is_err());
    }
}
