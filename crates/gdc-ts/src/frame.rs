//! Hourly data frames.
//!
//! An [`HourlyFrame`] couples a chrono-based hourly index with a polars
//! `DataFrame` of per-hour quantities (all absolute MW, energy per hour =
//! MWh). The index is kept outside the frame so that every persisted column
//! stays numeric; the `Date` column only exists inside CSV files.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use polars::prelude::*;

use gdc_core::{GridError, GridResult};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How many hours of a gap get backfilled when aligning a region's data to
/// the joint index; longer gaps become zero.
pub const MAX_BACKFILL_HOURS: u32 = 4;

/// An hourly-indexed table of per-region quantities.
#[derive(Debug, Clone)]
pub struct HourlyFrame {
    index: Vec<NaiveDateTime>,
    data: DataFrame,
}

fn polars_err(err: PolarsError) -> GridError {
    GridError::Data(err.to_string())
}

impl HourlyFrame {
    pub fn new(index: Vec<NaiveDateTime>, data: DataFrame) -> GridResult<Self> {
        if data.width() > 0 && data.height() != index.len() {
            return Err(GridError::Data(format!(
                "frame height {} does not match index length {}",
                data.height(),
                index.len()
            )));
        }
        Ok(HourlyFrame { index, data })
    }

    /// Build a frame from named columns of plain values.
    pub fn from_columns(
        index: Vec<NaiveDateTime>,
        columns: Vec<(&str, Vec<f64>)>,
    ) -> GridResult<Self> {
        let series: Vec<Series> = columns
            .into_iter()
            .map(|(name, values)| Series::new(name, values))
            .collect();
        let data = if series.is_empty() {
            DataFrame::empty()
        } else {
            DataFrame::new(series).map_err(polars_err)?
        };
        HourlyFrame::new(index, data)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.get_column_names().contains(&name)
    }

    /// Materialize a numeric column; missing values count as zero.
    pub fn values(&self, name: &str) -> GridResult<Vec<f64>> {
        let series = self
            .data
            .column(name)
            .map_err(|_| GridError::Data(format!("missing required column '{name}'")))?;
        let series = series
            .cast(&DataType::Float64)
            .map_err(|_| GridError::Data(format!("column '{name}' is not numeric")))?;
        let chunked = series.f64().map_err(polars_err)?;
        Ok(chunked.into_iter().map(|v| v.unwrap_or(0.0)).collect())
    }

    /// Insert or replace a numeric column.
    pub fn set_values(&mut self, name: &str, values: Vec<f64>) -> GridResult<()> {
        if values.len() != self.index.len() {
            return Err(GridError::Data(format!(
                "column '{name}' has {} values for an index of {} hours",
                values.len(),
                self.index.len()
            )));
        }
        self.data
            .with_column(Series::new(name, values))
            .map_err(polars_err)?;
        Ok(())
    }

    /// Insert or replace a string column (used for the marginal price type,
    /// which is dropped again after persistence).
    pub fn set_strings(&mut self, name: &str, values: Vec<String>) -> GridResult<()> {
        if values.len() != self.index.len() {
            return Err(GridError::Data(format!(
                "column '{name}' has {} values for an index of {} hours",
                values.len(),
                self.index.len()
            )));
        }
        self.data
            .with_column(Series::new(name, values))
            .map_err(polars_err)?;
        Ok(())
    }

    pub fn strings(&self, name: &str) -> GridResult<Vec<String>> {
        let series = self.data.column(name).map_err(polars_err)?;
        let chunked = series.utf8().map_err(polars_err)?;
        Ok(chunked
            .into_iter()
            .map(|v| v.unwrap_or("").to_string())
            .collect())
    }

    /// Drop a column if it exists.
    pub fn drop_column(&mut self, name: &str) -> GridResult<()> {
        if self.has_column(name) {
            self.data = self.data.drop(name).map_err(polars_err)?;
        }
        Ok(())
    }

    /// Restrict the frame to the given columns, failing on missing ones.
    pub fn select_columns(&self, names: &[&str]) -> GridResult<HourlyFrame> {
        let data = self
            .data
            .select(names.iter().copied())
            .map_err(|_| {
                let missing: Vec<&str> = names
                    .iter()
                    .copied()
                    .filter(|name| !self.has_column(name))
                    .collect();
                GridError::Config(format!("missing required columns: {missing:?}"))
            })?;
        HourlyFrame::new(self.index.clone(), data)
    }

    pub fn column_sum(&self, name: &str) -> GridResult<f64> {
        Ok(self.values(name)?.iter().sum())
    }

    /// Align the frame to a joint index: rows present in the frame are kept,
    /// gaps of up to [`MAX_BACKFILL_HOURS`] are backfilled with the next
    /// non-missing value, and longer gaps become zero.
    pub fn align_to(&self, index: &[NaiveDateTime]) -> GridResult<HourlyFrame> {
        let positions: HashMap<NaiveDateTime, usize> = self
            .index
            .iter()
            .enumerate()
            .map(|(row, stamp)| (*stamp, row))
            .collect();

        let mut aligned = Vec::with_capacity(self.data.width());
        for name in self.data.get_column_names() {
            let values = self.values(name)?;
            let gapped: Vec<Option<f64>> = index
                .iter()
                .map(|stamp| positions.get(stamp).map(|&row| values[row]))
                .collect();
            let series = Series::new(name, gapped)
                .fill_null(FillNullStrategy::Backward(Some(MAX_BACKFILL_HOURS)))
                .map_err(polars_err)?
                .fill_null(FillNullStrategy::Zero)
                .map_err(polars_err)?;
            aligned.push(series);
        }
        let data = if aligned.is_empty() {
            DataFrame::empty()
        } else {
            DataFrame::new(aligned).map_err(polars_err)?
        };
        HourlyFrame::new(index.to_vec(), data)
    }

    /// Keep only the rows selected by the mask.
    pub fn filter_rows(&self, mask: &[bool]) -> GridResult<HourlyFrame> {
        if mask.len() != self.index.len() {
            return Err(GridError::Data(format!(
                "mask length {} does not match index length {}",
                mask.len(),
                self.index.len()
            )));
        }
        let mask_ca = BooleanChunked::from_slice("mask", mask);
        let data = self.data.filter(&mask_ca).map_err(polars_err)?;
        let index = self
            .index
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(stamp, _)| *stamp)
            .collect();
        HourlyFrame::new(index, data)
    }

    /// Pointwise sum with another frame over the union of columns; columns
    /// missing on one side count as zero. Indexes must already be aligned.
    /// String columns are dropped.
    pub fn add_pointwise(&self, other: &HourlyFrame) -> GridResult<HourlyFrame> {
        if self.index != other.index {
            return Err(GridError::Data(
                "cannot add frames with different indexes; align them first".into(),
            ));
        }
        let mut names: Vec<String> = Vec::new();
        for name in self.numeric_column_names().into_iter().chain(other.numeric_column_names()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let zeros = vec![0.0; self.index.len()];
        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let left = if self.has_column(name) { self.values(name)? } else { zeros.clone() };
            let right = if other.has_column(name) { other.values(name)? } else { zeros.clone() };
            let sum: Vec<f64> = left.iter().zip(&right).map(|(a, b)| a + b).collect();
            columns.push(Series::new(name, sum));
        }
        let data = if columns.is_empty() {
            DataFrame::empty()
        } else {
            DataFrame::new(columns).map_err(polars_err)?
        };
        HourlyFrame::new(self.index.clone(), data)
    }

    fn numeric_column_names(&self) -> Vec<String> {
        self.data
            .get_columns()
            .iter()
            .filter(|series| series.dtype().is_numeric())
            .map(|series| series.name().to_string())
            .collect()
    }

    /// Persist the frame as a CSV file with a leading `Date` column.
    pub fn store_csv(&self, path: &Path) -> GridResult<()> {
        let dates: Vec<String> = self
            .index
            .iter()
            .map(|stamp| stamp.format(DATE_FORMAT).to_string())
            .collect();
        let mut columns = vec![Series::new(crate::keys::DATE, dates)];
        columns.extend(self.data.get_columns().iter().cloned());
        let mut with_date = DataFrame::new(columns).map_err(polars_err)?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .finish(&mut with_date)
            .map_err(polars_err)?;
        Ok(())
    }

    /// Reload a frame persisted by [`store_csv`](Self::store_csv).
    pub fn load_csv(path: &Path) -> GridResult<HourlyFrame> {
        let file = File::open(path)?;
        let data = CsvReader::new(file)
            .has_header(true)
            .finish()
            .map_err(polars_err)?;
        let date_series = data
            .column(crate::keys::DATE)
            .map_err(|_| GridError::Data(format!("{}: missing Date column", path.display())))?;
        let dates = date_series.utf8().map_err(polars_err)?;
        let mut index = Vec::with_capacity(data.height());
        for value in dates.into_iter() {
            let raw = value
                .ok_or_else(|| GridError::Data(format!("{}: empty Date cell", path.display())))?;
            let stamp = NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|err| {
                    GridError::Parse(format!("{}: bad Date '{raw}': {err}", path.display()))
                })?;
            index.push(stamp);
        }
        let data = data.drop(crate::keys::DATE).map_err(polars_err)?;
        HourlyFrame::new(index, data)
    }
}

/// Joint index over several frames: the sorted union of their hourly
/// timestamps.
pub fn union_index<'a>(indexes: impl IntoIterator<Item = &'a [NaiveDateTime]>) -> Vec<NaiveDateTime> {
    let mut union: Vec<NaiveDateTime> = indexes.into_iter().flatten().copied().collect();
    union.sort_unstable();
    union.dedup();
    union
}

/// An hourly index covering `hours` steps from the given start.
pub fn hourly_index(start: NaiveDateTime, hours: usize) -> Vec<NaiveDateTime> {
    (0..hours)
        .map(|h| start + chrono::Duration::hours(h as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_align_backfills_short_gaps() {
        let full = hourly_index(start(), 10);
        // The frame only covers hours 6..10; the 6-hour leading gap must be
        // backfilled for 4 hours and zeroed before that.
        let partial = full[6..].to_vec();
        let frame =
            HourlyFrame::from_columns(partial, vec![("Load", vec![5.0, 6.0, 7.0, 8.0])]).unwrap();
        let aligned = frame.align_to(&full).unwrap();
        let load = aligned.values("Load").unwrap();
        assert_eq!(load, vec![0.0, 0.0, 5.0, 5.0, 5.0, 5.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CZ.csv");
        let index = hourly_index(start(), 3);
        let mut frame = HourlyFrame::from_columns(
            index,
            vec![("Load", vec![100.0, 200.5, 300.25]), ("Solar", vec![0.0, 10.0, 20.0])],
        )
        .unwrap();
        frame
            .set_strings("Price_Type", vec!["Curtailment".into(), "gas".into(), "gas".into()])
            .unwrap();
        frame.store_csv(&path).unwrap();

        let reloaded = HourlyFrame::load_csv(&path).unwrap();
        assert_eq!(reloaded.index(), frame.index());
        let load = reloaded.values("Load").unwrap();
        assert!((load[1] - 200.5).abs() < 1e-9);
        assert_eq!(reloaded.strings("Price_Type").unwrap()[0], "Curtailment");
    }

    #[test]
    fn test_add_pointwise_union_of_columns() {
        let index = hourly_index(start(), 2);
        let a = HourlyFrame::from_columns(
            index.clone(),
            vec![("Load", vec![1.0, 2.0]), ("Solar", vec![3.0, 4.0])],
        )
        .unwrap();
        let b =
            HourlyFrame::from_columns(index, vec![("Load", vec![10.0, 20.0]), ("Hydro", vec![1.0, 1.0])])
                .unwrap();
        let sum = a.add_pointwise(&b).unwrap();
        assert_eq!(sum.values("Load").unwrap(), vec![11.0, 22.0]);
        assert_eq!(sum.values("Solar").unwrap(), vec![3.0, 4.0]);
        assert_eq!(sum.values("Hydro").unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_union_index_sorts_and_dedups() {
        let a = hourly_index(start(), 3);
        let b = hourly_index(start() + chrono::Duration::hours(2), 3);
        let union = union_index([a.as_slice(), b.as_slice()]);
        assert_eq!(union.len(), 5);
        assert!(union.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_select_columns_reports_missing() {
        let index = hourly_index(start(), 2);
        let frame = HourlyFrame::from_columns(index, vec![("Load", vec![1.0, 2.0])]).unwrap();
        let err = frame.select_columns(&["Load", "Solar"]).unwrap_err();
        assert!(err.to_string().contains("Solar"));
    }
}
