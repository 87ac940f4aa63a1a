//! Seasonal slicing of the hourly index.

use chrono::{Datelike, NaiveDateTime};

// Summer covers the middle half of the year by day-of-year.
const SUMMER_START_DAY: u32 = 92; // ceil(365 / 4)
const SUMMER_END_DAY: u32 = 274; // ceil(3 * 365 / 4)

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Year,
    Summer,
    Winter,
}

impl Season {
    pub const ALL: [Season; 3] = [Season::Year, Season::Summer, Season::Winter];

    pub fn code(&self) -> &'static str {
        match self {
            Season::Year => "Y",
            Season::Summer => "S",
            Season::Winter => "W",
        }
    }
}

fn is_summer(stamp: &NaiveDateTime) -> bool {
    let day = stamp.date().ordinal();
    (SUMMER_START_DAY..SUMMER_END_DAY).contains(&day)
}

/// Row mask selecting the hours belonging to the given season.
pub fn season_mask(index: &[NaiveDateTime], season: Season) -> Vec<bool> {
    match season {
        Season::Year => vec![true; index.len()],
        Season::Summer => index.iter().map(is_summer).collect(),
        Season::Winter => index.iter().map(|stamp| !is_summer(stamp)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, month, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_season_boundaries() {
        // 2020: day 92 is April 1 (leap year), day 274 is September 30.
        assert!(!is_summer(&noon(1, 15)));
        assert!(is_summer(&noon(4, 1)));
        assert!(is_summer(&noon(7, 15)));
        assert!(!is_summer(&noon(10, 1)));
        assert!(!is_summer(&noon(12, 31)));
    }

    #[test]
    fn test_masks_partition_the_year() {
        let index: Vec<NaiveDateTime> = (1..=12).map(|month| noon(month, 15)).collect();
        let summer = season_mask(&index, Season::Summer);
        let winter = season_mask(&index, Season::Winter);
        for (s, w) in summer.iter().zip(&winter) {
            assert!(s ^ w);
        }
    }
}
