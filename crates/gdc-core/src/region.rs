//! Region identifiers.
//!
//! A region is one node of the dispatch problem: either an atomic zone (a
//! bidding zone, control area or country for which hourly data exists) or an
//! aggregate built by summing several zones. The LP does not distinguish the
//! two; aggregation only matters when grids are merged for reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a region participating in the dispatch problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Region(name.into())
    }

    /// Build the identifier of an aggregate of two regions.
    pub fn aggregate_with(&self, other: &Region) -> Region {
        Region(format!("{} - {}", self.0, other.0))
    }

    /// Build the identifier of an aggregate of all given regions.
    pub fn aggregate_of<'a>(members: impl IntoIterator<Item = &'a Region>) -> Region {
        let names: Vec<&str> = members.into_iter().map(|r| r.0.as_str()).collect();
        Region(names.join(", "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(s: &str) -> Self {
        Region(s.to_string())
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        Region(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_naming() {
        let cz = Region::new("CZ");
        let de = Region::new("DE");
        assert_eq!(cz.aggregate_with(&de).as_str(), "CZ - DE");
        assert_eq!(Region::aggregate_of([&cz, &de]).as_str(), "CZ, DE");
    }

    #[test]
    fn test_serde_transparent() {
        let region = Region::new("AT");
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, "\"AT\"");
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
    }
}
