//! Regions represent the geographical nodes of the model, which can be linked by lines.
use crate::id::{IDCollection, define_id_type};
use anyhow::{Result, bail, ensure};
use indexmap::IndexSet;
use itertools::Itertools;
use std::fmt;

define_id_type! {RegionID}

/// An inter-regional link between two distinct regions.
///
/// Lines are unordered: the region which sorts first lexicographically is always stored as
/// `first`, so there is exactly one [`LineID`] for each pair of regions.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct LineID {
    /// The region which sorts first
    pub first: RegionID,
    /// The region which sorts second
    pub second: RegionID,
}

impl LineID {
    /// Create a canonical [`LineID`] for two regions, in either order
    pub fn new(a: &RegionID, b: &RegionID) -> Result<Self> {
        ensure!(a != b, "A line must connect two different regions (got {a} twice)");

        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            first: first.clone(),
            second: second.clone(),
        })
    }

    /// Whether the line is connected to the given region
    pub fn connects(&self, region_id: &RegionID) -> bool {
        &self.first == region_id || &self.second == region_id
    }

    /// Parse a line in the form `region1-region2`.
    ///
    /// Region names may themselves contain dashes, so every split point is tried until one is
    /// found for which both halves are known regions.
    pub fn from_str_in(s: &str, region_ids: &IndexSet<RegionID>) -> Result<Self> {
        let s = s.trim();
        for (idx, _) in s.match_indices('-') {
            let (a, b) = (&s[..idx], &s[idx + 1..]);
            if let (Ok(a), Ok(b)) = (region_ids.get_id_by_str(a), region_ids.get_id_by_str(b)) {
                return Self::new(&a, &b);
            }
        }

        bail!("Invalid line '{s}': must be in the form region1-region2")
    }
}

impl fmt::Display for LineID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Get the canonical list of lines for the given regions.
///
/// Every unordered pair of regions is represented once, sorted by `(first, second)`. There are
/// no lines if there is only one region.
pub fn lines_for_regions(region_ids: &IndexSet<RegionID>) -> Vec<LineID> {
    region_ids
        .iter()
        .tuple_combinations()
        .map(|(a, b)| LineID::new(a, b).expect("Region IDs are unique"))
        .sorted()
        .collect()
}
