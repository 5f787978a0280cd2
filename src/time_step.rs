//! Code for working with time steps.
//!
//! Time steps are sub-annual slices of each modelled year. Each has a fraction of the year
//! associated with it and the fractions sum to one. When no time steps are provided, a single
//! "Annual" time step covering the whole year is used.
use crate::id::define_id_type;
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use std::iter;

define_id_type! {TimeStepID}

/// The name of the time step used when no sub-annual resolution is configured
pub const ANNUAL_TIME_STEP: &str = "Annual";

/// A parameter which is either the same for every entry or varies by entry
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// The same value everywhere
    Scalar(f64),
    /// One value per entry
    Series(Vec<f64>),
}

impl ParamValue {
    /// Get the value for the entry at `idx`
    pub fn at(&self, idx: usize) -> f64 {
        match self {
            ParamValue::Scalar(value) => *value,
            ParamValue::Series(values) => values[idx],
        }
    }
}

/// The time steps of each year and the fraction of the year each occupies
#[derive(Clone, Debug, PartialEq)]
pub struct TimeStepInfo {
    time_steps: IndexMap<TimeStepID, f64>,
    sub_annual: bool,
}

impl Default for TimeStepInfo {
    /// The default `TimeStepInfo` is a single time step covering the whole year
    fn default() -> Self {
        Self {
            time_steps: iter::once((ANNUAL_TIME_STEP.into(), 1.0)).collect(),
            sub_annual: false,
        }
    }
}

impl TimeStepInfo {
    /// Create a new [`TimeStepInfo`] from time step names and fractions.
    ///
    /// The names must be unique and the fractions must be positive and sum to one.
    pub fn new<I>(time_steps: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TimeStepID, f64)>,
    {
        let mut map = IndexMap::new();
        for (id, fraction) in time_steps {
            ensure!(
                fraction > 0.0 && fraction <= 1.0,
                "Fraction for time step {id} must be in the range (0, 1]"
            );
            ensure!(
                map.insert(id.clone(), fraction).is_none(),
                "Duplicate time step: {id}"
            );
        }
        ensure!(!map.is_empty(), "At least one time step must be provided");

        let total: f64 = map.values().sum();
        ensure!(
            approx_eq!(f64, total, 1.0, epsilon = 1e-6),
            "Time step fractions must sum to one (sum is {total})"
        );

        Ok(Self {
            time_steps: map,
            sub_annual: true,
        })
    }

    /// The number of time steps in each year
    pub fn len(&self) -> usize {
        self.time_steps.len()
    }

    /// Whether there are no time steps (never true for a valid [`TimeStepInfo`])
    pub fn is_empty(&self) -> bool {
        self.time_steps.is_empty()
    }

    /// Iterate over the time step IDs in order
    pub fn iter_ids(&self) -> impl Iterator<Item = &TimeStepID> + Clone {
        self.time_steps.keys()
    }

    /// Iterate over time step IDs along with their fractions
    pub fn iter(&self) -> impl Iterator<Item = (&TimeStepID, f64)> {
        self.time_steps.iter().map(|(id, fraction)| (id, *fraction))
    }

    /// The fraction of the year occupied by the time step at `idx`
    pub fn fraction(&self, idx: usize) -> f64 {
        self.time_steps[idx]
    }

    /// The fractions of each time step, or a scalar one if there is no sub-annual resolution
    pub fn timeslice_fraction(&self) -> ParamValue {
        if self.sub_annual {
            ParamValue::Series(self.time_steps.values().copied().collect())
        } else {
            ParamValue::Scalar(1.0)
        }
    }

    /// Look up the position of a time step
    pub fn get_index(&self, id: &str) -> Option<usize> {
        self.time_steps.get_index_of(id)
    }
}
