//! Two-dimensional numeric parameter tables with explicitly typed row and column keys.
use crate::carrier::{CarrierID, EmissionID};
use crate::region::LineID;
use crate::technology::{TaxOrSub, TechKey, TechnologyID};
use crate::time_step::TimeStepID;
use anyhow::{Result, bail, ensure};
use indexmap::IndexSet;
use std::fmt;

/// The label of the single row of tables indexed by [`RowKey::Performance`]
pub const PERFORMANCE_ROW_LABEL: &str = "Performance Parameter";

/// Identifies a row of a [`ParameterTable`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// The single row of a table of time-invariant values
    Performance,
    /// A modelled year
    Year(u32),
    /// A time step within a modelled year
    YearStep(u32, TimeStepID),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Performance => write!(f, "{PERFORMANCE_ROW_LABEL}"),
            RowKey::Year(year) => write!(f, "{year}"),
            RowKey::YearStep(year, time_step) => write!(f, "{year}/{time_step}"),
        }
    }
}

/// Identifies a column of a [`ParameterTable`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    /// The single column of a table holding one value per row
    Value,
    /// A technology
    Technology(TechKey),
    /// The tax or subsidy rate for a technology
    TaxedTechnology(TaxOrSub, TechKey),
    /// A carrier of a Conversion_plus technology
    TechnologyCarrier(TechnologyID, CarrierID),
    /// An emission type
    Emission(EmissionID),
    /// An emission type produced by a technology
    EmissionTechnology(EmissionID, TechKey),
    /// A carrier transported over a line
    LineCarrier(LineID, CarrierID),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Value => write!(f, "value"),
            ColumnKey::Technology(TechKey(category, tech)) => write!(f, "{category}/{tech}"),
            ColumnKey::TaxedTechnology(kind, TechKey(category, tech)) => {
                write!(f, "{kind}/{category}/{tech}")
            }
            ColumnKey::TechnologyCarrier(tech, carrier) => write!(f, "{tech}/{carrier}"),
            ColumnKey::Emission(emission) => write!(f, "{emission}"),
            ColumnKey::EmissionTechnology(emission, TechKey(category, tech)) => {
                write!(f, "{emission}/{category}/{tech}")
            }
            ColumnKey::LineCarrier(line, carrier) => write!(f, "{line}/{carrier}"),
        }
    }
}

/// A dense two-dimensional table of values, stored row by row.
///
/// The order of the rows and columns is significant: it is checked against the declared order
/// when model data is validated and the derived quantities rely on it.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterTable {
    index: IndexSet<RowKey>,
    columns: IndexSet<ColumnKey>,
    values: Vec<f64>,
}

impl ParameterTable {
    /// Create a table with the given index and columns, with every entry set to `fill`
    pub fn filled(index: IndexSet<RowKey>, columns: IndexSet<ColumnKey>, fill: f64) -> Self {
        let values = vec![fill; index.len() * columns.len()];
        Self {
            index,
            columns,
            values,
        }
    }

    /// Build a table from `(row, column, value)` entries.
    ///
    /// Rows and columns are ordered by first appearance. Entries which are not provided are
    /// left as NaN, so that they are reported as missing values on validation.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (RowKey, ColumnKey, f64)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        let index: IndexSet<RowKey> = entries.iter().map(|(row, _, _)| row.clone()).collect();
        let columns: IndexSet<ColumnKey> =
            entries.iter().map(|(_, col, _)| col.clone()).collect();

        let mut table = Self::filled(index, columns, f64::NAN);
        let mut seen = vec![false; table.values.len()];
        for (row, col, value) in entries {
            let pos = table.position(&row, &col).expect("Key was added above");
            ensure!(!seen[pos], "Duplicate entry for row {row}, column {col}");
            seen[pos] = true;
            table.values[pos] = value;
        }

        Ok(table)
    }

    /// The table's rows
    pub fn index(&self) -> &IndexSet<RowKey> {
        &self.index
    }

    /// The table's columns
    pub fn columns(&self) -> &IndexSet<ColumnKey> {
        &self.columns
    }

    /// Whether any entry is missing
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|value| value.is_nan())
    }

    /// Whether any entry is zero or negative
    pub fn has_non_positive_values(&self) -> bool {
        self.values.iter().any(|value| *value <= 0.0)
    }

    fn position(&self, row: &RowKey, col: &ColumnKey) -> Option<usize> {
        let row_idx = self.index.get_index_of(row)?;
        let col_idx = self.columns.get_index_of(col)?;
        Some(row_idx * self.columns.len() + col_idx)
    }

    /// Get a single entry
    pub fn get(&self, row: &RowKey, col: &ColumnKey) -> Option<f64> {
        self.position(row, col).map(|pos| self.values[pos])
    }

    /// Set a single entry
    pub fn set(&mut self, row: &RowKey, col: &ColumnKey, value: f64) -> Result<()> {
        let Some(pos) = self.position(row, col) else {
            bail!("No entry for row {row}, column {col}");
        };
        self.values[pos] = value;

        Ok(())
    }

    /// The values of a column, in row order
    pub fn column(&self, col: &ColumnKey) -> Option<Vec<f64>> {
        let col_idx = self.columns.get_index_of(col)?;
        Some(
            self.values
                .iter()
                .skip(col_idx)
                .step_by(self.columns.len())
                .copied()
                .collect(),
        )
    }

    /// Apply `f` to every entry of a column
    pub fn update_column<F>(&mut self, col: &ColumnKey, f: F) -> Result<()>
    where
        F: Fn(f64) -> f64,
    {
        let Some(col_idx) = self.columns.get_index_of(col) else {
            bail!("No column {col}");
        };
        let n_cols = self.columns.len();
        for value in self.values.iter_mut().skip(col_idx).step_by(n_cols) {
            *value = f(*value);
        }

        Ok(())
    }

    /// Apply `f` to every entry of the table
    pub fn update_all<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        for value in &mut self.values {
            *value = f(*value);
        }
    }

    /// Iterate over every entry, row by row
    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, &ColumnKey, f64)> {
        self.index.iter().flat_map(move |row| {
            self.columns
                .iter()
                .map(move |col| (row, col, self.get(row, col).expect("Keys are valid")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::technology::TechCategory;

    fn tech_col(name: &str) -> ColumnKey {
        ColumnKey::Technology(TechKey(TechCategory::Supply, name.into()))
    }

    fn example_table() -> ParameterTable {
        ParameterTable::from_entries([
            (RowKey::Year(2020), tech_col("a"), 1.0),
            (RowKey::Year(2020), tech_col("b"), 2.0),
            (RowKey::Year(2030), tech_col("a"), 3.0),
            (RowKey::Year(2030), tech_col("b"), 4.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_entries() {
        let table = example_table();
        assert_eq!(table.index().len(), 2);
        assert_eq!(table.columns().len(), 2);
        assert!(!table.has_missing_values());
        assert_eq!(table.get(&RowKey::Year(2030), &tech_col("a")), Some(3.0));
        assert_eq!(table.column(&tech_col("b")), Some(vec![2.0, 4.0]));
        assert_eq!(table.column(&tech_col("c")), None);
    }

    #[test]
    fn test_from_entries_missing() {
        let table = ParameterTable::from_entries([
            (RowKey::Year(2020), tech_col("a"), 1.0),
            (RowKey::Year(2030), tech_col("b"), 4.0),
        ])
        .unwrap();
        assert!(table.has_missing_values());
    }

    #[test]
    fn test_from_entries_duplicate() {
        assert_error!(
            ParameterTable::from_entries([
                (RowKey::Performance, ColumnKey::Value, 1.0),
                (RowKey::Performance, ColumnKey::Value, 2.0),
            ]),
            "Duplicate entry for row Performance Parameter, column value"
        );
    }

    #[test]
    fn test_update_column() {
        let mut table = example_table();
        table.update_column(&tech_col("a"), |v| v + 10.0).unwrap();
        assert_eq!(table.column(&tech_col("a")), Some(vec![11.0, 13.0]));
        assert_eq!(table.column(&tech_col("b")), Some(vec![2.0, 4.0]));
        assert!(table.update_column(&tech_col("c"), |v| v).is_err());
    }

    #[test]
    fn test_set_and_iter() {
        let mut table = example_table();
        table.set(&RowKey::Year(2020), &tech_col("b"), 7.0).unwrap();
        let values: Vec<_> = table.iter().map(|(_, _, value)| value).collect();
        assert_eq!(values, [1.0, 7.0, 3.0, 4.0]);
    }
}
