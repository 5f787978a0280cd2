//! Validated numeric parameter tables bound to a model structure.
//!
//! [`ModelData`] is the single gate between user-supplied numbers and the model builder: every
//! table required by the [`ParameterSchema`] must be present, free of missing values and have
//! exactly the declared index and columns, in the declared order.
use crate::carrier::CarrierID;
use crate::constraints::ModelConstraint;
use crate::error::SchemaError;
use crate::region::{LineID, RegionID};
use crate::schema::{ParameterData, ParameterGroup, ParameterKey, ParameterSchema, TableMap};
use crate::structure::ModelStructure;
use crate::table::{ColumnKey, ParameterTable};
use crate::technology::Technology;
use anyhow::Result;
use indexmap::IndexSet;
use log::warn;
use std::fmt::Display;

/// Parameter tables which have been checked against the schema for a model structure
#[derive(Clone, Debug, PartialEq)]
pub struct ModelData {
    structure: ModelStructure,
    schema: ParameterSchema,
    tables: ParameterData,
}

/// Describe the first difference between an expected and actual ordered set, if any
fn describe_mismatch<T: Display + PartialEq>(
    what: &str,
    expected: &IndexSet<T>,
    actual: &IndexSet<T>,
) -> Option<String> {
    if expected.len() != actual.len() {
        return Some(format!(
            "expected {} {what}, found {}",
            expected.len(),
            actual.len()
        ));
    }

    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .map(|idx| {
            format!(
                "{what} {idx}: expected {}, found {}",
                expected[idx], actual[idx]
            )
        })
}

/// Check the tables of one group against their definitions
fn check_group(
    group: &ParameterGroup,
    schema: &ParameterSchema,
    tables: Option<&TableMap>,
) -> Result<()> {
    let Some(defs) = schema.group(group) else {
        return Ok(());
    };

    for (key, def) in defs {
        let Some(table) = tables.and_then(|tables| tables.get(key)) else {
            return Err(SchemaError::WrongTableName {
                group: group.to_string(),
                table: key.to_string(),
            }
            .into());
        };

        let mismatch = describe_mismatch("rows", &def.index, table.index())
            .or_else(|| describe_mismatch("columns", &def.columns, table.columns()));
        if let Some(detail) = mismatch {
            Err(SchemaError::WrongIndex {
                table: key.to_string(),
                detail,
            })?;
        }

        if table.has_missing_values() {
            Err(SchemaError::NanValues {
                table: key.to_string(),
            })?;
        }

        if key.is_divisor() && table.has_non_positive_values() {
            Err(SchemaError::NonPositiveValues {
                table: key.to_string(),
            })?;
        }
    }

    if let Some(tables) = tables {
        for key in tables.keys().filter(|key| !defs.contains_key(*key)) {
            warn!("Ignoring table {key} for {group}, which is not used by this model");
        }
    }

    Ok(())
}

impl ModelData {
    /// Validate parameter tables against the schema for a structure and set of constraints.
    ///
    /// Tables which are not required are dropped with a warning.
    pub fn new(
        structure: ModelStructure,
        mut tables: ParameterData,
        constraints: &[Box<dyn ModelConstraint>],
    ) -> Result<Self> {
        let schema = ParameterSchema::new(&structure, constraints);

        check_group(&ParameterGroup::Global, &schema, Some(&tables.global))?;
        check_group(&ParameterGroup::Trade, &schema, Some(&tables.trade))?;
        for region_id in structure.regions() {
            check_group(
                &ParameterGroup::Regional(region_id.clone()),
                &schema,
                tables.regional.get(region_id),
            )?;
        }

        tables.global.retain(|key, _| schema.global.contains_key(key));
        tables.trade.retain(|key, _| schema.trade.contains_key(key));
        tables.regional.retain(|region_id, regional| {
            let Some(defs) = schema.regional.get(region_id) else {
                warn!("Ignoring tables for unknown region {region_id}");
                return false;
            };
            regional.retain(|key, _| defs.contains_key(key));
            true
        });

        let data = Self {
            structure,
            schema,
            tables,
        };
        data.warn_suspicious_values();

        Ok(data)
    }

    /// Warn about values which are valid but probably not what the user intended
    fn warn_suspicious_values(&self) {
        let rates = [
            (ParameterKey::DiscountRate, "discount rate"),
            (ParameterKey::InterestRate, "interest rate"),
        ];
        for (region_id, tables) in &self.tables.regional {
            for (key, what) in rates {
                if let Some(table) = tables.get(&key)
                    && table.iter().any(|(_, _, value)| value > 1.0)
                {
                    warn!("Region {region_id} has a {what} greater than one ({key})");
                }
            }
        }
    }

    /// The model structure
    pub fn structure(&self) -> &ModelStructure {
        &self.structure
    }

    /// The schema the tables were validated against
    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    /// The validated tables
    pub fn tables(&self) -> &ParameterData {
        &self.tables
    }

    /// Get a table, if it is required for this model
    pub fn table(&self, group: &ParameterGroup, key: ParameterKey) -> Option<&ParameterTable> {
        match group {
            ParameterGroup::Global => self.tables.global.get(&key),
            ParameterGroup::Trade => self.tables.trade.get(&key),
            ParameterGroup::Regional(region_id) => self
                .tables
                .regional
                .get(region_id)
                .and_then(|tables| tables.get(&key)),
        }
    }

    /// The values of a column of a table, in row order.
    ///
    /// # Panics
    ///
    /// If the table is not required for this model or has no such column. Callers only ask for
    /// tables and columns which the schema guarantees exist.
    pub fn column(&self, group: &ParameterGroup, key: ParameterKey, col: &ColumnKey) -> Vec<f64> {
        self.table(group, key)
            .unwrap_or_else(|| panic!("Table {key} is not required for {group}"))
            .column(col)
            .unwrap_or_else(|| panic!("Table {key} for {group} has no column {col}"))
    }

    /// A column of a regional table
    pub fn regional(&self, region_id: &RegionID, key: ParameterKey, col: &ColumnKey) -> Vec<f64> {
        self.column(&ParameterGroup::Regional(region_id.clone()), key, col)
    }

    /// The column of a regional table for a technology
    pub fn tech(&self, region_id: &RegionID, key: ParameterKey, tech: &Technology) -> Vec<f64> {
        self.regional(region_id, key, &ColumnKey::Technology(tech.key()))
    }

    /// The single time-invariant value of a regional table for a technology
    pub fn tech_performance(
        &self,
        region_id: &RegionID,
        key: ParameterKey,
        tech: &Technology,
    ) -> f64 {
        self.tech(region_id, key, tech)[0]
    }

    /// The value column of a regional table
    pub fn regional_value(&self, region_id: &RegionID, key: ParameterKey) -> Vec<f64> {
        self.regional(region_id, key, &ColumnKey::Value)
    }

    /// A column of a trade table for a line and carrier
    pub fn line(&self, key: ParameterKey, line: &LineID, carrier: &CarrierID) -> Vec<f64> {
        self.column(
            &ParameterGroup::Trade,
            key,
            &ColumnKey::LineCarrier(line.clone(), carrier.clone()),
        )
    }

    /// A column of a global table
    pub fn global(&self, key: ParameterKey, col: &ColumnKey) -> Vec<f64> {
        self.column(&ParameterGroup::Global, key, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::default_constraints;
    use crate::fixture::{multi_region_structure, single_region_structure, storage_structure};
    use crate::table::RowKey;
    use crate::technology::{TechCategory, TechKey};
    use rstest::rstest;

    fn default_tables(structure: &ModelStructure) -> ParameterData {
        ParameterSchema::new(structure, &default_constraints()).default_tables()
    }

    fn schema_error(result: Result<ModelData>) -> SchemaError {
        result
            .unwrap_err()
            .downcast::<SchemaError>()
            .expect("Expected a schema error")
    }

    #[rstest]
    fn test_model_data_defaults(single_region_structure: ModelStructure) {
        let tables = default_tables(&single_region_structure);
        let data = ModelData::new(single_region_structure, tables, &default_constraints()).unwrap();

        let reg1 = RegionID::new("reg1");
        let ng_extr = data.structure().find_technology(&reg1, "NG_extr").unwrap().clone();
        assert_eq!(
            data.tech(&reg1, ParameterKey::TechCapacityFactor, &ng_extr),
            [1.0]
        );
        assert_eq!(
            data.tech_performance(&reg1, ParameterKey::AnnualprodPerUnitcapacity, &ng_extr),
            1.0
        );
    }

    #[rstest]
    fn test_model_data_missing_table(single_region_structure: ModelStructure) {
        let mut tables = default_tables(&single_region_structure);
        tables.regional[0].shift_remove(&ParameterKey::Demand);
        assert_eq!(
            schema_error(ModelData::new(
                single_region_structure,
                tables,
                &default_constraints()
            )),
            SchemaError::WrongTableName {
                group: "reg1".into(),
                table: "demand".into()
            }
        );
    }

    #[rstest]
    fn test_model_data_nan_values(single_region_structure: ModelStructure) {
        let mut tables = default_tables(&single_region_structure);
        tables.regional[0][&ParameterKey::TechVarCost].update_all(|_| f64::NAN);
        assert_eq!(
            schema_error(ModelData::new(
                single_region_structure,
                tables,
                &default_constraints()
            )),
            SchemaError::NanValues {
                table: "tech_var_cost".into()
            }
        );
    }

    #[rstest]
    #[case(ParameterKey::StorageDischargeEfficiency, 0.0)]
    #[case(ParameterKey::StorageChargeTime, 0.0)]
    #[case(ParameterKey::StorageDischargeTime, -1.0)]
    fn test_model_data_non_positive_divisor(
        storage_structure: ModelStructure,
        #[case] key: ParameterKey,
        #[case] value: f64,
    ) {
        let mut tables = default_tables(&storage_structure);
        tables.regional[0][&key].update_all(|_| value);
        assert_eq!(
            schema_error(ModelData::new(
                storage_structure,
                tables,
                &default_constraints()
            )),
            SchemaError::NonPositiveValues {
                table: key.to_string()
            }
        );
    }

    #[rstest]
    fn test_model_data_zero_min_soc_allowed(storage_structure: ModelStructure) {
        let mut tables = default_tables(&storage_structure);
        tables.regional[0][&ParameterKey::StorageMinSoc].update_all(|_| 0.0);
        assert!(ModelData::new(storage_structure, tables, &default_constraints()).is_ok());
    }

    #[rstest]
    fn test_model_data_wrong_columns(single_region_structure: ModelStructure) {
        let mut tables = default_tables(&single_region_structure);
        let table = ParameterTable::from_entries([(
            RowKey::Year(2020),
            ColumnKey::Technology(TechKey(TechCategory::Supply, "NG_extr".into())),
            0.0,
        )])
        .unwrap();
        tables.regional[0].insert(ParameterKey::TechFixedCost, table);

        let err = schema_error(ModelData::new(
            single_region_structure,
            tables,
            &default_constraints(),
        ));
        assert!(matches!(err, SchemaError::WrongIndex { ref table, .. } if table == "tech_fixed_cost"));
    }

    #[rstest]
    fn test_model_data_reordered_columns(multi_region_structure: ModelStructure) {
        // Swap the order of two columns of a trade table
        let mut tables = default_tables(&multi_region_structure);
        let table = &tables.trade[&ParameterKey::LineEfficiency];
        let mut entries: Vec<_> = table
            .iter()
            .map(|(row, col, value)| (row.clone(), col.clone(), value))
            .collect();
        entries.swap(0, 1);
        tables
            .trade
            .insert(ParameterKey::LineEfficiency, ParameterTable::from_entries(entries).unwrap());

        let err = schema_error(ModelData::new(
            multi_region_structure,
            tables,
            &default_constraints(),
        ));
        assert!(matches!(err, SchemaError::WrongIndex { .. }));
    }

    #[rstest]
    fn test_model_data_drops_unused_tables(single_region_structure: ModelStructure) {
        let mut tables = default_tables(&single_region_structure);
        tables.global.insert(
            ParameterKey::GlobalDiscountRate,
            ParameterTable::from_entries([(RowKey::Year(2020), ColumnKey::Value, 0.05)]).unwrap(),
        );
        let data = ModelData::new(single_region_structure, tables, &default_constraints()).unwrap();
        assert!(data.tables().global.is_empty());
    }
}
