//! Operation of storage technologies.
use super::{BuildContext, ModelConstraint};
use crate::derived::{DerivedQuantities, RegionQuantity, TechQuantity, tech_params};
use crate::error::PreconditionError;
use crate::expr::Constraint;
use crate::schema::ParameterKey;
use crate::technology::TechCategory;

/// The state of charge stays between its minimum and the installed capacity, and each year ends
/// with the state of charge it started with
#[derive(Debug)]
pub struct StorageSoc;

impl ModelConstraint for StorageSoc {
    fn name(&self) -> &'static str {
        "StorageSoc"
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::TotalCapacity)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        // Without storage there is no state of charge
        let Some(soc) = ctx.derived.region(RegionQuantity::StorageSoc) else {
            return Ok(Vec::new());
        };
        let n_time_steps = ctx.structure().n_time_steps();
        let capacity = ctx
            .derived
            .require_tech(self.name(), TechQuantity::TotalCapacity)?;

        let mut rows = Vec::new();
        for (region_id, soc) in soc {
            let capacity = &capacity[region_id][&TechCategory::Storage];
            let min_soc = tech_params(
                ctx.data,
                region_id,
                TechCategory::Storage,
                ParameterKey::StorageMinSoc,
            );
            let initial = tech_params(
                ctx.data,
                region_id,
                TechCategory::Storage,
                ParameterKey::StorageInitialSoc,
            );

            for col in 0..soc.cols() {
                for row in 0..soc.rows() {
                    let capacity = capacity.get(row / n_time_steps, col);
                    let state = soc.get(row, col);
                    rows.push(state.clone().leq(capacity.clone()));
                    if min_soc[col][0] > 0.0 {
                        rows.push(state.clone().geq(capacity * min_soc[col][0]));
                    }
                    if row % n_time_steps == n_time_steps - 1 {
                        rows.push(state.clone().equals(capacity * initial[col][0]));
                    }
                }
            }
        }

        Ok(rows)
    }
}

/// Charge and discharge in each time step are limited by the capacity and the time it takes to
/// fully charge or discharge the storage
#[derive(Debug)]
pub struct StorageFlow;

impl ModelConstraint for StorageFlow {
    fn name(&self) -> &'static str {
        "StorageFlow"
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::Production)?;
        derived.require_tech(self.name(), TechQuantity::Use)?;
        derived.require_tech(self.name(), TechQuantity::TotalCapacity)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let n_time_steps = structure.n_time_steps();
        let production = ctx.derived.require_tech(self.name(), TechQuantity::Production)?;
        let consumption = ctx.derived.require_tech(self.name(), TechQuantity::Use)?;
        let capacity = ctx
            .derived
            .require_tech(self.name(), TechQuantity::TotalCapacity)?;

        let mut rows = Vec::new();
        for region_id in structure.regions() {
            let Some(capacity) = capacity[region_id].get(&TechCategory::Storage) else {
                continue;
            };
            let params = |key| tech_params(ctx.data, region_id, TechCategory::Storage, key);
            let factors = params(ParameterKey::ResCapacityFactor);
            let annualprod = params(ParameterKey::AnnualprodPerUnitcapacity);
            let flows = [
                (
                    &production[region_id][&TechCategory::Storage],
                    params(ParameterKey::StorageDischargeTime),
                ),
                (
                    &consumption[region_id][&TechCategory::Storage],
                    params(ParameterKey::StorageChargeTime),
                ),
            ];

            for (flow, times) in flows {
                for col in 0..flow.cols() {
                    for row in 0..flow.rows() {
                        let scale = factors[col][row] * annualprod[col][0]
                            / times[col][0]
                            * structure.time_steps().fraction(row % n_time_steps);
                        let limit = capacity.get(row / n_time_steps, col) * scale;
                        rows.push(flow.get(row, col).clone().leq(limit));
                    }
                }
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::default_constraints;
    use crate::data::ModelData;
    use crate::expr::Relation;
    use crate::fixture::{
        build_rows, default_model_data, single_region_structure, storage_structure,
    };
    use crate::region::RegionID;
    use crate::schema::{ParameterGroup, ParameterSchema};
    use crate::structure::ModelStructure;
    use crate::table::ColumnKey;
    use crate::technology::TechKey;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_no_storage(single_region_structure: ModelStructure) {
        let data = default_model_data(single_region_structure);
        assert!(build_rows(&data, &StorageSoc).is_empty());
        assert!(build_rows(&data, &StorageFlow).is_empty());
    }

    #[rstest]
    fn test_storage_soc(storage_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables = ParameterSchema::new(&storage_structure, &constraints).default_tables();
        let battery = ColumnKey::Technology(TechKey(TechCategory::Storage, "Battery".into()));
        let regional = tables
            .group_mut(&ParameterGroup::Regional(RegionID::new("reg1")))
            .unwrap();
        regional[&ParameterKey::TechResidualCap]
            .update_column(&battery, |_| 10.0)
            .unwrap();
        regional[&ParameterKey::StorageMinSoc]
            .update_column(&battery, |_| 0.1)
            .unwrap();
        regional[&ParameterKey::StorageInitialSoc]
            .update_column(&battery, |_| 0.5)
            .unwrap();
        let data = ModelData::new(storage_structure, tables, &constraints).unwrap();

        let rows = build_rows(&data, &StorageSoc);
        // Upper and lower bounds in four time steps and one end-of-year condition
        assert_eq!(rows.len(), 9);
        let cyclic: Vec<_> = rows
            .iter()
            .filter(|row| row.relation() == Relation::Equal)
            .collect();
        assert_eq!(cyclic.len(), 1);
        assert_eq!(cyclic[0].row_bounds(), (5.0, 5.0));
        assert_eq!(rows[1].row_bounds(), (1.0, f64::INFINITY));
    }

    #[rstest]
    fn test_storage_flow(storage_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables = ParameterSchema::new(&storage_structure, &constraints).default_tables();
        let battery = ColumnKey::Technology(TechKey(TechCategory::Storage, "Battery".into()));
        let regional = tables
            .group_mut(&ParameterGroup::Regional(RegionID::new("reg1")))
            .unwrap();
        regional[&ParameterKey::TechResidualCap]
            .update_column(&battery, |_| 8.0)
            .unwrap();
        regional[&ParameterKey::StorageChargeTime]
            .update_column(&battery, |_| 4.0)
            .unwrap();
        let data = ModelData::new(storage_structure, tables, &constraints).unwrap();

        let rows = build_rows(&data, &StorageFlow);
        assert_eq!(rows.len(), 8);
        // Discharge: 8 * 0.25, charge: 8 / 4 * 0.25
        assert_approx_eq!(f64, rows[0].row_bounds().1, 2.0);
        assert_approx_eq!(f64, rows[4].row_bounds().1, 0.5);
    }
}
