//! Limits on production from the available capacity.
use super::{BuildContext, ModelConstraint};
use crate::derived::{DerivedQuantities, TechQuantity, tech_params};
use crate::error::PreconditionError;
use crate::expr::Constraint;
use crate::schema::ParameterKey;
use crate::technology::TechCategory;

/// Production in each time step can't exceed what the capacity can deliver in that time step.
///
/// Storage discharge is limited by [`StorageFlow`](super::storage::StorageFlow) instead.
#[derive(Debug)]
pub struct ResourceAvailability;

impl ModelConstraint for ResourceAvailability {
    fn name(&self) -> &'static str {
        "ResourceAvailability"
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::Production)?;
        derived.require_tech(self.name(), TechQuantity::TotalCapacity)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let production = ctx.derived.require_tech(self.name(), TechQuantity::Production)?;
        let capacity = ctx
            .derived
            .require_tech(self.name(), TechQuantity::TotalCapacity)?;
        let n_time_steps = structure.n_time_steps();

        let mut rows = Vec::new();
        for (region_id, categories) in production {
            for (category, flows) in categories {
                if *category == TechCategory::Storage {
                    continue;
                }
                let capacity = &capacity[region_id][category];
                let factors =
                    tech_params(ctx.data, region_id, *category, ParameterKey::ResCapacityFactor);
                let annualprod = tech_params(
                    ctx.data,
                    region_id,
                    *category,
                    ParameterKey::AnnualprodPerUnitcapacity,
                );

                for col in 0..flows.cols() {
                    for row in 0..flows.rows() {
                        let scale = factors[col][row]
                            * annualprod[col][0]
                            * structure.time_steps().fraction(row % n_time_steps);
                        let limit = capacity.get(row / n_time_steps, col).clone() * scale;
                        rows.push(flows.get(row, col).clone().leq(limit));
                    }
                }
            }
        }

        Ok(rows)
    }
}

/// Annual production can't exceed the capacity scaled by the technology's capacity factor
#[derive(Debug)]
pub struct TechnologyAvailability;

impl ModelConstraint for TechnologyAvailability {
    fn name(&self) -> &'static str {
        "TechnologyAvailability"
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::AnnualProduction)?;
        derived.require_tech(self.name(), TechQuantity::TotalCapacity)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let annual = ctx
            .derived
            .require_tech(self.name(), TechQuantity::AnnualProduction)?;
        let capacity = ctx
            .derived
            .require_tech(self.name(), TechQuantity::TotalCapacity)?;

        let mut rows = Vec::new();
        for (region_id, categories) in annual {
            for (category, production) in categories {
                let capacity = &capacity[region_id][category];
                let factors =
                    tech_params(ctx.data, region_id, *category, ParameterKey::TechCapacityFactor);
                let annualprod = tech_params(
                    ctx.data,
                    region_id,
                    *category,
                    ParameterKey::AnnualprodPerUnitcapacity,
                );

                for col in 0..production.cols() {
                    for row in 0..production.rows() {
                        let limit =
                            capacity.get(row, col).clone() * (factors[col][row] * annualprod[col][0]);
                        rows.push(production.get(row, col).clone().leq(limit));
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
    use crate::fixture::{build_rows, default_model_data, single_region_structure};
    use crate::region::RegionID;
    use crate::schema::{ParameterGroup, ParameterSchema};
    use crate::structure::ModelStructure;
    use crate::table::ColumnKey;
    use crate::technology::TechKey;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_resource_availability(single_region_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables =
            ParameterSchema::new(&single_region_structure, &constraints).default_tables();
        let reg1 = RegionID::new("reg1");
        let extr = ColumnKey::Technology(TechKey(TechCategory::Supply, "NG_extr".into()));
        tables
            .group_mut(&ParameterGroup::Regional(reg1.clone()))
            .unwrap()[&ParameterKey::TechResidualCap]
            .update_column(&extr, |_| 8.0)
            .unwrap();
        let data = ModelData::new(single_region_structure, tables, &constraints).unwrap();

        let rows = build_rows(&data, &ResourceAvailability);
        // One row per time step for each of the five producing technologies
        assert_eq!(rows.len(), 4 * 5);

        // NG_extr can produce 8 * 0.25 = 2 in each time step
        let (_, upper) = rows[0].row_bounds();
        assert_approx_eq!(f64, upper, 2.0);
        assert_eq!(rows[0].expr().terms().len(), 1);
    }

    #[rstest]
    fn test_technology_availability(single_region_structure: ModelStructure) {
        let data = default_model_data(single_region_structure);
        let rows = build_rows(&data, &TechnologyAvailability);
        assert_eq!(rows.len(), 5);
        // Four time steps summed into the annual production
        assert!(rows.iter().all(|row| row.expr().terms().len() == 4));
    }
}
