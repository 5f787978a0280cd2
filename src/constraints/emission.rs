//! Caps on annual emissions.
use super::{BuildContext, ModelConstraint, bound_rows};
use crate::derived::{DerivedQuantities, TechQuantity};
use crate::error::PreconditionError;
use crate::expr::{Constraint, LinExpr};
use crate::region::RegionID;
use crate::schema::{ColumnLayout, IndexKind, ParameterDef, ParameterKey, emission_columns};
use crate::structure::{Mode, ModelStructure, Topology};
use crate::table::ColumnKey;

fn cap_table(structure: &ModelStructure, key: ParameterKey) -> ParameterDef {
    ParameterDef::new(
        structure,
        key,
        f64::INFINITY,
        IndexKind::Years,
        ColumnLayout::Emission,
        emission_columns(structure),
    )
}

/// The annual emissions of each type in a region can't exceed the region's cap
#[derive(Debug)]
pub struct EmissionCapRegional;

impl ModelConstraint for EmissionCapRegional {
    fn name(&self) -> &'static str {
        "EmissionCapRegional"
    }

    fn regional_parameters(
        &self,
        structure: &ModelStructure,
        _region_id: &RegionID,
    ) -> Vec<ParameterDef> {
        vec![cap_table(structure, ParameterKey::EmissionCapAnnual)]
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        // Emission totals are computed from annual production
        derived.require_tech(self.name(), TechQuantity::AnnualProduction)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let mut rows = Vec::new();
        for (emission, totals) in &ctx.derived.emissions().regional {
            let column = ColumnKey::Emission(emission.clone());
            for (region_id, total) in totals {
                let caps = ctx
                    .data
                    .regional(region_id, ParameterKey::EmissionCapAnnual, &column);
                for (year_idx, cap) in caps.iter().enumerate() {
                    bound_rows(total.get(year_idx, 0), 0.0, *cap, &mut rows);
                }
            }
        }

        Ok(rows)
    }
}

/// The annual emissions of each type summed over every region can't exceed the global cap
#[derive(Debug)]
pub struct EmissionCapGlobal;

impl ModelConstraint for EmissionCapGlobal {
    fn name(&self) -> &'static str {
        "EmissionCapGlobal"
    }

    fn applies_to(&self, _mode: Mode, topology: Topology) -> bool {
        topology == Topology::MultiNode
    }

    fn global_parameters(&self, structure: &ModelStructure) -> Vec<ParameterDef> {
        vec![cap_table(structure, ParameterKey::GlobalEmissionCapAnnual)]
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        // Emission totals are computed from annual production
        derived.require_tech(self.name(), TechQuantity::AnnualProduction)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let mut rows = Vec::new();
        for (emission, totals) in &ctx.derived.emissions().regional {
            let caps = ctx.data.global(
                ParameterKey::GlobalEmissionCapAnnual,
                &ColumnKey::Emission(emission.clone()),
            );
            for (year_idx, cap) in caps.iter().enumerate() {
                let total: LinExpr = totals.values().map(|total| total.get(year_idx, 0)).sum();
                bound_rows(&total, 0.0, *cap, &mut rows);
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
    use crate::fixture::{
        build_rows, default_model_data, multi_region_structure, single_region_structure,
    };
    use crate::schema::{ParameterGroup, ParameterSchema};
    use crate::variables::Variables;
    use rstest::rstest;

    #[rstest]
    fn test_check_requires_annual_production(multi_region_structure: ModelStructure) {
        let data = default_model_data(multi_region_structure);
        let variables = Variables::new(data.structure());
        let derived = DerivedQuantities::new(&data, &variables);
        assert!(EmissionCapRegional.check(&derived).is_ok());
        assert!(EmissionCapGlobal.check(&derived).is_ok());

        let without = derived.without_tech(TechQuantity::AnnualProduction);
        assert_eq!(
            EmissionCapGlobal.check(&without),
            Err(PreconditionError {
                constraint: "EmissionCapGlobal",
                missing: "annual_production",
            })
        );
    }

    #[rstest]
    fn test_uncapped_emissions(single_region_structure: ModelStructure) {
        let data = default_model_data(single_region_structure);
        assert!(build_rows(&data, &EmissionCapRegional).is_empty());
    }

    #[rstest]
    fn test_regional_cap(single_region_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables =
            ParameterSchema::new(&single_region_structure, &constraints).default_tables();
        tables
            .group_mut(&ParameterGroup::Regional(RegionID::new("reg1")))
            .unwrap()[&ParameterKey::EmissionCapAnnual]
            .update_column(&ColumnKey::Emission("CO2".into()), |_| 0.0)
            .unwrap();
        let data = ModelData::new(single_region_structure, tables, &constraints).unwrap();

        let rows = build_rows(&data, &EmissionCapRegional);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_bounds(), (f64::NEG_INFINITY, 0.0));
    }

    #[rstest]
    fn test_global_cap(multi_region_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables =
            ParameterSchema::new(&multi_region_structure, &constraints).default_tables();
        tables.global[&ParameterKey::GlobalEmissionCapAnnual]
            .update_column(&ColumnKey::Emission("CO2".into()), |_| 100.0)
            .unwrap();
        let data = ModelData::new(multi_region_structure, tables, &constraints).unwrap();

        let rows = build_rows(&data, &EmissionCapGlobal);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_bounds(), (f64::NEG_INFINITY, 100.0));
    }
}
