//! Bounds on total and new capacity, per region and across regions.
use super::{BuildContext, ModelConstraint, bound_matrix, bound_rows, global_sum};
use crate::derived::{DerivedQuantities, TechQuantity, tech_params};
use crate::error::PreconditionError;
use crate::expr::Constraint;
use crate::region::RegionID;
use crate::schema::{
    ColumnLayout, IndexKind, ParameterDef, ParameterKey, global_technology_columns,
    technology_columns,
};
use crate::structure::{Mode, ModelStructure, Topology};
use crate::table::ColumnKey;
use crate::technology::TechCategory;

/// Which capacity quantity each pair of bound tables applies to
const REGIONAL_BOUNDS: [(TechQuantity, ParameterKey, ParameterKey); 2] = [
    (
        TechQuantity::TotalCapacity,
        ParameterKey::TechMinTotcap,
        ParameterKey::TechMaxTotcap,
    ),
    (
        TechQuantity::NewCapacity,
        ParameterKey::TechMinNewcap,
        ParameterKey::TechMaxNewcap,
    ),
];

const GLOBAL_BOUNDS: [(TechQuantity, ParameterKey, ParameterKey); 2] = [
    (
        TechQuantity::TotalCapacity,
        ParameterKey::GlobalMinTotcap,
        ParameterKey::GlobalMaxTotcap,
    ),
    (
        TechQuantity::NewCapacity,
        ParameterKey::GlobalMinNewcap,
        ParameterKey::GlobalMaxNewcap,
    ),
];

/// Minimum and maximum total and new capacity of each technology in each year
#[derive(Debug)]
pub struct TechCapacityRegional;

impl ModelConstraint for TechCapacityRegional {
    fn name(&self) -> &'static str {
        "TechCapacityRegional"
    }

    fn applies_to(&self, mode: Mode, _topology: Topology) -> bool {
        mode == Mode::Planning
    }

    fn regional_parameters(
        &self,
        structure: &ModelStructure,
        region_id: &RegionID,
    ) -> Vec<ParameterDef> {
        let columns = || technology_columns(structure, region_id, TechCategory::has_capacity);
        REGIONAL_BOUNDS
            .iter()
            .flat_map(|(_, min, max)| [(*min, 0.0), (*max, f64::INFINITY)])
            .map(|(key, default)| {
                ParameterDef::new(
                    structure,
                    key,
                    default,
                    IndexKind::Years,
                    ColumnLayout::Technology,
                    columns(),
                )
            })
            .collect()
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        for (quantity, _, _) in REGIONAL_BOUNDS {
            derived.require_tech(self.name(), quantity)?;
        }
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let mut rows = Vec::new();
        for (quantity, min_key, max_key) in REGIONAL_BOUNDS {
            let capacity = ctx.derived.require_tech(self.name(), quantity)?;
            for (region_id, categories) in capacity {
                for (category, matrix) in categories {
                    bound_matrix(
                        matrix,
                        &tech_params(ctx.data, region_id, *category, min_key),
                        &tech_params(ctx.data, region_id, *category, max_key),
                        &mut rows,
                    );
                }
            }
        }

        Ok(rows)
    }
}

/// Minimum and maximum total and new capacity of each technology summed over every region
/// which has it
#[derive(Debug)]
pub struct TechCapacityGlobal;

impl ModelConstraint for TechCapacityGlobal {
    fn name(&self) -> &'static str {
        "TechCapacityGlobal"
    }

    fn applies_to(&self, mode: Mode, topology: Topology) -> bool {
        mode == Mode::Planning && topology == Topology::MultiNode
    }

    fn global_parameters(&self, structure: &ModelStructure) -> Vec<ParameterDef> {
        GLOBAL_BOUNDS
            .iter()
            .flat_map(|(_, min, max)| [(*min, 0.0), (*max, f64::INFINITY)])
            .map(|(key, default)| {
                ParameterDef::new(
                    structure,
                    key,
                    default,
                    IndexKind::Years,
                    ColumnLayout::Technology,
                    global_technology_columns(structure, TechCategory::has_capacity),
                )
            })
            .collect()
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        for (quantity, _, _) in GLOBAL_BOUNDS {
            derived.require_tech(self.name(), quantity)?;
        }
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let mut rows = Vec::new();
        for (quantity, min_key, max_key) in GLOBAL_BOUNDS {
            let capacity = ctx.derived.require_tech(self.name(), quantity)?;
            for key in structure.global_tech_keys() {
                let column = ColumnKey::Technology(key.clone());
                let lower = ctx.data.global(min_key, &column);
                let upper = ctx.data.global(max_key, &column);
                for (year_idx, (lower, upper)) in lower.iter().zip(&upper).enumerate() {
                    let total = global_sum(ctx, capacity, &key, |matrix, col| {
                        matrix.get(year_idx, col).clone()
                    });
                    bound_rows(&total, *lower, *upper, &mut rows);
                }
            }
        }

        Ok(rows)
    }
}
