//! Constraints on the production of technologies.
use super::{BuildContext, ModelConstraint, bound_matrix, bound_rows, global_sum};
use crate::derived::{DerivedQuantities, TechQuantity, tech_params};
use crate::error::PreconditionError;
use crate::expr::{Constraint, LinExpr};
use crate::region::RegionID;
use crate::schema::{
    ColumnLayout, IndexKind, ParameterDef, ParameterKey, global_technology_columns,
    technology_columns, value_column,
};
use crate::structure::{Mode, ModelStructure, Topology};
use crate::table::ColumnKey;
use crate::technology::TechCategory;

/// Whether the annual production of a category can be bounded
fn production_bounded(category: TechCategory) -> bool {
    category.has_capacity()
        && !matches!(category, TechCategory::Transmission | TechCategory::Storage)
}

/// Production is the use of the input carrier scaled by the technology's efficiency
#[derive(Debug)]
pub struct TechnologyEfficiency;

impl ModelConstraint for TechnologyEfficiency {
    fn name(&self) -> &'static str {
        "TechnologyEfficiency"
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::Production)?;
        derived.require_tech(self.name(), TechQuantity::Use)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let n_time_steps = ctx.structure().n_time_steps();
        let production = ctx.derived.require_tech(self.name(), TechQuantity::Production)?;
        let consumption = ctx.derived.require_tech(self.name(), TechQuantity::Use)?;

        let mut rows = Vec::new();
        for (region_id, categories) in production {
            for (category, production) in categories.iter().filter(|(c, _)| c.has_efficiency()) {
                let consumption = &consumption[region_id][category];
                let efficiency =
                    tech_params(ctx.data, region_id, *category, ParameterKey::TechEfficiency);
                for col in 0..production.cols() {
                    for row in 0..production.rows() {
                        let input =
                            consumption.get(row, col).clone() * efficiency[col][row / n_time_steps];
                        rows.push(production.get(row, col).clone().equals(input));
                    }
                }
            }
        }

        Ok(rows)
    }
}

/// Minimum and maximum annual production of each technology in a region
#[derive(Debug)]
pub struct TechProductionRegional;

impl ModelConstraint for TechProductionRegional {
    fn name(&self) -> &'static str {
        "TechProductionRegional"
    }

    fn regional_parameters(
        &self,
        structure: &ModelStructure,
        region_id: &RegionID,
    ) -> Vec<ParameterDef> {
        [
            (ParameterKey::TechMaxProduction, f64::INFINITY),
            (ParameterKey::TechMinProduction, 0.0),
        ]
        .into_iter()
        .map(|(key, default)| {
            ParameterDef::new(
                structure,
                key,
                default,
                IndexKind::Years,
                ColumnLayout::Technology,
                technology_columns(structure, region_id, production_bounded),
            )
        })
        .collect()
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::AnnualProduction)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let annual = ctx
            .derived
            .require_tech(self.name(), TechQuantity::AnnualProduction)?;

        let mut rows = Vec::new();
        for (region_id, categories) in annual {
            for (category, production) in categories.iter().filter(|(c, _)| production_bounded(**c))
            {
                bound_matrix(
                    production,
                    &tech_params(ctx.data, region_id, *category, ParameterKey::TechMinProduction),
                    &tech_params(ctx.data, region_id, *category, ParameterKey::TechMaxProduction),
                    &mut rows,
                );
            }
        }

        Ok(rows)
    }
}

/// Minimum and maximum annual production of each technology summed over every region
#[derive(Debug)]
pub struct TechProductionGlobal;

impl ModelConstraint for TechProductionGlobal {
    fn name(&self) -> &'static str {
        "TechProductionGlobal"
    }

    fn applies_to(&self, _mode: Mode, topology: Topology) -> bool {
        topology == Topology::MultiNode
    }

    fn global_parameters(&self, structure: &ModelStructure) -> Vec<ParameterDef> {
        [
            (ParameterKey::GlobalMaxProduction, f64::INFINITY),
            (ParameterKey::GlobalMinProduction, 0.0),
        ]
        .into_iter()
        .map(|(key, default)| {
            ParameterDef::new(
                structure,
                key,
                default,
                IndexKind::Years,
                ColumnLayout::Technology,
                global_technology_columns(structure, production_bounded),
            )
        })
        .collect()
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::AnnualProduction)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let annual = ctx
            .derived
            .require_tech(self.name(), TechQuantity::AnnualProduction)?;

        let mut rows = Vec::new();
        for key in ctx
            .structure()
            .global_tech_keys()
            .into_iter()
            .filter(|key| production_bounded(key.0))
        {
            let column = ColumnKey::Technology(key.clone());
            let lower = ctx.data.global(ParameterKey::GlobalMinProduction, &column);
            let upper = ctx.data.global(ParameterKey::GlobalMaxProduction, &column);
            for (year_idx, (lower, upper)) in lower.iter().zip(&upper).enumerate() {
                let total = global_sum(ctx, annual, &key, |matrix, col| {
                    matrix.get(year_idx, col).clone()
                });
                bound_rows(&total, *lower, *upper, &mut rows);
            }
        }

        Ok(rows)
    }
}

/// Limits how quickly production can change between consecutive time steps of a year.
///
/// The change is limited to a share of what the capacity can deliver in the later time step.
#[derive(Debug)]
pub struct ProductionRamping;

impl ModelConstraint for ProductionRamping {
    fn name(&self) -> &'static str {
        "ProductionRamping"
    }

    fn regional_parameters(
        &self,
        structure: &ModelStructure,
        region_id: &RegionID,
    ) -> Vec<ParameterDef> {
        vec![ParameterDef::new(
            structure,
            ParameterKey::ProdMaxRamp,
            1.0,
            IndexKind::Performance,
            ColumnLayout::Technology,
            technology_columns(structure, region_id, production_bounded),
        )]
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::Production)?;
        derived.require_tech(self.name(), TechQuantity::TotalCapacity)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let n_time_steps = structure.n_time_steps();
        let production = ctx.derived.require_tech(self.name(), TechQuantity::Production)?;
        let capacity = ctx
            .derived
            .require_tech(self.name(), TechQuantity::TotalCapacity)?;

        let mut rows = Vec::new();
        for (region_id, categories) in production {
            for (category, production) in categories.iter().filter(|(c, _)| production_bounded(**c))
            {
                let capacity = &capacity[region_id][category];
                let ramps = tech_params(ctx.data, region_id, *category, ParameterKey::ProdMaxRamp);
                let annualprod = tech_params(
                    ctx.data,
                    region_id,
                    *category,
                    ParameterKey::AnnualprodPerUnitcapacity,
                );
                for col in 0..production.cols() {
                    for row in (0..production.rows()).filter(|row| row % n_time_steps != 0) {
                        let scale = ramps[col][0]
                            * annualprod[col][0]
                            * structure.time_steps().fraction(row % n_time_steps);
                        let limit = capacity.get(row / n_time_steps, col).clone() * scale;
                        let change =
                            production.get(row, col).clone() - production.get(row - 1, col);
                        rows.push(change.clone().leq(limit.clone()));
                        rows.push((-change).leq(limit));
                    }
                }
            }
        }

        Ok(rows)
    }
}

/// A minimum share of the annual production of each region comes from renewable technologies.
///
/// Only Supply, Conversion and Conversion_plus technologies count towards the total, and a
/// technology is renewable if its `renewable_tech` flag is non-zero.
#[derive(Debug)]
pub struct RenewableProductionRegional;

impl ModelConstraint for RenewableProductionRegional {
    fn name(&self) -> &'static str {
        "RenewableProductionRegional"
    }

    fn regional_parameters(
        &self,
        structure: &ModelStructure,
        region_id: &RegionID,
    ) -> Vec<ParameterDef> {
        vec![
            ParameterDef::new(
                structure,
                ParameterKey::RenewableTech,
                0.0,
                IndexKind::Performance,
                ColumnLayout::Technology,
                technology_columns(structure, region_id, TechCategory::emits),
            ),
            ParameterDef::new(
                structure,
                ParameterKey::MinRenewableProduction,
                0.0,
                IndexKind::Years,
                ColumnLayout::Value,
                value_column(),
            ),
        ]
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_tech(self.name(), TechQuantity::AnnualProduction)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let annual = ctx
            .derived
            .require_tech(self.name(), TechQuantity::AnnualProduction)?;

        let mut rows = Vec::new();
        for (region_id, categories) in annual {
            let shares = ctx
                .data
                .regional_value(region_id, ParameterKey::MinRenewableProduction);
            for (year_idx, share) in shares.iter().enumerate() {
                if *share <= 0.0 {
                    continue;
                }

                let mut renewable = LinExpr::zero();
                let mut total = LinExpr::zero();
                for (category, production) in categories.iter().filter(|(c, _)| c.emits()) {
                    for (col, tech) in structure
                        .technologies_in(region_id, *category)
                        .iter()
                        .enumerate()
                    {
                        let flag =
                            ctx.data
                                .tech_performance(region_id, ParameterKey::RenewableTech, tech);
                        let entry = production.get(year_idx, col);
                        if flag != 0.0 {
                            renewable += entry;
                        }
                        total += entry;
                    }
                }
                rows.push(renewable.geq(total * *share));
            }
        }

        Ok(rows)
    }
}
