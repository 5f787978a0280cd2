//! Capacity accumulation under vintaging and annual production.
use super::{RegionalMatrices, TechQuantity, per_category, tech_params};
use crate::data::ModelData;
use crate::expr::{ExprMatrix, LinExpr};
use crate::region::RegionID;
use crate::schema::ParameterKey;
use crate::structure::{Mode, ModelStructure};
use crate::technology::TechCategory;
use crate::variables::Variables;

/// A square (year, vintage) matrix of weights
pub type VintageMatrix = Vec<Vec<f64>>;

/// Build the matrix whose entry `(year, vintage)` is one iff capacity installed in `vintage` is
/// still alive in `year`, i.e. `0 <= (year - vintage) * period_step < lifetime`
pub fn survival_matrix(n_years: usize, period_step: u32, lifetime: f64) -> VintageMatrix {
    (0..n_years)
        .map(|year| {
            (0..n_years)
                .map(|vintage| {
                    let alive = year >= vintage
                        && (((year - vintage) as u32 * period_step) as f64) < lifetime;
                    if alive { 1.0 } else { 0.0 }
                })
                .collect()
        })
        .collect()
}

/// The number of periods for which capacity with the given lifetime survives
pub fn periods_alive(period_step: u32, lifetime: f64) -> usize {
    (lifetime / period_step as f64).ceil().max(0.0) as usize
}

/// Build the matrix whose entry `(year, vintage)` is one iff capacity installed in `vintage`
/// retires in `year`
pub fn decommission_matrix(n_years: usize, period_step: u32, lifetime: f64) -> VintageMatrix {
    let periods = periods_alive(period_step, lifetime);
    (0..n_years)
        .map(|year| {
            (0..n_years)
                .map(|vintage| if vintage + periods == year { 1.0 } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Combine new capacity of every vintage using one vintage matrix per column
pub fn apply_vintages(new_capacity: &ExprMatrix, matrices: &[VintageMatrix]) -> ExprMatrix {
    let n_years = new_capacity.rows();
    ExprMatrix::from_fn(n_years, new_capacity.cols(), |year, col| {
        let mut expr = LinExpr::zero();
        for vintage in 0..n_years {
            let weight = matrices[col][year][vintage];
            if weight != 0.0 {
                expr.add_scaled(new_capacity.get(vintage, col), weight);
            }
        }
        expr
    })
}

/// Compute capacity quantities: total capacity and, in planning mode, new, accumulated and
/// decommissioned capacity
pub fn capacity_quantities(
    data: &ModelData,
    variables: &Variables,
) -> Vec<(TechQuantity, RegionalMatrices)> {
    let structure = data.structure();
    let n_years = structure.n_years();
    let residual = |region_id: &RegionID, category: TechCategory| {
        ExprMatrix::from_columns(
            n_years,
            &tech_params(data, region_id, category, ParameterKey::TechResidualCap),
        )
    };

    if structure.mode() == Mode::Operation {
        let total = per_category(structure, TechCategory::has_capacity, residual);
        return vec![(TechQuantity::TotalCapacity, total)];
    }

    let new_capacity = per_category(structure, TechCategory::has_capacity, |region_id, category| {
        variables.new_capacity()[region_id][&category].to_exprs()
    });
    let vintages = |rule: fn(usize, u32, f64) -> VintageMatrix| {
        per_category(structure, TechCategory::has_capacity, |region_id, category| {
            let matrices: Vec<_> = structure
                .technologies_in(region_id, category)
                .iter()
                .map(|tech| {
                    let lifetime =
                        data.tech_performance(region_id, ParameterKey::TechLifetime, tech);
                    rule(n_years, structure.period_step(), lifetime)
                })
                .collect();
            apply_vintages(&new_capacity[region_id][&category], &matrices)
        })
    };
    let accumulated = vintages(survival_matrix);
    let decommissioned = vintages(decommission_matrix);
    let total = per_category(structure, TechCategory::has_capacity, |region_id, category| {
        accumulated[region_id][&category].plus(&residual(region_id, category))
    });

    vec![
        (TechQuantity::NewCapacity, new_capacity),
        (TechQuantity::AccumulatedNewCapacity, accumulated),
        (TechQuantity::TotalCapacity, total),
        (TechQuantity::DecommissionedCapacity, decommissioned),
    ]
}

/// Sum production over the time steps of each year
pub fn annual_production(
    structure: &ModelStructure,
    production: &RegionalMatrices,
) -> RegionalMatrices {
    production
        .iter()
        .map(|(region_id, categories)| {
            let annual = categories
                .iter()
                .map(|(category, matrix)| {
                    (*category, matrix.sum_row_blocks(structure.n_time_steps()))
                })
                .collect();
            (region_id.clone(), annual)
        })
        .collect()
}
