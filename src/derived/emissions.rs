//! Emissions and the cost of emissions.
use super::{Emissions, RegionMatrix, RegionalMatrices};
use crate::data::ModelData;
use crate::expr::ExprMatrix;
use crate::schema::ParameterKey;
use crate::table::ColumnKey;
use indexmap::IndexMap;

/// Compute annual emissions of each type from annual production.
///
/// Only the categories whose production is directly linked to emissions (Supply, Conversion
/// and Conversion_plus) emit.
pub fn emissions(data: &ModelData, annual_production: &RegionalMatrices) -> Emissions {
    let structure = data.structure();
    let n_years = structure.n_years();
    let mut result = Emissions::default();

    for emission in structure.emissions() {
        let mut by_region = RegionalMatrices::new();
        let mut totals = RegionMatrix::new();
        for (region_id, categories) in annual_production {
            let mut by_category = IndexMap::new();
            let mut total = ExprMatrix::zeros(n_years, 1);
            for (category, production) in categories.iter().filter(|(c, _)| c.emits()) {
                let rates: Vec<_> = structure
                    .technologies_in(region_id, *category)
                    .iter()
                    .map(|tech| {
                        data.regional(
                            region_id,
                            ParameterKey::SpecificEmission,
                            &ColumnKey::EmissionTechnology(emission.clone(), tech.key()),
                        )
                    })
                    .collect();
                let emitted = production.scale_columns(&rates);
                total = total.plus(&emitted.sum_columns());
                by_category.insert(*category, emitted);
            }
            by_region.insert(region_id.clone(), by_category);
            totals.insert(region_id.clone(), total);
        }
        result.by_type.insert(emission.clone(), by_region);
        result.regional.insert(emission.clone(), totals);
    }

    result
}

/// The annual cost of the emissions of each region at the region's emission tax rates
pub fn emission_cost(data: &ModelData, emissions: &Emissions) -> RegionMatrix {
    let structure = data.structure();
    structure
        .regions()
        .iter()
        .map(|region_id| {
            let mut cost = ExprMatrix::zeros(structure.n_years(), 1);
            for (emission, totals) in &emissions.regional {
                let tax = data.regional(
                    region_id,
                    ParameterKey::EmissionTax,
                    &ColumnKey::Emission(emission.clone()),
                );
                cost = cost.plus(&totals[region_id].scale_columns(&[tax]));
            }
            (region_id.clone(), cost)
        })
        .collect()
}
