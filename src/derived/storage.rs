//! State of charge of storage technologies.
use super::{RegionMatrix, RegionalMatrices, TechQuantity};
use crate::data::ModelData;
use crate::expr::Constraint;
use crate::schema::ParameterKey;
use crate::technology::TechCategory;
use crate::variables::Variables;
use indexmap::IndexMap;

/// Compute the state of charge of every storage technology, along with the equalities which
/// tie the state of charge variables to charge and discharge.
///
/// Within each year, the state of charge is the initial state of charge plus the running sum of
/// charge (scaled by the charge efficiency) minus discharge (divided by the discharge
/// efficiency). The state of charge does not carry over between years.
pub fn state_of_charge(
    data: &ModelData,
    variables: &Variables,
    tech: &IndexMap<TechQuantity, RegionalMatrices>,
) -> (RegionMatrix, Vec<Constraint>) {
    let structure = data.structure();
    let n_time_steps = structure.n_time_steps();
    let mut soc_matrices = RegionMatrix::new();
    let mut definitions = Vec::new();

    for (region_id, soc) in variables.storage_soc() {
        let charge = &variables.consumption()[region_id][&TechCategory::Storage];
        let discharge = &variables.production()[region_id][&TechCategory::Storage];
        let capacity = &tech[&TechQuantity::TotalCapacity][region_id][&TechCategory::Storage];

        for (col, storage) in structure
            .technologies_in(region_id, TechCategory::Storage)
            .iter()
            .enumerate()
        {
            let perf = |key| data.tech_performance(region_id, key, storage);
            let charge_efficiency = perf(ParameterKey::StorageChargeEfficiency);
            let discharge_efficiency = perf(ParameterKey::StorageDischargeEfficiency);
            let initial = perf(ParameterKey::StorageInitialSoc);

            for row in 0..soc.rows() {
                let mut previous = if row % n_time_steps == 0 {
                    capacity.get(row / n_time_steps, col) * initial
                } else {
                    soc.expr(row - 1, col)
                };
                previous.add_term(charge.var(row, col), charge_efficiency);
                previous.add_term(discharge.var(row, col), -1.0 / discharge_efficiency);
                definitions.push(soc.expr(row, col).equals(previous));
            }
        }

        soc_matrices.insert(region_id.clone(), soc.to_exprs());
    }

    (soc_matrices, definitions)
}
