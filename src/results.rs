//! The values of every named quantity of a solved model.
use crate::carrier::EmissionID;
use crate::derived::{
    CarrierQuantity, DerivedQuantities, LineQuantity, RegionMatrix, RegionQuantity,
    RegionalMatrices, TechQuantity,
};
use crate::expr::{ExprMatrix, LinExpr, ValueMatrix};
use crate::region::{LineID, RegionID};
use crate::solver::Solution;
use crate::technology::TechCategory;
use crate::variables::{TradeVars, Variables};
use indexmap::IndexMap;
use std::hash::Hash;

/// Values for each region and technology category
pub type RegionalValues = IndexMap<RegionID, IndexMap<TechCategory, ValueMatrix>>;

/// Values for each region
pub type RegionValues = IndexMap<RegionID, ValueMatrix>;

/// Values for each ordered pair of regions
pub type TradeValues = IndexMap<RegionID, IndexMap<RegionID, ValueMatrix>>;

/// The results of a successful solve
#[derive(Clone, Debug, PartialEq)]
pub struct ModelResults {
    /// The optimal total cost
    pub objective_value: f64,
    /// Technology quantities, e.g. production and total capacity
    pub tech: IndexMap<TechQuantity, RegionalValues>,
    /// Production, use, demand and trade summed by carrier
    pub carrier: IndexMap<CarrierQuantity, RegionValues>,
    /// Quantities with a single matrix per region, e.g. the state of charge of storage
    pub region: IndexMap<RegionQuantity, RegionValues>,
    /// Line quantities
    pub line: IndexMap<LineQuantity, IndexMap<LineID, ValueMatrix>>,
    /// Annual emissions of each type by region and category
    pub emission_by_type: IndexMap<EmissionID, RegionalValues>,
    /// Annual emissions of each type by region
    pub emission_by_region: IndexMap<EmissionID, RegionValues>,
    /// Imports of each region from each other region
    pub import: TradeValues,
    /// Exports of each region to each other region
    pub export: TradeValues,
    /// The share of the objective belonging to each region
    pub regional_cost: IndexMap<RegionID, f64>,
    /// The share of the objective belonging to each line
    pub line_cost: IndexMap<LineID, f64>,
}

fn evaluate_map<K: Clone + Hash + Eq>(
    map: &IndexMap<K, ExprMatrix>,
    values: &[f64],
) -> IndexMap<K, ValueMatrix> {
    map.iter()
        .map(|(key, matrix)| (key.clone(), matrix.evaluate(values)))
        .collect()
}

fn evaluate_regional(matrices: &RegionalMatrices, values: &[f64]) -> RegionalValues {
    matrices
        .iter()
        .map(|(region_id, categories)| (region_id.clone(), evaluate_map(categories, values)))
        .collect()
}

fn evaluate_regions(matrices: &RegionMatrix, values: &[f64]) -> RegionValues {
    evaluate_map(matrices, values)
}

fn evaluate_trade(vars: &TradeVars, values: &[f64]) -> TradeValues {
    vars.iter()
        .map(|(region_id, partners)| {
            let partners = partners
                .iter()
                .map(|(partner, block)| (partner.clone(), block.to_exprs().evaluate(values)))
                .collect();
            (region_id.clone(), partners)
        })
        .collect()
}

fn evaluate_costs<K: Clone + Hash + Eq>(
    costs: &IndexMap<K, LinExpr>,
    values: &[f64],
) -> IndexMap<K, f64> {
    costs
        .iter()
        .map(|(key, cost)| (key.clone(), cost.evaluate(values)))
        .collect()
}

impl ModelResults {
    /// Evaluate every quantity of a built model at the solution
    pub fn new(
        variables: &Variables,
        derived: &DerivedQuantities,
        regional_costs: &IndexMap<RegionID, LinExpr>,
        line_costs: &IndexMap<LineID, LinExpr>,
        solution: &Solution,
    ) -> Self {
        let values = &solution.values;
        let emissions = derived.emissions();
        Self {
            objective_value: solution.objective_value,
            tech: derived
                .iter_tech()
                .map(|(quantity, matrices)| (quantity, evaluate_regional(matrices, values)))
                .collect(),
            carrier: derived
                .iter_carrier()
                .map(|(quantity, matrices)| (quantity, evaluate_regions(matrices, values)))
                .collect(),
            region: derived
                .iter_region()
                .map(|(quantity, matrices)| (quantity, evaluate_regions(matrices, values)))
                .collect(),
            line: derived
                .iter_line()
                .map(|(quantity, matrices)| (quantity, evaluate_map(matrices, values)))
                .collect(),
            emission_by_type: emissions
                .by_type
                .iter()
                .map(|(emission, matrices)| (emission.clone(), evaluate_regional(matrices, values)))
                .collect(),
            emission_by_region: emissions
                .regional
                .iter()
                .map(|(emission, matrices)| (emission.clone(), evaluate_regions(matrices, values)))
                .collect(),
            import: evaluate_trade(variables.import(), values),
            export: evaluate_trade(variables.export(), values),
            regional_cost: evaluate_costs(regional_costs, values),
            line_cost: evaluate_costs(line_costs, values),
        }
    }

    /// The values of a technology quantity for one region and category
    pub fn tech_values(
        &self,
        quantity: TechQuantity,
        region_id: &RegionID,
        category: TechCategory,
    ) -> Option<&ValueMatrix> {
        self.tech.get(&quantity)?.get(region_id)?.get(&category)
    }

    /// The values of a carrier quantity for one region
    pub fn carrier_values(
        &self,
        quantity: CarrierQuantity,
        region_id: &RegionID,
    ) -> Option<&ValueMatrix> {
        self.carrier.get(&quantity)?.get(region_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{default_model_data, multi_region_structure, single_region_structure};
    use crate::objective::{line_costs, regional_costs};
    use crate::structure::ModelStructure;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn results_at(structure: ModelStructure, value: f64) -> ModelResults {
        let data = default_model_data(structure);
        let variables = Variables::new(data.structure());
        let derived = DerivedQuantities::new(&data, &variables);
        let regional = regional_costs(&data, &derived).unwrap();
        let lines = line_costs(&data, &derived).unwrap();
        let solution = Solution {
            values: vec![value; variables.len()],
            objective_value: 0.0,
        };
        ModelResults::new(&variables, &derived, &regional, &lines, &solution)
    }

    #[rstest]
    fn test_results_shapes(single_region_structure: ModelStructure) {
        let results = results_at(single_region_structure, 1.0);
        let reg1 = RegionID::new("reg1");

        // Four time steps and three supply technologies
        let production = results
            .tech_values(TechQuantity::Production, &reg1, TechCategory::Supply)
            .unwrap();
        assert_eq!((production.rows(), production.cols()), (4, 3));
        let annual = results
            .tech_values(TechQuantity::AnnualProduction, &reg1, TechCategory::Supply)
            .unwrap();
        assert_eq!(annual.to_rows(), [[4.0, 4.0, 4.0]]);

        assert!(results.carrier_values(CarrierQuantity::TotalProdByCarrier, &reg1).is_some());
        assert!(results.emission_by_type.contains_key(&EmissionID::new("CO2")));
        assert!(results.import.is_empty());
        assert!(results.line.is_empty());
        assert_approx_eq!(f64, results.regional_cost[&reg1], 0.0);
    }

    #[rstest]
    fn test_results_trade(multi_region_structure: ModelStructure) {
        let results = results_at(multi_region_structure, 0.0);
        let (reg1, reg2) = (RegionID::new("reg1"), RegionID::new("reg2"));
        assert!(results.import[&reg1].contains_key(&reg2));
        assert!(results.export[&reg2].contains_key(&reg1));
        assert_eq!(results.line_cost.len(), 1);
        assert!(results.line.contains_key(&LineQuantity::LineTotalCapacity));
    }
}
