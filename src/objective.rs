//! Assembly of the objective function: the total cost of the system.
//!
//! In operation mode, the objective is the undiscounted sum of fixed, variable and emission
//! costs (with taxes added and subsidies subtracted) over every region and line. In planning
//! mode, the cost of each year is discounted back to the start of the horizon, and the present
//! value of investment annuities minus salvage values is added.
use crate::data::ModelData;
use crate::derived::{DerivedQuantities, LineQuantity, RegionQuantity, TechQuantity};
use crate::error::PreconditionError;
use crate::expr::{ExprMatrix, LinExpr};
use crate::finance::discount_factor;
use crate::region::{LineID, RegionID};
use crate::schema::ParameterKey;
use crate::structure::{Mode, ModelStructure};
use crate::table::ColumnKey;
use indexmap::IndexMap;
use log::debug;

/// Used to report which quantity was missing
const NAME: &str = "Objective";

/// Cost streams whose tax is added and subsidy subtracted, as `[base, tax, sub]`
const TAXED_COSTS: [[TechQuantity; 3]; 2] = [
    [
        TechQuantity::CostFix,
        TechQuantity::CostFixTax,
        TechQuantity::CostFixSub,
    ],
    [
        TechQuantity::CostVariable,
        TechQuantity::CostVariableTax,
        TechQuantity::CostVariableSub,
    ],
];

/// The sum over every category and technology of a region of a yearly technology cost, scaled
/// by `sign`
fn add_tech_cost(
    derived: &DerivedQuantities,
    quantity: TechQuantity,
    region_id: &RegionID,
    sign: f64,
    yearly: &mut ExprMatrix,
) -> Result<(), PreconditionError> {
    let matrices = derived.require_tech(NAME, quantity)?;
    for matrix in matrices[region_id].values() {
        let total = matrix.sum_columns();
        for year_idx in 0..yearly.rows() {
            yearly
                .get_mut(year_idx, 0)
                .add_scaled(total.get(year_idx, 0), sign);
        }
    }

    Ok(())
}

/// The undiscounted cost of each year for a region
fn regional_yearly_costs(
    structure: &ModelStructure,
    derived: &DerivedQuantities,
    region_id: &RegionID,
) -> Result<ExprMatrix, PreconditionError> {
    let mut yearly = ExprMatrix::zeros(structure.n_years(), 1);
    for [base, tax, sub] in TAXED_COSTS {
        add_tech_cost(derived, base, region_id, 1.0, &mut yearly)?;
        add_tech_cost(derived, tax, region_id, 1.0, &mut yearly)?;
        add_tech_cost(derived, sub, region_id, -1.0, &mut yearly)?;
    }
    if structure.mode() == Mode::Planning {
        add_tech_cost(derived, TechQuantity::CostDecom, region_id, 1.0, &mut yearly)?;
    }

    let emission_cost = derived.require_region(NAME, RegionQuantity::EmissionCost)?;
    Ok(yearly.plus(&emission_cost[region_id]))
}

/// Sum the entries of a yearly cost, discounting each year from the start of the horizon
fn discounted(
    structure: &ModelStructure,
    yearly: &ExprMatrix,
    discount_rates: &[f64],
) -> LinExpr {
    let mut total = LinExpr::zero();
    for (year_idx, rate) in discount_rates.iter().enumerate() {
        let factor = discount_factor(*rate, f64::from(structure.years_elapsed(year_idx)));
        total.add_scaled(yearly.get(year_idx, 0), factor);
    }

    total
}

/// The total cost of each region
pub fn regional_costs(
    data: &ModelData,
    derived: &DerivedQuantities,
) -> Result<IndexMap<RegionID, LinExpr>, PreconditionError> {
    let structure = data.structure();
    let mut costs = IndexMap::new();
    for region_id in structure.regions() {
        let yearly = regional_yearly_costs(structure, derived, region_id)?;
        let cost = match structure.mode() {
            Mode::Operation => yearly.total(),
            Mode::Planning => {
                let rates = data.regional_value(region_id, ParameterKey::DiscountRate);
                let annuity = derived.require_region(NAME, RegionQuantity::InvAnnuity)?;
                let salvage = derived.require_region(NAME, RegionQuantity::Salvage)?;
                discounted(structure, &yearly, &rates) + annuity[region_id].get(0, 0)
                    - salvage[region_id].get(0, 0)
            }
        };
        costs.insert(region_id.clone(), cost);
    }

    Ok(costs)
}

/// The total cost of each line.
///
/// In planning mode, line costs are discounted at the global discount rate.
pub fn line_costs(
    data: &ModelData,
    derived: &DerivedQuantities,
) -> Result<IndexMap<LineID, LinExpr>, PreconditionError> {
    let structure = data.structure();
    let planning = structure.mode() == Mode::Planning;
    let mut streams = vec![LineQuantity::LineCostFix, LineQuantity::LineCostVariable];
    if planning {
        streams.push(LineQuantity::LineCostDecom);
    }

    let mut costs = IndexMap::new();
    for line in structure.lines_list().unwrap_or_default() {
        let mut yearly = ExprMatrix::zeros(structure.n_years(), 1);
        for quantity in &streams {
            let matrices = derived.require_line(NAME, *quantity)?;
            yearly = yearly.plus(&matrices[line].sum_columns());
        }

        let cost = if planning {
            let rates = data.global(ParameterKey::GlobalDiscountRate, &ColumnKey::Value);
            let annuity = derived.require_line(NAME, LineQuantity::LineInvAnnuity)?;
            let salvage = derived.require_line(NAME, LineQuantity::LineSalvage)?;
            discounted(structure, &yearly, &rates) + annuity[line].get(0, 0)
                - salvage[line].get(0, 0)
        } else {
            yearly.total()
        };
        costs.insert(line.clone(), cost);
    }

    Ok(costs)
}

/// Assemble the objective function to minimise
pub fn objective(
    data: &ModelData,
    derived: &DerivedQuantities,
) -> Result<LinExpr, PreconditionError> {
    let regional = regional_costs(data, derived)?;
    let lines = line_costs(data, derived)?;
    let objective: LinExpr = regional.values().chain(lines.values()).sum();
    let objective = objective.simplify();
    debug!(
        "Objective has {} terms and a constant of {}",
        objective.terms().len(),
        objective.constant_part()
    );

    Ok(objective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::default_constraints;
    use crate::fixture::{
        default_model_data, multi_region_definition, planning_structure, single_region_structure,
    };
    use crate::schema::{ParameterGroup, ParameterSchema};
    use crate::structure::StructureDefinition;
    use crate::technology::{TaxOrSub, TechCategory, TechKey};
    use crate::variables::Variables;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_operation_objective(single_region_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables =
            ParameterSchema::new(&single_region_structure, &constraints).default_tables();
        let reg1 = RegionID::new("reg1");
        let extr = ColumnKey::Technology(TechKey(TechCategory::Supply, "NG_extr".into()));
        let regional = tables
            .group_mut(&ParameterGroup::Regional(reg1.clone()))
            .unwrap();
        regional[&ParameterKey::TechResidualCap]
            .update_column(&extr, |_| 10.0)
            .unwrap();
        regional[&ParameterKey::TechFixedCost]
            .update_column(&extr, |_| 2.0)
            .unwrap();
        regional[&ParameterKey::TechVarCost]
            .update_column(&extr, |_| 3.0)
            .unwrap();
        regional[&ParameterKey::VarTaxsub]
            .update_column(
                &ColumnKey::TaxedTechnology(
                    TaxOrSub::Sub,
                    TechKey(TechCategory::Supply, "NG_extr".into()),
                ),
                |_| 0.5,
            )
            .unwrap();
        let data = ModelData::new(single_region_structure, tables, &constraints).unwrap();
        let variables = Variables::new(data.structure());
        let derived = DerivedQuantities::new(&data, &variables);
        let objective = objective(&data, &derived).unwrap();

        // Fixed cost of the residual capacity is a constant
        assert_approx_eq!(f64, objective.constant_part(), 20.0);

        // Producing one unit costs 3, less a subsidy of 1.5
        let production = variables.production()[&reg1][&TechCategory::Supply];
        let mut values = vec![0.0; variables.len()];
        values[production.var(0, 0).index()] = 1.0;
        assert_approx_eq!(f64, objective.evaluate(&values), 21.5);
    }

    #[rstest]
    fn test_planning_objective_discounting(planning_structure: ModelStructure) {
        let constraints = default_constraints();
        let mut tables = ParameterSchema::new(&planning_structure, &constraints).default_tables();
        let reg1 = RegionID::new("reg1");
        let plant = ColumnKey::Technology(TechKey(TechCategory::Conversion, "NG_plant".into()));
        let regional = tables
            .group_mut(&ParameterGroup::Regional(reg1.clone()))
            .unwrap();
        regional[&ParameterKey::TechResidualCap]
            .update_column(&plant, |_| 1.0)
            .unwrap();
        regional[&ParameterKey::TechFixedCost]
            .update_column(&plant, |_| 1.0)
            .unwrap();
        regional[&ParameterKey::DiscountRate]
            .update_column(&ColumnKey::Value, |_| 0.1)
            .unwrap();
        let data = ModelData::new(planning_structure, tables, &constraints).unwrap();
        let variables = Variables::new(data.structure());
        let derived = DerivedQuantities::new(&data, &variables);
        let costs = regional_costs(&data, &derived).unwrap();

        // A fixed cost of one in 2020, 2025 and 2030, discounted at 10%
        let expected = 1.0 + 1.1_f64.powi(-5) + 1.1_f64.powi(-10);
        assert_approx_eq!(f64, costs[&reg1].constant_part(), expected);
    }

    #[rstest]
    fn test_line_costs(multi_region_definition: StructureDefinition) {
        let structure = ModelStructure::new(multi_region_definition).unwrap();
        let constraints = default_constraints();
        let mut tables = ParameterSchema::new(&structure, &constraints).default_tables();
        let line = structure.lines_list().unwrap()[0].clone();
        let column = ColumnKey::LineCarrier(line.clone(), "NG".into());
        tables.trade[&ParameterKey::LineResidualCap]
            .update_column(&column, |_| 5.0)
            .unwrap();
        tables.trade[&ParameterKey::LineFixedCost]
            .update_column(&column, |_| 2.0)
            .unwrap();
        let data = ModelData::new(structure, tables, &constraints).unwrap();
        let variables = Variables::new(data.structure());
        let derived = DerivedQuantities::new(&data, &variables);

        let costs = line_costs(&data, &derived).unwrap();
        assert_approx_eq!(f64, costs[&line].constant_part(), 10.0);
        assert!(costs[&line].terms().is_empty());
    }

    #[rstest]
    fn test_default_objective_is_zero(planning_structure: ModelStructure) {
        let data = default_model_data(planning_structure);
        let variables = Variables::new(data.structure());
        let derived = DerivedQuantities::new(&data, &variables);
        let objective = objective(&data, &derived).unwrap();
        assert!(objective.terms().is_empty());
        assert_approx_eq!(f64, objective.constant_part(), 0.0);
    }
}
