//! The model: validated data plus the constraints to apply, which can be built into a linear
//! program and solved.
use crate::constraints::{BuildContext, ModelConstraint};
use crate::data::ModelData;
use crate::derived::DerivedQuantities;
use crate::expr::{Constraint, LinExpr};
use crate::objective::{line_costs, regional_costs};
use crate::region::{LineID, RegionID};
use crate::results::ModelResults;
use crate::schema::ParameterData;
use crate::solver::{LinearProgram, SolveOptions, solve};
use crate::structure::ModelStructure;
use crate::variables::Variables;
use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, info};

pub mod parameters;

/// A model whose parameter tables have been validated against its structure
pub struct Model {
    data: ModelData,
    constraints: Vec<Box<dyn ModelConstraint>>,
}

/// The linear program built from a model
pub struct BuiltModel {
    /// The decision variables
    pub variables: Variables,
    /// Every quantity derived from the variables
    pub derived: DerivedQuantities,
    /// Every row of the problem: defining equalities first, then each constraint's rows
    pub rows: Vec<Constraint>,
    /// The number of rows contributed by each constraint
    pub row_counts: IndexMap<&'static str, usize>,
    /// The total cost of each region
    pub regional_costs: IndexMap<RegionID, LinExpr>,
    /// The total cost of each line
    pub line_costs: IndexMap<LineID, LinExpr>,
    /// The total cost to minimise
    pub objective: LinExpr,
}

impl Model {
    /// Create a model, validating the parameter tables.
    ///
    /// # Arguments
    ///
    /// * `structure` - The model structure
    /// * `parameters` - Global, trade and regional parameter tables
    /// * `constraints` - The constraints to apply, in order
    pub fn new(
        structure: ModelStructure,
        parameters: ParameterData,
        constraints: Vec<Box<dyn ModelConstraint>>,
    ) -> Result<Self> {
        let data = ModelData::new(structure, parameters, &constraints)?;
        Ok(Self { data, constraints })
    }

    /// The validated model data
    pub fn data(&self) -> &ModelData {
        &self.data
    }

    /// The model structure
    pub fn structure(&self) -> &ModelStructure {
        self.data.structure()
    }

    /// The constraints which apply to this model's mode and topology
    pub fn active_constraints(&self) -> impl Iterator<Item = &dyn ModelConstraint> {
        let structure = self.structure();
        self.constraints
            .iter()
            .map(Box::as_ref)
            .filter(|constraint| constraint.applies_to(structure.mode(), structure.topology()))
    }

    /// Create the variables, derived quantities, constraints and objective.
    ///
    /// Building is deterministic: the same model always gives the same problem.
    pub fn build(&self) -> Result<BuiltModel> {
        let variables = Variables::new(self.structure());
        let derived = DerivedQuantities::new(&self.data, &variables);

        let mut rows = derived.definitions().to_vec();
        let mut row_counts = IndexMap::new();
        let ctx = BuildContext {
            data: &self.data,
            variables: &variables,
            derived: &derived,
        };
        for constraint in self.active_constraints() {
            constraint.check(&derived)?;
            let constraint_rows = constraint.rules(&ctx)?;
            debug!(
                "Constraint {} added {} rows",
                constraint.name(),
                constraint_rows.len()
            );
            row_counts.insert(constraint.name(), constraint_rows.len());
            rows.extend(constraint_rows);
        }

        let regional_costs = regional_costs(&self.data, &derived)?;
        let line_costs = line_costs(&self.data, &derived)?;
        let objective: LinExpr = regional_costs
            .values()
            .chain(line_costs.values())
            .sum::<LinExpr>()
            .simplify();

        info!(
            "Built model with {} variables and {} constraints",
            variables.len(),
            rows.len()
        );

        Ok(BuiltModel {
            variables,
            derived,
            rows,
            row_counts,
            regional_costs,
            line_costs,
            objective,
        })
    }

    /// Build the model and solve it.
    ///
    /// # Returns
    ///
    /// The value of every named quantity at the optimum, or `None` if no optimal solution was
    /// found.
    pub fn solve(&self, options: &SolveOptions) -> Result<Option<ModelResults>> {
        self.build()?.solve(options)
    }
}

impl BuiltModel {
    /// Solve the linear program.
    ///
    /// # Returns
    ///
    /// The value of every named quantity at the optimum, or `None` if no optimal solution was
    /// found.
    pub fn solve(&self, options: &SolveOptions) -> Result<Option<ModelResults>> {
        let program = LinearProgram {
            upper_bounds: self.variables.upper_bounds(),
            objective: &self.objective,
            rows: &self.rows,
        };
        let Some(solution) = solve(&program, options)? else {
            return Ok(None);
        };
        info!("Optimal total cost: {}", solution.objective_value);

        Ok(Some(ModelResults::new(
            &self.variables,
            &self.derived,
            &self.regional_costs,
            &self.line_costs,
            &solution,
        )))
    }

    /// The largest amount by which any row is violated at the given variable values
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        self.rows
            .iter()
            .map(|row| row.violation(values))
            .fold(0.0, f64::max)
    }
}
