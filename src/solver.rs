//! Hands an assembled linear program to the HiGHS solver.
use crate::expr::{Constraint, LinExpr};
use crate::log::LOG_LEVEL_ENV_VAR;
use anyhow::{Context, Result, anyhow, bail, ensure};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::{debug, warn};
use std::fmt;
use std::str::FromStr;

/// The only solver currently supported
pub const DEFAULT_SOLVER: &str = "highs";

/// A value for a solver option
#[derive(Clone, Debug, PartialEq)]
pub enum SolverOption {
    /// A boolean option, e.g. `presolve_reduction_off=true`
    Bool(bool),
    /// An integer option, e.g. `threads=4`
    Int(i32),
    /// A real option, e.g. `time_limit=60.0`
    Float(f64),
    /// A string option, e.g. `solver=ipm`
    Text(String),
}

impl FromStr for SolverOption {
    type Err = std::convert::Infallible;

    /// Values are interpreted as the most specific type they parse as
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if let Ok(value) = s.parse() {
            Self::Bool(value)
        } else if let Ok(value) = s.parse() {
            Self::Int(value)
        } else if let Ok(value) = s.parse() {
            Self::Float(value)
        } else {
            Self::Text(s.to_string())
        })
    }
}

impl fmt::Display for SolverOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Parse a solver option given on the command line as `name=value`
pub fn parse_solver_option(arg: &str) -> Result<(String, SolverOption)> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Solver option must be given as name=value: {arg}"))?;
    let name = name.trim();
    ensure!(!name.is_empty(), "Solver option name is empty: {arg}");
    let value = value.trim().parse().context("Invalid solver option")?;

    Ok((name.to_string(), value))
}

/// How to solve a model
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOptions {
    /// Whether to show the solver's own output
    pub verbose: bool,
    /// Which solver to use
    pub solver_name: String,
    /// Options passed to the solver unchanged
    pub options: IndexMap<String, SolverOption>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            solver_name: DEFAULT_SOLVER.to_string(),
            options: IndexMap::new(),
        }
    }
}

/// The optimal values of a linear program's variables
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// One value per variable, in the order the variables were created
    pub values: Vec<f64>,
    /// The value of the objective, including its constant part
    pub objective_value: f64,
}

/// A linear program over non-negative variables: minimise `objective` subject to `rows`
pub struct LinearProgram<'a> {
    /// The upper bound of each variable (possibly infinite)
    pub upper_bounds: &'a [f64],
    /// The cost to minimise
    pub objective: &'a LinExpr,
    /// The constraints
    pub rows: &'a [Constraint],
}

/// Enable logging for the HiGHS solver
fn enable_highs_logging(model: &mut highs::Model) {
    // Skip this step if logging is disabled (e.g. when running tests)
    if let Ok(log_level) = std::env::var(LOG_LEVEL_ENV_VAR) {
        if log_level.eq_ignore_ascii_case("off") {
            return;
        }
    }

    model.set_option("log_to_console", true);
    model.set_option("output_flag", true);
}

/// Solve a linear program.
///
/// # Returns
///
/// The optimal solution, or `None` if the problem is infeasible, unbounded or the solver
/// otherwise stopped without an optimal solution.
pub fn solve(program: &LinearProgram, options: &SolveOptions) -> Result<Option<Solution>> {
    if !options.solver_name.eq_ignore_ascii_case(DEFAULT_SOLVER) {
        bail!(
            "Unknown solver '{}' (supported solvers: {DEFAULT_SOLVER})",
            options.solver_name
        );
    }

    let n_variables = program.upper_bounds.len();
    let mut coefficients = vec![0.0; n_variables];
    for (var, coeff) in program.objective.terms() {
        coefficients[var.index()] += coeff;
    }

    let mut problem = Problem::default();
    let columns: Vec<_> = coefficients
        .iter()
        .zip(program.upper_bounds)
        .map(|(coeff, upper)| problem.add_column(*coeff, 0.0..=*upper))
        .collect();

    let mut n_rows = 0;
    for row in program.rows {
        match row.trivially_satisfied() {
            Some(true) => continue,
            Some(false) => {
                warn!("A constraint with no variables can never be satisfied");
                return Ok(None);
            }
            None => {}
        }

        let (lower, upper) = row.row_bounds();
        let terms = row
            .expr()
            .terms()
            .iter()
            .map(|(var, coeff)| (columns[var.index()], *coeff));
        problem.add_row(lower..=upper, terms);
        n_rows += 1;
    }
    debug!("Passing {n_variables} columns and {n_rows} rows to HiGHS");

    let mut model = problem.optimise(Sense::Minimise);
    if options.verbose {
        enable_highs_logging(&mut model);
    }
    for (name, value) in &options.options {
        match value {
            SolverOption::Bool(value) => model.set_option(name.as_str(), *value),
            SolverOption::Int(value) => model.set_option(name.as_str(), *value),
            SolverOption::Float(value) => model.set_option(name.as_str(), *value),
            SolverOption::Text(value) => model.set_option(name.as_str(), value.as_str()),
        }
    }

    let solved = model
        .try_solve()
        .map_err(|status| anyhow!("Could not solve: {status:?}"))?;
    match solved.status() {
        HighsModelStatus::Optimal => {
            let values = solved.get_solution().columns().to_vec();
            let objective_value = program.objective.evaluate(&values);
            Ok(Some(Solution {
                values,
                objective_value,
            }))
        }
        status => {
            warn!("Solver finished without an optimal solution: {status:?}");
            Ok(None)
        }
    }
}
