//! Capacity, flows and costs of inter-regional lines.
use super::LineQuantity;
use super::capacity::{VintageMatrix, apply_vintages, decommission_matrix, survival_matrix};
use super::costs::{InvestmentTerms, add_investment_terms};
use crate::data::ModelData;
use crate::expr::{ExprMatrix, LinExpr};
use crate::region::LineID;
use crate::schema::ParameterKey;
use crate::structure::Mode;
use crate::table::ColumnKey;
use crate::variables::Variables;
use indexmap::IndexMap;

/// One column of parameter values per carrier in the catalog
fn line_params(data: &ModelData, key: ParameterKey, line: &LineID) -> Vec<Vec<f64>> {
    data.structure()
        .carriers()
        .keys()
        .map(|carrier| data.line(key, line, carrier))
        .collect()
}

/// Compute every line quantity
pub fn line_quantities(
    data: &ModelData,
    variables: &Variables,
) -> IndexMap<LineQuantity, IndexMap<LineID, ExprMatrix>> {
    use LineQuantity as Q;

    let structure = data.structure();
    let n_years = structure.n_years();
    let planning = structure.mode() == Mode::Planning;
    let mut quantities: IndexMap<LineQuantity, IndexMap<LineID, ExprMatrix>> = IndexMap::new();
    let mut insert = |quantity, line: &LineID, matrix| {
        quantities
            .entry(quantity)
            .or_default()
            .insert(line.clone(), matrix);
    };

    for line in structure.lines_list().unwrap_or_default() {
        let (a, b) = (&line.first, &line.second);
        let flows = variables.import()[a][b]
            .to_exprs()
            .plus(&variables.import()[b][a].to_exprs());
        let annual_flow = flows.sum_row_blocks(structure.n_time_steps());
        let residual =
            ExprMatrix::from_columns(n_years, &line_params(data, ParameterKey::LineResidualCap, line));

        let total = if planning {
            let new_capacity = variables.line_new_capacity()[line].to_exprs();
            let lifetimes: Vec<f64> = line_params(data, ParameterKey::LineLifetime, line)
                .into_iter()
                .map(|values| values[0])
                .collect();
            let vintages = |rule: fn(usize, u32, f64) -> VintageMatrix| -> Vec<VintageMatrix> {
                lifetimes
                    .iter()
                    .map(|lifetime| rule(n_years, structure.period_step(), *lifetime))
                    .collect()
            };
            let accumulated = apply_vintages(&new_capacity, &vintages(survival_matrix));
            let decommissioned = apply_vintages(&new_capacity, &vintages(decommission_matrix));

            let investment = new_capacity
                .scale_columns(&line_params(data, ParameterKey::LineInvestmentCost, line));
            let (annuity, salvage) = line_present_values(data, line, &investment);
            insert(Q::LineInvAnnuity, line, annuity);
            insert(Q::LineSalvage, line, salvage);
            insert(Q::LineCostInv, line, investment);
            insert(
                Q::LineCostDecom,
                line,
                decommissioned
                    .scale_columns(&line_params(data, ParameterKey::LineDecommissioningCost, line)),
            );
            insert(Q::LineNewCapacity, line, new_capacity);
            insert(Q::LineDecommissionedCapacity, line, decommissioned);

            accumulated.plus(&residual)
        } else {
            residual
        };

        insert(
            Q::LineCostFix,
            line,
            total.scale_columns(&line_params(data, ParameterKey::LineFixedCost, line)),
        );
        insert(
            Q::LineCostVariable,
            line,
            annual_flow.scale_columns(&line_params(data, ParameterKey::LineVarCost, line)),
        );
        insert(Q::LineTotalCapacity, line, total);
        insert(Q::LineAnnualFlow, line, annual_flow);
    }

    quantities
}

/// Present values of the investment annuities and salvage value of a line, discounted at the
/// global discount rate
fn line_present_values(
    data: &ModelData,
    line: &LineID,
    investment: &ExprMatrix,
) -> (ExprMatrix, ExprMatrix) {
    let structure = data.structure();
    let discount_rates = data.global(ParameterKey::GlobalDiscountRate, &ColumnKey::Value);
    let economic_lifetimes = line_params(data, ParameterKey::LineEconomicLifetime, line);
    let lifetimes = line_params(data, ParameterKey::LineLifetime, line);
    let interest_rates = line_params(data, ParameterKey::LineInterestRate, line);

    let mut annuity = LinExpr::zero();
    let mut salvage = LinExpr::zero();
    for col in 0..investment.cols() {
        add_investment_terms(
            structure,
            investment.column(col),
            &discount_rates,
            InvestmentTerms {
                economic_lifetime: economic_lifetimes[col][0],
                lifetime: lifetimes[col][0],
                interest_rate: interest_rates[col][0],
            },
            &mut annuity,
            &mut salvage,
        );
    }

    (
        ExprMatrix::from_fn(1, 1, |_, _| annuity.clone()),
        ExprMatrix::from_fn(1, 1, |_, _| salvage.clone()),
    )
}
