//! Limits on the flows over lines and on line capacity.
use super::{BuildContext, ModelConstraint, bound_matrix};
use crate::data::ModelData;
use crate::derived::{DerivedQuantities, LineQuantity};
use crate::error::PreconditionError;
use crate::expr::Constraint;
use crate::region::LineID;
use crate::schema::{ColumnLayout, IndexKind, ParameterDef, ParameterKey, line_carrier_columns};
use crate::structure::{Mode, ModelStructure, Topology};

/// One column of trade parameter values per carrier in the catalog
fn line_columns(data: &ModelData, key: ParameterKey, line: &LineID) -> Vec<Vec<f64>> {
    data.structure()
        .carriers()
        .keys()
        .map(|carrier| data.line(key, line, carrier))
        .collect()
}

/// The flow over a line in both directions is limited by its capacity, both in each time step
/// and over the year
#[derive(Debug)]
pub struct LineAvailability;

impl ModelConstraint for LineAvailability {
    fn name(&self) -> &'static str {
        "LineAvailability"
    }

    fn applies_to(&self, _mode: Mode, topology: Topology) -> bool {
        topology == Topology::MultiNode
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        derived.require_line(self.name(), LineQuantity::LineTotalCapacity)?;
        derived.require_line(self.name(), LineQuantity::LineAnnualFlow)?;
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let n_time_steps = structure.n_time_steps();
        let capacity = ctx
            .derived
            .require_line(self.name(), LineQuantity::LineTotalCapacity)?;
        let annual_flow = ctx
            .derived
            .require_line(self.name(), LineQuantity::LineAnnualFlow)?;
        let imports = ctx.variables.import();

        let mut rows = Vec::new();
        for (line, capacity) in capacity {
            let (a, b) = (&line.first, &line.second);
            let (forward, backward) = (imports[a][b], imports[b][a]);
            let annualprod =
                line_columns(ctx.data, ParameterKey::LineAnnualprodPerUnitcapacity, line);
            let factors = line_columns(ctx.data, ParameterKey::LineCapacityFactor, line);

            for col in 0..forward.cols() {
                if ctx.variables.upper_bound(forward.var(0, col)) == 0.0 {
                    continue;
                }

                for row in 0..forward.rows() {
                    let flow = forward.expr(row, col) + backward.expr(row, col);
                    let scale =
                        annualprod[col][0] * structure.time_steps().fraction(row % n_time_steps);
                    rows.push(flow.leq(capacity.get(row / n_time_steps, col) * scale));
                }

                for year_idx in 0..capacity.rows() {
                    let limit = capacity.get(year_idx, col)
                        * (factors[col][year_idx] * annualprod[col][0]);
                    rows.push(annual_flow[line].get(year_idx, col).clone().leq(limit));
                }
            }
        }

        Ok(rows)
    }
}

/// Minimum and maximum total and new capacity of each line for each carrier
#[derive(Debug)]
pub struct LineCapacity;

/// Which line quantity each pair of bound tables applies to
const LINE_BOUNDS: [(LineQuantity, ParameterKey, ParameterKey); 2] = [
    (
        LineQuantity::LineTotalCapacity,
        ParameterKey::LineMinTotcap,
        ParameterKey::LineMaxTotcap,
    ),
    (
        LineQuantity::LineNewCapacity,
        ParameterKey::LineMinNewcap,
        ParameterKey::LineMaxNewcap,
    ),
];

impl ModelConstraint for LineCapacity {
    fn name(&self) -> &'static str {
        "LineCapacity"
    }

    fn applies_to(&self, mode: Mode, topology: Topology) -> bool {
        mode == Mode::Planning && topology == Topology::MultiNode
    }

    fn trade_parameters(&self, structure: &ModelStructure) -> Vec<ParameterDef> {
        LINE_BOUNDS
            .iter()
            .flat_map(|(_, min, max)| [(*max, f64::INFINITY), (*min, 0.0)])
            .map(|(key, default)| {
                ParameterDef::new(
                    structure,
                    key,
                    default,
                    IndexKind::Years,
                    ColumnLayout::LineCarrier,
                    line_carrier_columns(structure),
                )
            })
            .collect()
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        for (quantity, _, _) in LINE_BOUNDS {
            derived.require_line(self.name(), quantity)?;
        }
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let mut rows = Vec::new();
        for (quantity, min_key, max_key) in LINE_BOUNDS {
            for (line, matrix) in ctx.derived.require_line(self.name(), quantity)? {
                bound_matrix(
                    matrix,
                    &line_columns(ctx.data, min_key, line),
                    &line_columns(ctx.data, max_key, line),
                    &mut rows,
                );
            }
        }

        Ok(rows)
    }
}
