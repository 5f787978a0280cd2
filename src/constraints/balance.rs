//! Conservation of carriers within regions and across lines.
use super::{BuildContext, ModelConstraint};
use crate::derived::{CarrierQuantity, DerivedQuantities};
use crate::error::PreconditionError;
use crate::expr::{Constraint, LinExpr};
use crate::structure::{Mode, Topology};

/// Supply meets demand for every carrier in every region and time step:
/// `production + import - use - export - demand == 0`
#[derive(Debug)]
pub struct Balance;

impl Balance {
    fn inflows(multi_node: bool) -> &'static [CarrierQuantity] {
        if multi_node {
            &[
                CarrierQuantity::TotalProdByCarrier,
                CarrierQuantity::TotalImportByCarrier,
            ]
        } else {
            &[CarrierQuantity::TotalProdByCarrier]
        }
    }

    fn outflows(multi_node: bool) -> &'static [CarrierQuantity] {
        if multi_node {
            &[
                CarrierQuantity::TotalUseByCarrier,
                CarrierQuantity::TotalExportByCarrier,
                CarrierQuantity::TotalDemandByCarrier,
            ]
        } else {
            &[
                CarrierQuantity::TotalUseByCarrier,
                CarrierQuantity::TotalDemandByCarrier,
            ]
        }
    }
}

impl ModelConstraint for Balance {
    fn name(&self) -> &'static str {
        "Balance"
    }

    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        // Imports and exports exist exactly when the model has several regions
        let multi_node = derived
            .carrier(CarrierQuantity::TotalImportByCarrier)
            .is_some();
        for quantity in Self::inflows(multi_node)
            .iter()
            .chain(Self::outflows(multi_node))
        {
            derived.require_carrier(self.name(), *quantity)?;
        }
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let structure = ctx.structure();
        let multi_node = structure.multi_node();
        let require = |quantity| ctx.derived.require_carrier(self.name(), quantity);
        let inflows = Self::inflows(multi_node)
            .iter()
            .map(|quantity| require(*quantity))
            .collect::<Result<Vec<_>, _>>()?;
        let outflows = Self::outflows(multi_node)
            .iter()
            .map(|quantity| require(*quantity))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for region_id in structure.regions() {
            let mut net = inflows[0][region_id].clone();
            for inflow in &inflows[1..] {
                net = net.plus(&inflow[region_id]);
            }
            for outflow in &outflows {
                net = net.minus(&outflow[region_id]);
            }
            for col in 0..net.cols() {
                rows.extend(net.column(col).map(|expr| expr.clone().equals(0.0)));
            }
        }

        Ok(rows)
    }
}

/// What one region exports to another is what the other imports from it
#[derive(Debug)]
pub struct TradeBalance;

impl ModelConstraint for TradeBalance {
    fn name(&self) -> &'static str {
        "TradeBalance"
    }

    fn applies_to(&self, _mode: Mode, topology: Topology) -> bool {
        topology == Topology::MultiNode
    }

    /// Only the import and export variables are read, so nothing needs to be derived first
    fn check(&self, _derived: &DerivedQuantities) -> Result<(), PreconditionError> {
        Ok(())
    }

    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError> {
        let variables = ctx.variables;
        let mut rows = Vec::new();
        for (importer, sources) in variables.import() {
            for (exporter, imports) in sources {
                let exports = variables.export()[exporter][importer];
                for (import, export) in imports.iter().zip(exports.iter()) {
                    // Untradeable carriers are fixed at zero on both sides
                    if variables.upper_bound(import) == 0.0 && variables.upper_bound(export) == 0.0
                    {
                        continue;
                    }
                    rows.push(LinExpr::var(import).equals(export));
                }
            }
        }

        Ok(rows)
    }
}
