//! The library of constraints which can be added to a model.
//!
//! Each constraint is a self-contained unit implementing [`ModelConstraint`]. It declares which
//! modes and topologies it applies to, which extra parameter tables it needs and which derived
//! quantities it depends on, and produces a list of linear rows. A constraint which does not
//! apply to a model contributes neither rows nor parameter tables.
//!
//! The list of constraints is built explicitly with [`default_constraints`] or
//! [`constraint_list`] and passed to the schema registry and the model builder.
use crate::data::ModelData;
use crate::derived::{DerivedQuantities, RegionalMatrices};
use crate::error::PreconditionError;
use crate::expr::{Constraint, ExprMatrix, LinExpr};
use crate::region::RegionID;
use crate::schema::ParameterDef;
use crate::structure::{Mode, ModelStructure, Topology};
use crate::technology::TechKey;
use crate::variables::Variables;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::fmt;
use strum::Display;

pub mod availability;
pub mod balance;
pub mod capacity;
pub mod emission;
pub mod line;
pub mod production;
pub mod storage;

use availability::{ResourceAvailability, TechnologyAvailability};
use balance::{Balance, TradeBalance};
use capacity::{TechCapacityGlobal, TechCapacityRegional};
use emission::{EmissionCapGlobal, EmissionCapRegional};
use line::{LineAvailability, LineCapacity};
use production::{
    ProductionRamping, RenewableProductionRegional, TechProductionGlobal, TechProductionRegional,
    TechnologyEfficiency,
};
use storage::{StorageFlow, StorageSoc};

/// Everything a constraint may read when producing its rows
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    /// The validated parameter data (including the model structure)
    pub data: &'a ModelData,
    /// The decision variables
    pub variables: &'a Variables,
    /// The derived quantities
    pub derived: &'a DerivedQuantities,
}

impl BuildContext<'_> {
    /// The model structure
    pub fn structure(&self) -> &ModelStructure {
        self.data.structure()
    }
}

/// A family of constraints which can be added to a model
pub trait ModelConstraint: fmt::Debug {
    /// The name of the constraint family
    fn name(&self) -> &'static str;

    /// Whether the constraint applies to models with the given mode and topology
    fn applies_to(&self, _mode: Mode, _topology: Topology) -> bool {
        true
    }

    /// Extra global parameter tables needed by the constraint
    fn global_parameters(&self, _structure: &ModelStructure) -> Vec<ParameterDef> {
        Vec::new()
    }

    /// Extra trade parameter tables needed by the constraint
    fn trade_parameters(&self, _structure: &ModelStructure) -> Vec<ParameterDef> {
        Vec::new()
    }

    /// Extra parameter tables needed by the constraint for a region
    fn regional_parameters(
        &self,
        _structure: &ModelStructure,
        _region_id: &RegionID,
    ) -> Vec<ParameterDef> {
        Vec::new()
    }

    /// Check that every derived quantity the constraint needs has been computed
    fn check(&self, derived: &DerivedQuantities) -> Result<(), PreconditionError>;

    /// Produce the constraint's rows
    fn rules(&self, ctx: &BuildContext) -> Result<Vec<Constraint>, PreconditionError>;
}

/// Constraint families which are not part of the default list and must be requested in
/// `model.toml`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, DeserializeLabeledStringEnum)]
pub enum ConstraintKind {
    /// Limit the change in production between consecutive time steps
    #[string = "ProductionRamping"]
    ProductionRamping,
    /// Require a minimum share of production from renewable technologies
    #[string = "RenewableProductionRegional"]
    RenewableProductionRegional,
}

impl ConstraintKind {
    fn create(self) -> Box<dyn ModelConstraint> {
        match self {
            ConstraintKind::ProductionRamping => Box::new(ProductionRamping),
            ConstraintKind::RenewableProductionRegional => Box::new(RenewableProductionRegional),
        }
    }
}

/// The constraints every model has, in the order their rows are added
pub fn default_constraints() -> Vec<Box<dyn ModelConstraint>> {
    vec![
        Box::new(Balance),
        Box::new(TradeBalance),
        Box::new(ResourceAvailability),
        Box::new(TechnologyAvailability),
        Box::new(TechnologyEfficiency),
        Box::new(TechCapacityRegional),
        Box::new(TechCapacityGlobal),
        Box::new(TechProductionRegional),
        Box::new(TechProductionGlobal),
        Box::new(EmissionCapRegional),
        Box::new(EmissionCapGlobal),
        Box::new(StorageSoc),
        Box::new(StorageFlow),
        Box::new(LineAvailability),
        Box::new(LineCapacity),
    ]
}

/// The default constraints followed by the requested extra constraints
pub fn constraint_list(extra: &[ConstraintKind]) -> Vec<Box<dyn ModelConstraint>> {
    let mut constraints = default_constraints();
    constraints.extend(extra.iter().map(|kind| kind.create()));
    constraints
}

/// Rows for `lower <= expr <= upper`.
///
/// An infinite upper bound or a non-positive lower bound produces no row, as the variables are
/// non-negative anyway.
pub(crate) fn bound_rows(expr: &LinExpr, lower: f64, upper: f64, rows: &mut Vec<Constraint>) {
    if upper.is_finite() {
        rows.push(expr.clone().leq(upper));
    }
    if lower > 0.0 {
        rows.push(expr.clone().geq(lower));
    }
}

/// Bound every entry of a matrix, with `lower[col][row]` and `upper[col][row]` as bounds
pub(crate) fn bound_matrix(
    matrix: &ExprMatrix,
    lower: &[Vec<f64>],
    upper: &[Vec<f64>],
    rows: &mut Vec<Constraint>,
) {
    for col in 0..matrix.cols() {
        for row in 0..matrix.rows() {
            bound_rows(matrix.get(row, col), lower[col][row], upper[col][row], rows);
        }
    }
}

/// Sum an entry of a per-technology matrix over every region which has the technology.
///
/// `entry` is given the region's matrix for the technology's category and the technology's
/// column in it.
pub(crate) fn global_sum<F>(
    ctx: &BuildContext,
    matrices: &RegionalMatrices,
    key: &TechKey,
    mut entry: F,
) -> LinExpr
where
    F: FnMut(&ExprMatrix, usize) -> LinExpr,
{
    let structure = ctx.structure();
    let mut total = LinExpr::zero();
    for region_id in structure.regions() {
        let Some(col) = structure
            .technologies_in(region_id, key.0)
            .iter()
            .position(|tech| tech.id == key.1)
        else {
            continue;
        };
        if let Some(matrix) = matrices
            .get(region_id)
            .and_then(|categories| categories.get(&key.0))
        {
            total += entry(matrix, col);
        }
    }

    total
}
