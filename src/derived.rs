//! Quantities derived from the decision variables and parameter data.
//!
//! Every quantity other than the decision variables is an affine function of them. They are all
//! computed eagerly, in dependency order, when [`DerivedQuantities::new`] is called. Which
//! quantities exist depends on the model's mode and topology: for example, there is no new
//! capacity in operation mode. Constraints ask for the quantities they need through the
//! `require_*` methods, which report a [`PreconditionError`] if a quantity was not computed.
use crate::carrier::EmissionID;
use crate::data::ModelData;
use crate::error::PreconditionError;
use crate::expr::{Constraint, ExprMatrix};
use crate::region::{LineID, RegionID};
use crate::schema::ParameterKey;
use crate::structure::{Mode, ModelStructure};
use crate::technology::TechCategory;
use crate::variables::{RegionalVars, Variables};
use indexmap::IndexMap;
use log::debug;
use std::hash::Hash;
use strum::{Display, EnumIter, IntoStaticStr};

pub mod balance;
pub mod capacity;
pub mod costs;
pub mod emissions;
pub mod lines;
pub mod storage;

/// Matrices for each technology category of a region
pub type CategoryMatrices = IndexMap<TechCategory, ExprMatrix>;

/// Matrices for each category of each region
pub type RegionalMatrices = IndexMap<RegionID, CategoryMatrices>;

/// One matrix per region
pub type RegionMatrix = IndexMap<RegionID, ExprMatrix>;

/// Quantities with one column per technology of a (region, category).
///
/// Production and use have one row per time step of each year; the rest have one row per year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
#[allow(missing_docs)]
pub enum TechQuantity {
    #[strum(serialize = "production")]
    Production,
    #[strum(serialize = "use")]
    Use,
    #[strum(serialize = "new_capacity")]
    NewCapacity,
    #[strum(serialize = "accumulated_new_capacity")]
    AccumulatedNewCapacity,
    #[strum(serialize = "totalcapacity")]
    TotalCapacity,
    #[strum(serialize = "decommissioned_capacity")]
    DecommissionedCapacity,
    #[strum(serialize = "annual_production")]
    AnnualProduction,
    #[strum(serialize = "cost_fix")]
    CostFix,
    #[strum(serialize = "cost_fix_tax")]
    CostFixTax,
    #[strum(serialize = "cost_fix_sub")]
    CostFixSub,
    #[strum(serialize = "cost_variable")]
    CostVariable,
    #[strum(serialize = "cost_variable_tax")]
    CostVariableTax,
    #[strum(serialize = "cost_variable_sub")]
    CostVariableSub,
    #[strum(serialize = "cost_inv")]
    CostInv,
    #[strum(serialize = "cost_inv_tax")]
    CostInvTax,
    #[strum(serialize = "cost_inv_sub")]
    CostInvSub,
    #[strum(serialize = "cost_decom")]
    CostDecom,
}

/// Quantities with one row per time step of each year and one column per carrier of a region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
#[allow(missing_docs)]
pub enum CarrierQuantity {
    #[strum(serialize = "totalprodbycarrier")]
    TotalProdByCarrier,
    #[strum(serialize = "totalusebycarrier")]
    TotalUseByCarrier,
    #[strum(serialize = "totaldemandbycarrier")]
    TotalDemandByCarrier,
    #[strum(serialize = "totalimportbycarrier")]
    TotalImportByCarrier,
    #[strum(serialize = "totalexportbycarrier")]
    TotalExportByCarrier,
}

/// Quantities with a single matrix per region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
pub enum RegionQuantity {
    /// State of charge of storage technologies (one row per time step of each year)
    #[strum(serialize = "storage_soc")]
    StorageSoc,
    /// Cost of emissions (one row per year)
    #[strum(serialize = "emission_cost")]
    EmissionCost,
    /// Present value of the investment annuities (a single entry)
    #[strum(serialize = "inv_annuity")]
    InvAnnuity,
    /// Present value of the residual value of investments at the end of the horizon (a single
    /// entry)
    #[strum(serialize = "salvage")]
    Salvage,
}

/// Quantities for inter-regional lines.
///
/// Present values have a single entry; the rest have one row per year and one column per
/// carrier in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
#[allow(missing_docs)]
pub enum LineQuantity {
    #[strum(serialize = "line_new_capacity")]
    LineNewCapacity,
    #[strum(serialize = "line_totalcapacity")]
    LineTotalCapacity,
    #[strum(serialize = "line_decommissioned_capacity")]
    LineDecommissionedCapacity,
    #[strum(serialize = "line_annual_flow")]
    LineAnnualFlow,
    #[strum(serialize = "line_cost_fix")]
    LineCostFix,
    #[strum(serialize = "line_cost_variable")]
    LineCostVariable,
    #[strum(serialize = "line_cost_inv")]
    LineCostInv,
    #[strum(serialize = "line_cost_decom")]
    LineCostDecom,
    #[strum(serialize = "line_inv_annuity")]
    LineInvAnnuity,
    #[strum(serialize = "line_salvage")]
    LineSalvage,
}

/// Emission quantities
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Emissions {
    /// Annual emissions of each type, by region and category (one column per technology)
    pub by_type: IndexMap<EmissionID, RegionalMatrices>,
    /// Annual emissions of each type, summed for each region (a single column)
    pub regional: IndexMap<EmissionID, RegionMatrix>,
}

/// Every quantity derived from the decision variables
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedQuantities {
    tech: IndexMap<TechQuantity, RegionalMatrices>,
    carrier: IndexMap<CarrierQuantity, RegionMatrix>,
    region: IndexMap<RegionQuantity, RegionMatrix>,
    line: IndexMap<LineQuantity, IndexMap<LineID, ExprMatrix>>,
    emissions: Emissions,
    definitions: Vec<Constraint>,
}

/// Look up a quantity, reporting which constraint needed it if it is missing
fn require<'a, K, V>(
    map: &'a IndexMap<K, V>,
    constraint: &'static str,
    key: K,
) -> Result<&'a V, PreconditionError>
where
    K: Copy + Hash + Eq + Into<&'static str>,
{
    map.get(&key).ok_or_else(|| PreconditionError {
        constraint,
        missing: key.into(),
    })
}

impl DerivedQuantities {
    /// Compute every quantity for the given data and variables
    pub fn new(data: &ModelData, variables: &Variables) -> Self {
        let structure = data.structure();
        let mut derived = Self {
            tech: IndexMap::new(),
            carrier: IndexMap::new(),
            region: IndexMap::new(),
            line: IndexMap::new(),
            emissions: Emissions::default(),
            definitions: Vec::new(),
        };

        derived.insert_tech(TechQuantity::Production, to_exprs(variables.production()));
        derived.insert_tech(TechQuantity::Use, to_exprs(variables.consumption()));
        for (quantity, matrices) in capacity::capacity_quantities(data, variables) {
            derived.insert_tech(quantity, matrices);
        }
        derived.insert_tech(
            TechQuantity::AnnualProduction,
            capacity::annual_production(structure, &derived.tech[&TechQuantity::Production]),
        );

        for (quantity, matrices) in costs::technology_costs(data, &derived.tech) {
            derived.insert_tech(quantity, matrices);
        }

        for (quantity, matrices) in balance::carrier_balances(data, variables) {
            derived.carrier.insert(quantity, matrices);
        }

        let (soc, definitions) = storage::state_of_charge(data, variables, &derived.tech);
        if !soc.is_empty() {
            derived.region.insert(RegionQuantity::StorageSoc, soc);
        }
        derived.definitions = definitions;

        derived.emissions =
            emissions::emissions(data, &derived.tech[&TechQuantity::AnnualProduction]);
        derived.region.insert(
            RegionQuantity::EmissionCost,
            emissions::emission_cost(data, &derived.emissions),
        );

        if structure.mode() == Mode::Planning {
            let (annuity, salvage) = costs::investment_present_values(data, &derived.tech);
            derived.region.insert(RegionQuantity::InvAnnuity, annuity);
            derived.region.insert(RegionQuantity::Salvage, salvage);
        }

        if structure.multi_node() {
            derived.line = lines::line_quantities(data, variables);
        }

        debug!(
            "Computed {} technology, {} carrier, {} regional and {} line quantities",
            derived.tech.len(),
            derived.carrier.len(),
            derived.region.len(),
            derived.line.len()
        );

        derived
    }

    fn insert_tech(&mut self, quantity: TechQuantity, matrices: RegionalMatrices) {
        self.tech.insert(quantity, matrices);
    }

    /// A technology quantity, if it was computed for this model
    pub fn tech(&self, quantity: TechQuantity) -> Option<&RegionalMatrices> {
        self.tech.get(&quantity)
    }

    /// A carrier quantity, if it was computed for this model
    pub fn carrier(&self, quantity: CarrierQuantity) -> Option<&RegionMatrix> {
        self.carrier.get(&quantity)
    }

    /// A regional quantity, if it was computed for this model
    pub fn region(&self, quantity: RegionQuantity) -> Option<&RegionMatrix> {
        self.region.get(&quantity)
    }

    /// A line quantity, if it was computed for this model
    pub fn line(&self, quantity: LineQuantity) -> Option<&IndexMap<LineID, ExprMatrix>> {
        self.line.get(&quantity)
    }

    /// Emissions by type, region and category
    pub fn emissions(&self) -> &Emissions {
        &self.emissions
    }

    /// Equalities which define auxiliary variables (e.g. state of charge) in terms of flows.
    ///
    /// These must always be part of the problem.
    pub fn definitions(&self) -> &[Constraint] {
        &self.definitions
    }

    /// Get a technology quantity on behalf of a constraint
    pub fn require_tech(
        &self,
        constraint: &'static str,
        quantity: TechQuantity,
    ) -> Result<&RegionalMatrices, PreconditionError> {
        require(&self.tech, constraint, quantity)
    }

    /// Get a carrier quantity on behalf of a constraint
    pub fn require_carrier(
        &self,
        constraint: &'static str,
        quantity: CarrierQuantity,
    ) -> Result<&RegionMatrix, PreconditionError> {
        require(&self.carrier, constraint, quantity)
    }

    /// Get a regional quantity on behalf of a constraint
    pub fn require_region(
        &self,
        constraint: &'static str,
        quantity: RegionQuantity,
    ) -> Result<&RegionMatrix, PreconditionError> {
        require(&self.region, constraint, quantity)
    }

    /// Get a line quantity on behalf of a constraint
    pub fn require_line(
        &self,
        constraint: &'static str,
        quantity: LineQuantity,
    ) -> Result<&IndexMap<LineID, ExprMatrix>, PreconditionError> {
        require(&self.line, constraint, quantity)
    }

    /// Iterate over every technology quantity
    pub fn iter_tech(&self) -> impl Iterator<Item = (TechQuantity, &RegionalMatrices)> {
        self.tech.iter().map(|(quantity, matrices)| (*quantity, matrices))
    }

    /// Iterate over every carrier quantity
    pub fn iter_carrier(&self) -> impl Iterator<Item = (CarrierQuantity, &RegionMatrix)> {
        self.carrier.iter().map(|(quantity, matrices)| (*quantity, matrices))
    }

    /// Iterate over every regional quantity
    pub fn iter_region(&self) -> impl Iterator<Item = (RegionQuantity, &RegionMatrix)> {
        self.region.iter().map(|(quantity, matrices)| (*quantity, matrices))
    }

    /// Iterate over every line quantity
    pub fn iter_line(
        &self,
    ) -> impl Iterator<Item = (LineQuantity, &IndexMap<LineID, ExprMatrix>)> {
        self.line.iter().map(|(quantity, matrices)| (*quantity, matrices))
    }

    /// A copy with one technology quantity missing
    #[cfg(test)]
    pub(crate) fn without_tech(&self, quantity: TechQuantity) -> Self {
        let mut derived = self.clone();
        derived.tech.shift_remove(&quantity);
        derived
    }
}

/// Convert blocks of variables into matrices of expressions
pub(crate) fn to_exprs(vars: &RegionalVars) -> RegionalMatrices {
    vars.iter()
        .map(|(region_id, categories)| {
            let matrices = categories
                .iter()
                .map(|(category, block)| (*category, block.to_exprs()))
                .collect();
            (region_id.clone(), matrices)
        })
        .collect()
}

/// For each region and each category passing `filter`, build a matrix with `f`
pub(crate) fn per_category<F>(
    structure: &ModelStructure,
    filter: fn(TechCategory) -> bool,
    mut f: F,
) -> RegionalMatrices
where
    F: FnMut(&RegionID, TechCategory) -> ExprMatrix,
{
    structure
        .regions()
        .iter()
        .map(|region_id| {
            let matrices = structure
                .technologies(region_id)
                .keys()
                .filter(|category| filter(**category))
                .map(|category| (*category, f(region_id, *category)))
                .collect();
            (region_id.clone(), matrices)
        })
        .collect()
}

/// One column of parameter values per technology of a category
pub(crate) fn tech_params(
    data: &ModelData,
    region_id: &RegionID,
    category: TechCategory,
    key: ParameterKey,
) -> Vec<Vec<f64>> {
    data.structure()
        .technologies_in(region_id, category)
        .iter()
        .map(|tech| data.tech(region_id, key, tech))
        .collect()
}
