//! The parameter schema registry.
//!
//! For a given [`ModelStructure`] and list of active constraints, this module computes exactly
//! which parameter tables are required, along with their default values, index and columns. The
//! same schema is used to generate blank templates for users to fill in and to validate the
//! tables they provide.
use crate::carrier::CarrierID;
use crate::constraints::ModelConstraint;
use crate::region::RegionID;
use crate::structure::{Mode, ModelStructure, Topology};
use crate::table::{ColumnKey, ParameterTable, RowKey};
use crate::technology::{TaxOrSub, TechCategory, Technology};
use indexmap::{IndexMap, IndexSet};
use itertools::iproduct;
use strum::{Display, EnumString, IntoStaticStr};

/// The name of a parameter table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)]
pub enum ParameterKey {
    // Regional
    TechResidualCap,
    TechFixedCost,
    TechVarCost,
    FixTaxsub,
    VarTaxsub,
    TechEfficiency,
    TechCapacityFactor,
    ResCapacityFactor,
    AnnualprodPerUnitcapacity,
    CarrierRatioIn,
    CarrierRatioOut,
    Demand,
    SpecificEmission,
    EmissionTax,
    StorageChargeEfficiency,
    StorageDischargeEfficiency,
    StorageMinSoc,
    StorageInitialSoc,
    StorageChargeTime,
    StorageDischargeTime,
    TechLifetime,
    EconomicLifetime,
    InterestRate,
    DiscountRate,
    TechInvestmentCost,
    TechDecommissioningCost,
    InvTaxsub,
    TechMaxTotcap,
    TechMinTotcap,
    TechMaxNewcap,
    TechMinNewcap,
    TechMaxProduction,
    TechMinProduction,
    EmissionCapAnnual,
    ProdMaxRamp,
    RenewableTech,
    MinRenewableProduction,
    // Trade
    LineEfficiency,
    LineCapacityFactor,
    LineAnnualprodPerUnitcapacity,
    LineResidualCap,
    LineFixedCost,
    LineVarCost,
    LineLifetime,
    LineEconomicLifetime,
    LineInterestRate,
    LineInvestmentCost,
    LineDecommissioningCost,
    LineMaxTotcap,
    LineMinTotcap,
    LineMaxNewcap,
    LineMinNewcap,
    // Global
    GlobalDiscountRate,
    GlobalMaxTotcap,
    GlobalMinTotcap,
    GlobalMaxNewcap,
    GlobalMinNewcap,
    GlobalMaxProduction,
    GlobalMinProduction,
    GlobalEmissionCapAnnual,
}

impl ParameterKey {
    /// Whether the model divides by this parameter, so that it must be positive
    pub fn is_divisor(self) -> bool {
        matches!(
            self,
            Self::StorageDischargeEfficiency | Self::StorageChargeTime | Self::StorageDischargeTime
        )
    }
}

/// The kind of rows a table has
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    /// A single row of time-invariant values
    Performance,
    /// One row per modelled year
    Years,
    /// One row per time step of each modelled year
    YearTimeSteps,
}

/// The kind of columns a table has.
///
/// Each variant corresponds to a variant of [`ColumnKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnLayout {
    /// A single value column
    Value,
    /// (category, technology)
    Technology,
    /// (tax or subsidy, category, technology)
    TaxedTechnology,
    /// (technology, carrier)
    TechnologyCarrier,
    /// Emission type
    Emission,
    /// (emission type, category, technology)
    EmissionTechnology,
    /// (line, carrier)
    LineCarrier,
}

/// Which group of tables a table belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParameterGroup {
    /// Tables which apply to all regions
    Global,
    /// Tables describing inter-regional lines
    Trade,
    /// Tables for a single region
    Regional(RegionID),
}

impl std::fmt::Display for ParameterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterGroup::Global => write!(f, "global"),
            ParameterGroup::Trade => write!(f, "trade"),
            ParameterGroup::Regional(region_id) => write!(f, "{region_id}"),
        }
    }
}

/// The definition of a required parameter table
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDef {
    /// The table's name
    pub key: ParameterKey,
    /// The value used for entries in blank templates
    pub default: f64,
    /// The kind of rows
    pub index_kind: IndexKind,
    /// The kind of columns
    pub column_layout: ColumnLayout,
    /// The exact rows the table must have
    pub index: IndexSet<RowKey>,
    /// The exact columns the table must have
    pub columns: IndexSet<ColumnKey>,
}

impl ParameterDef {
    /// Create a new [`ParameterDef`], building its index from the model structure
    pub fn new(
        structure: &ModelStructure,
        key: ParameterKey,
        default: f64,
        index_kind: IndexKind,
        column_layout: ColumnLayout,
        columns: IndexSet<ColumnKey>,
    ) -> Self {
        Self {
            key,
            default,
            index_kind,
            column_layout,
            index: build_index(structure, index_kind),
            columns,
        }
    }

    /// The name of the table (also used for file names)
    pub fn table_name(&self) -> &'static str {
        self.key.into()
    }

    /// A table of the declared shape with every entry set to the default value
    pub fn default_table(&self) -> ParameterTable {
        ParameterTable::filled(self.index.clone(), self.columns.clone(), self.default)
    }
}

/// Build the rows for a table
pub fn build_index(structure: &ModelStructure, index_kind: IndexKind) -> IndexSet<RowKey> {
    match index_kind {
        IndexKind::Performance => IndexSet::from([RowKey::Performance]),
        IndexKind::Years => structure.years().iter().map(|y| RowKey::Year(*y)).collect(),
        IndexKind::YearTimeSteps => {
            iproduct!(structure.years(), structure.time_steps().iter_ids())
                .map(|(year, time_step)| RowKey::YearStep(*year, time_step.clone()))
                .collect()
        }
    }
}

/// Columns for the technologies of a region whose category passes `filter`
pub fn technology_columns<F>(
    structure: &ModelStructure,
    region_id: &RegionID,
    filter: F,
) -> IndexSet<ColumnKey>
where
    F: Fn(TechCategory) -> bool,
{
    structure
        .iter_technologies(region_id)
        .filter(|tech| filter(tech.category))
        .map(|tech| ColumnKey::Technology(tech.key()))
        .collect()
}

/// Tax and subsidy columns for the technologies of a region whose category passes `filter`.
///
/// The technology columns are duplicated: first every technology tagged as a tax, then every
/// technology tagged as a subsidy.
pub fn taxed_technology_columns<F>(
    structure: &ModelStructure,
    region_id: &RegionID,
    filter: F,
) -> IndexSet<ColumnKey>
where
    F: Fn(TechCategory) -> bool,
{
    let techs: Vec<&Technology> = structure
        .iter_technologies(region_id)
        .filter(|tech| filter(tech.category))
        .collect();

    [TaxOrSub::Tax, TaxOrSub::Sub]
        .into_iter()
        .flat_map(|kind| {
            techs
                .iter()
                .map(move |tech| ColumnKey::TaxedTechnology(kind, tech.key()))
        })
        .collect()
}

/// (technology, carrier) columns for the inputs or outputs of Conversion_plus technologies
pub fn conversion_plus_columns(
    structure: &ModelStructure,
    region_id: &RegionID,
    outputs: bool,
) -> IndexSet<ColumnKey> {
    structure
        .technologies_in(region_id, TechCategory::ConversionPlus)
        .iter()
        .flat_map(|tech| {
            let carriers: &[CarrierID] = if outputs { &tech.outputs } else { &tech.inputs };
            carriers
                .iter()
                .map(|carrier| ColumnKey::TechnologyCarrier(tech.id.clone(), carrier.clone()))
        })
        .collect()
}

/// One column per emission type
pub fn emission_columns(structure: &ModelStructure) -> IndexSet<ColumnKey> {
    structure
        .emissions()
        .iter()
        .map(|emission| ColumnKey::Emission(emission.clone()))
        .collect()
}

/// (emission type, technology) columns for the emitting technologies of a region
pub fn emission_technology_columns(
    structure: &ModelStructure,
    region_id: &RegionID,
) -> IndexSet<ColumnKey> {
    iproduct!(
        structure.emissions(),
        structure
            .iter_technologies(region_id)
            .filter(|tech| tech.category.emits())
    )
    .map(|(emission, tech)| ColumnKey::EmissionTechnology(emission.clone(), tech.key()))
    .collect()
}

/// (line, carrier) columns for every line and every carrier in the catalog
pub fn line_carrier_columns(structure: &ModelStructure) -> IndexSet<ColumnKey> {
    let Some(lines) = structure.lines_list() else {
        return IndexSet::new();
    };

    iproduct!(lines, structure.carriers().keys())
        .map(|(line, carrier)| ColumnKey::LineCarrier(line.clone(), carrier.clone()))
        .collect()
}

/// Columns for every distinct technology across all regions whose category passes `filter`
pub fn global_technology_columns<F>(structure: &ModelStructure, filter: F) -> IndexSet<ColumnKey>
where
    F: Fn(TechCategory) -> bool,
{
    structure
        .global_tech_keys()
        .into_iter()
        .filter(|key| filter(key.0))
        .map(ColumnKey::Technology)
        .collect()
}

/// The single value column
pub fn value_column() -> IndexSet<ColumnKey> {
    IndexSet::from([ColumnKey::Value])
}

fn all_with_capacity(category: TechCategory) -> bool {
    category.has_capacity()
}

/// Tables every region needs regardless of which constraints are active
fn regional_base(structure: &ModelStructure, region_id: &RegionID) -> Vec<ParameterDef> {
    use ColumnLayout as L;
    use IndexKind as I;
    use ParameterKey as K;

    let def = |key, default, index, layout, columns| {
        ParameterDef::new(structure, key, default, index, layout, columns)
    };
    let techs = |filter: fn(TechCategory) -> bool| technology_columns(structure, region_id, filter);
    let taxed = || taxed_technology_columns(structure, region_id, all_with_capacity);
    let storage = || techs(|c| c == TechCategory::Storage);

    let mut defs = vec![
        def(K::TechResidualCap, 0.0, I::Years, L::Technology, techs(all_with_capacity)),
        def(K::TechFixedCost, 0.0, I::Years, L::Technology, techs(all_with_capacity)),
        def(K::TechVarCost, 0.0, I::Years, L::Technology, techs(all_with_capacity)),
        def(K::FixTaxsub, 0.0, I::Years, L::TaxedTechnology, taxed()),
        def(K::VarTaxsub, 0.0, I::Years, L::TaxedTechnology, taxed()),
        def(
            K::TechEfficiency,
            1.0,
            I::Years,
            L::Technology,
            techs(TechCategory::has_efficiency),
        ),
        def(K::TechCapacityFactor, 1.0, I::Years, L::Technology, techs(all_with_capacity)),
        def(
            K::ResCapacityFactor,
            1.0,
            I::YearTimeSteps,
            L::Technology,
            techs(all_with_capacity),
        ),
        def(
            K::AnnualprodPerUnitcapacity,
            1.0,
            I::Performance,
            L::Technology,
            techs(all_with_capacity),
        ),
        def(
            K::CarrierRatioIn,
            1.0,
            I::YearTimeSteps,
            L::TechnologyCarrier,
            conversion_plus_columns(structure, region_id, false),
        ),
        def(
            K::CarrierRatioOut,
            1.0,
            I::YearTimeSteps,
            L::TechnologyCarrier,
            conversion_plus_columns(structure, region_id, true),
        ),
        def(
            K::Demand,
            0.0,
            I::YearTimeSteps,
            L::Technology,
            techs(|c| c == TechCategory::Demand),
        ),
        def(
            K::SpecificEmission,
            0.0,
            I::Years,
            L::EmissionTechnology,
            emission_technology_columns(structure, region_id),
        ),
        def(K::EmissionTax, 0.0, I::Years, L::Emission, emission_columns(structure)),
        def(K::StorageChargeEfficiency, 1.0, I::Performance, L::Technology, storage()),
        def(K::StorageDischargeEfficiency, 1.0, I::Performance, L::Technology, storage()),
        def(K::StorageMinSoc, 0.0, I::Performance, L::Technology, storage()),
        def(K::StorageInitialSoc, 0.0, I::Performance, L::Technology, storage()),
        def(K::StorageChargeTime, 1.0, I::Performance, L::Technology, storage()),
        def(K::StorageDischargeTime, 1.0, I::Performance, L::Technology, storage()),
    ];

    if structure.mode() == Mode::Planning {
        defs.extend([
            def(K::TechLifetime, 1.0, I::Performance, L::Technology, techs(all_with_capacity)),
            def(
                K::EconomicLifetime,
                1.0,
                I::Performance,
                L::Technology,
                techs(all_with_capacity),
            ),
            def(K::InterestRate, 0.05, I::Performance, L::Technology, techs(all_with_capacity)),
            def(K::DiscountRate, 0.05, I::Years, L::Value, value_column()),
            def(K::TechInvestmentCost, 0.0, I::Years, L::Technology, techs(all_with_capacity)),
            def(
                K::TechDecommissioningCost,
                0.0,
                I::Years,
                L::Technology,
                techs(all_with_capacity),
            ),
            def(K::InvTaxsub, 0.0, I::Years, L::TaxedTechnology, taxed()),
        ]);
    }

    defs
}

/// Tables describing the lines of a multi-region model
fn trade_base(structure: &ModelStructure) -> Vec<ParameterDef> {
    use ColumnLayout as L;
    use IndexKind as I;
    use ParameterKey as K;

    if !structure.multi_node() {
        return Vec::new();
    }

    let def = |key, default, index| {
        ParameterDef::new(
            structure,
            key,
            default,
            index,
            L::LineCarrier,
            line_carrier_columns(structure),
        )
    };
    let mut defs = vec![
        def(K::LineEfficiency, 1.0, I::Years),
        def(K::LineCapacityFactor, 1.0, I::Years),
        def(K::LineAnnualprodPerUnitcapacity, 1.0, I::Performance),
        def(K::LineResidualCap, 0.0, I::Years),
        def(K::LineFixedCost, 0.0, I::Years),
        def(K::LineVarCost, 0.0, I::Years),
    ];
    if structure.mode() == Mode::Planning {
        defs.extend([
            def(K::LineLifetime, 1.0, I::Performance),
            def(K::LineEconomicLifetime, 1.0, I::Performance),
            def(K::LineInterestRate, 0.05, I::Performance),
            def(K::LineInvestmentCost, 0.0, I::Years),
            def(K::LineDecommissioningCost, 0.0, I::Years),
        ]);
    }

    defs
}

/// Tables which apply to the whole multi-region model
fn global_base(structure: &ModelStructure) -> Vec<ParameterDef> {
    if structure.topology() == Topology::MultiNode && structure.mode() == Mode::Planning {
        vec![ParameterDef::new(
            structure,
            ParameterKey::GlobalDiscountRate,
            0.05,
            IndexKind::Years,
            ColumnLayout::Value,
            value_column(),
        )]
    } else {
        Vec::new()
    }
}

/// A map of table definitions by name
pub type ParameterDefMap = IndexMap<ParameterKey, ParameterDef>;

/// The complete set of required parameter tables for a model
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSchema {
    /// Tables which apply to the whole model
    pub global: ParameterDefMap,
    /// Tables describing inter-regional lines
    pub trade: ParameterDefMap,
    /// Tables for each region
    pub regional: IndexMap<RegionID, ParameterDefMap>,
}

impl ParameterSchema {
    /// Compute the required tables for a model structure and list of constraints.
    ///
    /// Constraints which don't apply to the model's mode and topology contribute no tables.
    /// Tables with no columns (e.g. storage parameters for a region without storage) are not
    /// required.
    pub fn new(structure: &ModelStructure, constraints: &[Box<dyn ModelConstraint>]) -> Self {
        let (mode, topology) = (structure.mode(), structure.topology());
        let active: Vec<_> = constraints
            .iter()
            .filter(|constraint| constraint.applies_to(mode, topology))
            .collect();

        let mut global = global_base(structure);
        let mut trade = trade_base(structure);
        for constraint in &active {
            global.extend(constraint.global_parameters(structure));
            trade.extend(constraint.trade_parameters(structure));
        }

        let regional = structure
            .regions()
            .iter()
            .map(|region_id| {
                let mut defs = regional_base(structure, region_id);
                for constraint in &active {
                    defs.extend(constraint.regional_parameters(structure, region_id));
                }
                (region_id.clone(), collect_defs(defs))
            })
            .collect();

        Self {
            global: collect_defs(global),
            trade: collect_defs(trade),
            regional,
        }
    }

    /// Iterate over every group of tables
    pub fn iter_groups(&self) -> impl Iterator<Item = (ParameterGroup, &ParameterDefMap)> {
        [
            (ParameterGroup::Global, &self.global),
            (ParameterGroup::Trade, &self.trade),
        ]
        .into_iter()
        .chain(
            self.regional
                .iter()
                .map(|(region_id, defs)| (ParameterGroup::Regional(region_id.clone()), defs)),
        )
    }

    /// Get the definitions for a group of tables
    pub fn group(&self, group: &ParameterGroup) -> Option<&ParameterDefMap> {
        match group {
            ParameterGroup::Global => Some(&self.global),
            ParameterGroup::Trade => Some(&self.trade),
            ParameterGroup::Regional(region_id) => self.regional.get(region_id),
        }
    }

    /// Blank tables for every definition, filled with default values
    pub fn default_tables(&self) -> ParameterData {
        let tables = |defs: &ParameterDefMap| -> TableMap {
            defs.iter()
                .map(|(key, def)| (*key, def.default_table()))
                .collect()
        };

        ParameterData {
            global: tables(&self.global),
            trade: tables(&self.trade),
            regional: self
                .regional
                .iter()
                .map(|(region_id, defs)| (region_id.clone(), tables(defs)))
                .collect(),
        }
    }

    /// The total number of required tables
    pub fn n_tables(&self) -> usize {
        self.iter_groups().map(|(_, defs)| defs.len()).sum()
    }
}

/// Drop definitions with no columns and keep the first definition for each key
fn collect_defs(defs: Vec<ParameterDef>) -> ParameterDefMap {
    let mut map = ParameterDefMap::new();
    for def in defs {
        if !def.columns.is_empty() {
            map.entry(def.key).or_insert(def);
        }
    }

    map
}

/// A map of parameter tables by name
pub type TableMap = IndexMap<ParameterKey, ParameterTable>;

/// Parameter tables for every group, before validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterData {
    /// Tables which apply to the whole model
    pub global: TableMap,
    /// Tables describing inter-regional lines
    pub trade: TableMap,
    /// Tables for each region
    pub regional: IndexMap<RegionID, TableMap>,
}

impl ParameterData {
    /// Get a mutable reference to a group of tables, if present
    pub fn group_mut(&mut self, group: &ParameterGroup) -> Option<&mut TableMap> {
        match group {
            ParameterGroup::Global => Some(&mut self.global),
            ParameterGroup::Trade => Some(&mut self.trade),
            ParameterGroup::Regional(region_id) => self.regional.get_mut(region_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{ConstraintKind, constraint_list, default_constraints};
    use crate::fixture::{multi_region_structure, single_region_structure};
    use crate::technology::TechKey;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_parameter_key_names() {
        assert_eq!(ParameterKey::TechResidualCap.to_string(), "tech_residual_cap");
        assert_eq!(
            ParameterKey::AnnualprodPerUnitcapacity.to_string(),
            "annualprod_per_unitcapacity"
        );
        assert_eq!(
            ParameterKey::from_str("emission_cap_annual").unwrap(),
            ParameterKey::EmissionCapAnnual
        );
    }

    #[rstest]
    fn test_operation_single_node_schema(single_region_structure: ModelStructure) {
        let schema = ParameterSchema::new(&single_region_structure, &default_constraints());
        assert!(schema.global.is_empty());
        assert!(schema.trade.is_empty());

        let reg1 = &schema.regional[&RegionID::new("reg1")];
        // Operation mode: no investment tables or new capacity bounds
        assert!(!reg1.contains_key(&ParameterKey::TechInvestmentCost));
        assert!(!reg1.contains_key(&ParameterKey::TechMaxNewcap));
        // No storage technologies in this region
        assert!(!reg1.contains_key(&ParameterKey::StorageMinSoc));
        assert!(reg1.contains_key(&ParameterKey::EmissionCapAnnual));
        assert!(reg1.contains_key(&ParameterKey::TechMaxProduction));

        let demand = &reg1[&ParameterKey::Demand];
        assert_eq!(demand.index.len(), single_region_structure.n_time_steps());
        assert_eq!(demand.columns.len(), 2);

        // Efficiency excludes Supply technologies
        let efficiency = &reg1[&ParameterKey::TechEfficiency];
        assert!(efficiency.columns.iter().all(|col| matches!(
            col,
            ColumnKey::Technology(TechKey(category, _)) if *category != TechCategory::Supply
        )));
    }

    #[rstest]
    fn test_taxed_columns_duplicated(single_region_structure: ModelStructure) {
        let reg1 = RegionID::new("reg1");
        let columns = taxed_technology_columns(&single_region_structure, &reg1, |c| {
            c == TechCategory::Supply
        });
        let names: Vec<_> = columns.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            [
                "Tax/Supply/NG_extr",
                "Tax/Supply/Elec_import",
                "Tax/Supply/Heat_import",
                "Sub/Supply/NG_extr",
                "Sub/Supply/Elec_import",
                "Sub/Supply/Heat_import",
            ]
        );
    }

    #[rstest]
    fn test_multi_node_schema(multi_region_structure: ModelStructure) {
        let schema = ParameterSchema::new(&multi_region_structure, &default_constraints());

        // Operation mode: no global discount rate, but global caps apply
        assert!(!schema.global.contains_key(&ParameterKey::GlobalDiscountRate));
        assert!(schema.global.contains_key(&ParameterKey::GlobalEmissionCapAnnual));
        assert!(!schema.global.contains_key(&ParameterKey::GlobalMaxTotcap));

        let efficiency = &schema.trade[&ParameterKey::LineEfficiency];
        assert_eq!(
            efficiency.columns.len(),
            multi_region_structure.carriers().len()
        );
        assert!(!schema.trade.contains_key(&ParameterKey::LineMaxNewcap));
    }

    #[rstest]
    fn test_optional_constraint_adds_tables(single_region_structure: ModelStructure) {
        let reg1 = RegionID::new("reg1");
        let schema = ParameterSchema::new(&single_region_structure, &default_constraints());
        assert!(!schema.regional[&reg1].contains_key(&ParameterKey::ProdMaxRamp));

        let constraints = constraint_list(&[ConstraintKind::ProductionRamping]);
        let schema = ParameterSchema::new(&single_region_structure, &constraints);
        assert!(schema.regional[&reg1].contains_key(&ParameterKey::ProdMaxRamp));
    }

    #[rstest]
    fn test_default_tables(single_region_structure: ModelStructure) {
        let schema = ParameterSchema::new(&single_region_structure, &default_constraints());
        let data = schema.default_tables();
        let reg1 = RegionID::new("reg1");
        let table = &data.regional[&reg1][&ParameterKey::TechEfficiency];
        assert!(table.iter().all(|(_, _, value)| value == 1.0));
        assert_eq!(schema.n_tables(), data.regional[&reg1].len());
    }
}
