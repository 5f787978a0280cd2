//! The decision variables of a model.
//!
//! Variables are allocated as contiguous blocks of columns, one block per (region, category) for
//! technology flows and capacity, one per ordered region pair for trade and one per line for
//! line capacity. All variables are non-negative; some trade columns are additionally fixed to
//! zero because the carrier is not present in one of the two regions.
use crate::expr::{ExprMatrix, LinExpr, VarId};
use crate::region::{LineID, RegionID};
use crate::structure::{Mode, ModelStructure};
use crate::technology::TechCategory;
use indexmap::IndexMap;
use log::debug;
use strum::{Display, IntoStaticStr};

/// A block of variables arranged as a matrix, stored row by row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarMatrix {
    start: usize,
    rows: usize,
    cols: usize,
}

impl VarMatrix {
    /// The number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The variable at the given position
    pub fn var(&self, row: usize, col: usize) -> VarId {
        assert!(row < self.rows && col < self.cols, "Index out of range");
        VarId::new(self.start + row * self.cols + col)
    }

    /// The variable at the given position as an expression
    pub fn expr(&self, row: usize, col: usize) -> LinExpr {
        LinExpr::var(self.var(row, col))
    }

    /// The whole block as a matrix of expressions
    pub fn to_exprs(&self) -> ExprMatrix {
        ExprMatrix::from_fn(self.rows, self.cols, |row, col| self.expr(row, col))
    }

    /// Iterate over the variables of the block in order
    pub fn iter(&self) -> impl Iterator<Item = VarId> + use<> {
        (self.start..self.start + self.rows * self.cols).map(VarId::new)
    }
}

/// Variables for each technology category of a region
pub type CategoryVars = IndexMap<TechCategory, VarMatrix>;

/// Variables for each category of each region
pub type RegionalVars = IndexMap<RegionID, CategoryVars>;

/// Trade variables for each ordered pair of regions
pub type TradeVars = IndexMap<RegionID, IndexMap<RegionID, VarMatrix>>;

/// The kinds of decision variable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum VariableKind {
    /// Production of technologies
    Production,
    /// Use (consumption) of technologies
    Use,
    /// New capacity of technologies
    NewCapacity,
    /// Imports from another region
    Import,
    /// Exports to another region
    Export,
    /// New capacity of lines
    LineNewCapacity,
    /// State of charge of storage technologies
    StorageSoc,
}

/// All the decision variables of a model
#[derive(Clone, Debug, PartialEq)]
pub struct Variables {
    upper_bounds: Vec<f64>,
    kinds: Vec<(VariableKind, usize)>,
    production: RegionalVars,
    consumption: RegionalVars,
    new_capacity: RegionalVars,
    import: TradeVars,
    export: TradeVars,
    line_new_capacity: IndexMap<LineID, VarMatrix>,
    storage_soc: IndexMap<RegionID, VarMatrix>,
}

impl Variables {
    /// Create every decision variable for a model structure
    pub fn new(structure: &ModelStructure) -> Self {
        let mut vars = Self {
            upper_bounds: Vec::new(),
            kinds: Vec::new(),
            production: IndexMap::new(),
            consumption: IndexMap::new(),
            new_capacity: IndexMap::new(),
            import: IndexMap::new(),
            export: IndexMap::new(),
            line_new_capacity: IndexMap::new(),
            storage_soc: IndexMap::new(),
        };

        let flow_rows = structure.n_years() * structure.n_time_steps();
        let planning = structure.mode() == Mode::Planning;
        for region_id in structure.regions() {
            let mut production = CategoryVars::new();
            let mut consumption = CategoryVars::new();
            let mut new_capacity = CategoryVars::new();
            for (category, techs) in structure.technologies(region_id) {
                let n_techs = techs.len();
                if category.has_production() {
                    let block = vars.allocate(VariableKind::Production, flow_rows, n_techs);
                    production.insert(*category, block);
                }
                if category.has_use() {
                    let block = vars.allocate(VariableKind::Use, flow_rows, n_techs);
                    consumption.insert(*category, block);
                }
                if planning && category.has_capacity() {
                    let block =
                        vars.allocate(VariableKind::NewCapacity, structure.n_years(), n_techs);
                    new_capacity.insert(*category, block);
                }
            }

            let n_storage = structure
                .technologies_in(region_id, TechCategory::Storage)
                .len();
            if n_storage > 0 {
                let block = vars.allocate(VariableKind::StorageSoc, flow_rows, n_storage);
                vars.storage_soc.insert(region_id.clone(), block);
            }

            vars.production.insert(region_id.clone(), production);
            vars.consumption.insert(region_id.clone(), consumption);
            vars.new_capacity.insert(region_id.clone(), new_capacity);
        }

        if structure.multi_node() {
            vars.add_trade_variables(structure, flow_rows, planning);
        }

        debug!("Created {} decision variables", vars.len());

        vars
    }

    fn add_trade_variables(&mut self, structure: &ModelStructure, flow_rows: usize, planning: bool) {
        let catalog: Vec<_> = structure.carriers().keys().collect();
        for region_a in structure.regions() {
            let mut imports = IndexMap::new();
            let mut exports = IndexMap::new();
            for region_b in structure.regions().iter().filter(|id| *id != region_a) {
                // A carrier can only be traded if both regions produce or consume it
                let tradeable: Vec<bool> = catalog
                    .iter()
                    .map(|carrier| {
                        structure.region_carriers(region_a).contains(*carrier)
                            && structure.region_carriers(region_b).contains(*carrier)
                    })
                    .collect();

                let import = self.allocate(VariableKind::Import, flow_rows, catalog.len());
                self.fix_untradeable(&import, &tradeable);
                imports.insert(region_b.clone(), import);

                let export = self.allocate(VariableKind::Export, flow_rows, catalog.len());
                self.fix_untradeable(&export, &tradeable);
                exports.insert(region_b.clone(), export);
            }
            self.import.insert(region_a.clone(), imports);
            self.export.insert(region_a.clone(), exports);
        }

        if planning {
            for line in structure.lines_list().unwrap_or_default() {
                let block = self.allocate(
                    VariableKind::LineNewCapacity,
                    structure.n_years(),
                    catalog.len(),
                );
                self.line_new_capacity.insert(line.clone(), block);
            }
        }
    }

    /// Fix the columns of a trade block for carriers which cannot be traded to zero
    fn fix_untradeable(&mut self, block: &VarMatrix, tradeable: &[bool]) {
        for (col, _) in tradeable.iter().enumerate().filter(|(_, ok)| !**ok) {
            for row in 0..block.rows() {
                self.upper_bounds[block.var(row, col).index()] = 0.0;
            }
        }
    }

    fn allocate(&mut self, kind: VariableKind, rows: usize, cols: usize) -> VarMatrix {
        let block = VarMatrix {
            start: self.upper_bounds.len(),
            rows,
            cols,
        };
        self.upper_bounds
            .extend(std::iter::repeat_n(f64::INFINITY, rows * cols));
        self.kinds.push((kind, rows * cols));

        block
    }

    /// The total number of variables
    pub fn len(&self) -> usize {
        self.upper_bounds.len()
    }

    /// Whether there are no variables
    pub fn is_empty(&self) -> bool {
        self.upper_bounds.is_empty()
    }

    /// The upper bound of a variable (the lower bound is always zero)
    pub fn upper_bound(&self, var: VarId) -> f64 {
        self.upper_bounds[var.index()]
    }

    /// The upper bound of every variable, in the order the variables were created
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    /// The number of variables of each kind
    pub fn counts(&self) -> IndexMap<VariableKind, usize> {
        let mut counts = IndexMap::new();
        for (kind, n) in &self.kinds {
            *counts.entry(*kind).or_default() += n;
        }

        counts
    }

    /// Production variables of each region and category
    pub fn production(&self) -> &RegionalVars {
        &self.production
    }

    /// Use variables of each region and category
    pub fn consumption(&self) -> &RegionalVars {
        &self.consumption
    }

    /// New capacity variables of each region and category (empty in operation mode)
    pub fn new_capacity(&self) -> &RegionalVars {
        &self.new_capacity
    }

    /// `import[a][b]` is the flow region `a` receives from region `b`
    pub fn import(&self) -> &TradeVars {
        &self.import
    }

    /// `export[a][b]` is the flow region `a` sends to region `b`
    pub fn export(&self) -> &TradeVars {
        &self.export
    }

    /// New capacity variables of each line
    pub fn line_new_capacity(&self) -> &IndexMap<LineID, VarMatrix> {
        &self.line_new_capacity
    }

    /// State of charge variables of the storage technologies of each region
    pub fn storage_soc(&self) -> &IndexMap<RegionID, VarMatrix> {
        &self.storage_soc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{
        multi_region_structure, planning_structure, single_region_structure, storage_structure,
    };
    use rstest::rstest;

    #[rstest]
    fn test_single_region_variables(single_region_structure: ModelStructure) {
        let vars = Variables::new(&single_region_structure);
        let reg1 = RegionID::new("reg1");

        let production = &vars.production()[&reg1];
        assert!(!production.contains_key(&TechCategory::Demand));
        assert_eq!(production[&TechCategory::Supply].rows(), 4);
        assert_eq!(production[&TechCategory::Supply].cols(), 3);

        let consumption = &vars.consumption()[&reg1];
        assert!(!consumption.contains_key(&TechCategory::Supply));
        assert!(consumption.contains_key(&TechCategory::ConversionPlus));

        // Operation mode, single region
        assert!(vars.new_capacity()[&reg1].is_empty());
        assert!(vars.import().is_empty());
        assert!(vars.storage_soc().is_empty());

        // Supply (3) + Conversion (1) + Conversion_plus (1), production and use for the latter
        assert_eq!(vars.len(), 4 * (3 + 1 + 1) + 4 * (1 + 1));
    }

    #[rstest]
    fn test_variables_do_not_alias(single_region_structure: ModelStructure) {
        let vars = Variables::new(&single_region_structure);
        let mut seen = vec![false; vars.len()];
        let blocks = vars
            .production()
            .values()
            .chain(vars.consumption().values())
            .flat_map(|categories| categories.values());
        for block in blocks {
            for var in block.iter() {
                assert!(!seen[var.index()]);
                seen[var.index()] = true;
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[rstest]
    fn test_planning_variables(planning_structure: ModelStructure) {
        let vars = Variables::new(&planning_structure);
        let reg1 = RegionID::new("reg1");
        let new_capacity = &vars.new_capacity()[&reg1];
        assert_eq!(new_capacity[&TechCategory::Supply].rows(), 3);
        assert!(!new_capacity.contains_key(&TechCategory::Demand));
        assert_eq!(vars.counts()[&VariableKind::NewCapacity], 6);
    }

    #[rstest]
    fn test_trade_variables(multi_region_structure: ModelStructure) {
        let vars = Variables::new(&multi_region_structure);
        let reg1 = RegionID::new("reg1");
        let reg2 = RegionID::new("reg2");

        let import = &vars.import()[&reg1][&reg2];
        assert_eq!(import.cols(), multi_region_structure.carriers().len());
        assert!(vars.line_new_capacity().is_empty());

        // Only NG is used in both regions
        let ng = multi_region_structure.carriers().get_index_of("NG").unwrap();
        let elec = multi_region_structure.carriers().get_index_of("Elec").unwrap();
        assert_eq!(vars.upper_bound(import.var(0, ng)), f64::INFINITY);
        assert_eq!(vars.upper_bound(import.var(0, elec)), 0.0);
        assert_eq!(vars.upper_bound(vars.export()[&reg2][&reg1].var(3, elec)), 0.0);
    }

    #[rstest]
    fn test_storage_variables(storage_structure: ModelStructure) {
        let vars = Variables::new(&storage_structure);
        let soc = &vars.storage_soc()[&RegionID::new("reg1")];
        assert_eq!((soc.rows(), soc.cols()), (4, 1));
        assert_eq!(vars.counts()[&VariableKind::StorageSoc], 4);
    }
}
