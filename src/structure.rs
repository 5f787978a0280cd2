//! The structural description of a model: its regions, years, time steps, carriers and
//! technologies.
//!
//! A [`ModelStructure`] is validated once on construction and is immutable afterwards. Every
//! derived collection (technologies per category, lines, carriers per region etc.) is computed at
//! construction time so that later lookups are cheap.
use crate::carrier::{Carrier, CarrierID, CarrierType, EmissionID};
use crate::error::SchemaError;
use crate::input::is_sorted_and_unique;
use crate::region::{LineID, RegionID, lines_for_regions};
use crate::technology::{TechCategory, TechKey, Technology, TechnologyID};
use crate::time_step::{ParamValue, TimeStepID, TimeStepInfo};
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::str::FromStr;
use strum::Display;

/// Whether the model decides on new capacity or only on dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, DeserializeLabeledStringEnum)]
pub enum Mode {
    /// Capacity expansion over several years
    #[string = "planning"]
    Planning,
    /// Dispatch of existing capacity in a single year
    #[string = "operation"]
    Operation,
}

/// Whether the model has one region or several linked regions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Topology {
    /// A single region
    SingleNode,
    /// Several regions, which may trade carriers over lines
    MultiNode,
}

/// A row of the technologies table
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TechnologyDefinition {
    /// The region the technology belongs to
    pub region: String,
    /// The technology's category
    pub category: String,
    /// The technology's name
    pub technology: String,
    /// Unit of capacity
    #[serde(default)]
    pub capacity_unit: String,
    /// Unit of production
    #[serde(default)]
    pub production_unit: String,
}

/// A row of the carrier catalog
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CarrierDefinition {
    /// The carrier's name
    pub carrier: String,
    /// The carrier's type
    #[serde(rename = "type")]
    pub kind: String,
    /// Unit of the carrier
    #[serde(default)]
    pub unit: String,
}

/// A row of the carrier input or output tables
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CarrierMapping {
    /// The region of the technology
    pub region: String,
    /// The technology
    pub technology: String,
    /// The carrier consumed or produced
    pub carrier: String,
}

/// The raw, unvalidated description of a model's structure
#[derive(Clone, Debug, PartialEq)]
pub struct StructureDefinition {
    /// Planning or operation
    pub mode: Mode,
    /// Region names
    pub regions: Vec<String>,
    /// Modelled years
    pub years: Vec<u32>,
    /// Number of calendar years represented by each modelled year
    pub period_step: u32,
    /// Sub-annual time steps and their fractions of the year, if any
    pub time_steps: Option<Vec<(String, f64)>>,
    /// Emission types
    pub emissions: Vec<String>,
    /// The technologies of every region
    pub technologies: Vec<TechnologyDefinition>,
    /// The carrier catalog
    pub carriers: Vec<CarrierDefinition>,
    /// Which carriers each technology consumes
    pub carrier_input: Vec<CarrierMapping>,
    /// Which carriers each technology produces
    pub carrier_output: Vec<CarrierMapping>,
}

/// The technologies of a region, grouped by category.
///
/// Only categories with at least one technology are present and categories are in canonical
/// order.
pub type RegionTechnologies = IndexMap<TechCategory, Vec<Technology>>;

/// The validated structure of a model
#[derive(Clone, Debug, PartialEq)]
pub struct ModelStructure {
    mode: Mode,
    regions: IndexSet<RegionID>,
    years: Vec<u32>,
    period_step: u32,
    time_steps: TimeStepInfo,
    carriers: IndexMap<CarrierID, Carrier>,
    emissions: IndexSet<EmissionID>,
    technologies: IndexMap<RegionID, RegionTechnologies>,
    region_carriers: IndexMap<RegionID, IndexSet<CarrierID>>,
    lines: Option<Vec<LineID>>,
}

impl ModelStructure {
    /// Validate a [`StructureDefinition`] and build a [`ModelStructure`] from it
    pub fn new(definition: StructureDefinition) -> Result<Self> {
        let regions = check_regions(&definition.regions)?;
        check_years(definition.mode, &definition.years)?;
        ensure!(definition.period_step > 0, "period_step must be greater than zero");

        let time_steps = match &definition.time_steps {
            None => TimeStepInfo::default(),
            Some(time_steps) => TimeStepInfo::new(
                time_steps
                    .iter()
                    .map(|(id, fraction)| (TimeStepID::new(id), *fraction)),
            )
            .context("Invalid time steps")?,
        };

        let carriers = read_carriers(&definition.carriers)?;

        let mut emissions = IndexSet::new();
        for emission in &definition.emissions {
            ensure!(
                emissions.insert(EmissionID::new(emission)),
                "Duplicate emission type: {emission}"
            );
        }

        let mut technologies = read_technologies(&regions, &definition.technologies)?;
        add_carrier_mappings(
            &mut technologies,
            &carriers,
            &definition.carrier_input,
            FlowDirection::Input,
        )?;
        add_carrier_mappings(
            &mut technologies,
            &carriers,
            &definition.carrier_output,
            FlowDirection::Output,
        )?;

        let technologies: IndexMap<RegionID, RegionTechnologies> = technologies
            .into_iter()
            .map(|(region_id, techs)| (region_id, group_by_category(techs)))
            .collect();
        for tech in technologies.values().flat_map(|techs| techs.values().flatten()) {
            check_technology_carriers(tech)?;
        }

        let region_carriers = technologies
            .iter()
            .map(|(region_id, techs)| {
                let used: IndexSet<&CarrierID> = techs
                    .values()
                    .flatten()
                    .flat_map(|tech| tech.inputs.iter().chain(tech.outputs.iter()))
                    .collect();
                let carriers_in_region = carriers
                    .keys()
                    .filter(|id| used.contains(id))
                    .cloned()
                    .collect();
                (region_id.clone(), carriers_in_region)
            })
            .collect();

        let lines = (regions.len() > 1).then(|| lines_for_regions(&regions));

        Ok(Self {
            mode: definition.mode,
            regions,
            years: definition.years,
            period_step: definition.period_step,
            time_steps,
            carriers,
            emissions,
            technologies,
            region_carriers,
            lines,
        })
    }

    /// Planning or operation
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Single- or multi-node
    pub fn topology(&self) -> Topology {
        if self.multi_node() {
            Topology::MultiNode
        } else {
            Topology::SingleNode
        }
    }

    /// Whether there is more than one region
    pub fn multi_node(&self) -> bool {
        self.regions.len() > 1
    }

    /// The regions in order of declaration
    pub fn regions(&self) -> &IndexSet<RegionID> {
        &self.regions
    }

    /// The modelled years
    pub fn years(&self) -> &[u32] {
        &self.years
    }

    /// The number of modelled years
    pub fn n_years(&self) -> usize {
        self.years.len()
    }

    /// Number of calendar years between consecutive modelled years
    pub fn period_step(&self) -> u32 {
        self.period_step
    }

    /// The time steps of each year
    pub fn time_steps(&self) -> &TimeStepInfo {
        &self.time_steps
    }

    /// The number of time steps in each year
    pub fn n_time_steps(&self) -> usize {
        self.time_steps.len()
    }

    /// The fraction of the year covered by each time step
    pub fn timeslice_fraction(&self) -> ParamValue {
        self.time_steps.timeslice_fraction()
    }

    /// The carrier catalog
    pub fn carriers(&self) -> &IndexMap<CarrierID, Carrier> {
        &self.carriers
    }

    /// The emission types
    pub fn emissions(&self) -> &IndexSet<EmissionID> {
        &self.emissions
    }

    /// The technologies of a region, grouped by category
    pub fn technologies(&self, region_id: &RegionID) -> &RegionTechnologies {
        self.technologies
            .get(region_id)
            .unwrap_or_else(|| panic!("Unknown region {region_id}"))
    }

    /// The technologies of a region in a given category (empty if there are none)
    pub fn technologies_in(&self, region_id: &RegionID, category: TechCategory) -> &[Technology] {
        self.technologies(region_id)
            .get(&category)
            .map_or(&[], Vec::as_slice)
    }

    /// Iterate over all technologies of a region, in category order
    pub fn iter_technologies(&self, region_id: &RegionID) -> impl Iterator<Item = &Technology> + Clone {
        self.technologies(region_id).values().flatten()
    }

    /// Find a technology in a region by name
    pub fn find_technology(&self, region_id: &RegionID, name: &str) -> Option<&Technology> {
        self.iter_technologies(region_id)
            .find(|tech| tech.id.as_str() == name)
    }

    /// Every distinct (category, technology) key across all regions, excluding Demand.
    ///
    /// Used for globally aggregated bounds. Keys are in order of first appearance.
    pub fn global_tech_keys(&self) -> IndexSet<TechKey> {
        self.technologies
            .values()
            .flat_map(|techs| techs.values().flatten())
            .filter(|tech| tech.category.has_capacity())
            .map(Technology::key)
            .collect()
    }

    /// The carriers consumed or produced in a region, in catalog order
    pub fn region_carriers(&self, region_id: &RegionID) -> &IndexSet<CarrierID> {
        &self.region_carriers[region_id]
    }

    /// The inter-regional lines, or `None` for a single-region model
    pub fn lines_list(&self) -> Option<&[LineID]> {
        self.lines.as_deref()
    }

    /// Elapsed years between the first modelled year and the modelled year at `year_idx`
    pub fn years_elapsed(&self, year_idx: usize) -> u32 {
        year_idx as u32 * self.period_step
    }
}

/// Whether a carrier mapping describes a technology's inputs or outputs
#[derive(Clone, Copy, PartialEq)]
enum FlowDirection {
    Input,
    Output,
}

fn check_regions(regions: &[String]) -> Result<IndexSet<RegionID>> {
    ensure!(!regions.is_empty(), "At least one region must be provided");

    let mut ids = IndexSet::new();
    for region in regions {
        ensure!(
            ids.insert(RegionID::new(region.trim())),
            "Duplicate region: {region}"
        );
    }

    Ok(ids)
}

fn check_years(mode: Mode, years: &[u32]) -> Result<()> {
    if mode == Mode::Operation && years.len() != 1 {
        Err(SchemaError::WrongNumberOfYears { count: years.len() })?;
    }
    ensure!(!years.is_empty(), "At least one year must be provided");
    ensure!(
        is_sorted_and_unique(years),
        "Years must be composed of unique values in order"
    );

    Ok(())
}

fn read_carriers(definitions: &[CarrierDefinition]) -> Result<IndexMap<CarrierID, Carrier>> {
    let mut carriers = IndexMap::new();
    for def in definitions {
        let kind =
            CarrierType::from_str(def.kind.trim()).map_err(|_| SchemaError::WrongCarrierType {
                carrier: def.carrier.clone(),
                kind: def.kind.clone(),
            })?;
        let id = CarrierID::new(def.carrier.trim());
        let carrier = Carrier {
            id: id.clone(),
            kind,
            unit: def.unit.clone(),
        };
        ensure!(
            carriers.insert(id, carrier).is_none(),
            "Duplicate carrier: {}",
            def.carrier
        );
    }

    Ok(carriers)
}

fn read_technologies(
    regions: &IndexSet<RegionID>,
    definitions: &[TechnologyDefinition],
) -> Result<IndexMap<RegionID, IndexMap<TechnologyID, Technology>>> {
    let mut technologies: IndexMap<RegionID, IndexMap<TechnologyID, Technology>> = regions
        .iter()
        .map(|region_id| (region_id.clone(), IndexMap::new()))
        .collect();

    for def in definitions {
        let Some(techs) = technologies.get_mut(def.region.trim()) else {
            bail!(
                "Technology {} belongs to unknown region {}",
                def.technology,
                def.region
            );
        };
        let category = TechCategory::from_str(def.category.trim()).map_err(|_| {
            SchemaError::WrongTechCategory {
                category: def.category.clone(),
            }
        })?;

        let id = TechnologyID::new(def.technology.trim());
        let tech = Technology {
            id: id.clone(),
            category,
            capacity_unit: def.capacity_unit.clone(),
            production_unit: def.production_unit.clone(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        ensure!(
            techs.insert(id, tech).is_none(),
            "Duplicate technology {} in region {}",
            def.technology,
            def.region
        );
    }

    Ok(technologies)
}

fn add_carrier_mappings(
    technologies: &mut IndexMap<RegionID, IndexMap<TechnologyID, Technology>>,
    carriers: &IndexMap<CarrierID, Carrier>,
    mappings: &[CarrierMapping],
    direction: FlowDirection,
) -> Result<()> {
    for mapping in mappings {
        let technology = mapping.technology.trim();
        let tech = technologies
            .get_mut(mapping.region.trim())
            .and_then(|techs| techs.get_mut(technology))
            .ok_or_else(|| SchemaError::WrongMappingTech {
                technology: technology.to_string(),
                reason: format!("not a technology of region {}", mapping.region),
            })?;

        let forbidden = match direction {
            FlowDirection::Input => TechCategory::Supply,
            FlowDirection::Output => TechCategory::Demand,
        };
        if tech.category == forbidden {
            let side = match direction {
                FlowDirection::Input => "carrier input",
                FlowDirection::Output => "carrier output",
            };
            Err(SchemaError::WrongMappingTech {
                technology: technology.to_string(),
                reason: format!("{forbidden} technologies cannot have a {side}"),
            })?;
        }

        let carrier = carriers
            .get_key_value(mapping.carrier.trim())
            .map(|(id, _)| id.clone())
            .ok_or_else(|| SchemaError::WrongMappingData {
                technology: technology.to_string(),
                carrier: mapping.carrier.clone(),
            })?;

        let flows = match direction {
            FlowDirection::Input => &mut tech.inputs,
            FlowDirection::Output => &mut tech.outputs,
        };
        ensure!(
            !flows.contains(&carrier),
            "Carrier {carrier} is mapped more than once to technology {technology}"
        );
        flows.push(carrier);
    }

    Ok(())
}

/// Check that a technology's carriers are consistent with its category
fn check_technology_carriers(tech: &Technology) -> Result<()> {
    let error = |reason: &str| SchemaError::WrongMappingTech {
        technology: tech.id.to_string(),
        reason: reason.to_string(),
    };

    let (n_in, n_out) = (tech.inputs.len(), tech.outputs.len());
    match tech.category {
        TechCategory::ConversionPlus => {
            if n_in == 0 || n_out == 0 {
                Err(error("Conversion_plus technologies need inputs and outputs"))?;
            }
        }
        _ if n_in > 1 || n_out > 1 => Err(error(
            "only Conversion_plus technologies can have more than one input or output carrier",
        ))?,
        TechCategory::Supply if n_out == 0 => Err(error("Supply technologies need an output"))?,
        TechCategory::Demand if n_in == 0 => Err(error("Demand technologies need an input"))?,
        TechCategory::Conversion | TechCategory::Transmission if n_in == 0 || n_out == 0 => {
            Err(error("technology needs an input and an output carrier"))?;
        }
        TechCategory::Storage if n_in == 0 || tech.inputs != tech.outputs => Err(error(
            "Storage technologies must have the same input and output carrier",
        ))?,
        _ => {}
    }

    Ok(())
}

fn group_by_category(techs: IndexMap<TechnologyID, Technology>) -> RegionTechnologies {
    let mut grouped: RegionTechnologies = TechCategory::iter_all()
        .map(|category| (category, Vec::new()))
        .collect();
    for tech in techs.into_values() {
        grouped[&tech.category].push(tech);
    }
    grouped.retain(|_, techs| !techs.is_empty());

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, single_region_definition};
    use itertools::assert_equal;
    use rstest::rstest;

    fn schema_error(result: Result<ModelStructure>) -> SchemaError {
        result
            .unwrap_err()
            .downcast::<SchemaError>()
            .expect("Expected a schema error")
    }

    #[rstest]
    fn test_new_structure(single_region_definition: StructureDefinition) {
        let structure = ModelStructure::new(single_region_definition).unwrap();
        let reg1 = RegionID::new("reg1");

        assert_eq!(structure.topology(), Topology::SingleNode);
        assert!(structure.lines_list().is_none());
        assert_equal(
            structure.technologies(&reg1).keys().copied(),
            [
                TechCategory::Supply,
                TechCategory::Conversion,
                TechCategory::ConversionPlus,
                TechCategory::Demand,
            ],
        );
        assert_equal(
            structure
                .technologies_in(&reg1, TechCategory::Supply)
                .iter()
                .map(|tech| tech.id.as_str()),
            ["NG_extr", "Elec_import", "Heat_import"],
        );
        assert!(
            structure
                .technologies_in(&reg1, TechCategory::Storage)
                .is_empty()
        );
        assert_equal(
            structure.region_carriers(&reg1).iter().map(CarrierID::as_str),
            ["NG_raw", "NG", "Elec", "Heat"],
        );
        let chp = structure.find_technology(&reg1, "NG_chp").unwrap();
        assert_equal(chp.outputs.iter().map(CarrierID::as_str), ["Elec", "Heat"]);
    }

    #[rstest]
    fn test_wrong_number_of_years(mut single_region_definition: StructureDefinition) {
        single_region_definition.years = vec![2020, 2021];
        assert_eq!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongNumberOfYears { count: 2 }
        );
    }

    #[rstest]
    fn test_planning_allows_several_years(mut single_region_definition: StructureDefinition) {
        single_region_definition.mode = Mode::Planning;
        single_region_definition.years = vec![2020, 2025];
        single_region_definition.period_step = 5;
        let structure = ModelStructure::new(single_region_definition).unwrap();
        assert_eq!(structure.years_elapsed(1), 5);
    }

    #[rstest]
    fn test_unsorted_years(mut single_region_definition: StructureDefinition) {
        single_region_definition.mode = Mode::Planning;
        single_region_definition.years = vec![2025, 2020];
        assert_error!(
            ModelStructure::new(single_region_definition),
            "Years must be composed of unique values in order"
        );
    }

    #[rstest]
    fn test_wrong_tech_category(mut single_region_definition: StructureDefinition) {
        single_region_definition.technologies[0].category = "Imports".into();
        assert_eq!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongTechCategory {
                category: "Imports".into()
            }
        );
    }

    #[rstest]
    fn test_wrong_carrier_type(mut single_region_definition: StructureDefinition) {
        single_region_definition.carriers[0].kind = "Fuel".into();
        assert!(matches!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongCarrierType { .. }
        ));
    }

    #[rstest]
    fn test_wrong_mapping_data(mut single_region_definition: StructureDefinition) {
        single_region_definition.carrier_output[0].carrier = "Coal".into();
        assert!(matches!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongMappingData { .. }
        ));
    }

    #[rstest]
    fn test_supply_cannot_have_input(mut single_region_definition: StructureDefinition) {
        single_region_definition.carrier_input.push(CarrierMapping {
            region: "reg1".into(),
            technology: "NG_extr".into(),
            carrier: "NG".into(),
        });
        assert!(matches!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongMappingTech { .. }
        ));
    }

    #[rstest]
    fn test_demand_cannot_have_output(mut single_region_definition: StructureDefinition) {
        single_region_definition.carrier_output.push(CarrierMapping {
            region: "reg1".into(),
            technology: "Elec_demand".into(),
            carrier: "Elec".into(),
        });
        assert!(matches!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongMappingTech { .. }
        ));
    }

    #[rstest]
    fn test_unknown_mapping_tech(mut single_region_definition: StructureDefinition) {
        single_region_definition.carrier_input[0].technology = "NG_turbine".into();
        assert!(matches!(
            schema_error(ModelStructure::new(single_region_definition)),
            SchemaError::WrongMappingTech { .. }
        ));
    }

    #[rstest]
    fn test_multi_region_lines(mut single_region_definition: StructureDefinition) {
        single_region_definition.regions = vec!["reg2".into(), "reg1".into()];
        let structure = ModelStructure::new(single_region_definition).unwrap();
        assert_eq!(structure.topology(), Topology::MultiNode);
        assert_equal(
            structure.lines_list().unwrap().iter().map(ToString::to_string),
            ["reg1-reg2".to_string()],
        );
        // reg2 has no technologies
        assert!(structure.technologies(&RegionID::new("reg2")).is_empty());
    }
}
