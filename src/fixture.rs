//! Fixtures for tests

use crate::constraints::{BuildContext, ModelConstraint, default_constraints};
use crate::data::ModelData;
use crate::derived::DerivedQuantities;
use crate::expr::Constraint;
use crate::schema::ParameterSchema;
use crate::structure::{
    CarrierDefinition, CarrierMapping, Mode, ModelStructure, StructureDefinition,
    TechnologyDefinition,
};
use crate::variables::Variables;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

pub fn tech_def(region: &str, category: &str, technology: &str) -> TechnologyDefinition {
    TechnologyDefinition {
        region: region.into(),
        category: category.into(),
        technology: technology.into(),
        capacity_unit: "GW".into(),
        production_unit: "GWh".into(),
    }
}

pub fn carrier_def(carrier: &str, kind: &str) -> CarrierDefinition {
    CarrierDefinition {
        carrier: carrier.into(),
        kind: kind.into(),
        unit: "GWh".into(),
    }
}

pub fn mapping(region: &str, technology: &str, carrier: &str) -> CarrierMapping {
    CarrierMapping {
        region: region.into(),
        technology: technology.into(),
        carrier: carrier.into(),
    }
}

fn four_time_steps() -> Option<Vec<(String, f64)>> {
    Some(
        ["T1", "T2", "T3", "T4"]
            .into_iter()
            .map(|id| (id.to_string(), 0.25))
            .collect(),
    )
}

fn gas_carriers() -> Vec<CarrierDefinition> {
    vec![
        carrier_def("NG_raw", "Resource"),
        carrier_def("NG", "Intermediate"),
        carrier_def("Elec", "Demand"),
        carrier_def("Heat", "Demand"),
    ]
}

/// A single region with a natural gas chain, imports and demand for electricity and heat
#[fixture]
pub fn single_region_definition() -> StructureDefinition {
    StructureDefinition {
        mode: Mode::Operation,
        regions: vec!["reg1".into()],
        years: vec![2020],
        period_step: 1,
        time_steps: four_time_steps(),
        emissions: vec!["CO2".into(), "NOx".into()],
        technologies: vec![
            tech_def("reg1", "Supply", "NG_extr"),
            tech_def("reg1", "Supply", "Elec_import"),
            tech_def("reg1", "Supply", "Heat_import"),
            tech_def("reg1", "Conversion", "NG_ref"),
            tech_def("reg1", "Conversion_plus", "NG_chp"),
            tech_def("reg1", "Demand", "Elec_demand"),
            tech_def("reg1", "Demand", "Heat_demand"),
        ],
        carriers: gas_carriers(),
        carrier_input: vec![
            mapping("reg1", "NG_ref", "NG_raw"),
            mapping("reg1", "NG_chp", "NG"),
            mapping("reg1", "Elec_demand", "Elec"),
            mapping("reg1", "Heat_demand", "Heat"),
        ],
        carrier_output: vec![
            mapping("reg1", "NG_extr", "NG_raw"),
            mapping("reg1", "NG_ref", "NG"),
            mapping("reg1", "NG_chp", "Elec"),
            mapping("reg1", "NG_chp", "Heat"),
            mapping("reg1", "Elec_import", "Elec"),
            mapping("reg1", "Heat_import", "Heat"),
        ],
    }
}

#[fixture]
pub fn single_region_structure(single_region_definition: StructureDefinition) -> ModelStructure {
    ModelStructure::new(single_region_definition).unwrap()
}

/// Two regions: reg1 has a CHP plant, imports and demand, while reg2 extracts and refines gas
#[fixture]
pub fn multi_region_definition() -> StructureDefinition {
    StructureDefinition {
        mode: Mode::Operation,
        regions: vec!["reg1".into(), "reg2".into()],
        years: vec![2020],
        period_step: 1,
        time_steps: four_time_steps(),
        emissions: vec!["CO2".into()],
        technologies: vec![
            tech_def("reg1", "Supply", "Elec_import"),
            tech_def("reg1", "Supply", "Heat_import"),
            tech_def("reg1", "Conversion_plus", "NG_chp"),
            tech_def("reg1", "Demand", "Elec_demand"),
            tech_def("reg1", "Demand", "Heat_demand"),
            tech_def("reg2", "Supply", "NG_extr"),
            tech_def("reg2", "Conversion", "NG_ref"),
        ],
        carriers: gas_carriers(),
        carrier_input: vec![
            mapping("reg1", "NG_chp", "NG"),
            mapping("reg1", "Elec_demand", "Elec"),
            mapping("reg1", "Heat_demand", "Heat"),
            mapping("reg2", "NG_ref", "NG_raw"),
        ],
        carrier_output: vec![
            mapping("reg1", "NG_chp", "Elec"),
            mapping("reg1", "NG_chp", "Heat"),
            mapping("reg1", "Elec_import", "Elec"),
            mapping("reg1", "Heat_import", "Heat"),
            mapping("reg2", "NG_extr", "NG_raw"),
            mapping("reg2", "NG_ref", "NG"),
        ],
    }
}

#[fixture]
pub fn multi_region_structure(multi_region_definition: StructureDefinition) -> ModelStructure {
    ModelStructure::new(multi_region_definition).unwrap()
}

/// A single region with a generator, a battery and electricity demand
#[fixture]
pub fn storage_definition() -> StructureDefinition {
    StructureDefinition {
        mode: Mode::Operation,
        regions: vec!["reg1".into()],
        years: vec![2020],
        period_step: 1,
        time_steps: four_time_steps(),
        emissions: Vec::new(),
        technologies: vec![
            tech_def("reg1", "Supply", "Elec_gen"),
            tech_def("reg1", "Storage", "Battery"),
            tech_def("reg1", "Demand", "Elec_demand"),
        ],
        carriers: vec![carrier_def("Elec", "Demand")],
        carrier_input: vec![
            mapping("reg1", "Battery", "Elec"),
            mapping("reg1", "Elec_demand", "Elec"),
        ],
        carrier_output: vec![
            mapping("reg1", "Elec_gen", "Elec"),
            mapping("reg1", "Battery", "Elec"),
        ],
    }
}

#[fixture]
pub fn storage_structure(storage_definition: StructureDefinition) -> ModelStructure {
    ModelStructure::new(storage_definition).unwrap()
}

/// A single region planning model with a gas chain and electricity demand over three periods
#[fixture]
pub fn planning_definition() -> StructureDefinition {
    StructureDefinition {
        mode: Mode::Planning,
        regions: vec!["reg1".into()],
        years: vec![2020, 2025, 2030],
        period_step: 5,
        time_steps: None,
        emissions: vec!["CO2".into()],
        technologies: vec![
            tech_def("reg1", "Supply", "NG_extr"),
            tech_def("reg1", "Conversion", "NG_plant"),
            tech_def("reg1", "Demand", "Elec_demand"),
        ],
        carriers: vec![
            carrier_def("NG", "Resource"),
            carrier_def("Elec", "Demand"),
        ],
        carrier_input: vec![
            mapping("reg1", "NG_plant", "NG"),
            mapping("reg1", "Elec_demand", "Elec"),
        ],
        carrier_output: vec![
            mapping("reg1", "NG_extr", "NG"),
            mapping("reg1", "NG_plant", "Elec"),
        ],
    }
}

#[fixture]
pub fn planning_structure(planning_definition: StructureDefinition) -> ModelStructure {
    ModelStructure::new(planning_definition).unwrap()
}

/// Model data for a structure with every table filled with default values
pub fn default_model_data(structure: ModelStructure) -> ModelData {
    let constraints = default_constraints();
    let tables = ParameterSchema::new(&structure, &constraints).default_tables();
    ModelData::new(structure, tables, &constraints).unwrap()
}

/// Check a constraint's preconditions and build its rows for model data
pub fn build_rows(data: &ModelData, constraint: &dyn ModelConstraint) -> Vec<Constraint> {
    let variables = Variables::new(data.structure());
    let derived = DerivedQuantities::new(data, &variables);
    constraint.check(&derived).unwrap();
    constraint
        .rules(&BuildContext {
            data,
            variables: &variables,
            derived: &derived,
        })
        .unwrap()
}
