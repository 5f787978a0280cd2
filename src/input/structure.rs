//! Code for reading the structural description of a model from CSV files.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::model::parameters::ModelFile;
use crate::structure::{
    CarrierDefinition, CarrierMapping, ModelStructure, StructureDefinition, TechnologyDefinition,
};
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::path::Path;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const CARRIERS_FILE_NAME: &str = "carriers.csv";
const CARRIER_INPUT_FILE_NAME: &str = "carrier_input.csv";
const CARRIER_OUTPUT_FILE_NAME: &str = "carrier_output.csv";
const TIME_STEPS_FILE_NAME: &str = "time_steps.csv";

#[derive(Debug, PartialEq, Deserialize)]
struct TimeStepRaw {
    time_step: String,
    fraction: f64,
}

/// Read the time steps file, if present
fn read_time_steps(model_dir: &Path) -> Result<Option<Vec<(String, f64)>>> {
    let file_path = model_dir.join(TIME_STEPS_FILE_NAME);
    if !file_path.is_file() {
        info!("No time steps file provided; using a single annual time step");
        return Ok(None);
    }

    let time_steps = read_csv::<TimeStepRaw>(&file_path)?
        .into_iter()
        .map(|raw| (raw.time_step, raw.fraction))
        .collect();

    Ok(Some(time_steps))
}

/// Read the structure of a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `model_file` - The contents of `model.toml`
pub fn read_structure(model_dir: &Path, model_file: ModelFile) -> Result<ModelStructure> {
    let technologies: Vec<TechnologyDefinition> =
        read_csv(&model_dir.join(TECHNOLOGIES_FILE_NAME))?;
    let carriers: Vec<CarrierDefinition> = read_csv(&model_dir.join(CARRIERS_FILE_NAME))?;

    // Models consisting solely of supply technologies have no carrier inputs
    let carrier_input: Vec<CarrierMapping> =
        read_csv_optional(&model_dir.join(CARRIER_INPUT_FILE_NAME))?;
    let carrier_output: Vec<CarrierMapping> =
        read_csv(&model_dir.join(CARRIER_OUTPUT_FILE_NAME))?;

    let definition = StructureDefinition {
        mode: model_file.mode,
        regions: model_file.regions,
        years: model_file.years,
        period_step: model_file.period_step,
        time_steps: read_time_steps(model_dir)?,
        emissions: model_file.emissions,
        technologies,
        carriers,
        carrier_input,
        carrier_output,
    };

    ModelStructure::new(definition).with_context(|| input_err_msg(model_dir))
}
