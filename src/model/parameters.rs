//! Defines the `ModelFile` struct, which represents the contents of `model.toml`.
use crate::constraints::ConstraintKind;
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use crate::structure::Mode;
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_period_step, u32, 1);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelFile {
    /// Whether to plan new capacity or only dispatch existing capacity
    pub mode: Mode,
    /// Region names
    pub regions: Vec<String>,
    /// Modelled years
    pub years: Vec<u32>,
    /// Number of calendar years represented by each modelled year
    #[serde(default = "default_period_step")]
    pub period_step: u32,
    /// Emission types tracked by the model
    #[serde(default)]
    pub emissions: Vec<String>,
    /// Optional constraints to apply on top of the core set
    #[serde(default)]
    pub extra_constraints: Vec<ConstraintKind>,
}

/// Check that the `years` parameter is valid
fn check_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "`years` is empty");

    ensure!(
        is_sorted_and_unique(years),
        "`years` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that the `period_step` parameter is valid
fn check_period_step(value: u32) -> Result<()> {
    ensure!(value > 0, "period_step cannot be zero");

    Ok(())
}

impl ModelFile {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelFile`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelFile> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        let model_file: ModelFile = read_toml(&file_path)?;

        model_file
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_file)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_years(&self.years)?;
        check_period_step(self.period_step)?;

        if self.mode == Mode::Operation && self.period_step != 1 {
            warn!("period_step is ignored in operation mode");
        }

        for (i, kind) in self.extra_constraints.iter().enumerate() {
            ensure!(
                !self.extra_constraints[..i].contains(kind),
                "Constraint {kind} is listed more than once in extra_constraints"
            );
        }

        Ok(())
    }
}
