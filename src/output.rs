//! The module responsible for writing results to disk.
//!
//! Every quantity is written to its own CSV file in long format, with one row per matrix entry.
use crate::derived::RegionQuantity;
use crate::expr::ValueMatrix;
use crate::region::RegionID;
use crate::results::{ModelResults, RegionValues, RegionalValues, TradeValues};
use crate::structure::ModelStructure;
use crate::technology::TechCategory;
use anyhow::{Context, Result, ensure};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "esopt_results";

/// The output file name for the costs of each region and line
const COSTS_FILE_NAME: &str = "costs.csv";

/// The output file name for imports
const IMPORT_FILE_NAME: &str = "import.csv";

/// The output file name for exports
const EXPORT_FILE_NAME: &str = "export.csv";

/// Item label used for matrices with a single unnamed column
const VALUE_LABEL: &str = "value";

/// Get the default output directory for the model in `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for a model.
///
/// An existing folder which already contains files is only reused if `overwrite` is set.
///
/// # Returns
///
/// Whether an existing, non-empty folder is being reused.
pub fn create_output_directory(output_dir: &Path, overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = output_dir.read_dir()?.next().is_none();
        ensure!(
            is_empty || overwrite,
            "Output folder {} already contains files (use --overwrite to replace them)",
            output_dir.display()
        );
        return Ok(!is_empty);
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    Ok(false)
}

/// Represents a row in a CSV file of results
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct QuantityRow {
    /// The region (or line) the value belongs to
    region: String,
    /// The technology category, or the partner region for trade
    group: Option<String>,
    /// The technology or carrier
    item: String,
    year: Option<u32>,
    time_step: Option<String>,
    value: f64,
}

/// Represents a row in the costs CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CostRow {
    /// The region or line, or `total` for the objective
    id: String,
    cost: f64,
}

/// The year and time step labelling each row of a matrix with `n_rows` rows
fn row_labels(structure: &ModelStructure, n_rows: usize) -> Vec<(Option<u32>, Option<String>)> {
    let years = structure.years();
    let n_time_steps = structure.n_time_steps();
    if n_time_steps > 1 && n_rows == years.len() * n_time_steps {
        years
            .iter()
            .flat_map(|year| {
                structure
                    .time_steps()
                    .iter_ids()
                    .map(move |id| (Some(*year), Some(id.to_string())))
            })
            .collect()
    } else if n_rows == years.len() {
        years.iter().map(|year| (Some(*year), None)).collect()
    } else {
        vec![(None, None); n_rows]
    }
}

fn technology_names(
    structure: &ModelStructure,
    region_id: &RegionID,
    category: TechCategory,
) -> Vec<String> {
    structure
        .technologies_in(region_id, category)
        .iter()
        .map(|tech| tech.id.to_string())
        .collect()
}

fn value_labels(n_cols: usize) -> Vec<String> {
    vec![VALUE_LABEL.to_string(); n_cols]
}

/// Writes matrices of results to a single CSV file
struct QuantityWriter<'a> {
    structure: &'a ModelStructure,
    writer: csv::Writer<File>,
}

impl<'a> QuantityWriter<'a> {
    fn create(structure: &'a ModelStructure, file_path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(file_path)
            .with_context(|| format!("Failed to create {}", file_path.display()))?;
        Ok(Self { structure, writer })
    }

    /// Write every entry of a matrix, labelling its columns with `items`
    fn write_matrix(
        &mut self,
        region: &str,
        group: Option<&str>,
        items: &[String],
        matrix: &ValueMatrix,
    ) -> Result<()> {
        let labels = row_labels(self.structure, matrix.rows());
        for (row, (year, time_step)) in labels.into_iter().enumerate() {
            for (col, item) in items.iter().enumerate() {
                self.writer.serialize(QuantityRow {
                    region: region.to_string(),
                    group: group.map(ToString::to_string),
                    item: item.clone(),
                    year,
                    time_step: time_step.clone(),
                    value: matrix.get(row, col),
                })?;
            }
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes every result of a solved model to a folder
pub struct DataWriter<'a> {
    output_path: &'a Path,
    structure: &'a ModelStructure,
    n_files: usize,
}

impl<'a> DataWriter<'a> {
    /// Create a writer for results in `output_path`
    pub fn new(output_path: &'a Path, structure: &'a ModelStructure) -> Self {
        Self {
            output_path,
            structure,
            n_files: 0,
        }
    }

    fn open(&mut self, file_name: &str) -> Result<QuantityWriter<'a>> {
        self.n_files += 1;
        QuantityWriter::create(self.structure, &self.output_path.join(file_name))
    }

    fn carrier_catalog(&self) -> Vec<String> {
        self.structure
            .carriers()
            .keys()
            .map(ToString::to_string)
            .collect()
    }

    /// Write values with one column per technology of each region and category
    fn write_regional(&mut self, file_name: &str, values: &RegionalValues) -> Result<()> {
        let mut writer = self.open(file_name)?;
        for (region_id, categories) in values {
            for (category, matrix) in categories {
                writer.write_matrix(
                    &region_id.to_string(),
                    Some(&category.to_string()),
                    &technology_names(self.structure, region_id, *category),
                    matrix,
                )?;
            }
        }
        writer.flush()
    }

    /// Write values with one matrix per region, labelling columns with `items`
    fn write_regions<F>(&mut self, file_name: &str, values: &RegionValues, items: F) -> Result<()>
    where
        F: Fn(&RegionID, usize) -> Vec<String>,
    {
        let mut writer = self.open(file_name)?;
        for (region_id, matrix) in values {
            let items = items(region_id, matrix.cols());
            writer.write_matrix(&region_id.to_string(), None, &items, matrix)?;
        }
        writer.flush()
    }

    fn write_trade(&mut self, file_name: &str, values: &TradeValues) -> Result<()> {
        let carriers = self.carrier_catalog();
        let mut writer = self.open(file_name)?;
        for (region_id, partners) in values {
            for (partner, matrix) in partners {
                writer.write_matrix(
                    &region_id.to_string(),
                    Some(&partner.to_string()),
                    &carriers,
                    matrix,
                )?;
            }
        }
        writer.flush()
    }

    fn write_costs(&mut self, results: &ModelResults) -> Result<()> {
        self.n_files += 1;
        let file_path = self.output_path.join(COSTS_FILE_NAME);
        let mut writer = csv::Writer::from_path(&file_path)
            .with_context(|| format!("Failed to create {}", file_path.display()))?;

        let regions = results
            .regional_cost
            .iter()
            .map(|(id, cost)| (id.to_string(), *cost));
        let lines = results
            .line_cost
            .iter()
            .map(|(id, cost)| (id.to_string(), *cost));
        let total = ("total".to_string(), results.objective_value);
        for (id, cost) in regions.chain(lines).chain([total]) {
            writer.serialize(CostRow { id, cost })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write every quantity of the results.
    ///
    /// # Returns
    ///
    /// The number of files written.
    pub fn write_results(&mut self, results: &ModelResults) -> Result<usize> {
        let structure = self.structure;
        self.write_costs(results)?;

        for (quantity, values) in &results.tech {
            self.write_regional(&format!("{quantity}.csv"), values)?;
        }

        for (quantity, values) in &results.carrier {
            self.write_regions(&format!("{quantity}.csv"), values, |region_id, _| {
                structure
                    .region_carriers(region_id)
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            })?;
        }

        for (quantity, values) in &results.region {
            let storage = *quantity == RegionQuantity::StorageSoc;
            self.write_regions(&format!("{quantity}.csv"), values, |region_id, n_cols| {
                if storage {
                    technology_names(structure, region_id, TechCategory::Storage)
                } else {
                    value_labels(n_cols)
                }
            })?;
        }

        let carriers = self.carrier_catalog();
        for (quantity, values) in &results.line {
            let mut writer = self.open(&format!("{quantity}.csv"))?;
            for (line, matrix) in values {
                // Present values have a single entry rather than one per carrier
                let items = if matrix.cols() == carriers.len() {
                    carriers.clone()
                } else {
                    value_labels(matrix.cols())
                };
                writer.write_matrix(&line.to_string(), None, &items, matrix)?;
            }
            writer.flush()?;
        }

        for (emission, values) in &results.emission_by_type {
            self.write_regional(&format!("emission_by_type_{emission}.csv"), values)?;
        }
        for (emission, values) in &results.emission_by_region {
            self.write_regions(
                &format!("emission_by_region_{emission}.csv"),
                values,
                |_, n_cols| value_labels(n_cols),
            )?;
        }

        if structure.multi_node() {
            self.write_trade(IMPORT_FILE_NAME, &results.import)?;
            self.write_trade(EXPORT_FILE_NAME, &results.export)?;
        }

        info!(
            "Wrote {} result files to {}",
            self.n_files,
            self.output_path.display()
        );

        Ok(self.n_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::default_constraints;
    use crate::derived::TechQuantity;
    use crate::fixture::{multi_region_structure, single_region_structure};
    use crate::model::Model;
    use crate::schema::ParameterSchema;
    use crate::solver::SolveOptions;
    use itertools::Itertools;
    use rstest::rstest;
    use tempfile::tempdir;

    fn solve_default(structure: ModelStructure) -> ModelResults {
        let constraints = default_constraints();
        let tables = ParameterSchema::new(&structure, &constraints).default_tables();
        let model = Model::new(structure, tables, constraints).unwrap();
        model.solve(&SolveOptions::default()).unwrap().unwrap()
    }

    fn read_rows(file_path: &Path) -> Vec<QuantityRow> {
        csv::Reader::from_path(file_path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[rstest]
    fn test_row_labels(single_region_structure: ModelStructure) {
        assert_eq!(
            row_labels(&single_region_structure, 4)[1],
            (Some(2020), Some("T2".into()))
        );
        assert_eq!(
            row_labels(&single_region_structure, 1),
            [(Some(2020), None)]
        );
        assert_eq!(
            row_labels(&single_region_structure, 3),
            vec![(None, None); 3]
        );
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");

        // New directory
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Existing but empty
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Existing and not empty
        fs::write(output_dir.join("file.txt"), "").unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
    }

    #[rstest]
    fn test_write_results(single_region_structure: ModelStructure) {
        let results = solve_default(single_region_structure.clone());
        let dir = tempdir().unwrap();
        let n_files = DataWriter::new(dir.path(), &single_region_structure)
            .write_results(&results)
            .unwrap();
        assert!(n_files > 1);

        // Four time steps for each of three supply technologies and more for other categories
        let rows = read_rows(&dir.path().join(format!("{}.csv", TechQuantity::Production)));
        let supply: Vec<_> = rows
            .iter()
            .filter(|row| row.group.as_deref() == Some("Supply"))
            .collect();
        assert_eq!(supply.len(), 12);
        assert_eq!(supply[0].region, "reg1");
        assert_eq!(supply[0].item, "NG_extr");
        assert_eq!(supply[0].year, Some(2020));

        let costs: Vec<CostRow> = csv::Reader::from_path(dir.path().join(COSTS_FILE_NAME))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
        assert_eq!(costs.last().unwrap().id, "total");
        assert!(!dir.path().join(IMPORT_FILE_NAME).exists());
    }

    #[rstest]
    fn test_write_trade(multi_region_structure: ModelStructure) {
        let results = solve_default(multi_region_structure.clone());
        let dir = tempdir().unwrap();
        DataWriter::new(dir.path(), &multi_region_structure)
            .write_results(&results)
            .unwrap();

        // One entry per carrier and time step for each direction
        let rows = read_rows(&dir.path().join(IMPORT_FILE_NAME));
        assert_eq!(rows.len(), 2 * 4 * 4);
        assert_eq!(rows[0].group.as_deref(), Some("reg2"));
    }
}
