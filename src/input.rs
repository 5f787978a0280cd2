//! Common routines for handling input data.
use crate::constraints::{ModelConstraint, constraint_list};
use crate::model::Model;
use crate::model::parameters::ModelFile;
use crate::structure::ModelStructure;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod parameter;
use parameter::read_parameters;
pub mod structure;
use structure::read_structure;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_optional(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file, which may be empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;

    let mut vec = Vec::new();
    for result in reader.deserialize() {
        let record: T = result.with_context(|| input_err_msg(file_path))?;
        vec.push(record);
    }

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;

    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Read the model structure and the list of active constraints from a model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn load_structure(model_dir: &Path) -> Result<(ModelStructure, Vec<Box<dyn ModelConstraint>>)> {
    let model_file = ModelFile::from_path(model_dir)?;
    let constraints = constraint_list(&model_file.extra_constraints);
    let structure = read_structure(model_dir, model_file)?;

    Ok((structure, constraints))
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The validated model, ready to be built and solved.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let (structure, constraints) = load_structure(model_dir)?;
    let parameters = read_parameters(model_dir, &structure, &constraints)?;

    Model::new(structure, parameters, constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let file_path = dir.join(name);
        let mut file = File::create(&file_path).unwrap();
        write!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "test.csv", "id,value\nhello, 1\nworld,2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap();
        assert_eq!(
            records,
            [
                Record {
                    id: "hello".into(),
                    value: 1
                },
                Record {
                    id: "world".into(),
                    value: 2
                }
            ]
        );
    }

    #[test]
    fn test_read_csv_empty() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "test.csv", "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(read_csv_optional::<Record>(&file_path).unwrap().is_empty());
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = write_file(dir.path(), "test.toml", "id = \"hello\"\nvalue = 1\n");
        let record: Record = read_toml(&file_path).unwrap();
        assert_eq!(record.value, 1);

        let missing = dir.path().join("missing.toml");
        assert_error!(
            read_toml::<Record>(&missing),
            format!("Error reading {}", missing.display())
        );
    }

    #[test]
    fn test_is_sorted_and_unique() {
        assert!(is_sorted_and_unique([1, 2, 3]));
        assert!(is_sorted_and_unique([1]));
        assert!(is_sorted_and_unique::<u32, _>([]));
        assert!(!is_sorted_and_unique([1, 1]));
        assert!(!is_sorted_and_unique([2, 1]));
    }
}
