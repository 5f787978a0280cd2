//! Code for reading and writing parameter tables in long CSV format.
//!
//! Each table is stored in `parameters/<group>/<table>.csv`, where the group is `global`, `trade`
//! or a region ID. Each row of the file holds a single entry: the key columns identifying the
//! table row (`year`, `time_step`) and column (`category`, `technology`, `tax_or_sub`, `carrier`,
//! `emission`, `line`), followed by `value`.
use super::{input_err_msg, read_csv_optional};
use crate::constraints::ModelConstraint;
use crate::error::SchemaError;
use crate::region::LineID;
use crate::schema::{ColumnLayout, IndexKind, ParameterData, ParameterDef, ParameterSchema};
use crate::structure::ModelStructure;
use crate::table::{ColumnKey, ParameterTable, RowKey};
use crate::technology::{TaxOrSub, TechCategory, TechKey};
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The folder within a model directory containing parameter tables
pub const PARAMETERS_DIR_NAME: &str = "parameters";

/// A row of a parameter table file.
///
/// Which of the key fields must be present depends on the table's index and column kinds.
#[derive(Debug, PartialEq, Deserialize)]
struct ParameterRow {
    year: Option<u32>,
    time_step: Option<String>,
    tax_or_sub: Option<String>,
    category: Option<String>,
    technology: Option<String>,
    carrier: Option<String>,
    emission: Option<String>,
    line: Option<String>,
    value: Option<f64>,
}

/// Get a required key field from a row
fn required<'a>(field: Option<&'a String>, name: &str) -> Result<&'a str> {
    field
        .map(String::as_str)
        .with_context(|| format!("Missing value for column {name}"))
}

/// The names of the key columns for an index kind
fn index_headers(index_kind: IndexKind) -> &'static [&'static str] {
    match index_kind {
        IndexKind::Performance => &[],
        IndexKind::Years => &["year"],
        IndexKind::YearTimeSteps => &["year", "time_step"],
    }
}

/// The names of the key columns for a column layout
fn column_headers(layout: ColumnLayout) -> &'static [&'static str] {
    match layout {
        ColumnLayout::Value => &[],
        ColumnLayout::Technology => &["category", "technology"],
        ColumnLayout::TaxedTechnology => &["tax_or_sub", "category", "technology"],
        ColumnLayout::TechnologyCarrier => &["technology", "carrier"],
        ColumnLayout::Emission => &["emission"],
        ColumnLayout::EmissionTechnology => &["emission", "category", "technology"],
        ColumnLayout::LineCarrier => &["line", "carrier"],
    }
}

fn parse_tech_key(row: &ParameterRow) -> Result<TechKey> {
    let category = required(row.category.as_ref(), "category")?;
    let category =
        TechCategory::from_str(category).map_err(|_| SchemaError::WrongTechCategory {
            category: category.to_string(),
        })?;
    let technology = required(row.technology.as_ref(), "technology")?;

    Ok(TechKey(category, technology.into()))
}

fn parse_row_key(row: &ParameterRow, index_kind: IndexKind) -> Result<RowKey> {
    let year = || row.year.context("Missing value for column year");
    Ok(match index_kind {
        IndexKind::Performance => RowKey::Performance,
        IndexKind::Years => RowKey::Year(year()?),
        IndexKind::YearTimeSteps => RowKey::YearStep(
            year()?,
            required(row.time_step.as_ref(), "time_step")?.into(),
        ),
    })
}

fn parse_column_key(
    row: &ParameterRow,
    layout: ColumnLayout,
    structure: &ModelStructure,
) -> Result<ColumnKey> {
    Ok(match layout {
        ColumnLayout::Value => ColumnKey::Value,
        ColumnLayout::Technology => ColumnKey::Technology(parse_tech_key(row)?),
        ColumnLayout::TaxedTechnology => {
            let kind = required(row.tax_or_sub.as_ref(), "tax_or_sub")?;
            let kind = TaxOrSub::from_str(kind)
                .with_context(|| format!("Invalid value for tax_or_sub: {kind}"))?;
            ColumnKey::TaxedTechnology(kind, parse_tech_key(row)?)
        }
        ColumnLayout::TechnologyCarrier => ColumnKey::TechnologyCarrier(
            required(row.technology.as_ref(), "technology")?.into(),
            required(row.carrier.as_ref(), "carrier")?.into(),
        ),
        ColumnLayout::Emission => {
            ColumnKey::Emission(required(row.emission.as_ref(), "emission")?.into())
        }
        ColumnLayout::EmissionTechnology => ColumnKey::EmissionTechnology(
            required(row.emission.as_ref(), "emission")?.into(),
            parse_tech_key(row)?,
        ),
        ColumnLayout::LineCarrier => {
            let line = required(row.line.as_ref(), "line")?;
            ColumnKey::LineCarrier(
                LineID::from_str_in(line, structure.regions())?,
                required(row.carrier.as_ref(), "carrier")?.into(),
            )
        }
    })
}

/// Read a single parameter table from a CSV file.
///
/// Empty values are read as missing values, which are rejected when the model data is validated.
fn read_table(
    file_path: &Path,
    def: &ParameterDef,
    structure: &ModelStructure,
) -> Result<ParameterTable> {
    let rows: Vec<ParameterRow> = read_csv_optional(file_path)?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let row_key = parse_row_key(row, def.index_kind).with_context(|| input_err_msg(file_path))?;
        let col_key = parse_column_key(row, def.column_layout, structure)
            .with_context(|| input_err_msg(file_path))?;
        entries.push((row_key, col_key, row.value.unwrap_or(f64::NAN)));
    }

    ParameterTable::from_entries(entries).with_context(|| input_err_msg(file_path))
}

/// The folder containing the tables of a group
fn group_dir(model_dir: &Path, group: &impl ToString) -> PathBuf {
    model_dir.join(PARAMETERS_DIR_NAME).join(group.to_string())
}

/// Read all parameter tables required by the model.
///
/// Tables whose files are missing are left out; this is reported when the data is validated.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `structure` - The model structure
/// * `constraints` - The active constraints
pub fn read_parameters(
    model_dir: &Path,
    structure: &ModelStructure,
    constraints: &[Box<dyn ModelConstraint>],
) -> Result<ParameterData> {
    let schema = ParameterSchema::new(structure, constraints);
    let mut data = ParameterData {
        regional: structure
            .regions()
            .iter()
            .map(|region_id| (region_id.clone(), Default::default()))
            .collect(),
        ..Default::default()
    };

    for (group, defs) in schema.iter_groups() {
        let dir = group_dir(model_dir, &group);
        let tables = data
            .group_mut(&group)
            .expect("Every group in the schema has an entry");
        for (key, def) in defs {
            let file_path = dir.join(format!("{key}.csv"));
            if !file_path.is_file() {
                debug!("No file found for table {key} ({group})");
                continue;
            }

            tables.insert(*key, read_table(&file_path, def, structure)?);
        }
    }

    Ok(data)
}

/// Write a single table to a CSV file in long format
fn write_table(file_path: &Path, def: &ParameterDef, table: &ParameterTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;

    let header = index_headers(def.index_kind)
        .iter()
        .chain(column_headers(def.column_layout))
        .chain(&["value"]);
    writer.write_record(header)?;

    for (row, col, value) in table.iter() {
        let record = row_fields(row)
            .into_iter()
            .chain(column_fields(col))
            .chain([value.to_string()]);
        writer.write_record(record)?;
    }
    writer.flush()?;

    Ok(())
}

fn row_fields(row: &RowKey) -> Vec<String> {
    match row {
        RowKey::Performance => Vec::new(),
        RowKey::Year(year) => vec![year.to_string()],
        RowKey::YearStep(year, time_step) => vec![year.to_string(), time_step.to_string()],
    }
}

fn column_fields(col: &ColumnKey) -> Vec<String> {
    match col {
        ColumnKey::Value => Vec::new(),
        ColumnKey::Technology(TechKey(category, tech)) => {
            vec![category.to_string(), tech.to_string()]
        }
        ColumnKey::TaxedTechnology(kind, TechKey(category, tech)) => {
            vec![kind.to_string(), category.to_string(), tech.to_string()]
        }
        ColumnKey::TechnologyCarrier(tech, carrier) => vec![tech.to_string(), carrier.to_string()],
        ColumnKey::Emission(emission) => vec![emission.to_string()],
        ColumnKey::EmissionTechnology(emission, TechKey(category, tech)) => {
            vec![emission.to_string(), category.to_string(), tech.to_string()]
        }
        ColumnKey::LineCarrier(line, carrier) => vec![line.to_string(), carrier.to_string()],
    }
}

/// Write blank templates for every required table, filled with default values.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `structure` - The model structure
/// * `constraints` - The active constraints
/// * `overwrite` - Whether to replace existing files
///
/// # Returns
///
/// The number of files written.
pub fn write_parameter_templates(
    model_dir: &Path,
    structure: &ModelStructure,
    constraints: &[Box<dyn ModelConstraint>],
    overwrite: bool,
) -> Result<usize> {
    let schema = ParameterSchema::new(structure, constraints);

    let mut count = 0;
    for (group, defs) in schema.iter_groups() {
        if defs.is_empty() {
            continue;
        }

        let dir = group_dir(model_dir, &group);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        for (key, def) in defs {
            let file_path = dir.join(format!("{key}.csv"));
            ensure!(
                overwrite || !file_path.exists(),
                "File {} already exists (use --overwrite to replace it)",
                file_path.display()
            );
            write_table(&file_path, def, &def.default_table())
                .with_context(|| format!("Failed to write {}", file_path.display()))?;
            count += 1;
        }
    }
    info!("Wrote {count} parameter templates");

    Ok(count)
}
