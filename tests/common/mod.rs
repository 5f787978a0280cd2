//! Helpers for writing model directories in integration tests.
#![allow(dead_code)]
use esopt::input::load_structure;
use esopt::input::parameter::{PARAMETERS_DIR_NAME, write_parameter_templates};
use std::fs;
use std::path::Path;

/// The one modelled year of the operation models
pub const YEAR: &str = "2020";

/// Write a file into a model directory
pub fn write_file(model_dir: &Path, file_name: &str, contents: &str) {
    fs::write(model_dir.join(file_name), contents).unwrap();
}

/// Contents of a time steps file with `n` equal time steps named `T1`, `T2`, ...
pub fn time_steps_csv(n: usize) -> String {
    let fraction = 1.0 / n as f64;
    let mut contents = "time_step,fraction\n".to_string();
    for i in 1..=n {
        contents.push_str(&format!("T{i},{fraction}\n"));
    }
    contents
}

const CARRIERS: &str = "carrier,type,unit
NG_raw,Resource,GWh
NG,Intermediate,GWh
Elec,Demand,GWh
Heat,Demand,GWh
";

/// A single region whose electricity and heat demand can be met either by a gas chain feeding a
/// CHP plant or by importing electricity and heat directly
pub fn write_gas_chain_model(model_dir: &Path, n_time_steps: usize) {
    write_file(
        model_dir,
        "model.toml",
        &format!(
            "mode = \"operation\"\nregions = [\"reg1\"]\nyears = [{YEAR}]\nemissions = [\"CO2\", \"NOx\"]\n"
        ),
    );
    write_file(
        model_dir,
        "technologies.csv",
        "region,category,technology,capacity_unit,production_unit
reg1,Supply,NG_extr,GW,GWh
reg1,Supply,Elec_import,GW,GWh
reg1,Supply,Heat_import,GW,GWh
reg1,Conversion,NG_ref,GW,GWh
reg1,Conversion_plus,NG_chp,GW,GWh
reg1,Demand,Elec_demand,GW,GWh
reg1,Demand,Heat_demand,GW,GWh
",
    );
    write_file(model_dir, "carriers.csv", CARRIERS);
    write_file(
        model_dir,
        "carrier_input.csv",
        "region,technology,carrier
reg1,NG_ref,NG_raw
reg1,NG_chp,NG
reg1,Elec_demand,Elec
reg1,Heat_demand,Heat
",
    );
    write_file(
        model_dir,
        "carrier_output.csv",
        "region,technology,carrier
reg1,NG_extr,NG_raw
reg1,NG_ref,NG
reg1,NG_chp,Elec
reg1,NG_chp,Heat
reg1,Elec_import,Elec
reg1,Heat_import,Heat
",
    );
    write_file(model_dir, "time_steps.csv", &time_steps_csv(n_time_steps));
    write_templates(model_dir);
}

/// Two regions: reg1 has a CHP plant and imports, reg2 extracts and refines gas
pub fn write_two_region_model(model_dir: &Path, n_time_steps: usize) {
    write_file(
        model_dir,
        "model.toml",
        &format!(
            "mode = \"operation\"\nregions = [\"reg1\", \"reg2\"]\nyears = [{YEAR}]\nemissions = [\"CO2\"]\n"
        ),
    );
    write_file(
        model_dir,
        "technologies.csv",
        "region,category,technology,capacity_unit,production_unit
reg1,Supply,Elec_import,GW,GWh
reg1,Supply,Heat_import,GW,GWh
reg1,Conversion_plus,NG_chp,GW,GWh
reg1,Demand,Elec_demand,GW,GWh
reg1,Demand,Heat_demand,GW,GWh
reg2,Supply,NG_extr,GW,GWh
reg2,Conversion,NG_ref,GW,GWh
",
    );
    write_file(model_dir, "carriers.csv", CARRIERS);
    write_file(
        model_dir,
        "carrier_input.csv",
        "region,technology,carrier
reg1,NG_chp,NG
reg1,Elec_demand,Elec
reg1,Heat_demand,Heat
reg2,NG_ref,NG_raw
",
    );
    write_file(
        model_dir,
        "carrier_output.csv",
        "region,technology,carrier
reg1,NG_chp,Elec
reg1,NG_chp,Heat
reg1,Elec_import,Elec
reg1,Heat_import,Heat
reg2,NG_extr,NG_raw
reg2,NG_ref,NG
",
    );
    write_file(model_dir, "time_steps.csv", &time_steps_csv(n_time_steps));
    write_templates(model_dir);
}

/// Fill the model directory with parameter tables holding default values
pub fn write_templates(model_dir: &Path) {
    let (structure, constraints) = load_structure(model_dir).unwrap();
    write_parameter_templates(model_dir, &structure, &constraints, false).unwrap();
}

/// Apply `update` to the value of every row of a parameter table whose key columns match.
///
/// Panics if no row matches.
pub fn update_parameter<F>(
    model_dir: &Path,
    group: &str,
    table: &str,
    matches: &[(&str, &str)],
    update: F,
) where
    F: Fn(f64) -> f64,
{
    let path = model_dir
        .join(PARAMETERS_DIR_NAME)
        .join(group)
        .join(format!("{table}.csv"));
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let index = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .unwrap_or_else(|| panic!("No column {name} in {table}"))
    };
    let matches: Vec<_> = matches
        .iter()
        .map(|(column, value)| (index(column), *value))
        .collect();
    let value_idx = index("value");

    let mut records = Vec::new();
    let mut n_updated = 0;
    for record in reader.records() {
        let mut fields: Vec<String> = record.unwrap().iter().map(ToString::to_string).collect();
        if matches.iter().all(|(idx, value)| fields[*idx] == *value) {
            let value: f64 = fields[value_idx].parse().unwrap();
            fields[value_idx] = update(value).to_string();
            n_updated += 1;
        }
        records.push(fields);
    }
    drop(reader);
    assert!(n_updated > 0, "No rows of {table} matched");

    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(&headers).unwrap();
    for record in records {
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
}

/// Add `amount` to every matching value of a parameter table
pub fn add_to_parameter(
    model_dir: &Path,
    group: &str,
    table: &str,
    matches: &[(&str, &str)],
    amount: f64,
) {
    update_parameter(model_dir, group, table, matches, |value| value + amount);
}

/// Set every matching value of a parameter table
pub fn set_parameter(
    model_dir: &Path,
    group: &str,
    table: &str,
    matches: &[(&str, &str)],
    value: f64,
) {
    update_parameter(model_dir, group, table, matches, |_| value);
}

/// A single region planning model over three five-year periods, where an electricity generator
/// must be built to meet demand
pub fn write_planning_model(model_dir: &Path) {
    write_file(
        model_dir,
        "model.toml",
        "mode = \"planning\"
regions = [\"reg1\"]
years = [2020, 2025, 2030]
period_step = 5
emissions = [\"CO2\"]
",
    );
    write_file(
        model_dir,
        "technologies.csv",
        "region,category,technology,capacity_unit,production_unit
reg1,Supply,Elec_gen,GW,GWh
reg1,Demand,Elec_demand,GW,GWh
",
    );
    write_file(model_dir, "carriers.csv", "carrier,type,unit\nElec,Demand,GWh\n");
    write_file(
        model_dir,
        "carrier_input.csv",
        "region,technology,carrier\nreg1,Elec_demand,Elec\n",
    );
    write_file(
        model_dir,
        "carrier_output.csv",
        "region,technology,carrier\nreg1,Elec_gen,Elec\n",
    );
    write_templates(model_dir);
}

/// A single region where a generator and a battery meet electricity demand
pub fn write_storage_model(model_dir: &Path, n_time_steps: usize) {
    write_file(
        model_dir,
        "model.toml",
        &format!("mode = \"operation\"\nregions = [\"reg1\"]\nyears = [{YEAR}]\n"),
    );
    write_file(
        model_dir,
        "technologies.csv",
        "region,category,technology,capacity_unit,production_unit
reg1,Supply,Elec_gen,GW,GWh
reg1,Storage,Battery,GW,GWh
reg1,Demand,Elec_demand,GW,GWh
",
    );
    write_file(model_dir, "carriers.csv", "carrier,type,unit\nElec,Demand,GWh\n");
    write_file(
        model_dir,
        "carrier_input.csv",
        "region,technology,carrier\nreg1,Battery,Elec\nreg1,Elec_demand,Elec\n",
    );
    write_file(
        model_dir,
        "carrier_output.csv",
        "region,technology,carrier\nreg1,Elec_gen,Elec\nreg1,Battery,Elec\n",
    );
    write_file(model_dir, "time_steps.csv", &time_steps_csv(n_time_steps));
    write_templates(model_dir);
}
