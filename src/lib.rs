//! Builds and solves linear optimisation models of energy systems.
//!
//! A model is described by its structure (regions, years, time steps, technologies and carriers)
//! and a set of numeric parameter tables. From these, esopt creates the decision variables, every
//! derived quantity, the constraints and the discounted total cost, then hands the resulting
//! linear program to HiGHS.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod carrier;
pub mod cli;
pub mod constraints;
pub mod data;
pub mod derived;
pub mod error;
pub mod expr;
pub mod finance;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod objective;
pub mod output;
pub mod region;
pub mod results;
pub mod schema;
pub mod settings;
pub mod solver;
pub mod structure;
pub mod table;
pub mod technology;
pub mod time_step;
pub mod variables;

#[cfg(test)]
mod fixture;

/// Get the esopt config directory
pub fn get_esopt_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        panic!("Could not get path to config directory for your platform");
    };
    config_dir.push("esopt");
    config_dir
}
