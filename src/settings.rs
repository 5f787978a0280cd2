//! User-level settings for esopt, read from `settings.toml` in the esopt config directory.
//!
//! Settings apply to every model run by the user. Options given on the command line take
//! precedence over them.
use crate::get_esopt_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const SETTINGS_TEMPLATE_HEADER: &str = "# esopt settings
# Every setting below is commented out and shows its default value.
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Location of the settings file (which may not exist yet)
pub fn get_settings_file_path() -> PathBuf {
    get_esopt_config_dir().join(SETTINGS_FILE_NAME)
}

/// Settings which apply to every model run
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Log level used unless ESOPT_LOG_LEVEL is set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Replace existing output and template files without passing --overwrite
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            overwrite: false,
        }
    }
}

/// Append a setting, commented out, preceded by its documentation
fn write_commented_setting(out: &mut String, field: &str, assignment: &str) {
    let docs = Settings::get_field_docs(field)
        .unwrap_or_else(|_| panic!("Setting {field} has no doc comment"));
    out.push('\n');
    for doc_line in docs.lines() {
        writeln!(out, "# # {}", doc_line.trim()).expect("Writing to a String can't fail");
    }
    writeln!(out, "# {assignment}").expect("Writing to a String can't fail");
}

impl Settings {
    /// Load the user's settings, using defaults if there is no settings file
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if file_path.is_file() {
            read_toml(file_path)
        } else {
            Ok(Settings::default())
        }
    }

    /// A settings file documenting every setting, with each left at its default
    pub fn default_file_contents() -> String {
        let defaults =
            toml::to_string(&Settings::default()).expect("Default settings are serialisable");

        let mut out = SETTINGS_TEMPLATE_HEADER.to_string();
        for assignment in defaults.lines() {
            if let Some((field, _)) = assignment.split_once('=') {
                write_commented_setting(&mut out, field.trim(), assignment.trim());
            }
        }

        out
    }
}
