//! Code related to CLI interface for managing the settings file
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Create the program settings file with default values, if it doesn't exist
    Init,
    /// Get the path to where the settings file is read from
    Path,
    /// Write the contents of a placeholder `settings.toml` to the console
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Init => handle_init_command()?,
            Self::Path => handle_path_command(),
            Self::DumpDefault => handle_dump_default_command(),
        }

        Ok(())
    }
}

/// Create a placeholder settings file at the given path, unless one already exists.
///
/// # Returns
///
/// Whether a new file was written.
fn ensure_settings_file_exists(file_path: &Path) -> Result<bool> {
    if file_path.is_file() {
        return Ok(false);
    }

    if let Some(dir_path) = file_path.parent() {
        fs::create_dir_all(dir_path)
            .with_context(|| format!("Failed to create directory: {}", dir_path.display()))?;
    }

    fs::write(file_path, Settings::default_file_contents())
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    Ok(true)
}

/// Handle the `init` command
fn handle_init_command() -> Result<()> {
    let file_path = get_settings_file_path();
    if ensure_settings_file_exists(&file_path)? {
        println!("Created settings file: {}", file_path.display());
    } else {
        println!("Settings file already exists: {}", file_path.display());
    }

    Ok(())
}

/// Handle the `path` command
fn handle_path_command() {
    println!("{}", get_settings_file_path().display());
}

/// Handle the `dump-default` command
fn handle_dump_default_command() {
    print!("{}", Settings::default_file_contents());
}
