//! The command line interface for esopt.
use crate::input::parameter::write_parameter_templates;
use crate::input::{load_model, load_structure};
use crate::log;
use crate::output::{DataWriter, create_output_directory, get_output_dir};
use crate::settings::Settings;
use crate::solver::{DEFAULT_SOLVER, SolveOptions, SolverOption, parse_solver_option};
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for esopt.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Show the solver's own output
    #[arg(short, long)]
    pub verbose: bool,
    /// The solver to use
    #[arg(long, default_value = DEFAULT_SOLVER)]
    pub solver: String,
    /// An option to pass to the solver, as `name=value` (may be repeated)
    #[arg(long = "solver-option", value_parser = parse_solver_option)]
    pub solver_options: Vec<(String, SolverOption)>,
}

impl RunOpts {
    /// How the model should be solved
    fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            verbose: self.verbose,
            solver_name: self.solver.clone(),
            options: self.solver_options.iter().cloned().collect(),
        }
    }
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Build and solve a model, writing the results to CSV files.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Write parameter templates, filled with default values, for a model.
    Template {
        /// The path to the model directory.
        model_dir: PathBuf,
        /// Whether to replace existing parameter files
        #[arg(long)]
        overwrite: bool,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => {
                handle_run_command(&model_dir, &opts, None)?;
            }
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None)?,
            Self::Template {
                model_dir,
                overwrite,
            } => {
                handle_template_command(&model_dir, overwrite, None)?;
            }
            Self::Settings { subcommand } => subcommand.execute()?,
        }

        Ok(())
    }
}

/// Parse CLI arguments and start esopt
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ esopt --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_long_help()?;
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn settings_or_load(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `run` command.
///
/// # Returns
///
/// Whether an optimal solution was found (results are only written if so).
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<bool> {
    let settings = settings_or_load(settings)?;

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(model_path)?;
        &pathbuf
    };

    let overwrite = opts.overwrite || settings.overwrite;
    let reusing = create_output_directory(output_path, overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(&settings.log_level, Some(output_path)).context("Failed to initialise logging.")?;

    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if reusing {
        warn!("Output folder will be overwritten");
    }

    let Some(results) = model.solve(&opts.solve_options())? else {
        warn!("No optimal solution was found, so no results were written");
        return Ok(false);
    };

    let count = DataWriter::new(output_path, model.structure()).write_results(&results)?;
    info!("Wrote {count} result files");

    Ok(true)
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = settings_or_load(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let model = load_model(model_path).context("Failed to validate model.")?;
    let built = model.build().context("Failed to build model.")?;
    info!(
        "Model validation successful! ({} variables, {} constraints)",
        built.variables.len(),
        built.rows.len()
    );

    Ok(())
}

/// Handle the `template` command.
///
/// # Returns
///
/// The number of template files written.
pub fn handle_template_command(
    model_path: &Path,
    overwrite: bool,
    settings: Option<Settings>,
) -> Result<usize> {
    let settings = settings_or_load(settings)?;
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let (structure, constraints) =
        load_structure(model_path).context("Failed to load model structure.")?;
    write_parameter_templates(
        model_path,
        &structure,
        &constraints,
        overwrite || settings.overwrite,
    )
}
