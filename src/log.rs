//! The `log` module provides initialisation and configuration of the application's logging system.
//!
//! This module sets up logging with various levels (error, warn, info, debug, trace) and optional
//! colourisation based on terminal support. It also allows configuration of the log level through
//! environment variables.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::Arguments;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The environment variable which overrides the log level
pub const LOG_LEVEL_ENV_VAR: &str = "ESOPT_LOG_LEVEL";

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the `ESOPT_LOG_LEVEL`
/// environment variable or the settings.toml file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The file name for the log file containing messages about building and solving models
const LOG_INFO_FILE_NAME: &str = "esopt_info.log";

/// The file name for the log file containing warnings and error messages
const LOG_ERROR_FILE_NAME: &str = "esopt_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// The log level to use: the `ESOPT_LOG_LEVEL` environment variable if set, otherwise the level
/// from the settings file
fn resolve_log_level(log_level_from_settings: &str) -> Result<LevelFilter> {
    match env::var(LOG_LEVEL_ENV_VAR) {
        Ok(log_level) => parse_log_level(&log_level)
            .with_context(|| format!("Invalid value for {LOG_LEVEL_ENV_VAR}")),
        Err(_) => parse_log_level(log_level_from_settings),
    }
}

/// Console output: warnings and errors go to stderr, everything else to stdout
fn console_dispatch(log_level: LevelFilter) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let stdout_colour = std::io::stdout().is_terminal().then_some(colours);
    let stderr_colour = std::io::stderr().is_terminal().then_some(colours);

    Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log(out, message, record, stdout_colour.as_ref());
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    write_log(out, message, record, stderr_colour.as_ref());
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        )
}

/// Log files in `dir`: one for the progress of the build and solve, one for warnings and errors.
///
/// The progress file always records at least `info` messages, whatever the console level.
fn file_dispatch(dir: &Path, log_level: LevelFilter) -> Result<Dispatch> {
    let open = |file_name| {
        let file_path = dir.join(file_name);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("Failed to create log file {}", file_path.display()))
    };

    Ok(Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(|out, message, record| write_log(out, message, record, None))
                .level(log_level.max(LevelFilter::Info))
                .chain(open(LOG_INFO_FILE_NAME)?),
        )
        .chain(
            Dispatch::new()
                .format(|out, message, record| write_log(out, message, record, None))
                .level(LevelFilter::Warn)
                .chain(open(LOG_ERROR_FILE_NAME)?),
        ))
}

/// Initialise the program logger using the `fern` logging library with colourised output.
///
/// The log level is taken from the `ESOPT_LOG_LEVEL` environment variable if it is set and from
/// the program settings otherwise. Possible levels are `off`, `error`, `warn`, `info`, `debug` and
/// `trace`.
///
/// Only the first call in a process installs a logger. Later calls still validate the level and
/// create the log files, but messages keep going to the first logger.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_path`: The location to save log files (if Some, log files will be created)
pub fn init(log_level_from_settings: &str, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = resolve_log_level(log_level_from_settings)?;

    let mut dispatch = console_dispatch(log_level);
    if let Some(dir) = log_file_path {
        dispatch = dispatch.chain(file_dispatch(dir, log_level)?);
    }

    if dispatch.apply().is_ok() {
        LOGGER_INIT.get_or_init(|| ());
    }

    Ok(())
}

/// Convert a log level string to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    Ok(match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    })
}

/// Write a log message with a timestamp, level and target, colouring the level if requested
fn write_log(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    let target = record.target();
    match colours {
        Some(colours) => out.finish(format_args!(
            "[{timestamp} {} {target}] {message}",
            colours.color(record.level())
        )),
        None => out.finish(format_args!(
            "[{timestamp} {} {target}] {message}",
            record.level()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("WARN", LevelFilter::Warn)]
    #[case("info", LevelFilter::Info)]
    #[case("Debug", LevelFilter::Debug)]
    fn test_parse_log_level(#[case] input: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_unknown() {
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_file_dispatch_creates_files() {
        let dir = tempdir().unwrap();
        file_dispatch(dir.path(), LevelFilter::Warn).unwrap();
        assert!(dir.path().join(LOG_INFO_FILE_NAME).is_file());
        assert!(dir.path().join(LOG_ERROR_FILE_NAME).is_file());
    }

    #[test]
    fn test_file_dispatch_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(file_dispatch(&dir.path().join("missing"), LevelFilter::Info).is_err());
    }
}
