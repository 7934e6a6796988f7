//! Initialisation and configuration of the program's logging.
//!
//! Logging goes to the terminal (colourised when it is one) and, when an
//! output directory is given, to a pair of plain-text log files. The level
//! can be set in `settings.toml` or overridden with the `EXPANSE_LOG_LEVEL`
//! environment variable.
use anyhow::{bail, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Fallback level when neither the environment variable nor the settings
/// file names one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file for ordinary operation messages
const LOG_INFO_FILE_NAME: &str = "expanse_info.log";

/// Log file for warnings and errors, including the data-repair audit trail
const LOG_ERROR_FILE_NAME: &str = "expanse_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Initialise the program logger.
///
/// The `EXPANSE_LOG_LEVEL` environment variable takes precedence over
/// `log_level_from_settings`. When `log_file_path` is given, messages are
/// additionally written to log files in that directory.
pub fn init(log_level_from_settings: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = env::var("EXPANSE_LOG_LEVEL").unwrap_or_else(|_| {
        log_level_from_settings
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    });

    let log_level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {}", unknown),
    };

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let use_colour_stdout = std::io::stdout().is_terminal();
    let use_colour_stderr = std::io::stderr().is_terminal();

    let (info_log_file, err_log_file) = if let Some(log_file_path) = log_file_path {
        let new_log_file = |file_name| {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(log_file_path.join(file_name))
        };
        (
            Some(new_log_file(LOG_INFO_FILE_NAME)?),
            Some(new_log_file(LOG_ERROR_FILE_NAME)?),
        )
    } else {
        (None, None)
    };

    let mut dispatch = Dispatch::new()
        .chain(
            // Non-error messages go to stdout
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stdout, &colours);
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            // Warnings and errors go to stderr
            Dispatch::new()
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stderr, &colours);
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );

    if let Some(info_log_file) = info_log_file {
        dispatch = dispatch.chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(write_log_plain)
                .level(log_level.max(LevelFilter::Info))
                .chain(info_log_file),
        );
    }

    if let Some(err_log_file) = err_log_file {
        dispatch = dispatch.chain(
            Dispatch::new()
                .format(write_log_plain)
                .level(LevelFilter::Warn)
                .chain(err_log_file),
        );
    }

    dispatch.apply().expect("Logger already initialised");
    LOGGER_INIT.set(()).unwrap();

    Ok(())
}

fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log_plain(out, message, record);
    }
}
