//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::{DB_PATH, SITES_CONFIG_PATH};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Command-line options of the `site_monitor` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "site_monitor",
    about = "Probes HTTP(S) endpoints, records outages and escalates reminders"
)]
pub struct Opt {
    /// TOML file with the scheduler settings and the site catalog
    #[arg(long = "config", default_value = SITES_CONFIG_PATH)]
    pub config: PathBuf,

    /// SQLite database holding site state, incidents and mutes
    #[arg(long = "db-path", default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Log level
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Run a single sweep, print its report and exit
    #[arg(long = "once")]
    pub once: bool,
}
