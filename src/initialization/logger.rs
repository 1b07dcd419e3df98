//! Logger initialization.

use std::io::Write;

use colored::*;
use log::{info, LevelFilter};

use crate::check::CheckResult;
use crate::config::LogFormat;
use crate::error_handling::InitializationError;
use crate::time_utils::{format_for_log, format_timestamp, now_local};

/// Initializes the logger with the specified level and format.
///
/// `RUST_LOG` is read first, then `level` overrides it, so
/// `RUST_LOG=site_monitor=debug` still works for per-module filtering while
/// `--log-level` stays authoritative. Timestamps are rendered in UTC+4.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already set.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug site_monitor --config sites.toml
/// site_monitor --config sites.toml --log-level debug --log-format json
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    colored::control::set_override(format == LogFormat::Plain);

    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    builder.filter_module("sqlx", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("hyper_util", LevelFilter::Info);
    builder.filter_module("rustls", LevelFilter::Warn);
    builder.filter_module("site_monitor", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    format_timestamp(&now_local()),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = record.level();
                let colored_level = match level {
                    log::Level::Error => level.to_string().red(),
                    log::Level::Warn => level.to_string().yellow(),
                    log::Level::Info => level.to_string().green(),
                    log::Level::Debug => level.to_string().blue(),
                    log::Level::Trace => level.to_string().purple(),
                };

                writeln!(
                    buf,
                    "{} {} [{}] {}",
                    format_for_log(&now_local()).dimmed(),
                    record.target().cyan(),
                    colored_level,
                    record.args()
                )
            });
        }
    }

    builder.try_init().map_err(InitializationError::from)?;

    Ok(())
}

/// Renders a check result as `OK (200) 123ms` or `ERROR <message>`.
fn check_result_line(result: &CheckResult) -> String {
    if result.success {
        let code = result
            .status_code
            .map(|c| format!("({c})"))
            .unwrap_or_default();
        let time = result
            .response_time_ms
            .map(|ms| format!(" {ms}ms"))
            .unwrap_or_default();
        format!("OK {code}{time}")
    } else {
        format!(
            "ERROR {}",
            result.error.as_deref().unwrap_or("Unknown error")
        )
    }
}

/// Logs the final result of a site check.
pub fn log_check_result(site_id: &str, result: &CheckResult) {
    info!("[{site_id}] {}", check_result_line(result));
}
