//! Error type definitions.
//!
//! Check outcomes ([`CheckErrorKind`]) are business results carried inside a
//! `CheckResult`. The `*Error` enums are faults and propagate with `?`.

use std::str::FromStr;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Error types for the site catalog.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Error types for state store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// A persisted timestamp could not be parsed.
    #[error("Malformed timestamp '{value}' in {column}")]
    MalformedTimestamp { column: &'static str, value: String },

    /// A persisted status is neither UP nor DOWN.
    #[error("Malformed site status '{0}'")]
    MalformedStatus(String),

    /// A DOWN site references an incident row that does not exist.
    #[error("Site '{site_id}' references missing incident {incident_id}")]
    MissingIncident { site_id: String, incident_id: i64 },
}

/// Why a check failed.
///
/// This is the single vocabulary used for incident classification, message
/// formatting and logging.
///
/// - transport: `Timeout`, `NoResponse`
/// - protocol: `WrongCode`
/// - trust: `SslExpired`, `SslMismatch`
/// - content: `KeywordMissing`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum CheckErrorKind {
    Timeout,
    NoResponse,
    WrongCode,
    SslExpired,
    SslMismatch,
    KeywordMissing,
}

impl CheckErrorKind {
    /// Stable identifier persisted in `incidents.error_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckErrorKind::Timeout => "timeout",
            CheckErrorKind::NoResponse => "no_response",
            CheckErrorKind::WrongCode => "wrong_code",
            CheckErrorKind::SslExpired => "ssl_expired",
            CheckErrorKind::SslMismatch => "ssl_mismatch",
            CheckErrorKind::KeywordMissing => "keyword_missing",
        }
    }

    /// Short human-readable description used in notifications.
    pub fn describe(&self) -> &'static str {
        match self {
            CheckErrorKind::Timeout => "Request timed out",
            CheckErrorKind::NoResponse => "No response",
            CheckErrorKind::WrongCode => "Unexpected HTTP status",
            CheckErrorKind::SslExpired => "SSL certificate expired",
            CheckErrorKind::SslMismatch => "SSL certificate does not match host",
            CheckErrorKind::KeywordMissing => "Expected content missing",
        }
    }
}

impl std::fmt::Display for CheckErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(CheckErrorKind::Timeout),
            "no_response" => Ok(CheckErrorKind::NoResponse),
            "wrong_code" => Ok(CheckErrorKind::WrongCode),
            "ssl_expired" => Ok(CheckErrorKind::SslExpired),
            "ssl_mismatch" => Ok(CheckErrorKind::SslMismatch),
            "keyword_missing" => Ok(CheckErrorKind::KeywordMissing),
            other => Err(format!("unknown check error kind '{other}'")),
        }
    }
}
