//! Configuration constants.
//!
//! This module defines the fixed operational parameters of the monitor:
//! reminder escalation schedule, timestamp offset, TLS probe timeouts and
//! default file locations.

/// Default location of the SQLite state database.
pub const DB_PATH: &str = "./monitor.db";

/// Default location of the TOML site catalog.
pub const SITES_CONFIG_PATH: &str = "./sites.toml";

// Reminder escalation
/// Interval before the first reminder of an incident, in minutes.
pub const REMINDER_BASE_MINUTES: i64 = 15;
/// Upper bound for the interval between two reminders, in minutes.
/// The schedule is 15, 30, 60, 120, 240, 240, ...
pub const REMINDER_CAP_MINUTES: i64 = 240;

// Timestamps
/// Offset of every persisted and displayed timestamp (UTC+4).
pub const UTC_OFFSET_SECS: i32 = 4 * 3600;
/// Human-readable label of [`UTC_OFFSET_SECS`], appended to messages.
pub const UTC_OFFSET_LABEL: &str = "UTC+4";

// Network operation timeouts
/// TCP connection timeout for the certificate probe, in seconds.
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// TLS handshake timeout for the certificate probe, in seconds.
pub const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// Port used when an `https` URL does not name one.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Maximum stored error message length in characters.
/// Longer messages are truncated before they reach the incident ledger.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

// Statistics windows
pub const STATS_SHORT_WINDOW_DAYS: i64 = 7;
pub const STATS_LONG_WINDOW_DAYS: i64 = 30;
