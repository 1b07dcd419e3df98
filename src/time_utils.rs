//! Time handling in the monitor's fixed UTC+4 offset.
//!
//! Every persisted timestamp is an RFC 3339 string with microsecond precision
//! and a `+04:00` offset, so lexicographic order in SQL equals chronological
//! order. "Now" is read through the [`Clock`] trait so the store can be
//! driven deterministically in tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Offset, SecondsFormat, Utc};

use crate::config::{UTC_OFFSET_LABEL, UTC_OFFSET_SECS};

/// Timestamp type used throughout the crate.
pub type Timestamp = DateTime<FixedOffset>;

/// The monitor's display and storage offset.
pub fn local_offset() -> FixedOffset {
    match FixedOffset::east_opt(UTC_OFFSET_SECS) {
        Some(offset) => offset,
        None => Utc.fix(),
    }
}

/// Current wall-clock time in the monitor's offset.
pub fn now_local() -> Timestamp {
    Utc::now().with_timezone(&local_offset())
}

/// Source of "now" for the state store.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now_local()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: Timestamp) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Storage form: `2026-10-18T12:00:00.000000+04:00`.
pub fn format_timestamp(dt: &Timestamp) -> String {
    dt.with_timezone(&local_offset())
        .to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parses a stored timestamp.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&local_offset()))
}

/// Log form: `2026-10-18 12:00:00+0400`.
pub fn format_for_log(dt: &Timestamp) -> String {
    dt.with_timezone(&local_offset())
        .format("%Y-%m-%d %H:%M:%S%z")
        .to_string()
}

/// Message form: `18.10.2026 12:00:00 (UTC+4)`.
pub fn format_for_message(dt: &Timestamp) -> String {
    format!(
        "{} ({UTC_OFFSET_LABEL})",
        dt.with_timezone(&local_offset()).format("%d.%m.%Y %H:%M:%S")
    )
}

/// Compact duration: `2d 3h`, `1h 5m`, `5m 30s`, `45s`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
