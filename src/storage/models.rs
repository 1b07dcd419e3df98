// storage/models.rs
// Persisted records and their row decoding

use std::fmt;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error_handling::{CheckErrorKind, StoreError};
use crate::time_utils::{parse_timestamp, Timestamp};

/// Availability of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    Up,
    Down,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Up => "UP",
            SiteStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(SiteStatus::Up),
            "DOWN" => Ok(SiteStatus::Down),
            other => Err(StoreError::MalformedStatus(other.to_string())),
        }
    }
}

/// One row of `sites_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteState {
    pub status: SiteStatus,
    /// Consecutive failed sweeps since the last success.
    pub fail_streak: i64,
    pub last_status_change: Timestamp,
    pub last_notify_at: Option<Timestamp>,
    /// Reminders already sent for the current incident.
    pub reminder_count: i64,
    pub next_reminder_at: Option<Timestamp>,
    pub current_incident_id: Option<i64>,
}

impl SiteState {
    pub fn is_down(&self) -> bool {
        self.status == SiteStatus::Down
    }

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            status: status.parse()?,
            fail_streak: row.try_get("fail_streak")?,
            last_status_change: required_timestamp(row, "last_status_change")?,
            last_notify_at: optional_timestamp(row, "last_notify_at")?,
            reminder_count: row.try_get("reminder_count")?,
            next_reminder_at: optional_timestamp(row, "next_reminder_at")?,
            current_incident_id: row.try_get("current_incident_id")?,
        })
    }
}

/// A contiguous DOWN period of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub id: i64,
    pub site_id: String,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub duration_seconds: Option<i64>,
    pub error_type: Option<CheckErrorKind>,
    pub error_message: Option<String>,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let error_type: Option<String> = row.try_get("error_type")?;
        Ok(Self {
            id: row.try_get("id")?,
            site_id: row.try_get("site_id")?,
            started_at: required_timestamp(row, "started_at")?,
            ended_at: optional_timestamp(row, "ended_at")?,
            duration_seconds: row.try_get("duration_seconds")?,
            // Unknown identifiers from older data are kept out of the taxonomy.
            error_type: error_type.and_then(|t| t.parse().ok()),
            error_message: row.try_get("error_message")?,
        })
    }
}

/// A user's reminder mute for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mute {
    pub user_id: i64,
    pub site_id: String,
    pub muted_at: Timestamp,
    /// `last_status_change` of the site when the mute was created.
    pub incident_start: Timestamp,
}

impl Mute {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            site_id: row.try_get("site_id")?,
            muted_at: required_timestamp(row, "muted_at")?,
            incident_start: required_timestamp(row, "incident_start")?,
        })
    }
}

/// Availability statistics derived from the incident ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteStats {
    pub site_id: String,
    pub uptime_7d: f64,
    pub uptime_30d: f64,
    pub incidents_30d: i64,
    pub avg_downtime_seconds: i64,
    pub last_incident_at: Option<Timestamp>,
}

/// Outcome of `record_success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessOutcome {
    /// True when the site just went DOWN → UP.
    pub status_changed: bool,
    /// Duration of the incident that was closed, if any.
    pub downtime_seconds: Option<i64>,
}

/// A reminder claimed by `claim_due_reminder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueReminder {
    /// 1 for the first reminder of an incident.
    pub reminder_number: i64,
    pub downtime_seconds: i64,
    pub next_interval_minutes: i64,
}

pub(crate) fn parse_column(column: &'static str, value: &str) -> Result<Timestamp, StoreError> {
    parse_timestamp(value).map_err(|_| StoreError::MalformedTimestamp {
        column,
        value: value.to_string(),
    })
}

fn required_timestamp(row: &SqliteRow, column: &'static str) -> Result<Timestamp, StoreError> {
    let value: String = row.try_get(column)?;
    parse_column(column, &value)
}

fn optional_timestamp(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<Timestamp>, StoreError> {
    let value: Option<String> = row.try_get(column)?;
    value.map(|v| parse_column(column, &v)).transpose()
}
