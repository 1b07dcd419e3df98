//! Incident history and availability statistics.

use chrono::Duration;

use super::models::{Incident, SiteStats};
use super::StateStore;
use crate::config::{STATS_LONG_WINDOW_DAYS, STATS_SHORT_WINDOW_DAYS};
use crate::error_handling::StoreError;
use crate::time_utils::{format_timestamp, Timestamp};

const INCIDENT_COLUMNS: &str =
    "id, site_id, started_at, ended_at, duration_seconds, error_type, error_message";

impl StateStore {
    pub async fn get_incident(&self, incident_id: i64) -> Result<Option<Incident>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?"
        ))
        .bind(incident_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Incident::from_row).transpose()
    }

    /// Incidents of `site_id` started within the last `days` days, newest first.
    pub async fn site_incidents(
        &self,
        site_id: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<Incident>, StoreError> {
        let since = self.clock.now() - Duration::days(days);
        let rows = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents
             WHERE site_id = ? AND started_at >= ?
             ORDER BY started_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(site_id)
        .bind(format_timestamp(&since))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Incident::from_row).collect()
    }

    /// Uptime over the last 7 and 30 days plus incident figures for 30 days.
    ///
    /// Downtime is the overlap of each incident with the window, so an
    /// incident that began before the window still counts for the part inside
    /// it. Open incidents end at "now".
    pub async fn site_stats(&self, site_id: &str) -> Result<SiteStats, StoreError> {
        let now = self.clock.now();
        let long_start = now - Duration::days(STATS_LONG_WINDOW_DAYS);
        let short_start = now - Duration::days(STATS_SHORT_WINDOW_DAYS);

        let rows = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents
             WHERE site_id = ? AND (ended_at IS NULL OR ended_at > ?)
             ORDER BY started_at DESC, id DESC"
        ))
        .bind(site_id)
        .bind(format_timestamp(&long_start))
        .fetch_all(&self.pool)
        .await?;
        let incidents = rows
            .iter()
            .map(Incident::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let recent: Vec<&Incident> = incidents
            .iter()
            .filter(|i| i.started_at >= long_start)
            .collect();
        let closed: Vec<i64> = recent.iter().filter_map(|i| i.duration_seconds).collect();
        let avg_downtime_seconds = if closed.is_empty() {
            0
        } else {
            closed.iter().sum::<i64>() / closed.len() as i64
        };

        Ok(SiteStats {
            site_id: site_id.to_string(),
            uptime_7d: uptime_percent(&incidents, short_start, now),
            uptime_30d: uptime_percent(&incidents, long_start, now),
            incidents_30d: recent.len() as i64,
            avg_downtime_seconds,
            last_incident_at: recent.first().map(|i| i.started_at),
        })
    }
}

/// Seconds of `incidents` falling inside `[window_start, now]`.
fn downtime_in_window(incidents: &[Incident], window_start: Timestamp, now: Timestamp) -> i64 {
    incidents
        .iter()
        .map(|incident| {
            let start = incident.started_at.max(window_start);
            let end = incident.ended_at.unwrap_or(now).min(now);
            (end - start).num_seconds().max(0)
        })
        .sum()
}

/// `100 * (1 - downtime / window)`, rounded to two decimals.
fn uptime_percent(incidents: &[Incident], window_start: Timestamp, now: Timestamp) -> f64 {
    let window = (now - window_start).num_seconds();
    if window <= 0 {
        return 100.0;
    }
    let downtime = downtime_in_window(incidents, window_start, now).min(window);
    let uptime = 100.0 * (1.0 - downtime as f64 / window as f64);
    (uptime * 100.0).round() / 100.0
}
