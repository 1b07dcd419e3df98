//! Notification texts.

use crate::check::CheckResult;
use crate::config::Site;
use crate::time_utils::{format_duration, format_for_message, Timestamp};

fn status_code(result: &CheckResult) -> String {
    result
        .status_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn format_down_message(site: &Site, result: &CheckResult, at: &Timestamp) -> String {
    format!(
        "🚨 Site is down\n\
         Name: {}\n\
         URL: {}\n\
         Support level: {}\n\
         Error: {}\n\
         Code: {}\n\
         Time: {}",
        site.display_name(),
        site.url,
        site.support_level,
        result.error.as_deref().unwrap_or("unknown error"),
        status_code(result),
        format_for_message(at)
    )
}

pub fn format_up_message(
    site: &Site,
    result: &CheckResult,
    downtime_seconds: Option<i64>,
    at: &Timestamp,
) -> String {
    let downtime = downtime_seconds
        .map(|s| format!("Downtime: {}\n", format_duration(s)))
        .unwrap_or_default();
    format!(
        "✅ Site is back up\n\
         Name: {}\n\
         URL: {}\n\
         Support level: {}\n\
         {downtime}\
         Code: {}\n\
         Time: {}",
        site.display_name(),
        site.url,
        site.support_level,
        status_code(result),
        format_for_message(at)
    )
}

pub fn format_reminder_message(
    site: &Site,
    reminder_number: i64,
    downtime_seconds: i64,
    next_interval_minutes: i64,
    at: &Timestamp,
) -> String {
    format!(
        "⏰ Reminder #{reminder_number}: site is still down\n\
         Name: {}\n\
         URL: {}\n\
         Support level: {}\n\
         Down for: {}\n\
         Next reminder in {next_interval_minutes} min\n\
         Time: {}",
        site.display_name(),
        site.url,
        site.support_level,
        format_duration(downtime_seconds),
        format_for_message(at)
    )
}
