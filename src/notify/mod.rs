//! Outbound notifications.
//!
//! The scheduler only talks to the [`Notifier`] trait. Delivery problems are
//! the notifier's to log; they never undo a committed state transition.

mod messages;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::check::CheckResult;
use crate::config::Site;
use crate::time_utils::Clock;

pub use messages::{format_down_message, format_reminder_message, format_up_message};

/// Delivers down/up/reminder messages to a site's recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The site just went UP → DOWN.
    async fn notify_site_down(&self, site: &Site, result: &CheckResult);

    /// The site just went DOWN → UP after `downtime_seconds`.
    async fn notify_site_up(&self, site: &Site, result: &CheckResult, downtime_seconds: Option<i64>);

    /// The site is still DOWN. `muted_users` must not receive this reminder.
    async fn send_reminder(
        &self,
        site: &Site,
        reminder_number: i64,
        downtime_seconds: i64,
        next_interval_minutes: i64,
        recipients: &[i64],
        muted_users: &[i64],
    );
}

/// Writes every notification to the log, once per recipient.
pub struct LogNotifier {
    clock: Arc<dyn Clock>,
}

impl LogNotifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn deliver(&self, site: &Site, kind: &str, recipients: &[i64], message: &str) {
        debug!("[{}] {kind} message:\n{message}", site.id);
        if recipients.is_empty() {
            info!("[{}] {kind} notification has no recipients", site.id);
        }
        for user_id in recipients {
            info!("[{}] {kind} notification sent to user {user_id}", site.id);
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_site_down(&self, site: &Site, result: &CheckResult) {
        let message = format_down_message(site, result, &self.clock.now());
        self.deliver(site, "down", &site.notify_users, &message);
    }

    async fn notify_site_up(&self, site: &Site, result: &CheckResult, downtime_seconds: Option<i64>) {
        let message = format_up_message(site, result, downtime_seconds, &self.clock.now());
        self.deliver(site, "recovery", &site.notify_users, &message);
    }

    async fn send_reminder(
        &self,
        site: &Site,
        reminder_number: i64,
        downtime_seconds: i64,
        next_interval_minutes: i64,
        recipients: &[i64],
        muted_users: &[i64],
    ) {
        let active = unmuted_recipients(recipients, muted_users);
        let skipped = recipients.len() - active.len();
        if skipped > 0 {
            debug!("[{}] reminder skipped for {skipped} muted user(s)", site.id);
        }
        let message = format_reminder_message(
            site,
            reminder_number,
            downtime_seconds,
            next_interval_minutes,
            &self.clock.now(),
        );
        self.deliver(site, "reminder", &active, &message);
    }
}

/// Recipients that have not muted the site, in their original order.
pub fn unmuted_recipients(recipients: &[i64], muted_users: &[i64]) -> Vec<i64> {
    recipients
        .iter()
        .copied()
        .filter(|user_id| !muted_users.contains(user_id))
        .collect()
}
