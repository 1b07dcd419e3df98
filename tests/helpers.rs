// Shared test helpers for the integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use site_monitor::config::{Defaults, Site};
use site_monitor::storage::run_migrations;
use site_monitor::time_utils::{parse_timestamp, ManualClock};
use site_monitor::{CheckResult, Notifier};

/// In-memory database with migrations applied, on a single connection.
#[allow(dead_code)]
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Clock pinned at 2024-03-01 12:00 UTC+4.
#[allow(dead_code)]
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        parse_timestamp("2024-03-01T12:00:00+04:00").expect("valid timestamp"),
    ))
}

/// Single attempt, short timeout.
#[allow(dead_code)]
pub fn fast_defaults() -> Defaults {
    Defaults {
        retry_count: 1,
        retry_interval_minutes: 0,
        timeout_seconds: 1,
    }
}

/// A plain-HTTP site pointing at `path` on the mock server.
#[allow(dead_code)]
pub fn mock_site(id: &str, server: &httptest::Server, path: &str) -> Site {
    let mut site = Site::new(id, format!("http://{}{}", server.addr(), path));
    site.check_ssl = false;
    site.notify_users = vec![100, 200];
    site
}

/// What a [`RecordingNotifier`] was asked to deliver.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Down { site_id: String, error: Option<String> },
    Up { site_id: String, downtime: Option<i64> },
    Reminder { site_id: String, number: i64, muted: Vec<i64> },
}

#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().expect("notifier lock"))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_site_down(&self, site: &Site, result: &CheckResult) {
        self.sent.lock().expect("notifier lock").push(Sent::Down {
            site_id: site.id.clone(),
            error: result.error.clone(),
        });
    }

    async fn notify_site_up(&self, site: &Site, _result: &CheckResult, downtime: Option<i64>) {
        self.sent.lock().expect("notifier lock").push(Sent::Up {
            site_id: site.id.clone(),
            downtime,
        });
    }

    async fn send_reminder(
        &self,
        site: &Site,
        reminder_number: i64,
        _downtime_seconds: i64,
        _next_interval_minutes: i64,
        _recipients: &[i64],
        muted_users: &[i64],
    ) {
        self.sent.lock().expect("notifier lock").push(Sent::Reminder {
            site_id: site.id.clone(),
            number: reminder_number,
            muted: muted_users.to_vec(),
        });
    }
}
