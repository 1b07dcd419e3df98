//! Per-site state machine.
//!
//! Every mutating operation runs as one SQLite transaction while holding the
//! store's write lock: read the current row, compute the next state, write,
//! commit. A dropped future drops its transaction, which rolls back, so a
//! cancelled sweep never leaves a half-applied transition behind.
//!
//! Invariant: `status = DOWN` ⇔ `current_incident_id` is set ⇔ exactly one
//! incident of the site has no `ended_at`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use log::{debug, info, warn};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use super::models::{parse_column, DueReminder, SiteState, SiteStatus, SuccessOutcome};
use super::mutes::delete_site_mutes;
use crate::config::{MAX_ERROR_MESSAGE_LENGTH, REMINDER_BASE_MINUTES, REMINDER_CAP_MINUTES};
use crate::error_handling::{CheckErrorKind, StoreError};
use crate::time_utils::{format_timestamp, Clock, Timestamp};

const STATE_COLUMNS: &str = "status, fail_streak, last_status_change, last_notify_at, \
     reminder_count, next_reminder_at, current_incident_id";

/// Minutes until the next reminder after `reminders_sent` reminders.
///
/// `min(15 * 2^n, 240)`: 15, 30, 60, 120, 240, 240, ...
pub fn reminder_interval_minutes(reminders_sent: i64) -> i64 {
    let exponent = reminders_sent.clamp(0, 16) as u32;
    REMINDER_BASE_MINUTES
        .saturating_mul(1i64 << exponent)
        .min(REMINDER_CAP_MINUTES)
}

/// Durable monitoring state backed by SQLite.
pub struct StateStore {
    pub(super) pool: SqlitePool,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) write_lock: Mutex<()>,
}

impl StateStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current time as seen by the store.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Returns the state of `site_id`, creating a default UP row first.
    pub async fn get_state(&self, site_id: &str) -> Result<SiteState, StoreError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlError)?;
        let state = ensure_state(&mut tx, site_id, &now).await?;
        tx.commit().await.map_err(StoreError::SqlError)?;
        Ok(state)
    }

    /// Every known site state, keyed by site id.
    pub async fn get_all_states(&self) -> Result<BTreeMap<String, SiteState>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT site_id, {STATE_COLUMNS} FROM sites_state ORDER BY site_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut states = BTreeMap::new();
        for row in &rows {
            let site_id: String = sqlx::Row::try_get(row, "site_id")?;
            states.insert(site_id, SiteState::from_row(row)?);
        }
        Ok(states)
    }

    /// Records a successful sweep.
    ///
    /// From DOWN this closes the open incident, clears all mutes of the site
    /// and resets the reminder schedule. From UP only `fail_streak` is reset.
    pub async fn record_success(&self, site_id: &str) -> Result<SuccessOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let now_str = format_timestamp(&now);
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlError)?;
        let state = ensure_state(&mut tx, site_id, &now).await?;

        if state.status == SiteStatus::Up {
            sqlx::query("UPDATE sites_state SET fail_streak = 0, updated_at = ? WHERE site_id = ?")
                .bind(&now_str)
                .bind(site_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await.map_err(StoreError::SqlError)?;
            return Ok(SuccessOutcome {
                status_changed: false,
                downtime_seconds: None,
            });
        }

        let incident_id = match state.current_incident_id {
            Some(id) => Some(id),
            None => {
                warn!("[{site_id}] DOWN without an incident reference, closing any open incident");
                open_incident_id(&mut tx, site_id).await?
            }
        };
        let downtime_seconds = match incident_id {
            Some(id) => Some(close_incident(&mut tx, site_id, id, &now).await?),
            None => None,
        };

        let cleared = delete_site_mutes(&mut tx, site_id).await?;

        sqlx::query(
            "UPDATE sites_state SET
                status = 'UP',
                fail_streak = 0,
                last_status_change = ?,
                last_notify_at = ?,
                reminder_count = 0,
                next_reminder_at = NULL,
                current_incident_id = NULL,
                updated_at = ?
             WHERE site_id = ?",
        )
        .bind(&now_str)
        .bind(&now_str)
        .bind(&now_str)
        .bind(site_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(StoreError::SqlError)?;

        info!(
            "[{site_id}] DOWN -> UP after {}s, {cleared} mute(s) cleared",
            downtime_seconds.unwrap_or_default()
        );
        Ok(SuccessOutcome {
            status_changed: true,
            downtime_seconds,
        })
    }

    /// Records a failed sweep. Returns true when the site just went UP → DOWN.
    pub async fn record_failure(
        &self,
        site_id: &str,
        error_type: CheckErrorKind,
        error_message: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let now_str = format_timestamp(&now);
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlError)?;
        let state = ensure_state(&mut tx, site_id, &now).await?;

        if state.status == SiteStatus::Down {
            sqlx::query(
                "UPDATE sites_state SET fail_streak = fail_streak + 1, updated_at = ? WHERE site_id = ?",
            )
            .bind(&now_str)
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await.map_err(StoreError::SqlError)?;
            debug!("[{site_id}] still DOWN, fail streak {}", state.fail_streak + 1);
            return Ok(false);
        }

        let incident_id: i64 = sqlx::query_scalar(
            "INSERT INTO incidents (site_id, started_at, error_type, error_message)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(site_id)
        .bind(&now_str)
        .bind(error_type.as_str())
        .bind(truncate_message(error_message))
        .fetch_one(&mut *tx)
        .await?;

        let next_reminder_at = now + Duration::minutes(reminder_interval_minutes(0));
        sqlx::query(
            "UPDATE sites_state SET
                status = 'DOWN',
                fail_streak = ?,
                last_status_change = ?,
                last_notify_at = ?,
                reminder_count = 0,
                next_reminder_at = ?,
                current_incident_id = ?,
                updated_at = ?
             WHERE site_id = ?",
        )
        .bind(state.fail_streak + 1)
        .bind(&now_str)
        .bind(&now_str)
        .bind(format_timestamp(&next_reminder_at))
        .bind(incident_id)
        .bind(&now_str)
        .bind(site_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(StoreError::SqlError)?;

        info!("[{site_id}] UP -> DOWN ({error_type}), incident #{incident_id}");
        Ok(true)
    }

    /// DOWN sites whose next reminder is due at `now`, with the number of
    /// reminders already sent. Earliest due first.
    pub async fn sites_needing_reminder(
        &self,
        now: &Timestamp,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT site_id, reminder_count FROM sites_state
             WHERE status = 'DOWN'
               AND next_reminder_at IS NOT NULL
               AND next_reminder_at <= ?
             ORDER BY next_reminder_at, site_id",
        )
        .bind(format_timestamp(now))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Advances the reminder schedule after a reminder went out.
    ///
    /// Returns the minutes until the next reminder, or `None` for a site that
    /// is not DOWN, which is left untouched.
    pub async fn mark_reminder_sent(&self, site_id: &str) -> Result<Option<i64>, StoreError> {
        let claimed = self.advance_reminder(site_id, false).await?;
        Ok(claimed.map(|reminder| reminder.next_interval_minutes))
    }

    /// Claims the reminder of `site_id` if the site is DOWN and its reminder
    /// is due, advancing the schedule in the same transaction.
    ///
    /// `None` means no reminder must be sent: the site recovered or was
    /// already reminded since it was listed by `sites_needing_reminder`.
    pub async fn claim_due_reminder(
        &self,
        site_id: &str,
    ) -> Result<Option<DueReminder>, StoreError> {
        self.advance_reminder(site_id, true).await
    }

    async fn advance_reminder(
        &self,
        site_id: &str,
        due_only: bool,
    ) -> Result<Option<DueReminder>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let now_str = format_timestamp(&now);
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlError)?;
        let state = ensure_state(&mut tx, site_id, &now).await?;

        if !state.is_down() {
            tx.commit().await.map_err(StoreError::SqlError)?;
            warn!("[{site_id}] reminder skipped, site is UP");
            return Ok(None);
        }
        if due_only && !matches!(state.next_reminder_at, Some(due) if due <= now) {
            tx.commit().await.map_err(StoreError::SqlError)?;
            debug!("[{site_id}] reminder no longer due");
            return Ok(None);
        }

        let reminder_count = state.reminder_count + 1;
        let interval = reminder_interval_minutes(reminder_count);
        let next_reminder_at = now + Duration::minutes(interval);
        sqlx::query(
            "UPDATE sites_state SET reminder_count = ?, next_reminder_at = ?, updated_at = ?
             WHERE site_id = ?",
        )
        .bind(reminder_count)
        .bind(format_timestamp(&next_reminder_at))
        .bind(&now_str)
        .bind(site_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await.map_err(StoreError::SqlError)?;

        Ok(Some(DueReminder {
            reminder_number: reminder_count,
            downtime_seconds: (now - state.last_status_change).num_seconds().max(0),
            next_interval_minutes: interval,
        }))
    }

    /// Seconds the site has been DOWN, 0 when it is UP.
    pub async fn downtime_seconds(&self, site_id: &str) -> Result<i64, StoreError> {
        let state = self.get_state(site_id).await?;
        if !state.is_down() {
            return Ok(0);
        }
        Ok((self.clock.now() - state.last_status_change)
            .num_seconds()
            .max(0))
    }
}

/// Loads the state row of `site_id`, inserting the default UP row if absent.
pub(super) async fn ensure_state(
    conn: &mut SqliteConnection,
    site_id: &str,
    now: &Timestamp,
) -> Result<SiteState, StoreError> {
    let now_str = format_timestamp(now);
    sqlx::query(
        "INSERT OR IGNORE INTO sites_state (site_id, status, fail_streak, last_status_change, reminder_count, created_at, updated_at)
         VALUES (?, 'UP', 0, ?, 0, ?, ?)",
    )
    .bind(site_id)
    .bind(&now_str)
    .bind(&now_str)
    .bind(&now_str)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(&format!(
        "SELECT {STATE_COLUMNS} FROM sites_state WHERE site_id = ?"
    ))
    .bind(site_id)
    .fetch_one(&mut *conn)
    .await?;
    SiteState::from_row(&row)
}

async fn open_incident_id(
    conn: &mut SqliteConnection,
    site_id: &str,
) -> Result<Option<i64>, StoreError> {
    let id = sqlx::query_scalar(
        "SELECT id FROM incidents WHERE site_id = ? AND ended_at IS NULL ORDER BY id DESC LIMIT 1",
    )
    .bind(site_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

/// Closes incident `incident_id` at `now` and returns its duration.
async fn close_incident(
    conn: &mut SqliteConnection,
    site_id: &str,
    incident_id: i64,
    now: &Timestamp,
) -> Result<i64, StoreError> {
    let started_at: Option<String> =
        sqlx::query_scalar("SELECT started_at FROM incidents WHERE id = ? AND site_id = ?")
            .bind(incident_id)
            .bind(site_id)
            .fetch_optional(&mut *conn)
            .await?;
    let started_at = match started_at {
        Some(value) => parse_column("started_at", &value)?,
        None => {
            return Err(StoreError::MissingIncident {
                site_id: site_id.to_string(),
                incident_id,
            })
        }
    };

    let duration = (*now - started_at).num_seconds().max(0);
    sqlx::query(
        "UPDATE incidents SET ended_at = ?, duration_seconds = ? WHERE id = ? AND ended_at IS NULL",
    )
    .bind(format_timestamp(now))
    .bind(duration)
    .bind(incident_id)
    .execute(&mut *conn)
    .await?;
    Ok(duration)
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LENGTH {
        message.to_string()
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::{count_open_incidents, create_test_store};

    async fn assert_invariant(store: &StateStore, site_id: &str) {
        let state = store.get_state(site_id).await.unwrap();
        let open = count_open_incidents(store.pool(), site_id).await;
        if state.is_down() {
            assert!(state.current_incident_id.is_some());
            assert_eq!(open, 1);
        } else {
            assert_eq!(state.current_incident_id, None);
            assert_eq!(open, 0);
        }
    }

    #[test]
    fn test_reminder_interval_schedule() {
        let intervals: Vec<i64> = (0..7).map(reminder_interval_minutes).collect();
        assert_eq!(intervals, vec![15, 30, 60, 120, 240, 240, 240]);
        assert_eq!(reminder_interval_minutes(1000), 240);
        assert_eq!(reminder_interval_minutes(-1), 15);
    }

    #[test]
    fn test_truncate_message_respects_char_boundaries() {
        let long = "ж".repeat(MAX_ERROR_MESSAGE_LENGTH + 10);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_LENGTH);
        assert_eq!(truncate_message("short"), "short");
    }

    #[tokio::test]
    async fn test_get_state_creates_default_row() {
        let (store, clock) = create_test_store().await;
        let state = store.get_state("shop").await.unwrap();
        assert_eq!(state.status, SiteStatus::Up);
        assert_eq!(state.fail_streak, 0);
        assert_eq!(state.reminder_count, 0);
        assert_eq!(state.next_reminder_at, None);
        assert_eq!(state.last_status_change, clock.now());

        let all = store.get_all_states().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("shop"));
    }

    #[tokio::test]
    async fn test_up_to_down_transition() {
        let (store, clock) = create_test_store().await;
        let t0 = clock.now();

        let changed = store
            .record_failure("shop", CheckErrorKind::WrongCode, "Wrong HTTP code: 500, expected: 200")
            .await
            .unwrap();
        assert!(changed);

        let state = store.get_state("shop").await.unwrap();
        assert_eq!(state.status, SiteStatus::Down);
        assert_eq!(state.fail_streak, 1);
        assert_eq!(state.reminder_count, 0);
        assert_eq!(state.last_status_change, t0);
        assert_eq!(state.last_notify_at, Some(t0));
        assert_eq!(state.next_reminder_at, Some(t0 + Duration::minutes(15)));

        let incident = store
            .get_incident(state.current_incident_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(incident.started_at, t0);
        assert_eq!(incident.error_type, Some(CheckErrorKind::WrongCode));
        assert!(incident.is_open());
        assert_invariant(&store, "shop").await;
    }

    #[tokio::test]
    async fn test_repeated_failure_only_increments_streak() {
        let (store, clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();
        let first = store.get_state("shop").await.unwrap();

        clock.advance(Duration::minutes(3));
        let changed = store
            .record_failure("shop", CheckErrorKind::NoResponse, "Connection error")
            .await
            .unwrap();
        assert!(!changed);

        let second = store.get_state("shop").await.unwrap();
        assert_eq!(second.fail_streak, 2);
        assert_eq!(second.current_incident_id, first.current_incident_id);
        assert_eq!(second.next_reminder_at, first.next_reminder_at);
        assert_invariant(&store, "shop").await;
    }

    #[tokio::test]
    async fn test_recovery_closes_incident_and_clears_mutes() {
        let (store, clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();
        let incident_id = store.get_state("shop").await.unwrap().current_incident_id.unwrap();
        assert!(store.mute(7, "shop").await.unwrap());
        store.mark_reminder_sent("shop").await.unwrap();

        clock.advance(Duration::seconds(90));
        let outcome = store.record_success("shop").await.unwrap();
        assert!(outcome.status_changed);
        assert_eq!(outcome.downtime_seconds, Some(90));

        let incident = store.get_incident(incident_id).await.unwrap().unwrap();
        assert_eq!(incident.duration_seconds, Some(90));
        assert_eq!(incident.ended_at, Some(clock.now()));

        let state = store.get_state("shop").await.unwrap();
        assert_eq!(state.status, SiteStatus::Up);
        assert_eq!(state.reminder_count, 0);
        assert_eq!(state.next_reminder_at, None);
        assert_eq!(state.fail_streak, 0);
        assert!(store.muted_users("shop").await.unwrap().is_empty());
        assert_invariant(&store, "shop").await;
    }

    #[tokio::test]
    async fn test_success_while_up_is_idempotent() {
        let (store, _clock) = create_test_store().await;
        let before = store.get_state("shop").await.unwrap();
        for _ in 0..3 {
            let outcome = store.record_success("shop").await.unwrap();
            assert!(!outcome.status_changed);
            assert_eq!(outcome.downtime_seconds, None);
        }
        let after = store.get_state("shop").await.unwrap();
        assert_eq!(before, after);
        assert_invariant(&store, "shop").await;
    }

    #[tokio::test]
    async fn test_reminder_schedule_doubles_and_caps() {
        let (store, clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();

        let mut due = store.get_state("shop").await.unwrap().next_reminder_at.unwrap();
        let mut gaps = vec![(due - clock.now()).num_minutes()];
        for expected_count in 1..=6 {
            clock.set(due);
            let pending = store.sites_needing_reminder(&clock.now()).await.unwrap();
            assert_eq!(pending, vec![("shop".to_string(), expected_count - 1)]);

            let interval = store.mark_reminder_sent("shop").await.unwrap().unwrap();
            let state = store.get_state("shop").await.unwrap();
            assert_eq!(state.reminder_count, expected_count);
            due = state.next_reminder_at.unwrap();
            assert_eq!((due - clock.now()).num_minutes(), interval);
            gaps.push(interval);
        }
        assert_eq!(gaps, vec![15, 30, 60, 120, 240, 240, 240]);
    }

    #[tokio::test]
    async fn test_reminder_not_due_before_schedule() {
        let (store, clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();

        clock.advance(Duration::minutes(14));
        assert!(store.sites_needing_reminder(&clock.now()).await.unwrap().is_empty());
        clock.advance(Duration::minutes(1));
        assert_eq!(store.sites_needing_reminder(&clock.now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_reminder_on_up_site_is_a_no_op() {
        let (store, _clock) = create_test_store().await;
        let before = store.get_state("shop").await.unwrap();
        assert_eq!(store.mark_reminder_sent("shop").await.unwrap(), None);
        assert_eq!(store.get_state("shop").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_claim_due_reminder() {
        let (store, clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();

        clock.advance(Duration::minutes(10));
        assert_eq!(store.claim_due_reminder("shop").await.unwrap(), None);

        clock.advance(Duration::minutes(6));
        assert_eq!(
            store.claim_due_reminder("shop").await.unwrap(),
            Some(DueReminder {
                reminder_number: 1,
                downtime_seconds: 16 * 60,
                next_interval_minutes: 30,
            })
        );
        // Claimed once per due time.
        assert_eq!(store.claim_due_reminder("shop").await.unwrap(), None);
        assert_eq!(store.get_state("shop").await.unwrap().reminder_count, 1);
    }

    #[tokio::test]
    async fn test_no_reminder_after_recovery_between_listing_and_claim() {
        let (store, clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();
        clock.advance(Duration::minutes(15));
        let due = store.sites_needing_reminder(&clock.now()).await.unwrap();
        assert_eq!(due, vec![("shop".to_string(), 0)]);

        store.record_success("shop").await.unwrap();

        assert_eq!(store.claim_due_reminder("shop").await.unwrap(), None);
        let state = store.get_state("shop").await.unwrap();
        assert_eq!(state.reminder_count, 0);
        assert_eq!(state.next_reminder_at, None);
    }

    #[tokio::test]
    async fn test_downtime_seconds() {
        let (store, clock) = create_test_store().await;
        assert_eq!(store.downtime_seconds("shop").await.unwrap(), 0);
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();
        clock.advance(Duration::seconds(125));
        assert_eq!(store.downtime_seconds("shop").await.unwrap(), 125);
    }

    #[tokio::test]
    async fn test_invariant_over_mixed_sequence() {
        let (store, clock) = create_test_store().await;
        let outcomes = [false, false, true, false, true, true, false];
        for ok in outcomes {
            clock.advance(Duration::minutes(3));
            if ok {
                store.record_success("shop").await.unwrap();
            } else {
                store
                    .record_failure("shop", CheckErrorKind::NoResponse, "Connection error")
                    .await
                    .unwrap();
            }
            assert_invariant(&store, "shop").await;
        }
        let history = store.site_incidents("shop", 30, 10).await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_incident_is_a_fault() {
        let (store, _clock) = create_test_store().await;
        store
            .record_failure("shop", CheckErrorKind::Timeout, "Timeout")
            .await
            .unwrap();
        sqlx::query("DELETE FROM incidents")
            .execute(store.pool())
            .await
            .unwrap();

        let result = store.record_success("shop").await;
        assert!(matches!(result, Err(StoreError::MissingIncident { .. })));
        // The failed transition rolled back.
        assert!(store.get_state("shop").await.unwrap().is_down());
    }

    #[tokio::test]
    async fn test_malformed_timestamp_propagates() {
        let (store, _clock) = create_test_store().await;
        store.get_state("shop").await.unwrap();
        sqlx::query("UPDATE sites_state SET last_status_change = 'yesterday'")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(matches!(
            store.get_state("shop").await,
            Err(StoreError::MalformedTimestamp { column: "last_status_change", .. })
        ));
    }
}
