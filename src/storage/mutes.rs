//! Per-user reminder mutes.
//!
//! A mute only silences reminders of the incident active when it was
//! created: `record_success` deletes every mute of the site on recovery.

use log::info;
use sqlx::SqliteConnection;

use super::models::Mute;
use super::state::ensure_state;
use super::StateStore;
use crate::error_handling::StoreError;
use crate::time_utils::format_timestamp;

impl StateStore {
    /// Mutes reminders of `site_id` for `user_id`. False if already muted.
    pub async fn mute(&self, user_id: i64, site_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(StoreError::SqlError)?;
        let state = ensure_state(&mut tx, site_id, &now).await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO user_mutes (user_id, site_id, muted_at, incident_start)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(site_id)
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&state.last_status_change))
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await.map_err(StoreError::SqlError)?;

        if inserted > 0 {
            info!("[{site_id}] reminders muted for user {user_id}");
        }
        Ok(inserted > 0)
    }

    /// False if the user had no mute for the site.
    pub async fn unmute(&self, user_id: i64, site_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let deleted = sqlx::query("DELETE FROM user_mutes WHERE user_id = ? AND site_id = ?")
            .bind(user_id)
            .bind(site_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn is_muted(&self, user_id: i64, site_id: &str) -> Result<bool, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_mutes WHERE user_id = ? AND site_id = ?")
                .bind(user_id)
                .bind(site_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn get_mute(&self, user_id: i64, site_id: &str) -> Result<Option<Mute>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, site_id, muted_at, incident_start FROM user_mutes
             WHERE user_id = ? AND site_id = ?",
        )
        .bind(user_id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Mute::from_row).transpose()
    }

    /// Users who muted `site_id`, ascending.
    pub async fn muted_users(&self, site_id: &str) -> Result<Vec<i64>, StoreError> {
        let users =
            sqlx::query_scalar("SELECT user_id FROM user_mutes WHERE site_id = ? ORDER BY user_id")
                .bind(site_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(users)
    }

    /// Sites muted by `user_id`.
    pub async fn user_mutes(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        let sites =
            sqlx::query_scalar("SELECT site_id FROM user_mutes WHERE user_id = ? ORDER BY site_id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(sites)
    }

    /// Removes every mute of `site_id` and returns how many there were.
    pub async fn clear_mutes(&self, site_id: &str) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        delete_site_mutes(&mut conn, site_id).await
    }
}

pub(super) async fn delete_site_mutes(
    conn: &mut SqliteConnection,
    site_id: &str,
) -> Result<u64, StoreError> {
    let deleted = sqlx::query("DELETE FROM user_mutes WHERE site_id = ?")
        .bind(site_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted)
}
