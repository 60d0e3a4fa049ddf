//! Repository for the `status_history` table (append-only, count-bounded).

use chargewatch_core::station::TransitionEvent;
use sqlx::{PgConnection, PgPool};

use crate::models::TransitionRow;

/// Provides query operations for the transition log.
pub struct StatusHistoryRepo;

impl StatusHistoryRepo {
    /// Append one transition.
    pub async fn insert(conn: &mut PgConnection, event: &TransitionEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO status_history \
                 (station_id, station_name, old_status, new_status, timestamp) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&event.station_id)
        .bind(&event.station_name)
        .bind(event.old_status.map(|s| s.as_str()))
        .bind(event.new_status.as_str())
        .bind(&event.timestamp)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// The newest `limit` transitions, returned oldest first.
    pub async fn list_recent(pool: &PgPool, limit: usize) -> Result<Vec<TransitionRow>, sqlx::Error> {
        let mut rows = sqlx::query_as::<_, TransitionRow>(
            "SELECT id, station_id, station_name, old_status, new_status, timestamp \
             FROM status_history ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;
        rows.reverse();
        Ok(rows)
    }

    /// Delete everything but the newest `keep` rows.
    ///
    /// Returns the number of rows deleted.
    pub async fn prune_to(pool: &PgPool, keep: usize) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM status_history WHERE id NOT IN \
                 (SELECT id FROM status_history ORDER BY id DESC LIMIT $1)",
        )
        .bind(keep as i64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
