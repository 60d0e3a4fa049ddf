//! Repository for the `timeline_checks` table (append-only time-series).

use chargewatch_core::station::CheckRecord;
use sqlx::{PgConnection, PgPool};

use crate::models::CheckRow;

/// Column list for `timeline_checks` INSERT statements.
const INSERT_COLUMNS: &str = "station_id, station_name, status, timestamp";

/// Rows per INSERT statement; keeps the bind count well under the
/// PostgreSQL limit of 65535 parameters.
const INSERT_CHUNK: usize = 1000;

/// Provides query operations for timeline checks.
pub struct TimelineCheckRepo;

impl TimelineCheckRepo {
    /// Batch-insert check records using multi-row INSERTs.
    pub async fn insert_batch(
        conn: &mut PgConnection,
        checks: &[CheckRecord],
    ) -> Result<(), sqlx::Error> {
        for chunk in checks.chunks(INSERT_CHUNK) {
            let mut query = format!("INSERT INTO timeline_checks ({INSERT_COLUMNS}) VALUES ");
            let mut param_idx = 1u32;
            for (i, _) in chunk.iter().enumerate() {
                if i > 0 {
                    query.push_str(", ");
                }
                query.push('(');
                for j in 0..4 {
                    if j > 0 {
                        query.push_str(", ");
                    }
                    query.push('$');
                    query.push_str(&param_idx.to_string());
                    param_idx += 1;
                }
                query.push(')');
            }

            let mut q = sqlx::query(&query);
            for c in chunk {
                q = q
                    .bind(&c.station_id)
                    .bind(&c.station_name)
                    .bind(c.status.as_str())
                    .bind(&c.timestamp);
            }
            q.execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Checks at or after `cutoff`, oldest first.
    pub async fn list_since(pool: &PgPool, cutoff: &str) -> Result<Vec<CheckRow>, sqlx::Error> {
        sqlx::query_as::<_, CheckRow>(
            "SELECT station_id, station_name, status, timestamp \
             FROM timeline_checks WHERE timestamp >= $1 \
             ORDER BY timestamp, id",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    /// Delete checks older than `cutoff`.
    ///
    /// Returns the number of rows deleted.
    pub async fn delete_older_than(pool: &PgPool, cutoff: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM timeline_checks WHERE timestamp < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
