//! Durable offline queue backed by a local SQLite file.
//!
//! Item lifecycle: pending -> in_flight -> gone (acknowledged) or
//! failed_permanent. Rows left in_flight by a crash return to pending on
//! the next open, so a restart never loses or reorders work.

use chrono::Utc;
use printwatch_common::jobs::PrintJobPayload;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("queue payload error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One claimed queue item.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: i64,
    pub attempts: i64,
    pub payload: PrintJobPayload,
}

#[derive(Clone)]
pub struct OfflineQueue {
    pool: SqlitePool,
}

impl OfflineQueue {
    pub async fn open(path: &Path) -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        // A single connection keeps claims strictly serial.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let queue = OfflineQueue { pool };
        queue.init().await?;
        Ok(queue)
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let queue = OfflineQueue { pool };
        queue.init().await?;
        Ok(queue)
    }

    async fn init(&self) -> Result<(), QueueError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS queued_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                submission_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                enqueued_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_queued_jobs_state ON queued_jobs(state)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Crash recovery: anything claimed but unresolved goes back to
        // pending, keeping its place in the FIFO (ordering is by id).
        let recovered =
            sqlx::query("UPDATE queued_jobs SET state = 'pending' WHERE state = 'in_flight'")
                .execute(&self.pool)
                .await?
                .rows_affected();
        if recovered > 0 {
            info!(recovered, "Recovered in-flight queue items from previous run.");
        }
        Ok(())
    }

    pub async fn enqueue(&self, payload: &PrintJobPayload) -> Result<i64, QueueError> {
        let payload_json = serde_json::to_string(payload)?;
        let result = sqlx::query(
            "INSERT INTO queued_jobs (submission_id, payload, state, attempts, enqueued_at)
             VALUES (?, ?, 'pending', 0, ?)",
        )
        .bind(payload.submission_id.to_string())
        .bind(payload_json)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Claims the oldest pending item and marks it in-flight. The drain
    /// loop holds at most one claim at a time.
    pub async fn next_pending(&self) -> Result<Option<QueuedJob>, QueueError> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, payload, attempts FROM queued_jobs
             WHERE state = 'pending' ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, payload_json, attempts)) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE queued_jobs SET state = 'in_flight' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let payload: PrintJobPayload = serde_json::from_str(&payload_json)?;
        Ok(Some(QueuedJob {
            id,
            attempts,
            payload,
        }))
    }

    /// The server has the record; the local copy is no longer needed.
    pub async fn acknowledge(&self, id: i64) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM queued_jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns a claimed item to pending after a transient failure.
    pub async fn release(&self, id: i64) -> Result<(), QueueError> {
        sqlx::query("UPDATE queued_jobs SET state = 'pending' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_attempt(&self, id: i64, error: &str) -> Result<(), QueueError> {
        sqlx::query("UPDATE queued_jobs SET attempts = attempts + 1, last_error = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The server definitively rejected the item; it will never be retried.
    pub async fn mark_failed_permanent(&self, id: i64, reason: &str) -> Result<(), QueueError> {
        sqlx::query(
            "UPDATE queued_jobs SET state = 'failed_permanent', last_error = ? WHERE id = ?",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drops everything older than the retention cap except a live claim.
    /// Callers log the count so nothing disappears without a trace.
    pub async fn purge_older_than(&self, retention_days: i64) -> Result<u64, QueueError> {
        let cutoff = Utc::now().timestamp() - retention_days * 24 * 60 * 60;
        let result = sqlx::query(
            "DELETE FROM queued_jobs WHERE enqueued_at < ? AND state != 'in_flight'",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM queued_jobs WHERE state = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Byte offset of the last fully consumed spool line.
    pub async fn load_spool_offset(&self) -> Result<u64, QueueError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM meta WHERE key = 'spool_offset'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row
            .and_then(|(value,)| value.parse().ok())
            .unwrap_or(0))
    }

    pub async fn store_spool_offset(&self, offset: u64) -> Result<(), QueueError> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES ('spool_offset', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(offset.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[cfg(test)]
    async fn backdate_for_test(&self, id: i64, seconds: i64) -> Result<(), QueueError> {
        sqlx::query("UPDATE queued_jobs SET enqueued_at = enqueued_at - ? WHERE id = ?")
            .bind(seconds)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use printwatch_common::jobs::JobStatus;
    use uuid::Uuid;

    fn payload(document: &str) -> PrintJobPayload {
        PrintJobPayload {
            submission_id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            computer_name: "PC-042".to_string(),
            printer_name: "HQ-Laser-1".to_string(),
            printer_ip: None,
            document_name: document.to_string(),
            pages: 2,
            copies: 1,
            is_color: false,
            is_duplex: false,
            status: JobStatus::Completed,
            print_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn items_drain_in_enqueue_order() {
        let queue = OfflineQueue::open_in_memory().await.unwrap();
        queue.enqueue(&payload("first.pdf")).await.unwrap();
        queue.enqueue(&payload("second.pdf")).await.unwrap();
        queue.enqueue(&payload("third.pdf")).await.unwrap();

        let mut drained = Vec::new();
        while let Some(job) = queue.next_pending().await.unwrap() {
            drained.push(job.payload.document_name.clone());
            queue.acknowledge(job.id).await.unwrap();
        }
        assert_eq!(drained, vec!["first.pdf", "second.pdf", "third.pdf"]);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn released_item_keeps_its_place() {
        let queue = OfflineQueue::open_in_memory().await.unwrap();
        queue.enqueue(&payload("first.pdf")).await.unwrap();
        queue.enqueue(&payload("second.pdf")).await.unwrap();

        let job = queue.next_pending().await.unwrap().unwrap();
        assert_eq!(job.payload.document_name, "first.pdf");
        queue.record_attempt(job.id, "connection refused").await.unwrap();
        queue.release(job.id).await.unwrap();

        let again = queue.next_pending().await.unwrap().unwrap();
        assert_eq!(again.payload.document_name, "first.pdf");
        assert_eq!(again.attempts, 1);
    }

    #[tokio::test]
    async fn failed_permanent_items_are_never_offered() {
        let queue = OfflineQueue::open_in_memory().await.unwrap();
        queue.enqueue(&payload("bad.pdf")).await.unwrap();

        let job = queue.next_pending().await.unwrap().unwrap();
        queue
            .mark_failed_permanent(job.id, "validation failure")
            .await
            .unwrap();

        assert!(queue.next_pending().await.unwrap().is_none());
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn in_flight_items_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        {
            let queue = OfflineQueue::open(&path).await.unwrap();
            queue.enqueue(&payload("crashy.pdf")).await.unwrap();
            let job = queue.next_pending().await.unwrap().unwrap();
            assert_eq!(job.payload.document_name, "crashy.pdf");
            // The process dies with the item in flight.
        }

        let reopened = OfflineQueue::open(&path).await.unwrap();
        let job = reopened.next_pending().await.unwrap().unwrap();
        assert_eq!(job.payload.document_name, "crashy.pdf");
    }

    #[tokio::test]
    async fn purge_drops_items_past_retention() {
        let queue = OfflineQueue::open_in_memory().await.unwrap();
        let old_id = queue.enqueue(&payload("old.pdf")).await.unwrap();
        queue.enqueue(&payload("fresh.pdf")).await.unwrap();

        queue
            .backdate_for_test(old_id, 8 * 24 * 60 * 60)
            .await
            .unwrap();

        let purged = queue.purge_older_than(7).await.unwrap();
        assert_eq!(purged, 1);

        let job = queue.next_pending().await.unwrap().unwrap();
        assert_eq!(job.payload.document_name, "fresh.pdf");
        assert!(queue.next_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn spool_offset_round_trips() {
        let queue = OfflineQueue::open_in_memory().await.unwrap();
        assert_eq!(queue.load_spool_offset().await.unwrap(), 0);
        queue.store_spool_offset(4096).await.unwrap();
        assert_eq!(queue.load_spool_offset().await.unwrap(), 4096);
        queue.store_spool_offset(8192).await.unwrap();
        assert_eq!(queue.load_spool_offset().await.unwrap(), 8192);
    }
}
